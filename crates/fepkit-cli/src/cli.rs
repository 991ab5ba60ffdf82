use crate::utils::parser::parse_atom_link;
use clap::{Args, Parser, Subcommand};
use fepkit::engine::fragment::AtomLink;
use fepkit::engine::sampling::SamplingMethod;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "fepkit - alchemical free-energy perturbation toolkit: builds lambda-interpolated OPLS2005 templates and estimates free energies from sampled energy differences.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate an OPLS2005 template and optionally rewrite it in canonical layout.
    Template(TemplateArgs),
    /// Generate the alchemical templates of every lambda window for two end states.
    Schedule(ScheduleArgs),
    /// Estimate free energies from the energy reports of a finished calculation.
    Analyze(AnalyzeArgs),
}

/// Arguments for the `template` subcommand.
#[derive(Args, Debug)]
pub struct TemplateArgs {
    /// Path to the OPLS2005 template to read.
    #[arg(required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Rewrite the parsed template to this path.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Compare against a second end state and list core and fragment atoms.
    #[arg(long, value_name = "PATH")]
    pub against: Option<PathBuf>,

    /// Declare a linker pair as INITIAL:FINAL atom names. Can be used multiple times.
    #[arg(long = "link", value_name = "INITIAL:FINAL", value_parser = parse_atom_link)]
    pub links: Vec<AtomLink>,
}

/// Arguments for the `schedule` subcommand.
#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Path to the configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- End states ---
    /// Template of the initial end state (lambda = 0).
    #[arg(long = "initial", value_name = "PATH")]
    pub initial_template: Option<PathBuf>,

    /// Template of the final end state (lambda = 1).
    #[arg(long = "final", value_name = "PATH")]
    pub final_template: Option<PathBuf>,

    /// Declare a linker pair as INITIAL:FINAL atom names. Can be used multiple times.
    #[arg(long = "link", value_name = "INITIAL:FINAL", value_parser = parse_atom_link)]
    pub links: Vec<AtomLink>,

    // --- Lambda overrides ---
    /// Lambda values shared by both channels, comma-separated.
    #[arg(short, long, value_name = "LIST", value_delimiter = ',', num_args = 1..)]
    pub lambdas: Option<Vec<f64>>,

    /// Lambda values of the steric stage, comma-separated.
    #[arg(long, value_name = "LIST", value_delimiter = ',', num_args = 1..)]
    pub steric_lambdas: Option<Vec<f64>>,

    /// Lambda values of the Coulombic stage, comma-separated.
    #[arg(long, value_name = "LIST", value_delimiter = ',', num_args = 1..)]
    pub coulombic_lambdas: Option<Vec<f64>>,

    /// Perturb sterics and charges in two separate stages.
    #[arg(long)]
    pub split: bool,

    /// Sampling method: double-wide, double-ended or overlap.
    #[arg(short = 'm', long, value_name = "METHOD")]
    pub sampling: Option<SamplingMethod>,

    /// Interpolate bond lengths and spring constants along lambda.
    #[arg(long)]
    pub interpolate_bonds: bool,

    /// Interpolate angles around connecting bonds along lambda.
    #[arg(long)]
    pub interpolate_angles: bool,

    // --- Output ---
    /// Folder receiving one subfolder per lambda and per window.
    #[arg(short, long, value_name = "PATH")]
    pub output_dir: Option<PathBuf>,

    /// File name of the generated templates.
    #[arg(long, value_name = "NAME")]
    pub output_name: Option<String>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S schedule.sampling=double-ended
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `analyze` subcommand.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Path to the configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Folder holding the window folders of the calculation.
    #[arg(value_name = "PATH")]
    pub calculation_path: Option<PathBuf>,

    /// Temperature in Kelvin.
    #[arg(short, long, value_name = "FLOAT")]
    pub temperature: Option<f64>,

    /// Number of block-averaging divisions per window.
    #[arg(short, long, value_name = "INT")]
    pub divisions: Option<usize>,

    /// Sampling method the windows were run with: double-wide or double-ended.
    #[arg(short = 'm', long, value_name = "METHOD")]
    pub sampling: Option<SamplingMethod>,

    /// 1-based column of the energy difference in the report files.
    #[arg(long, value_name = "INT")]
    pub column: Option<usize>,

    /// Extension of the report files.
    #[arg(long, value_name = "EXT")]
    pub extension: Option<String>,

    /// Keep the first data row of every report.
    #[arg(long)]
    pub keep_first: bool,

    /// Write the per-window table as CSV.
    #[arg(short, long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S analysis.temperature=310
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
