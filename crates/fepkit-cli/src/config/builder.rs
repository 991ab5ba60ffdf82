use super::defaults::DefaultsConfig;
use super::file::{FileAnalysisConfig, FileConfig, FileScheduleConfig};
use crate::cli::{AnalyzeArgs, ScheduleArgs};
use crate::error::{CliError, Result};
use crate::utils::parser;
use fepkit::engine::combiner::BondedInterpolation;
use fepkit::engine::config as core_config;
use std::path::Path;
use std::str::FromStr;

pub fn build_schedule_config(args: &ScheduleArgs) -> Result<core_config::AlchemyConfig> {
    let defaults = DefaultsConfig::default();
    let file_config = load_file_config(args.config.as_deref(), &args.set_values)?;
    let file = file_config.schedule.unwrap_or_default();

    let initial_template = args
        .initial_template
        .clone()
        .or(file.initial_template)
        .ok_or_else(|| required("initial-template", "--initial"))?;
    let final_template = args
        .final_template
        .clone()
        .or(file.final_template)
        .ok_or_else(|| required("final-template", "--final"))?;

    let links = if args.links.is_empty() {
        file.links
            .unwrap_or_default()
            .iter()
            .map(|link| {
                parser::parse_atom_link(link).map_err(|e| CliError::Config(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?
    } else {
        args.links.clone()
    };

    let split = args.split || file.split.unwrap_or(false);
    let bonded = BondedInterpolation {
        bonds: args.interpolate_bonds || file.interpolate_bonds.unwrap_or(false),
        angles: args.interpolate_angles || file.interpolate_angles.unwrap_or(false),
    };

    let mut builder = core_config::AlchemyConfigBuilder::new()
        .initial_template(initial_template)
        .final_template(final_template)
        .links(links)
        .lambdas(
            args.lambdas
                .clone()
                .or(file.lambdas)
                .unwrap_or(defaults.lambdas),
        )
        .split_channels(split)
        .sampling(args.sampling.or(file.sampling).unwrap_or(defaults.sampling))
        .bonded(bonded)
        .output_dir(
            args.output_dir
                .clone()
                .or(file.output_dir)
                .unwrap_or(defaults.output_dir),
        );
    if let Some(values) = args.steric_lambdas.clone().or(file.steric_lambdas) {
        builder = builder.steric_lambdas(values);
    }
    if let Some(values) = args.coulombic_lambdas.clone().or(file.coulombic_lambdas) {
        builder = builder.coulombic_lambdas(values);
    }
    if let Some(name) = args.output_name.clone().or(file.output_name) {
        builder = builder.output_name(name);
    }

    builder.build().map_err(|e| CliError::Config(e.to_string()))
}

pub fn build_analysis_config(args: &AnalyzeArgs) -> Result<core_config::AnalysisConfig> {
    let defaults = DefaultsConfig::default();
    let file_config = load_file_config(args.config.as_deref(), &args.set_values)?;
    let file = file_config.analysis.unwrap_or_default();

    let calculation_path = args
        .calculation_path
        .clone()
        .or(file.calculation_path)
        .ok_or_else(|| required("calculation-path", "the PATH argument"))?;

    let discard_first = if args.keep_first {
        false
    } else {
        file.discard_first.unwrap_or(defaults.discard_first)
    };

    let mut builder = core_config::AnalysisConfigBuilder::new()
        .calculation_path(calculation_path)
        .temperature(
            args.temperature
                .or(file.temperature)
                .unwrap_or(defaults.temperature),
        )
        .divisions(args.divisions.or(file.divisions).unwrap_or(defaults.divisions))
        .sampling(args.sampling.or(file.sampling).unwrap_or(defaults.sampling))
        .energy_column(args.column.or(file.column).unwrap_or(defaults.column))
        .extension(
            args.extension
                .clone()
                .or(file.extension)
                .unwrap_or(defaults.extension),
        )
        .discard_first(discard_first);
    if let Some(path) = args.report.clone().or(file.report) {
        builder = builder.report_path(path);
    }

    builder.build().map_err(|e| CliError::Config(e.to_string()))
}

fn required(key: &str, flag: &str) -> CliError {
    CliError::Config(format!(
        "A value for '{}' is required either in the config file or via {}.",
        key, flag
    ))
}

fn load_file_config(path: Option<&Path>, set_values: &[String]) -> Result<FileConfig> {
    let config = match path {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    apply_set_values(config, set_values)
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

fn parse_list(key: &str, value: &str) -> Result<Vec<f64>> {
    value
        .split(',')
        .map(|item| parse_value(key, item.trim(), "float"))
        .collect()
}

fn schedule(config: &mut FileConfig) -> &mut FileScheduleConfig {
    config.schedule.get_or_insert_with(Default::default)
}

fn analysis(config: &mut FileConfig) -> &mut FileAnalysisConfig {
    config.analysis.get_or_insert_with(Default::default)
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let (key, value_str) = kv_pair.split_once('=').ok_or_else(|| {
            CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            ))
        })?;

        match key {
            "schedule.lambdas" => {
                schedule(&mut config).lambdas = Some(parse_list(key, value_str)?);
            }
            "schedule.steric-lambdas" => {
                schedule(&mut config).steric_lambdas = Some(parse_list(key, value_str)?);
            }
            "schedule.coulombic-lambdas" => {
                schedule(&mut config).coulombic_lambdas = Some(parse_list(key, value_str)?);
            }
            "schedule.split" => {
                schedule(&mut config).split = Some(parse_value(key, value_str, "boolean")?);
            }
            "schedule.sampling" => {
                schedule(&mut config).sampling = Some(
                    value_str
                        .parse()
                        .map_err(|e| CliError::Config(format!("{}: {}", key, e)))?,
                );
            }
            "schedule.output-name" => {
                schedule(&mut config).output_name = Some(value_str.to_string());
            }
            "analysis.temperature" => {
                analysis(&mut config).temperature = Some(parse_value(key, value_str, "float")?);
            }
            "analysis.divisions" => {
                analysis(&mut config).divisions = Some(parse_value(key, value_str, "integer")?);
            }
            "analysis.column" => {
                analysis(&mut config).column = Some(parse_value(key, value_str, "integer")?);
            }
            "analysis.extension" => {
                analysis(&mut config).extension = Some(value_str.to_string());
            }
            "analysis.sampling" => {
                analysis(&mut config).sampling = Some(
                    value_str
                        .parse()
                        .map_err(|e| CliError::Config(format!("{}: {}", key, e)))?,
                );
            }
            "analysis.discard-first" => {
                analysis(&mut config).discard_first =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
