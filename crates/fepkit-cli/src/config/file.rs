use crate::error::{CliError, Result};
use fepkit::engine::sampling::SamplingMethod;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileScheduleConfig {
    pub initial_template: Option<PathBuf>,
    pub final_template: Option<PathBuf>,
    /// `INITIAL:FINAL` atom-name pairs.
    pub links: Option<Vec<String>>,
    pub lambdas: Option<Vec<f64>>,
    pub steric_lambdas: Option<Vec<f64>>,
    pub coulombic_lambdas: Option<Vec<f64>>,
    pub split: Option<bool>,
    pub sampling: Option<SamplingMethod>,
    pub interpolate_bonds: Option<bool>,
    pub interpolate_angles: Option<bool>,
    pub output_dir: Option<PathBuf>,
    pub output_name: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileAnalysisConfig {
    pub calculation_path: Option<PathBuf>,
    pub temperature: Option<f64>,
    pub divisions: Option<usize>,
    pub sampling: Option<SamplingMethod>,
    pub column: Option<usize>,
    pub extension: Option<String>,
    pub discard_first: Option<bool>,
    pub report: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub schedule: Option<FileScheduleConfig>,
    pub analysis: Option<FileAnalysisConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}
