use super::combiner::BondedInterpolation;
use super::fragment::AtomLink;
use super::sampling::SamplingMethod;
use crate::core::io::samples::SampleReaderOptions;
use crate::core::lambda::{Channel, LambdaError, LambdaSchedule};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid {channel} lambda schedule: {source}")]
    InvalidSchedule {
        channel: Channel,
        #[source]
        source: LambdaError,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The λ stages of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum StagePlan {
    /// Sterics and charges follow the same schedule.
    Dual(LambdaSchedule),
    /// Sterics and charges are perturbed in two consecutive stages.
    Split {
        steric: LambdaSchedule,
        coulombic: LambdaSchedule,
    },
}

impl StagePlan {
    pub fn is_split(&self) -> bool {
        matches!(self, StagePlan::Split { .. })
    }

    pub fn schedule(&self, channel: Channel) -> Option<&LambdaSchedule> {
        match (self, channel) {
            (StagePlan::Dual(schedule), Channel::Dual) => Some(schedule),
            (StagePlan::Split { steric, .. }, Channel::Steric) => Some(steric),
            (StagePlan::Split { coulombic, .. }, Channel::Coulombic) => Some(coulombic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlchemyConfig {
    pub initial_template: PathBuf,
    pub final_template: PathBuf,
    pub links: Vec<AtomLink>,
    pub stages: StagePlan,
    pub sampling: SamplingMethod,
    pub bonded: BondedInterpolation,
    pub output_dir: PathBuf,
    /// File name of every generated template; defaults to the lower-cased
    /// template name with a `z` suffix.
    pub output_name: Option<String>,
}

#[derive(Default)]
pub struct AlchemyConfigBuilder {
    initial_template: Option<PathBuf>,
    final_template: Option<PathBuf>,
    links: Vec<AtomLink>,
    lambdas: Option<Vec<f64>>,
    steric_lambdas: Option<Vec<f64>>,
    coulombic_lambdas: Option<Vec<f64>>,
    split_channels: bool,
    sampling: Option<SamplingMethod>,
    bonded: BondedInterpolation,
    output_dir: Option<PathBuf>,
    output_name: Option<String>,
}

impl AlchemyConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_template(mut self, path: PathBuf) -> Self {
        self.initial_template = Some(path);
        self
    }
    pub fn final_template(mut self, path: PathBuf) -> Self {
        self.final_template = Some(path);
        self
    }
    pub fn links(mut self, links: Vec<AtomLink>) -> Self {
        self.links = links;
        self
    }
    pub fn lambdas(mut self, values: Vec<f64>) -> Self {
        self.lambdas = Some(values);
        self
    }
    pub fn steric_lambdas(mut self, values: Vec<f64>) -> Self {
        self.steric_lambdas = Some(values);
        self
    }
    pub fn coulombic_lambdas(mut self, values: Vec<f64>) -> Self {
        self.coulombic_lambdas = Some(values);
        self
    }
    pub fn split_channels(mut self, split: bool) -> Self {
        self.split_channels = split;
        self
    }
    pub fn sampling(mut self, method: SamplingMethod) -> Self {
        self.sampling = Some(method);
        self
    }
    pub fn bonded(mut self, bonded: BondedInterpolation) -> Self {
        self.bonded = bonded;
        self
    }
    pub fn output_dir(mut self, path: PathBuf) -> Self {
        self.output_dir = Some(path);
        self
    }
    pub fn output_name(mut self, name: String) -> Self {
        self.output_name = Some(name);
        self
    }

    /// Channel-specific schedules fall back to the dual one when split.
    pub fn build(self) -> Result<AlchemyConfig, ConfigError> {
        let schedule = |values: &[f64], channel| {
            LambdaSchedule::new(values, channel)
                .map_err(|source| ConfigError::InvalidSchedule { channel, source })
        };

        let stages = if self.split_channels {
            let steric = self
                .steric_lambdas
                .as_ref()
                .or(self.lambdas.as_ref())
                .ok_or(ConfigError::MissingParameter("steric_lambdas"))?;
            let coulombic = self
                .coulombic_lambdas
                .as_ref()
                .or(self.lambdas.as_ref())
                .ok_or(ConfigError::MissingParameter("coulombic_lambdas"))?;
            StagePlan::Split {
                steric: schedule(steric, Channel::Steric)?,
                coulombic: schedule(coulombic, Channel::Coulombic)?,
            }
        } else {
            let lambdas = self
                .lambdas
                .as_ref()
                .ok_or(ConfigError::MissingParameter("lambdas"))?;
            StagePlan::Dual(schedule(lambdas, Channel::Dual)?)
        };

        if let Some(name) = &self.output_name {
            if name.trim().is_empty() || name.contains(['/', '\\']) {
                return Err(ConfigError::Invalid(format!(
                    "output template name '{name}' must be a plain file name"
                )));
            }
        }

        Ok(AlchemyConfig {
            initial_template: self
                .initial_template
                .ok_or(ConfigError::MissingParameter("initial_template"))?,
            final_template: self
                .final_template
                .ok_or(ConfigError::MissingParameter("final_template"))?,
            links: self.links,
            stages,
            sampling: self
                .sampling
                .ok_or(ConfigError::MissingParameter("sampling"))?,
            bonded: self.bonded,
            output_dir: self
                .output_dir
                .ok_or(ConfigError::MissingParameter("output_dir"))?,
            output_name: self.output_name,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Folder holding the window folders, directly or in stage folders.
    pub calculation_path: PathBuf,
    pub temperature: f64,
    pub divisions: usize,
    /// How the window folders were sampled, which decides how the sums combine.
    pub sampling: SamplingMethod,
    pub samples: SampleReaderOptions,
    pub report_path: Option<PathBuf>,
}

#[derive(Default)]
pub struct AnalysisConfigBuilder {
    calculation_path: Option<PathBuf>,
    temperature: Option<f64>,
    divisions: Option<usize>,
    sampling: Option<SamplingMethod>,
    samples: SampleReaderOptions,
    report_path: Option<PathBuf>,
}

impl AnalysisConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calculation_path(mut self, path: PathBuf) -> Self {
        self.calculation_path = Some(path);
        self
    }
    pub fn temperature(mut self, kelvin: f64) -> Self {
        self.temperature = Some(kelvin);
        self
    }
    pub fn divisions(mut self, n: usize) -> Self {
        self.divisions = Some(n);
        self
    }
    pub fn sampling(mut self, method: SamplingMethod) -> Self {
        self.sampling = Some(method);
        self
    }
    pub fn energy_column(mut self, column: usize) -> Self {
        self.samples.column = column;
        self
    }
    pub fn header_lines(mut self, lines: usize) -> Self {
        self.samples.header_lines = lines;
        self
    }
    pub fn discard_first(mut self, discard: bool) -> Self {
        self.samples.discard_first = discard;
        self
    }
    pub fn extension(mut self, extension: String) -> Self {
        self.samples.extension = extension;
        self
    }
    pub fn report_path(mut self, path: PathBuf) -> Self {
        self.report_path = Some(path);
        self
    }

    pub fn build(self) -> Result<AnalysisConfig, ConfigError> {
        let temperature = self
            .temperature
            .ok_or(ConfigError::MissingParameter("temperature"))?;
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be positive, got {temperature}"
            )));
        }
        let divisions = self
            .divisions
            .ok_or(ConfigError::MissingParameter("divisions"))?;
        if divisions == 0 {
            return Err(ConfigError::Invalid(
                "divisions must be at least 1".to_string(),
            ));
        }
        if self.samples.column == 0 {
            return Err(ConfigError::Invalid(
                "energy column is 1-based".to_string(),
            ));
        }

        Ok(AnalysisConfig {
            calculation_path: self
                .calculation_path
                .ok_or(ConfigError::MissingParameter("calculation_path"))?,
            temperature,
            divisions,
            sampling: self.sampling.unwrap_or_default(),
            samples: self.samples,
            report_path: self.report_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alchemy() -> AlchemyConfigBuilder {
        AlchemyConfigBuilder::new()
            .initial_template(PathBuf::from("etz"))
            .final_template(PathBuf::from("prz"))
            .sampling(SamplingMethod::DoubleWide)
            .output_dir(PathBuf::from("out"))
    }

    #[test]
    fn dual_plan_uses_the_shared_schedule() {
        let config = alchemy().lambdas(vec![0.25, 0.75]).build().unwrap();
        let schedule = config.stages.schedule(Channel::Dual).unwrap();
        assert_eq!(schedule.values().collect::<Vec<_>>(), vec![0.25, 0.75]);
        assert!(!config.stages.is_split());
    }

    #[test]
    fn split_plan_falls_back_to_shared_schedule() {
        let config = alchemy()
            .lambdas(vec![0.5])
            .coulombic_lambdas(vec![0.1, 0.9])
            .split_channels(true)
            .build()
            .unwrap();
        let steric = config.stages.schedule(Channel::Steric).unwrap();
        let coulombic = config.stages.schedule(Channel::Coulombic).unwrap();
        assert_eq!(steric.values().collect::<Vec<_>>(), vec![0.5]);
        assert_eq!(coulombic.channel(), Channel::Coulombic);
        assert_eq!(coulombic.len(), 2);
    }

    #[test]
    fn missing_fields_are_named() {
        let err = AlchemyConfigBuilder::new()
            .lambdas(vec![0.5])
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("initial_template"));

        let err = alchemy().build().unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("lambdas"));
    }

    #[test]
    fn invalid_schedule_names_its_channel() {
        let err = alchemy()
            .steric_lambdas(vec![0.5, 0.4, 0.6])
            .coulombic_lambdas(vec![0.5])
            .split_channels(true)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidSchedule {
                channel: Channel::Steric,
                source: LambdaError::NotMonotonic { .. }
            }
        ));
    }

    #[test]
    fn output_name_must_be_a_file_name() {
        let err = alchemy()
            .lambdas(vec![0.5])
            .output_name("a/b".to_string())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn analysis_defaults_follow_report_layout() {
        let config = AnalysisConfigBuilder::new()
            .calculation_path(PathBuf::from("calc"))
            .temperature(300.0)
            .divisions(2)
            .build()
            .unwrap();
        assert_eq!(config.samples, SampleReaderOptions::default());
        assert_eq!(config.sampling, SamplingMethod::DoubleWide);
        assert_eq!(config.report_path, None);
    }

    #[test]
    fn analysis_rejects_bad_values() {
        let base = || {
            AnalysisConfigBuilder::new()
                .calculation_path(PathBuf::from("calc"))
                .divisions(1)
        };
        assert!(matches!(
            base().temperature(-1.0).build(),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            base().temperature(300.0).energy_column(0).build(),
            Err(ConfigError::Invalid(_))
        ));
        assert_eq!(
            base().build().unwrap_err(),
            ConfigError::MissingParameter("temperature")
        );
    }
}
