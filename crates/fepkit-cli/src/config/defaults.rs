use fepkit::engine::sampling::SamplingMethod;
use std::path::PathBuf;

pub struct DefaultsConfig {
    pub lambdas: Vec<f64>,
    pub sampling: SamplingMethod,
    pub output_dir: PathBuf,
    pub temperature: f64,
    pub divisions: usize,
    pub column: usize,
    pub extension: String,
    pub discard_first: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            lambdas: (0..10).map(|i| (5 + 10 * i) as f64 / 100.0).collect(),
            sampling: SamplingMethod::DoubleWide,
            output_dir: PathBuf::from("lambdas"),
            temperature: 300.0,
            divisions: 1,
            column: 5,
            extension: "out".to_string(),
            discard_first: true,
        }
    }
}
