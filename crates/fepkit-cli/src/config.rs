mod builder;
mod defaults;
mod file;

pub use builder::{build_analysis_config, build_schedule_config};
