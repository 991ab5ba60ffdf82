use crate::core::io::report::{self, WindowRecord};
use crate::core::io::samples::read_window_samples;
use crate::core::lambda::{Channel, Window};
use crate::engine::config::AnalysisConfig;
use crate::engine::error::{EngineError, SamplingError};
use crate::engine::estimator::{
    FreeEnergyEstimator, FreeEnergySummary, PathEstimate, WindowResult,
};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::sampling::SamplingMethod;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A window folder found under the calculation path.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowFolder {
    pub window: Window,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSummary {
    pub channel: Channel,
    pub summary: FreeEnergySummary,
    pub path: PathEstimate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub windows: Vec<WindowResult>,
    /// One entry per channel present, in stage order.
    pub channels: Vec<ChannelSummary>,
    pub overall: FreeEnergySummary,
    pub path: PathEstimate,
}

impl AnalysisResult {
    pub fn records(&self) -> Vec<WindowRecord> {
        self.windows.iter().map(WindowResult::to_record).collect()
    }
}

/// Parses a `<n>_<Channel>` stage folder name.
fn stage_channel(name: &str) -> Option<(usize, Channel)> {
    let (index, channel) = name.split_once('_')?;
    Some((index.parse().ok()?, channel.parse().ok()?))
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
    let io_err = |source| EngineError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn folder_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

fn windows_in(dir: &Path, channel: Channel) -> Result<Vec<WindowFolder>, EngineError> {
    let mut folders = Vec::new();
    for path in subdirectories(dir)? {
        let Some(name) = folder_name(&path) else {
            continue;
        };
        match Window::from_folder_name(name, channel) {
            Ok(window) => folders.push(WindowFolder { window, path }),
            Err(_) => debug!("Ignoring folder '{}'", path.display()),
        }
    }
    folders.sort_by(|a, b| {
        let (a, b) = (&a.window, &b.window);
        a.source
            .value()
            .total_cmp(&b.source.value())
            .then(a.shifted.value().total_cmp(&b.shifted.value()))
    });
    Ok(folders)
}

/// Finds window folders directly under `root` (dual channel) and inside
/// `<n>_<Channel>` stage folders, ordered by stage then by source λ.
pub fn discover_windows(root: &Path) -> Result<Vec<WindowFolder>, EngineError> {
    let mut stages: Vec<(usize, Channel, PathBuf)> = subdirectories(root)?
        .into_iter()
        .filter_map(|path| {
            let (index, channel) = stage_channel(folder_name(&path)?)?;
            Some((index, channel, path))
        })
        .collect();
    stages.sort_by_key(|(index, _, _)| *index);

    let mut folders = windows_in(root, Channel::Dual)?;
    for (_, channel, path) in &stages {
        folders.extend(windows_in(path, *channel)?);
    }
    Ok(folders)
}

/// Estimates every window under the calculation path and, when a report
/// path is configured, exports the per-window table as CSV.
#[instrument(skip_all, name = "analysis_workflow")]
pub fn run(
    config: &AnalysisConfig,
    reporter: &ProgressReporter,
) -> Result<AnalysisResult, EngineError> {
    let estimator = FreeEnergyEstimator::new(config.temperature, config.divisions)?;
    if config.sampling == SamplingMethod::Overlap {
        return Err(SamplingError::Unimplemented {
            method: config.sampling.as_str(),
        }
        .into());
    }

    reporter.report(Progress::PhaseStart {
        name: "Discovering windows",
    });
    let folders = discover_windows(&config.calculation_path)?;
    if folders.is_empty() {
        warn!(
            "No window folders found under '{}'",
            config.calculation_path.display()
        );
    }
    info!("Found {} window folders", folders.len());
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart {
        name: "Estimating free energies",
    });
    reporter.report(Progress::TaskStart {
        total_steps: folders.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = folders.iter();

    #[cfg(feature = "parallel")]
    let iterator = folders.par_iter();

    let results: Vec<Result<WindowResult, EngineError>> = iterator
        .map(|folder| {
            let result = read_window_samples(&folder.path, &config.samples)
                .map(|groups| estimator.estimate_window(folder.window, &groups))
                .map_err(EngineError::from);
            reporter.report(Progress::TaskIncrement);
            result
        })
        .collect();
    reporter.report(Progress::TaskFinish);

    let windows = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    reporter.report(Progress::PhaseFinish);

    let mut channels: Vec<Channel> = Vec::new();
    for result in &windows {
        if !channels.contains(&result.window.channel()) {
            channels.push(result.window.channel());
        }
    }
    let channels = channels
        .into_iter()
        .map(|channel| {
            let members: Vec<WindowResult> = windows
                .iter()
                .filter(|r| r.window.channel() == channel)
                .copied()
                .collect();
            let summary = estimator.aggregate(&members);
            Ok(ChannelSummary {
                channel,
                summary,
                path: summary.path_estimate(config.sampling)?,
            })
        })
        .collect::<Result<Vec<_>, SamplingError>>()?;
    let overall = estimator.aggregate(&windows);
    let path = overall.path_estimate(config.sampling)?;
    match path {
        PathEstimate::DoubleWide(total) => info!(
            "Path dG = {:.4} +/- {:.4} kcal/mol over {} windows",
            total.delta_g, total.standard_error, total.windows
        ),
        PathEstimate::DoubleEnded { forward, reverse } => info!(
            "Forward dG = {:.4} +/- {:.4}, reverse dG = {:.4} +/- {:.4} kcal/mol",
            forward.delta_g, forward.standard_error, reverse.delta_g, reverse.standard_error
        ),
    }

    let result = AnalysisResult {
        windows,
        channels,
        overall,
        path,
    };

    if let Some(path) = &config.report_path {
        report::write_records_to_path(path, &result.records())?;
        info!("Wrote window report to '{}'", path.display());
    }

    Ok(result)
}
