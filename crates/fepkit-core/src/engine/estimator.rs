use super::config::ConfigError;
use super::error::SamplingError;
use super::sampling::SamplingMethod;
use crate::core::io::report::WindowRecord;
use crate::core::io::samples::SampleGroup;
use crate::core::lambda::{Direction, Window};
use crate::core::stats;
use tracing::{debug, warn};

/// Free energy of one window, or a marker that no samples were available.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowEstimate {
    Estimate {
        delta_g: f64,
        standard_error: f64,
        samples: usize,
        divisions: usize,
    },
    NoData,
}

impl WindowEstimate {
    pub fn delta_g(&self) -> Option<f64> {
        match self {
            WindowEstimate::Estimate { delta_g, .. } => Some(*delta_g),
            WindowEstimate::NoData => None,
        }
    }

    pub fn standard_error(&self) -> Option<f64> {
        match self {
            WindowEstimate::Estimate { standard_error, .. } => Some(*standard_error),
            WindowEstimate::NoData => None,
        }
    }

    pub fn samples(&self) -> usize {
        match self {
            WindowEstimate::Estimate { samples, .. } => *samples,
            WindowEstimate::NoData => 0,
        }
    }

    pub fn divisions(&self) -> usize {
        match self {
            WindowEstimate::Estimate { divisions, .. } => *divisions,
            WindowEstimate::NoData => 0,
        }
    }

    pub fn has_data(&self) -> bool {
        matches!(self, WindowEstimate::Estimate { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowResult {
    pub window: Window,
    pub estimate: WindowEstimate,
}

impl WindowResult {
    pub fn to_record(&self) -> WindowRecord {
        WindowRecord {
            channel: self.window.channel(),
            source_lambda: self.window.source.value(),
            shifted_lambda: self.window.shifted.value(),
            direction: self.window.direction(),
            delta_g: self.estimate.delta_g(),
            standard_error: self.estimate.standard_error(),
            samples: self.estimate.samples(),
            divisions: self.estimate.divisions(),
        }
    }
}

/// Summed free energy of the windows sharing one direction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DirectionTotal {
    pub delta_g: f64,
    pub standard_error: f64,
    pub windows: usize,
}

impl DirectionTotal {
    fn accumulate<'a>(estimates: impl Iterator<Item = &'a WindowEstimate>) -> Self {
        let (mut delta_g, mut errors, mut windows) = (0.0, Vec::new(), 0);
        for estimate in estimates {
            if let WindowEstimate::Estimate {
                delta_g: dg,
                standard_error,
                ..
            } = estimate
            {
                delta_g += dg;
                errors.push(*standard_error);
                windows += 1;
            }
        }
        Self {
            delta_g,
            standard_error: stats::root_sum_square(errors),
            windows,
        }
    }
}

/// Forward and backward sums over a set of windows, kept apart.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FreeEnergySummary {
    pub forward: DirectionTotal,
    pub backward: DirectionTotal,
    pub empty_windows: usize,
}

impl FreeEnergySummary {
    pub fn total(&self, direction: Direction) -> &DirectionTotal {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Backward => &self.backward,
        }
    }

    /// Path free energy when every scheduled λ was shifted both ways by half
    /// a step: the forward sum minus the backward sum.
    pub fn double_wide_total(&self) -> DirectionTotal {
        DirectionTotal {
            delta_g: self.forward.delta_g - self.backward.delta_g,
            standard_error: stats::root_sum_square([
                self.forward.standard_error,
                self.backward.standard_error,
            ]),
            windows: self.forward.windows + self.backward.windows,
        }
    }

    /// The backward sum read as a second estimate of the forward path.
    pub fn reverse_total(&self) -> DirectionTotal {
        DirectionTotal {
            delta_g: -self.backward.delta_g,
            ..self.backward
        }
    }

    /// Path free energy as the given sampling method defines it.
    pub fn path_estimate(&self, sampling: SamplingMethod) -> Result<PathEstimate, SamplingError> {
        match sampling {
            SamplingMethod::DoubleWide => Ok(PathEstimate::DoubleWide(self.double_wide_total())),
            SamplingMethod::DoubleEnded => Ok(PathEstimate::DoubleEnded {
                forward: self.forward,
                reverse: self.reverse_total(),
            }),
            SamplingMethod::Overlap => Err(SamplingError::Unimplemented {
                method: sampling.as_str(),
            }),
        }
    }
}

/// How a summary reads as a free energy for the whole path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathEstimate {
    /// One estimate combining both half-steps of every window.
    DoubleWide(DirectionTotal),
    /// Two independent estimates, one per sweep direction.
    DoubleEnded {
        forward: DirectionTotal,
        reverse: DirectionTotal,
    },
}

/// Exponential-averaging estimator with block-averaged errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreeEnergyEstimator {
    temperature: f64,
    divisions: usize,
}

impl FreeEnergyEstimator {
    pub fn new(temperature: f64, divisions: usize) -> Result<Self, ConfigError> {
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be positive, got {temperature}"
            )));
        }
        if divisions == 0 {
            return Err(ConfigError::Invalid(
                "divisions must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            temperature,
            divisions,
        })
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn divisions(&self) -> usize {
        self.divisions
    }

    /// Estimates a window from its per-file sample groups.
    ///
    /// Group `i` goes to division `i % D` by its position in `groups`, empty
    /// groups included, so a given file always lands in the same division.
    /// At most as many divisions as groups are formed; divisions left without
    /// samples do not contribute.
    pub fn estimate_groups(&self, groups: &[SampleGroup]) -> WindowEstimate {
        if groups.is_empty() {
            return WindowEstimate::NoData;
        }

        let count = self.divisions.min(groups.len());
        let mut divisions = vec![Vec::new(); count];
        for (index, group) in groups.iter().enumerate() {
            divisions[index % count].extend_from_slice(&group.energies);
        }

        let estimates: Vec<f64> = divisions
            .iter()
            .filter_map(|energies| stats::free_energy(energies, self.temperature))
            .collect();
        let Some(delta_g) = stats::mean(&estimates) else {
            return WindowEstimate::NoData;
        };

        WindowEstimate::Estimate {
            delta_g,
            standard_error: stats::standard_error_of_mean(&estimates),
            samples: divisions.iter().map(Vec::len).sum(),
            divisions: estimates.len(),
        }
    }

    /// Estimates a window whose samples all come from a single source.
    pub fn estimate_samples(&self, energies: &[f64]) -> WindowEstimate {
        match stats::free_energy(energies, self.temperature) {
            Some(delta_g) => WindowEstimate::Estimate {
                delta_g,
                standard_error: 0.0,
                samples: energies.len(),
                divisions: 1,
            },
            None => WindowEstimate::NoData,
        }
    }

    pub fn estimate_window(&self, window: Window, groups: &[SampleGroup]) -> WindowResult {
        let estimate = self.estimate_groups(groups);
        match estimate {
            WindowEstimate::Estimate {
                delta_g,
                standard_error,
                ..
            } => debug!("{window}: dG = {delta_g:.5} +/- {standard_error:.5} kcal/mol"),
            WindowEstimate::NoData => warn!("{window} has no samples"),
        }
        WindowResult { window, estimate }
    }

    /// Sums window free energies per direction and combines their errors
    /// by root-sum-of-squares. Windows without data are counted but
    /// contribute nothing.
    pub fn aggregate(&self, results: &[WindowResult]) -> FreeEnergySummary {
        let by_direction = |direction: Direction| {
            DirectionTotal::accumulate(
                results
                    .iter()
                    .filter(move |r| r.window.direction() == direction)
                    .map(|r| &r.estimate),
            )
        };
        FreeEnergySummary {
            forward: by_direction(Direction::Forward),
            backward: by_direction(Direction::Backward),
            empty_windows: results.iter().filter(|r| !r.estimate.has_data()).count(),
        }
    }
}
