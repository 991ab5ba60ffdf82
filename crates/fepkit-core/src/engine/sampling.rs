use super::error::SamplingError;
use crate::core::lambda::{Lambda, LambdaNode, LambdaSchedule};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the neighbours of a sampled λ are chosen for reweighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SamplingMethod {
    /// Half a step towards each neighbour, reaching 0 and 1 at the edges.
    #[default]
    DoubleWide,
    /// A full step onto each existing neighbour.
    DoubleEnded,
    /// Accepted in configuration but has no shift rule.
    Overlap,
}

impl SamplingMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SamplingMethod::DoubleWide => "double-wide",
            SamplingMethod::DoubleEnded => "double-ended",
            SamplingMethod::Overlap => "overlap",
        }
    }

    /// λ values whose energies are evaluated from samples taken at `node`.
    ///
    /// The shift towards the previous node, when present, comes first.
    /// Shifted values keep the channel of `node`.
    pub fn shifted_lambdas(
        self,
        schedule: &LambdaSchedule,
        node: &LambdaNode,
    ) -> Result<Vec<Lambda>, SamplingError> {
        let channel = node.channel();
        let value = node.value();
        let previous = schedule.previous(node).map(LambdaNode::value);
        let next = schedule.next(node).map(LambdaNode::value);

        match self {
            SamplingMethod::DoubleWide => {
                let towards_previous = previous.map_or(0.0, |p| value - (value - p) / 2.0);
                let towards_next = next.map_or(1.0, |n| value + (n - value) / 2.0);
                Ok(vec![
                    Lambda::clamped(towards_previous, channel),
                    Lambda::clamped(towards_next, channel),
                ])
            }
            SamplingMethod::DoubleEnded => Ok(previous
                .into_iter()
                .chain(next)
                .map(|v| Lambda::clamped(v, channel))
                .collect()),
            SamplingMethod::Overlap => Err(SamplingError::Unimplemented {
                method: self.as_str(),
            }),
        }
    }
}

impl fmt::Display for SamplingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown sampling method '{0}' (expected double-wide, double-ended or overlap)")]
pub struct ParseSamplingMethodError(pub String);

impl FromStr for SamplingMethod {
    type Err = ParseSamplingMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "double-wide" | "doublewide" => Ok(SamplingMethod::DoubleWide),
            "double-ended" | "doubleended" => Ok(SamplingMethod::DoubleEnded),
            "overlap" => Ok(SamplingMethod::Overlap),
            _ => Err(ParseSamplingMethodError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lambda::Channel;

    fn schedule() -> LambdaSchedule {
        LambdaSchedule::new(&[0.2, 0.5, 0.8], Channel::Steric).unwrap()
    }

    fn shifts(method: SamplingMethod, index: usize) -> Vec<f64> {
        let schedule = schedule();
        let node = schedule.node(index).unwrap();
        method
            .shifted_lambdas(&schedule, node)
            .unwrap()
            .iter()
            .map(Lambda::value)
            .collect()
    }

    fn assert_values(actual: Vec<f64>, expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "{actual:?} vs {expected:?}");
        }
    }

    #[test]
    fn double_wide_shifts_half_a_step() {
        assert_values(shifts(SamplingMethod::DoubleWide, 1), &[0.35, 0.65]);
        assert_values(shifts(SamplingMethod::DoubleWide, 0), &[0.0, 0.35]);
        assert_values(shifts(SamplingMethod::DoubleWide, 2), &[0.65, 1.0]);
    }

    #[test]
    fn double_ended_shifts_onto_neighbours_only() {
        assert_values(shifts(SamplingMethod::DoubleEnded, 1), &[0.2, 0.8]);
        assert_values(shifts(SamplingMethod::DoubleEnded, 0), &[0.5]);
        assert_values(shifts(SamplingMethod::DoubleEnded, 2), &[0.5]);
    }

    #[test]
    fn single_node_schedule_has_no_double_ended_shift() {
        let schedule = LambdaSchedule::new(&[0.5], Channel::Dual).unwrap();
        let node = schedule.node(0).unwrap();
        assert!(SamplingMethod::DoubleEnded
            .shifted_lambdas(&schedule, node)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn shifted_lambdas_keep_the_node_channel() {
        let schedule = schedule();
        let node = schedule.node(1).unwrap();
        for method in [SamplingMethod::DoubleWide, SamplingMethod::DoubleEnded] {
            for lambda in method.shifted_lambdas(&schedule, node).unwrap() {
                assert_eq!(lambda.channel(), Channel::Steric);
            }
        }
    }

    #[test]
    fn descending_schedule_shifts_towards_neighbours() {
        let schedule = LambdaSchedule::new(&[0.8, 0.5, 0.2], Channel::Dual).unwrap();
        let node = schedule.node(1).unwrap();
        let values: Vec<f64> = SamplingMethod::DoubleWide
            .shifted_lambdas(&schedule, node)
            .unwrap()
            .iter()
            .map(Lambda::value)
            .collect();
        assert_values(values, &[0.65, 0.35]);
    }

    #[test]
    fn overlap_fails_loudly() {
        let schedule = schedule();
        let node = schedule.node(1).unwrap();
        assert_eq!(
            SamplingMethod::Overlap.shifted_lambdas(&schedule, node),
            Err(SamplingError::Unimplemented { method: "overlap" })
        );
    }

    #[test]
    fn method_names_parse() {
        assert_eq!("double-wide".parse(), Ok(SamplingMethod::DoubleWide));
        assert_eq!("Double_Ended".parse(), Ok(SamplingMethod::DoubleEnded));
        assert_eq!("overlap".parse(), Ok(SamplingMethod::Overlap));
        assert!("triple".parse::<SamplingMethod>().is_err());
    }
}
