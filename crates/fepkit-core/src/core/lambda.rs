use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LambdaError {
    #[error("Lambda value {value} is outside [0, 1]")]
    OutOfRange { value: f64 },
    #[error("Lambda schedule is not strictly monotonic at position {index} ({previous} -> {value})")]
    NotMonotonic {
        index: usize,
        previous: f64,
        value: f64,
    },
    #[error("Lambda schedule is empty")]
    Empty,
    #[error("Invalid lambda value '{0}'")]
    InvalidValue(String),
    #[error("Invalid lambda channel '{0}' (expected dual, steric or coulombic)")]
    InvalidChannel(String),
    #[error("Invalid window folder name '{0}' (expected '<source>_<shifted>' with distinct values in [0, 1])")]
    InvalidWindowName(String),
}

/// Which nonbonded parameters a λ acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    /// Sterics and electrostatics together.
    #[default]
    Dual,
    Steric,
    Coulombic,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Dual => "Dual",
            Channel::Steric => "Steric",
            Channel::Coulombic => "Coulombic",
        }
    }

    /// The channel held constant while this one is scheduled, for split stages.
    pub fn complement(self) -> Option<Channel> {
        match self {
            Channel::Dual => None,
            Channel::Steric => Some(Channel::Coulombic),
            Channel::Coulombic => Some(Channel::Steric),
        }
    }

    pub fn affects_sterics(self) -> bool {
        matches!(self, Channel::Dual | Channel::Steric)
    }

    pub fn affects_charges(self) -> bool {
        matches!(self, Channel::Dual | Channel::Coulombic)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = LambdaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dual" => Ok(Channel::Dual),
            "steric" | "sterics" => Ok(Channel::Steric),
            "coulombic" | "coulomb" => Ok(Channel::Coulombic),
            _ => Err(LambdaError::InvalidChannel(s.to_string())),
        }
    }
}

/// Renders a λ the way window folders name it: rounded to five decimals,
/// always with a fractional part.
pub fn format_lambda(value: f64) -> String {
    let rounded = (value * 1e5).round() / 1e5;
    let text = rounded.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}

/// A validated coupling value tagged with its channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lambda {
    value: f64,
    channel: Channel,
}

impl Lambda {
    pub fn new(value: f64, channel: Channel) -> Result<Self, LambdaError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(LambdaError::OutOfRange { value });
        }
        Ok(Self { value, channel })
    }

    /// Builds a λ from a value already known to lie in [0, 1], clamping
    /// floating-point drift at the edges.
    pub(crate) fn clamped(value: f64, channel: Channel) -> Self {
        Self {
            value: value.clamp(0.0, 1.0),
            channel,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn folder_name(&self) -> String {
        format_lambda(self.value)
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Lambda: {}", self.channel, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambdaNode {
    pub lambda: Lambda,
    pub index: usize,
    pub previous: Option<usize>,
    pub next: Option<usize>,
}

impl LambdaNode {
    pub fn value(&self) -> f64 {
        self.lambda.value()
    }

    pub fn channel(&self) -> Channel {
        self.lambda.channel()
    }

    pub fn is_first(&self) -> bool {
        self.previous.is_none()
    }
}

/// A strictly monotonic sequence of λ values for one channel.
///
/// Nodes are stored in an arena and linked to their neighbours by index, so
/// navigating the schedule never involves shared ownership.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaSchedule {
    channel: Channel,
    nodes: Vec<LambdaNode>,
}

impl LambdaSchedule {
    pub fn new(values: &[f64], channel: Channel) -> Result<Self, LambdaError> {
        if values.is_empty() {
            return Err(LambdaError::Empty);
        }

        let lambdas = values
            .iter()
            .map(|&value| Lambda::new(value, channel))
            .collect::<Result<Vec<_>, _>>()?;

        let ascending = values.len() < 2 || values[1] > values[0];
        for (index, (&previous, &value)) in values.iter().tuple_windows().enumerate() {
            let ordered = if ascending {
                value > previous
            } else {
                value < previous
            };
            if !ordered {
                return Err(LambdaError::NotMonotonic {
                    index: index + 1,
                    previous,
                    value,
                });
            }
        }

        let last = lambdas.len() - 1;
        let nodes = lambdas
            .into_iter()
            .enumerate()
            .map(|(index, lambda)| LambdaNode {
                lambda,
                index,
                previous: index.checked_sub(1),
                next: (index < last).then_some(index + 1),
            })
            .collect();

        Ok(Self { channel, nodes })
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_ascending(&self) -> bool {
        self.nodes.len() < 2 || self.nodes[1].value() > self.nodes[0].value()
    }

    pub fn nodes(&self) -> &[LambdaNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&LambdaNode> {
        self.nodes.get(index)
    }

    pub fn previous(&self, node: &LambdaNode) -> Option<&LambdaNode> {
        node.previous.and_then(|idx| self.nodes.get(idx))
    }

    pub fn next(&self, node: &LambdaNode) -> Option<&LambdaNode> {
        node.next.and_then(|idx| self.nodes.get(idx))
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.nodes.iter().map(LambdaNode::value)
    }

    /// Half the distance to the previous node, or the node's own value for
    /// the first node of the schedule.
    pub fn get_delta(&self, node: &LambdaNode) -> f64 {
        match self.previous(node) {
            None => node.value(),
            Some(previous) => (node.value() - previous.value()).abs() / 2.0,
        }
    }
}

/// Whether a window perturbs towards larger or smaller λ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    Forward,
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Backward => f.write_str("backward"),
        }
    }
}

/// A sampled λ paired with the λ its energies were recomputed at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub source: Lambda,
    pub shifted: Lambda,
}

impl Window {
    pub fn new(source: Lambda, shifted: Lambda) -> Self {
        Self { source, shifted }
    }

    pub fn channel(&self) -> Channel {
        self.source.channel()
    }

    pub fn direction(&self) -> Direction {
        if self.shifted.value() > self.source.value() {
            Direction::Forward
        } else {
            Direction::Backward
        }
    }

    pub fn folder_name(&self) -> String {
        format!("{}_{}", self.source.folder_name(), self.shifted.folder_name())
    }

    /// Parses a `<source>_<shifted>` folder name.
    pub fn from_folder_name(name: &str, channel: Channel) -> Result<Self, LambdaError> {
        let invalid = || LambdaError::InvalidWindowName(name.to_string());

        let (source, shifted) = name.split('_').collect_tuple().ok_or_else(invalid)?;
        let source: f64 = source.parse().map_err(|_| invalid())?;
        let shifted: f64 = shifted.parse().map_err(|_| invalid())?;
        if source == shifted {
            return Err(invalid());
        }

        Ok(Self {
            source: Lambda::new(source, channel).map_err(|_| invalid())?,
            shifted: Lambda::new(shifted, channel).map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} window {} -> {}",
            self.channel(),
            format_lambda(self.source.value()),
            format_lambda(self.shifted.value())
        )
    }
}
