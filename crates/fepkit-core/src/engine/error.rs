use thiserror::Error;

use super::config::ConfigError;
use crate::core::io::opls::OplsError;
use crate::core::io::report::ReportError;
use crate::core::io::samples::SampleReadError;
use crate::core::lambda::LambdaError;
use std::path::PathBuf;

/// Structural incompatibilities between the two end states.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error(
        "Both end states contain atoms missing from the other and not covered by an atom link \
         (initial only: {initial_only:?}, final only: {final_only:?})"
    )]
    Ambiguous {
        initial_only: Vec<String>,
        final_only: Vec<String>,
    },

    #[error("Linker atom '{atom}' in template '{template}' has no bond to a core atom")]
    MissingConnectingBond { atom: String, template: String },

    #[error(
        "Angles around the connecting bond of linker '{atom}' do not correspond \
         (implicit third atoms: {implicit:?}, explicit third atoms: {explicit:?})"
    )]
    MismatchedAngleTopology {
        atom: String,
        implicit: Vec<String>,
        explicit: Vec<String>,
    },

    #[error("Linked atom '{name}' not found in the {state} template")]
    UnknownLinkerAtom { name: String, state: &'static str },

    #[error("Invalid atom link '{initial}' <-> '{final_name}' (names must be distinct and non-empty)")]
    InvalidLinkerPair { initial: String, final_name: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SamplingError {
    #[error("Sampling method '{method}' has no shift rule yet")]
    Unimplemented { method: &'static str },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Template file error on '{path}': {source}")]
    TemplateFile {
        path: PathBuf,
        #[source]
        source: OplsError,
    },

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Lambda error: {0}")]
    Lambda(#[from] LambdaError),

    #[error("Sampling error: {0}")]
    Sampling(#[from] SamplingError),

    #[error("Sample error: {0}")]
    Samples(#[from] SampleReadError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Workflow phase '{phase}' failed: {reason}")]
    PhaseFailed { phase: &'static str, reason: String },
}
