//! Provides input/output for templates, energy samples and result tables.
//!
//! Template formats implement the [`traits::TemplateFile`] trait; [`opls`]
//! handles the fixed-column OPLS2005 layout consumed by the simulation engine.
//! [`samples`] extracts energy-difference columns from report files and
//! [`report`] exports per-window estimates as CSV.

pub mod opls;
pub mod report;
pub mod samples;
pub mod traits;
