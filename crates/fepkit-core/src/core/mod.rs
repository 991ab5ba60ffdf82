//! # Core Module
//!
//! Stateless building blocks shared by the engine and the workflows.
//!
//! - **Template models** ([`models`]) - atoms, bonded terms and the template arena
//! - **File I/O** ([`io`]) - OPLS2005 templates, energy reports and CSV export
//! - **Coupling parameters** ([`lambda`]) - channels, λ values, schedules and windows
//! - **Statistics** ([`stats`]) - exponential averaging and error propagation

pub mod io;
pub mod lambda;
pub mod models;
pub mod stats;
