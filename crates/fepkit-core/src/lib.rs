//! # fepkit Core Library
//!
//! Building blocks for alchemical free-energy perturbation: combining two force-field
//! templates along a coupling parameter λ and estimating free energies from sampled energy
//! differences.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Template`, `Atom`, bonded terms),
//!   the fixed-column template format, λ schedules and the statistics of exponential
//!   averaging.
//!
//! - **[`engine`]: The Logic Core.** Fragment detection between end states, the λ-dependent
//!   parameter combiner, sampling strategies and the free-energy estimator. End-state
//!   templates are never mutated; every combination yields a fresh template.
//!
//! - **[`workflows`]: The Public API.** Complete procedures: generating the alchemical
//!   templates of a run and analysing the sampled windows.

pub mod core;
pub mod engine;
pub mod workflows;
