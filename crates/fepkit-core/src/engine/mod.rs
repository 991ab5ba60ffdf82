//! # Engine Module
//!
//! Algorithms that turn two end-state templates into an alchemical
//! perturbation and reduce sampled energies into free energies.
//!
//! ## Overview
//!
//! - **Fragment detection** ([`fragment`]) - pairs the atoms, bonds and angles of the two end
//!   states, classifies the rest as fragment terms and resolves declared atom links.
//! - **Parameter combination** ([`combiner`]) - produces an independent template for any λ,
//!   blending paired parameters and fading fragment terms against dummy values.
//! - **Sampling** ([`sampling`]) - chooses the shifted λ values reweighted from each
//!   scheduled λ.
//! - **Estimation** ([`estimator`]) - exponential averaging with block-averaged errors and
//!   per-direction aggregation.
//! - **Configuration** ([`config`]), **progress** ([`progress`]) and **errors** ([`error`])
//!   support the workflows built on top.

pub mod combiner;
pub mod config;
pub mod error;
pub mod estimator;
pub mod fragment;
pub mod progress;
pub mod sampling;
