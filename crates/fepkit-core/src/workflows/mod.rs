//! # Workflows Module
//!
//! Top-level entry points tying the `core` and `engine` layers together.
//!
//! - **Alchemy** ([`alchemy`]) - loads both end states, detects the alchemical topology and
//!   writes one template per scheduled λ and per shifted λ, staged by channel when sterics
//!   and charges are perturbed separately.
//! - **Analysis** ([`analysis`]) - discovers window folders, reads their energy samples and
//!   reduces them to per-window and per-path free energies.
//!
//! Both report their phases through a [`ProgressReporter`](crate::engine::progress::ProgressReporter).

pub mod alchemy;
pub mod analysis;
