//! # Core Models Module
//!
//! In-memory representation of force-field templates.
//!
//! - [`atom`] - Template atoms with their nonbonded parameters and annotation flags
//! - [`terms`] - Bonded terms: bonds, angles and proper/improper dihedrals
//! - [`template`] - The [`Template`](template::Template) arena, its builder and
//!   graph-distance queries over the z-matrix tree
//!
//! Templates are values. Anything that changes parameters (such as the
//! combiner in [`crate::engine`]) produces a new template.

pub mod atom;
pub mod template;
pub mod terms;
