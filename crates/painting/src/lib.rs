//! Facet paint - adaptive per-triangle paint selection on triangle meshes
//!
//! This crate provides the paint selector and the types around it:
//! - [`selector::TriangleSelector`] - Split trees over a mesh, painted with brushes and fills
//! - [`cursor::Cursor`] - Brush shapes (sphere, circle, capsules, height range)
//! - [`types::PaintState`] - Enforcer/blocker/per-extruder paint values
//! - [`selector::TriangleSplittingData`] - Compact persisted form of the paint
//! - [`arena`] - Generational arena backing the trees
//! - [`geometry`] - Segment and triangle predicates used by the cursors

pub mod arena;
pub mod constants;
pub mod cursor;
pub mod error;
pub mod geometry;
pub mod selector;
pub mod types;

pub use constants::*;
pub use cursor::*;
pub use error::*;
pub use selector::*;
pub use types::*;
