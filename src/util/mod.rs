//! Utility types and functions.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - Math type re-exports from glam plus [`Ray`] and [`BBox3f`]

mod error;
mod math;

pub use error::*;
pub use math::*;
