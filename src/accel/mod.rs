//! Ray-scene acceleration structure.
//!
//! Software stand-in for a hardware ray-tracing structure:
//! - [`bvh`] - node, box and triangle types
//! - [`build`] - binned SAH builder
//! - [`traverse`] - closest-hit and any-hit traversal
//! - [`AccelerationStructure`] - generation-tracked structure over scene meshes

pub mod build;
pub mod bvh;
pub mod traverse;
mod structure;

pub use build::{build_bvh, Bvh};
pub use bvh::{Aabb, BvhNode, Triangle};
pub use structure::{AccelerationStructure, SurfaceHit};
