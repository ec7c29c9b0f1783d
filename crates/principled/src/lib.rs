//! Disney-style principled BSDF for path tracing.
//!
//! Evaluation and importance sampling of a layered multi-lobe material:
//! diffuse with sheen and fake subsurface, dielectric and metallic GGX
//! specular, rough specular transmission and a GTR1 clearcoat.
//!
//! ## Usage
//!
//! ```
//! use glam::Vec3;
//! use principled_bsdf::{relative_eta, Bsdf, Frame, Material};
//!
//! let material = Material::metal(Vec3::new(1.0, 0.8, 0.3), 0.3);
//! let frame = Frame::from_normal(Vec3::Y);
//! let bsdf = Bsdf::new(&material, frame, relative_eta(material.ior, true));
//!
//! let v = Vec3::new(0.0, 1.0, 1.0).normalize();
//! if let Some(s) = bsdf.sample(v, Vec3::new(0.3, 0.7, 0.5)) {
//!     let weight = s.f / s.pdf;
//!     assert!(weight.is_finite());
//! }
//! ```
//!
//! ## References
//! - Burley, Physically-Based Shading at Disney (2012)
//! - Burley, Extending the Disney BRDF to a BSDF with Integrated Subsurface Scattering (2015)
//! - Heitz, Sampling the GGX Distribution of Visible Normals (JCGT 2018)
//! - Walter et al., Microfacet Models for Refraction through Rough Surfaces (EGSR 2007)

mod bsdf;
mod frame;
mod fresnel;
mod microfacet;
mod params;

#[cfg(test)]
pub(crate) mod test_utils;

pub use bsdf::{relative_eta, Bsdf, BsdfEval, Lobe, ScatterSample, SPECULAR_ALPHA};
pub use frame::Frame;
pub use fresnel::{dielectric, reflect, refract, schlick_weight};
pub use microfacet::{Ggx, MIN_ALPHA};
pub use params::{Material, MIN_IOR};
