//! Principled material parameters
//!
//! Parameter set of the Disney "principled" BSDF, extended with
//! specular transmission and emission. Layout is plain `f32` data so the
//! record can be uploaded to a device buffer as-is.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Principled material parameters (80 bytes).
///
/// All colors are linear (not sRGB). Scalar parameters documented as
/// `[0, 1]` are clamped by [`Material::sanitized`]; `ior` must be positive.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Material {
    pub base_color: [f32; 3],
    /// 0 = dielectric, 1 = conductor tinted by `base_color`.
    pub metallic: f32,
    pub roughness: f32,
    /// Stretches the specular highlight along the tangent.
    pub anisotropic: f32,
    /// Blend from Lambert-like diffuse to the Hanrahan-Krueger flattened lobe.
    pub subsurface: f32,
    /// Tints dielectric specular reflection towards the base color hue.
    pub specular_tint: f32,
    pub sheen: f32,
    pub sheen_tint: f32,
    pub clearcoat: f32,
    pub clearcoat_roughness: f32,
    /// 0 = opaque, 1 = fully transmissive dielectric.
    pub spec_trans: f32,
    /// Index of refraction of the interior medium.
    pub ior: f32,
    pub emission_strength: f32,
    pub _pad0: f32,
    pub emission: [f32; 3],
    pub _pad1: f32,
}

/// Smallest index of refraction accepted by [`Material::sanitized`].
pub const MIN_IOR: f32 = 1.0e-3;

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: [0.8, 0.8, 0.8],
            metallic: 0.0,
            roughness: 0.5,
            anisotropic: 0.0,
            subsurface: 0.0,
            specular_tint: 0.0,
            sheen: 0.0,
            sheen_tint: 0.5,
            clearcoat: 0.0,
            clearcoat_roughness: 0.03,
            spec_trans: 0.0,
            ior: 1.5,
            emission_strength: 0.0,
            _pad0: 0.0,
            emission: [0.0; 3],
            _pad1: 0.0,
        }
    }
}

impl Material {
    /// Rough diffuse surface.
    pub fn diffuse(color: Vec3) -> Self {
        Self {
            base_color: color.to_array(),
            roughness: 1.0,
            ..Self::default()
        }
    }

    /// Dielectric with a glossy coat of the given roughness.
    pub fn plastic(color: Vec3, roughness: f32) -> Self {
        Self {
            base_color: color.to_array(),
            roughness,
            ..Self::default()
        }
    }

    /// Conductor tinted by `color`.
    pub fn metal(color: Vec3, roughness: f32) -> Self {
        Self {
            base_color: color.to_array(),
            metallic: 1.0,
            roughness,
            ..Self::default()
        }
    }

    /// Clear transmissive dielectric.
    pub fn glass(ior: f32, roughness: f32) -> Self {
        Self {
            base_color: [1.0; 3],
            roughness,
            spec_trans: 1.0,
            ior,
            ..Self::default()
        }
    }

    /// Black body emitting `color * strength`.
    pub fn emissive(color: Vec3, strength: f32) -> Self {
        Self {
            base_color: [0.0; 3],
            roughness: 1.0,
            emission: color.to_array(),
            emission_strength: strength,
            ..Self::default()
        }
    }

    #[inline]
    pub fn base_color(&self) -> Vec3 {
        Vec3::from_array(self.base_color)
    }

    /// Emitted radiance (`emission * emission_strength`).
    #[inline]
    pub fn emitted(&self) -> Vec3 {
        Vec3::from_array(self.emission) * self.emission_strength
    }

    /// True if the material emits any light.
    #[inline]
    pub fn is_emissive(&self) -> bool {
        self.emitted().max_element() > 0.0
    }

    /// Copy with every `[0, 1]` parameter clamped, colors made non-negative
    /// and `ior` forced positive. Non-finite values fall back to defaults.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let d = Self::default();
        let unit = |v: f32, fallback: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { fallback };
        let color = |c: [f32; 3]| c.map(|v| if v.is_finite() { v.max(0.0) } else { 0.0 });

        Self {
            base_color: color(self.base_color).map(|v| v.min(1.0)),
            metallic: unit(self.metallic, d.metallic),
            roughness: unit(self.roughness, d.roughness),
            anisotropic: unit(self.anisotropic, d.anisotropic),
            subsurface: unit(self.subsurface, d.subsurface),
            specular_tint: unit(self.specular_tint, d.specular_tint),
            sheen: unit(self.sheen, d.sheen),
            sheen_tint: unit(self.sheen_tint, d.sheen_tint),
            clearcoat: unit(self.clearcoat, d.clearcoat),
            clearcoat_roughness: unit(self.clearcoat_roughness, d.clearcoat_roughness),
            spec_trans: unit(self.spec_trans, d.spec_trans),
            ior: if self.ior.is_finite() { self.ior.max(MIN_IOR) } else { d.ior },
            emission_strength: if self.emission_strength.is_finite() {
                self.emission_strength.max(0.0)
            } else {
                0.0
            },
            _pad0: 0.0,
            emission: color(self.emission),
            _pad1: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_size() {
        assert_eq!(std::mem::size_of::<Material>(), 80);
    }

    #[test]
    fn test_sanitized_clamps_ranges() {
        let m = Material {
            base_color: [2.0, -1.0, 0.5],
            metallic: 1.5,
            roughness: -0.2,
            clearcoat: f32::NAN,
            ior: -3.0,
            emission_strength: -1.0,
            ..Material::default()
        }
        .sanitized();

        assert_eq!(m.base_color, [1.0, 0.0, 0.5]);
        assert_eq!(m.metallic, 1.0);
        assert_eq!(m.roughness, 0.0);
        assert_eq!(m.clearcoat, 0.0);
        assert!(m.ior > 0.0);
        assert_eq!(m.emission_strength, 0.0);
    }

    #[test]
    fn test_emissive() {
        let m = Material::emissive(Vec3::new(1.0, 0.5, 0.25), 4.0);
        assert!(m.is_emissive());
        assert_eq!(m.emitted(), Vec3::new(4.0, 2.0, 1.0));
        assert!(!Material::diffuse(Vec3::ONE).is_emissive());
    }
}
