//! Fresnel terms and specular geometry.

use glam::Vec3;

/// Schlick weight `(1 - cos)^5`.
#[inline]
pub fn schlick_weight(cos: f32) -> f32 {
    let m = (1.0 - cos).clamp(0.0, 1.0);
    let m2 = m * m;
    m2 * m2 * m
}

/// Unpolarized dielectric reflectance.
///
/// `eta` is the relative index of refraction `eta_i / eta_t` seen from the
/// incident side. Returns 1 under total internal reflection.
pub fn dielectric(cos_i: f32, eta: f32) -> f32 {
    let cos_i = cos_i.abs().min(1.0);
    let sin2_t = eta * eta * (1.0 - cos_i * cos_i);
    if sin2_t >= 1.0 {
        return 1.0;
    }
    let cos_t = (1.0 - sin2_t).max(0.0).sqrt();
    let rs = (eta * cos_t - cos_i) / (eta * cos_t + cos_i);
    let rp = (eta * cos_i - cos_t) / (eta * cos_i + cos_t);
    0.5 * (rs * rs + rp * rp)
}

/// Mirror `v` (pointing away from the surface) about `n`.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    2.0 * v.dot(n) * n - v
}

/// Refract `v` (pointing away from the surface, same side as `n`) through
/// the interface using Snell's law. `None` on total internal reflection.
pub fn refract(v: Vec3, n: Vec3, eta: f32) -> Option<Vec3> {
    let cos_i = v.dot(n);
    let k = 1.0 - eta * eta * (1.0 - cos_i * cos_i);
    if k < 0.0 {
        return None;
    }
    Some(-v * eta + n * (eta * cos_i - k.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_incidence() {
        // ((1 - 1.5) / (1 + 1.5))^2 = 0.04
        let f = dielectric(1.0, 1.0 / 1.5);
        assert!((f - 0.04).abs() < 1e-4, "{f}");
        assert!((dielectric(0.0, 1.0 / 1.5) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_total_internal_reflection() {
        // From glass into air beyond the critical angle (~41.8 degrees)
        let cos_i = 60f32.to_radians().cos();
        assert_eq!(dielectric(cos_i, 1.5), 1.0);
        let v = Vec3::new(60f32.to_radians().sin(), 0.0, cos_i);
        assert!(refract(v, Vec3::Z, 1.5).is_none());
    }

    #[test]
    fn test_snell() {
        let theta_i = 30f32.to_radians();
        let v = Vec3::new(theta_i.sin(), 0.0, theta_i.cos());
        let t = refract(v, Vec3::Z, 1.0 / 1.5).unwrap();
        assert!(t.z < 0.0);
        assert!(t.is_normalized());
        // sin(theta_t) = sin(theta_i) / 1.5, on the opposite side
        assert!((t.x + theta_i.sin() / 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_reflect() {
        let v = Vec3::new(0.3, 0.1, 0.9).normalize();
        let r = reflect(v, Vec3::Z);
        assert!((r - Vec3::new(-v.x, -v.y, v.z)).length() < 1e-6);
    }
}
