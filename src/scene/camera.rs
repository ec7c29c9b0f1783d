//! Fly camera using dolly

use bytemuck::{Pod, Zeroable};
use dolly::prelude::*;
use glam::{EulerRot, Quat, UVec2, Vec2, Vec3};

use crate::util::Ray;

/// First-person camera: right-drag looks around, keys move along the view axes.
pub struct Camera {
    rig: CameraRig,
    /// Vertical FOV in degrees
    pub fov: f32,
    /// Lens radius; 0 = pinhole
    pub aperture: f32,
    /// Distance to the plane in perfect focus
    pub focus_distance: f32,
    /// World units per second
    pub move_speed: f32,
    /// Degrees per pixel of mouse travel
    pub look_sensitivity: f32,
}

impl Camera {
    pub fn new(position: Vec3, yaw_degrees: f32, pitch_degrees: f32) -> Self {
        let rig = CameraRig::builder()
            .with(Position::new(mint::Point3 { x: position.x, y: position.y, z: position.z }))
            .with(YawPitch::new().yaw_degrees(yaw_degrees).pitch_degrees(pitch_degrees))
            .build();

        Self {
            rig,
            fov: 45.0,
            aperture: 0.0,
            focus_distance: 5.0,
            move_speed: 3.0,
            look_sensitivity: 0.3,
        }
    }

    /// Camera at `position` looking at `target`.
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        let mut cam = Self::new(position, 0.0, 0.0);
        cam.look_at(target);
        cam
    }

    /// Turn towards `target` and put it in focus.
    pub fn look_at(&mut self, target: Vec3) {
        let pos = self.position();
        let dir = (target - pos).normalize_or(Vec3::NEG_Z);
        // dolly's yaw/pitch: forward = -Z rotated by yaw (Y) then pitch (X)
        let yaw = (-dir.x).atan2(-dir.z);
        let pitch = dir.y.clamp(-1.0, 1.0).asin();
        self.set_angles(yaw.to_degrees(), pitch.to_degrees());
        self.focus_distance = (target - pos).length().max(1e-3);
    }

    pub fn set_angles(&mut self, yaw: f32, pitch: f32) {
        self.rig.driver_mut::<YawPitch>().set_rotation_quat(mint::Quaternion::from(Quat::from_euler(
            EulerRot::YXZ,
            yaw.to_radians(),
            pitch.to_radians(),
            0.0,
        )));
        self.rig.update(0.0);
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.rig.driver_mut::<Position>().position = mint::Point3 { x: position.x, y: position.y, z: position.z };
        self.rig.update(0.0);
    }

    /// Back away along the current view direction until a sphere of
    /// `radius` around `center` fills the view, and focus on it.
    pub fn focus(&mut self, center: Vec3, radius: f32) {
        let (_, _, forward) = self.basis();
        let half_fov = (self.fov.clamp(1.0, 179.0).to_radians() * 0.5).sin();
        let distance = radius.max(1e-3) / half_fov.max(1e-3) * 1.1;
        self.set_position(center - forward * distance);
        self.focus_distance = distance;
    }

    /// Apply one frame of input. `movement` is in camera space
    /// (x = right, y = up, z = forward), each component in `[-1, 1]`.
    pub fn update(&mut self, mouse_delta: Vec2, looking: bool, movement: Vec3, dt: f32) {
        if looking && mouse_delta != Vec2::ZERO {
            self.rig.driver_mut::<YawPitch>().rotate_yaw_pitch(
                -mouse_delta.x * self.look_sensitivity,
                -mouse_delta.y * self.look_sensitivity,
            );
        }

        if movement != Vec3::ZERO && dt > 0.0 {
            let (right, up, forward) = self.basis();
            let step = (right * movement.x + up * movement.y + forward * movement.z) * self.move_speed * dt;
            self.rig.driver_mut::<Position>().translate(mint::Vector3 { x: step.x, y: step.y, z: step.z });
        }

        self.rig.update(dt);
    }

    pub fn position(&self) -> Vec3 {
        let p = self.rig.final_transform.position;
        Vec3::new(p.x, p.y, p.z)
    }

    /// Unit `(right, up, forward)` vectors.
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let t = &self.rig.final_transform;
        (t.right(), t.up(), t.forward())
    }

    /// Yaw and pitch in degrees
    pub fn angles(&self) -> (f32, f32) {
        let rot = self.rig.final_transform.rotation;
        let q = Quat::from_xyzw(rot.v.x, rot.v.y, rot.v.z, rot.s);
        let (yaw, pitch, _) = q.to_euler(EulerRot::YXZ);
        (yaw.to_degrees(), pitch.to_degrees())
    }

    /// Snapshot for ray generation at the given viewport size.
    pub fn uniform(&self, size: UVec2) -> CameraUniform {
        let (right, up, forward) = self.basis();
        let aspect = size.x.max(1) as f32 / size.y.max(1) as f32;
        CameraUniform {
            position: self.position().to_array(),
            tan_half_fov: (self.fov.clamp(1.0, 179.0).to_radians() * 0.5).tan(),
            right: right.to_array(),
            aspect,
            up: up.to_array(),
            aperture: self.aperture.max(0.0),
            forward: forward.to_array(),
            focus_distance: self.focus_distance.max(1e-3),
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::looking_at(Vec3::new(0.0, 1.0, 5.0), Vec3::new(0.0, 1.0, 0.0))
    }
}

/// Camera parameters consumed by the ray generation kernel (64 bytes).
///
/// Two snapshots compare equal iff the generated rays are identical, which
/// is what accumulation reset detection keys on.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    pub position: [f32; 3],
    pub tan_half_fov: f32,
    pub right: [f32; 3],
    pub aspect: f32,
    pub up: [f32; 3],
    pub aperture: f32,
    pub forward: [f32; 3],
    pub focus_distance: f32,
}

impl CameraUniform {
    /// Primary ray through film position `film` (pixels, origin top-left) of a
    /// `size` viewport. `lens` is a unit-disk sample used for depth of field.
    pub fn generate_ray(&self, film: Vec2, size: UVec2, lens: Vec2) -> Ray {
        let size = size.max(UVec2::ONE).as_vec2();
        let ndc = Vec2::new(film.x / size.x * 2.0 - 1.0, 1.0 - film.y / size.y * 2.0);

        let right = Vec3::from_array(self.right);
        let up = Vec3::from_array(self.up);
        let forward = Vec3::from_array(self.forward);
        let origin = Vec3::from_array(self.position);

        let dir = (forward
            + right * (ndc.x * self.tan_half_fov * self.aspect)
            + up * (ndc.y * self.tan_half_fov))
            .normalize();

        if self.aperture <= 0.0 {
            return Ray::new(origin, dir);
        }

        // Thin lens: all rays through the lens meet on the focus plane
        let focus = origin + dir * (self.focus_distance / dir.dot(forward));
        let lens = lens * self.aperture;
        let origin = origin + right * lens.x + up * lens.y;
        Ray::new(origin, (focus - origin).normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_size() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 64);
    }

    #[test]
    fn test_look_at() {
        let cam = Camera::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        let (_, _, forward) = cam.basis();
        assert!((forward - Vec3::NEG_Z).length() < 1e-4, "{forward}");

        let cam = Camera::looking_at(Vec3::ZERO, Vec3::new(3.0, 3.0, 0.0));
        let (_, _, forward) = cam.basis();
        assert!((forward - Vec3::new(1.0, 1.0, 0.0).normalize()).length() < 1e-4, "{forward}");
    }

    #[test]
    fn test_center_ray() {
        let cam = Camera::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        let size = UVec2::new(64, 32);
        let u = cam.uniform(size);
        let ray = u.generate_ray(Vec2::new(32.0, 16.0), size, Vec2::ZERO);
        assert!((ray.dir - Vec3::NEG_Z).length() < 1e-5);

        // Top-left pixel points up and left
        let ray = u.generate_ray(Vec2::ZERO, size, Vec2::ZERO);
        assert!(ray.dir.x < 0.0 && ray.dir.y > 0.0);
    }

    #[test]
    fn test_thin_lens_converges_on_focus_plane() {
        let mut cam = Camera::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        cam.aperture = 0.2;
        let size = UVec2::new(16, 16);
        let u = cam.uniform(size);
        let film = Vec2::new(5.0, 9.0);
        let a = u.generate_ray(film, size, Vec2::new(1.0, 0.0));
        let b = u.generate_ray(film, size, Vec2::new(-0.5, 0.5));
        // Both reach z = 0 (focus distance 5) at the same point
        let pa = a.at(-a.origin.z / a.dir.z);
        let pb = b.at(-b.origin.z / b.dir.z);
        assert!((pa - pb).length() < 1e-4);
        assert_ne!(a.origin, b.origin);
    }

    #[test]
    fn test_update_reports_motion_in_uniform() {
        let mut cam = Camera::default();
        let size = UVec2::new(8, 8);
        let before = cam.uniform(size);
        cam.update(Vec2::ZERO, false, Vec3::ZERO, 0.016);
        assert_eq!(before, cam.uniform(size));

        cam.update(Vec2::new(10.0, 0.0), true, Vec3::ZERO, 0.016);
        assert_ne!(before, cam.uniform(size));

        let before = cam.uniform(size);
        cam.update(Vec2::ZERO, false, Vec3::Z, 0.1);
        let after = cam.uniform(size);
        assert_ne!(before.position, after.position);
    }

    #[test]
    fn test_focus_keeps_direction() {
        let mut cam = Camera::looking_at(Vec3::new(3.0, 2.0, 4.0), Vec3::ZERO);
        let (_, _, before) = cam.basis();
        cam.focus(Vec3::new(1.0, 0.0, 0.0), 2.0);
        let (_, _, after) = cam.basis();
        assert!((before - after).length() < 1e-5);
        let to_center = Vec3::new(1.0, 0.0, 0.0) - cam.position();
        assert!((to_center.length() - cam.focus_distance).abs() < 1e-4);
        assert!(to_center.normalize().dot(after) > 0.9999);
        assert!(cam.focus_distance > 2.0);
    }
}
