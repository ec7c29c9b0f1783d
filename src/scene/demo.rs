//! Built-in demo scenes.

use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Quat, Vec3};
use principled_bsdf::Material;

use super::mesh::SceneDesc;
use super::primitives::{cuboid, quad, uv_sphere};
use crate::light::Light;

/// Names accepted by [`demo_scene`].
pub const DEMO_SCENES: &[&str] = &["cornell", "sphere", "materials", "empty"];

/// A scene plus a suggested viewpoint.
#[derive(Debug, Clone)]
pub struct DemoScene {
    pub scene: SceneDesc,
    pub eye: Vec3,
    pub target: Vec3,
}

/// Build a demo scene by name.
pub fn demo_scene(name: &str) -> Option<DemoScene> {
    match name {
        "cornell" => Some(cornell_box()),
        "sphere" => Some(sphere_on_floor()),
        "materials" => Some(material_spheres()),
        "empty" => Some(DemoScene {
            scene: SceneDesc::new("empty"),
            eye: Vec3::new(0.0, 1.0, 5.0),
            target: Vec3::new(0.0, 1.0, 0.0),
        }),
        _ => None,
    }
}

fn srt(scale: Vec3, rotation: Quat, translation: Vec3) -> Mat4 {
    Mat4::from_scale_rotation_translation(scale, rotation, translation)
}

/// Closed-on-five-sides box lit by an emissive ceiling patch.
pub fn cornell_box() -> DemoScene {
    let mut scene = SceneDesc::new("cornell");
    let white = scene.add_material(Material::diffuse(Vec3::splat(0.73)));
    let red = scene.add_material(Material::diffuse(Vec3::new(0.65, 0.05, 0.05)));
    let green = scene.add_material(Material::diffuse(Vec3::new(0.12, 0.45, 0.15)));
    let light = scene.add_material(Material::emissive(Vec3::new(1.0, 0.85, 0.6), 15.0));
    let glass = scene.add_material(Material::glass(1.5, 0.0));

    let wall = quad(2.0, 2.0);
    let walls = [
        (white, Quat::IDENTITY, Vec3::ZERO),
        (white, Quat::from_rotation_x(std::f32::consts::PI), Vec3::new(0.0, 2.0, 0.0)),
        (white, Quat::from_rotation_x(FRAC_PI_2), Vec3::new(0.0, 1.0, -1.0)),
        (red, Quat::from_rotation_z(-FRAC_PI_2), Vec3::new(-1.0, 1.0, 0.0)),
        (green, Quat::from_rotation_z(FRAC_PI_2), Vec3::new(1.0, 1.0, 0.0)),
    ];
    for (material, rotation, translation) in walls {
        scene.add_mesh(wall.clone().with_material(material), srt(Vec3::ONE, rotation, translation));
    }

    scene.add_mesh(
        quad(0.5, 0.4).with_material(light),
        srt(Vec3::ONE, Quat::from_rotation_x(std::f32::consts::PI), Vec3::new(0.0, 1.98, 0.0)),
    );
    scene.add_mesh(
        cuboid(Vec3::new(0.6, 1.2, 0.6)).with_material(white),
        srt(Vec3::ONE, Quat::from_rotation_y(0.3), Vec3::new(-0.35, 0.6, -0.3)),
    );
    scene.add_mesh(
        cuboid(Vec3::splat(0.6)).with_material(glass),
        srt(Vec3::ONE, Quat::from_rotation_y(-0.3), Vec3::new(0.4, 0.3, 0.3)),
    );

    DemoScene { scene, eye: Vec3::new(0.0, 1.0, 3.9), target: Vec3::new(0.0, 1.0, 0.0) }
}

/// One diffuse sphere on a floor, lit by a point light.
pub fn sphere_on_floor() -> DemoScene {
    let mut scene = SceneDesc::new("sphere");
    let floor = scene.add_material(Material::diffuse(Vec3::splat(0.5)));
    let ball = scene.add_material(Material::diffuse(Vec3::new(0.8, 0.3, 0.2)));

    scene.add_mesh(quad(10.0, 10.0).with_material(floor), Mat4::IDENTITY);
    scene.add_mesh(uv_sphere(1.0, 64, 32).with_material(ball), Mat4::from_translation(Vec3::Y));
    scene.add_light(Light::point(Vec3::new(2.0, 4.0, 3.0), Vec3::splat(30.0)));

    DemoScene { scene, eye: Vec3::new(0.0, 1.5, 5.0), target: Vec3::new(0.0, 1.0, 0.0) }
}

/// Row of spheres exercising the material lobes.
pub fn material_spheres() -> DemoScene {
    let mut scene = SceneDesc::new("materials");
    let floor = scene.add_material(Material::plastic(Vec3::splat(0.4), 0.8));
    scene.add_mesh(quad(20.0, 20.0).with_material(floor), Mat4::IDENTITY);

    let row = [
        Material::metal(Vec3::new(1.0, 0.78, 0.34), 0.2),
        Material {
            clearcoat: 1.0,
            clearcoat_roughness: 0.05,
            ..Material::plastic(Vec3::new(0.1, 0.2, 0.6), 0.6)
        },
        Material {
            sheen: 1.0,
            sheen_tint: 0.5,
            subsurface: 0.5,
            ..Material::diffuse(Vec3::new(0.7, 0.2, 0.4))
        },
        Material::glass(1.5, 0.05),
        Material {
            anisotropic: 0.9,
            ..Material::metal(Vec3::splat(0.9), 0.4)
        },
    ];
    let sphere = uv_sphere(0.5, 48, 24);
    for (i, material) in row.into_iter().enumerate() {
        let id = scene.add_material(material);
        let x = (i as f32 - 2.0) * 1.2;
        scene.add_mesh(sphere.clone().with_material(id), Mat4::from_translation(Vec3::new(x, 0.5, 0.0)));
    }
    scene.add_light(Light::directional(Vec3::new(0.4, 1.0, 0.3), Vec3::splat(2.0)));

    DemoScene { scene, eye: Vec3::new(0.0, 1.6, 4.5), target: Vec3::new(0.0, 0.5, 0.0) }
}
