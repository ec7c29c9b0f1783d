//! Scene description: meshes, materials, camera and the built-in scenes.

mod camera;
mod demo;
mod materials;
mod mesh;
mod primitives;

pub use camera::{Camera, CameraUniform};
pub use demo::{cornell_box, demo_scene, material_spheres, sphere_on_floor, DemoScene, DEMO_SCENES};
pub use materials::MaterialTable;
pub use mesh::{Mesh, SceneDesc};
pub use primitives::{cuboid, quad, uv_sphere};

pub use principled_bsdf::Material;
