//! Procedural meshes used by the built-in scenes.

use std::f32::consts::{PI, TAU};

use glam::Vec3;

use super::mesh::Mesh;

/// UV sphere with smooth normals, centered at the origin.
pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> Mesh {
    let segments = segments.max(3);
    let rings = rings.max(2);

    let mut positions = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize);
    let mut normals = Vec::with_capacity(positions.capacity());
    for i in 0..=rings {
        let theta = PI * i as f32 / rings as f32;
        for j in 0..=segments {
            let phi = TAU * j as f32 / segments as f32;
            let n = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
            positions.push(n * radius);
            normals.push(n);
        }
    }

    let stride = segments + 1;
    let mut indices = Vec::with_capacity((rings * segments * 2) as usize);
    for i in 0..rings {
        for j in 0..segments {
            let a = i * stride + j;
            let b = a + stride;
            let c = a + 1;
            let d = b + 1;
            // Pole rows produce degenerate triangles; the accel builder drops them
            indices.push([a, c, d]);
            indices.push([a, d, b]);
        }
    }

    Mesh::new("sphere", positions, indices).with_normals(normals)
}

/// Two-triangle quad in the XZ plane facing +Y, `width` along X and `depth` along Z.
pub fn quad(width: f32, depth: f32) -> Mesh {
    let (hx, hz) = (width * 0.5, depth * 0.5);
    Mesh::new(
        "quad",
        vec![
            Vec3::new(-hx, 0.0, hz),
            Vec3::new(hx, 0.0, hz),
            Vec3::new(hx, 0.0, -hz),
            Vec3::new(-hx, 0.0, -hz),
        ],
        vec![[0, 1, 2], [0, 2, 3]],
    )
}

/// Axis-aligned box centered at the origin with flat outward faces.
pub fn cuboid(size: Vec3) -> Mesh {
    let h = size * 0.5;
    // (normal, u, v) with u x v = normal
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut positions = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(12);
    for (n, u, v) in faces {
        let base = positions.len() as u32;
        let c = n * h;
        let (u, v) = (u * h, v * h);
        positions.extend([c - u - v, c + u - v, c + u + v, c - u + v]);
        indices.push([base, base + 1, base + 2]);
        indices.push([base, base + 2, base + 3]);
    }

    Mesh::new("box", positions, indices)
}
