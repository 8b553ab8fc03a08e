//! Primitive shapes that are generated render side instead of being converted from simulation geometry.

use crate::rendering::common::types::{MeshContents, MeshPart, VertexBuffers};
use glam::{Vec2, Vec3};
use std::f32::consts::PI;

const SPHERE_SEGMENTS: u32 = 24;
const SPHERE_RINGS: u32 = 12;

fn single_part(name: String, vertex_buffers: VertexBuffers, index_buffer: Vec<u32>) -> MeshContents {
    MeshContents {
        name,
        parts: vec![MeshPart {
            vertex_buffers,
            index_buffer,
            joint_influences: None,
            material_index: 0,
        }],
        skeleton: None,
        instances: vec![],
    }
}

/// An axis aligned box centered on the origin, counter clockwise front faces.
pub fn generate_box(size: Vec3) -> MeshContents {
    let half = size * 0.5;
    // normal, u axis, v axis
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut buffers = VertexBuffers::default();
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = buffers.position_buffer.len() as u32;
        for (du, dv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let corner = (normal + u * du + v * dv) * half;
            buffers.position_buffer.push(corner);
            buffers.normals_buffer.push(normal);
            buffers.tangents_buffer.push(u);
            buffers
                .texcoord_buffer_0
                .push(Vec2::new((du + 1.0) * 0.5, 1.0 - (dv + 1.0) * 0.5));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    single_part(format!("box {:?}", size.to_array()), buffers, indices)
}

pub fn generate_sphere(radius: f32) -> MeshContents {
    let mut buffers = VertexBuffers::default();
    for ring in 0..=SPHERE_RINGS {
        let phi = PI * ring as f32 / SPHERE_RINGS as f32;
        for segment in 0..=SPHERE_SEGMENTS {
            let theta = 2.0 * PI * segment as f32 / SPHERE_SEGMENTS as f32;
            let normal = Vec3::new(phi.sin() * theta.cos(), phi.cos(), -phi.sin() * theta.sin());
            buffers.position_buffer.push(normal * radius);
            buffers.normals_buffer.push(normal);
            buffers
                .tangents_buffer
                .push(Vec3::new(-theta.sin(), 0.0, -theta.cos()));
            buffers.texcoord_buffer_0.push(Vec2::new(
                segment as f32 / SPHERE_SEGMENTS as f32,
                ring as f32 / SPHERE_RINGS as f32,
            ));
        }
    }

    let stride = SPHERE_SEGMENTS + 1;
    let mut indices = Vec::with_capacity((SPHERE_RINGS * SPHERE_SEGMENTS * 6) as usize);
    for ring in 0..SPHERE_RINGS {
        for segment in 0..SPHERE_SEGMENTS {
            let a = ring * stride + segment;
            let b = a + stride;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }

    single_part(format!("sphere {}", radius), buffers, indices)
}

/// Capsules are approximated by a box of the capsule's extents.
pub fn generate_capsule(height: f32, radius: f32) -> MeshContents {
    let mut mesh = generate_box(capsule_extents(height, radius));
    mesh.name = format!("capsule {}x{}", height, radius);
    mesh
}

pub fn capsule_extents(height: f32, radius: f32) -> Vec3 {
    Vec3::new(radius * 2.0, height, radius * 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_ccw_outwards(mesh: &MeshContents) {
        let part = &mesh.parts[0];
        for tri in part.index_buffer.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| part.vertex_buffers.position_buffer[i as usize]);
            let face_normal = (b - a).cross(c - a);
            if face_normal.length_squared() < 1e-12 {
                continue; // degenerate triangles at the sphere poles
            }
            let centroid = (a + b + c) / 3.0;
            assert!(face_normal.dot(centroid) > 0.0, "triangle {:?} faces inwards", tri);
        }
    }

    #[test]
    fn box_is_closed_and_sized() {
        let mesh = generate_box(Vec3::new(2.0, 4.0, 6.0));
        let bounds = mesh.bounds().expect("bounds");
        assert_eq!(bounds.extents(), Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(mesh.parts[0].index_buffer.len(), 36);
        assert_ccw_outwards(&mesh);
    }

    #[test]
    fn sphere_vertices_on_radius() {
        let mesh = generate_sphere(1.5);
        for p in &mesh.parts[0].vertex_buffers.position_buffer {
            assert!((p.length() - 1.5).abs() < 1e-4);
        }
        assert_ccw_outwards(&mesh);
    }

    #[test]
    fn capsule_extents_cover_radius() {
        let mesh = generate_capsule(2.0, 0.5);
        let bounds = mesh.bounds().expect("bounds");
        assert!((bounds.extents() - Vec3::new(1.0, 2.0, 1.0)).length() < 1e-6);
    }
}
