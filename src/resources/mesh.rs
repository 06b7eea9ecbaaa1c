//! Geometry data and generation

use std::sync::atomic::{AtomicBool, Ordering};

use crate::backend::types::Vertex;
use crate::bounds::Aabb;
use glam::{Vec2, Vec3};

use super::GeometryId;

/// Immutable vertex/index data shared between scene nodes through `Arc`
#[derive(Debug)]
pub struct Geometry {
    id: GeometryId,
    pub name: String,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    bounds: Aabb,
    disposed: AtomicBool,
}

impl Geometry {
    pub fn new(name: &str, vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        let bounds = Aabb::from_points(vertices.iter().map(|v| v.position));
        Self {
            id: GeometryId::next(),
            name: name.to_string(),
            vertices,
            indices,
            bounds,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> GeometryId {
        self.id
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Bounding box in the geometry's local space
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Calculate vertex count
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Calculate index count
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Get vertex data as bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Get index data as bytes
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Flag the geometry as disposed. Returns false if it already was.
    pub(crate) fn mark_disposed(&self) -> bool {
        !self.disposed.swap(true, Ordering::AcqRel)
    }

    /// Axis-aligned box centered at the origin
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        let (hx, hy, hz) = (width / 2.0, height / 2.0, depth / 2.0);

        let faces = [
            // Front face
            (Vec3::Z, [
                Vec3::new(-hx, -hy, hz),
                Vec3::new(hx, -hy, hz),
                Vec3::new(hx, hy, hz),
                Vec3::new(-hx, hy, hz),
            ]),
            // Back face
            (-Vec3::Z, [
                Vec3::new(hx, -hy, -hz),
                Vec3::new(-hx, -hy, -hz),
                Vec3::new(-hx, hy, -hz),
                Vec3::new(hx, hy, -hz),
            ]),
            // Right face
            (Vec3::X, [
                Vec3::new(hx, -hy, hz),
                Vec3::new(hx, -hy, -hz),
                Vec3::new(hx, hy, -hz),
                Vec3::new(hx, hy, hz),
            ]),
            // Left face
            (-Vec3::X, [
                Vec3::new(-hx, -hy, -hz),
                Vec3::new(-hx, -hy, hz),
                Vec3::new(-hx, hy, hz),
                Vec3::new(-hx, hy, -hz),
            ]),
            // Top face
            (Vec3::Y, [
                Vec3::new(-hx, hy, hz),
                Vec3::new(hx, hy, hz),
                Vec3::new(hx, hy, -hz),
                Vec3::new(-hx, hy, -hz),
            ]),
            // Bottom face
            (-Vec3::Y, [
                Vec3::new(-hx, -hy, -hz),
                Vec3::new(hx, -hy, -hz),
                Vec3::new(hx, -hy, hz),
                Vec3::new(-hx, -hy, hz),
            ]),
        ];
        let uvs = [
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (face, (normal, corners)) in faces.into_iter().enumerate() {
            for (position, uv) in corners.into_iter().zip(uvs) {
                vertices.push(Vertex::new(position, normal, uv));
            }
            // Two triangles per face
            let base = face as u32 * 4;
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new("box", vertices, indices)
    }
}

/// Smooth per-vertex normals from triangle faces, used when a source mesh
/// carries none
pub fn compute_vertex_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        let (Some(pa), Some(pb), Some(pc)) = (positions.get(a), positions.get(b), positions.get(c))
        else {
            continue;
        };
        let face = (*pb - *pa).cross(*pc - *pa);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    normals
        .into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y))
        .collect()
}
