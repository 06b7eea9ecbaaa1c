//! Common types shared between backends

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Standard vertex with position, normal and UV
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Colored vertex used by line helpers (grid)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LineVertex {
    pub position: Vec3,
    pub color: Vec3,
}

/// Pixel rectangle a raster target covers on its surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewportRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ViewportRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the rectangle has no drawable area
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Per-viewport uniform data: camera matrices and the scene's lighting
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniformData {
    pub view_proj: Mat4,
    pub camera_position: Vec4,
    /// rgb = background color, a = unused
    pub background: Vec4,
    /// rgb = ambient color * intensity
    pub ambient: Vec4,
    /// xyz = direction towards the light, w = intensity (up to 4 lights)
    pub light_directions: [Vec4; 4],
    /// x = number of directional lights in use
    pub light_count: [u32; 4],
}

/// Per-draw uniform data
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectUniformData {
    pub model: Mat4,
    pub normal_matrix: Mat4,
    pub base_color: Vec4,
    /// x = metalness, y = roughness, z = 1 when lit, w = 1 when textured
    pub params: Vec4,
}

/// Maximum directional lights forwarded to the shader per viewport
pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;

/// Dynamic uniform offsets must be aligned to this many bytes
pub const UNIFORM_ALIGNMENT: u64 = 256;
