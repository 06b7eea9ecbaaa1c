//! Scene management

mod camera;
mod camera_controller;
mod light;
mod node;
mod transform;

pub use camera::*;
pub use camera_controller::*;
pub use light::*;
pub use node::*;
pub use transform::*;

use glam::Vec3;

use crate::backend::types::LineVertex;
use crate::resources::color_from_hex;

/// Square grid on the XZ plane, drawn as lines
#[derive(Debug, Clone, PartialEq)]
pub struct GridHelper {
    pub size: f32,
    pub divisions: u32,
    pub center_color: Vec3,
    pub line_color: Vec3,
}

impl GridHelper {
    pub fn new(size: f32, divisions: u32) -> Self {
        Self {
            size,
            divisions,
            center_color: color_from_hex(0x444444),
            line_color: color_from_hex(0x888888),
        }
    }

    /// Line list vertices, two per line
    pub fn line_vertices(&self) -> Vec<LineVertex> {
        let divisions = self.divisions.max(1);
        let step = self.size / divisions as f32;
        let half = self.size / 2.0;
        let center = divisions / 2;

        let mut vertices = Vec::with_capacity((divisions as usize + 1) * 4);
        for i in 0..=divisions {
            let k = -half + i as f32 * step;
            let color = if i == center && divisions % 2 == 0 {
                self.center_color
            } else {
                self.line_color
            };
            vertices.push(LineVertex { position: Vec3::new(-half, 0.0, k), color });
            vertices.push(LineVertex { position: Vec3::new(half, 0.0, k), color });
            vertices.push(LineVertex { position: Vec3::new(k, 0.0, -half), color });
            vertices.push(LineVertex { position: Vec3::new(k, 0.0, half), color });
        }
        vertices
    }
}

/// The content of one viewport: lights, helpers and attached nodes
#[derive(Debug, Clone)]
pub struct Scene {
    pub background: Vec3,
    pub ambient_light: AmbientLight,
    pub lights: Vec<DirectionalLight>,
    pub grid: Option<GridHelper>,
    nodes: Vec<Node>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            background: Vec3::ZERO,
            ambient_light: AmbientLight::default(),
            lights: Vec::new(),
            grid: None,
            nodes: Vec::new(),
        }
    }

    pub fn with_background(mut self, color: Vec3) -> Self {
        self.background = color;
        self
    }

    pub fn with_ambient_light(mut self, color: Vec3, intensity: f32) -> Self {
        self.ambient_light = AmbientLight::new(color, intensity);
        self
    }

    pub fn with_grid(mut self, grid: GridHelper) -> Self {
        self.grid = Some(grid);
        self
    }

    /// Add a directional light to the scene
    pub fn add_directional_light(&mut self, light: DirectionalLight) {
        self.lights.push(light);
    }

    /// Attach a node at the scene root
    pub fn add(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// First root node carrying `name`
    pub fn find_named(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn find_named_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.name == name)
    }

    pub fn count_named(&self, name: &str) -> usize {
        self.nodes.iter().filter(|node| node.name == name).count()
    }

    /// Detach every root node carrying `name` and hand them back
    pub fn remove_named(&mut self, name: &str) -> Vec<Node> {
        let (removed, kept): (Vec<Node>, Vec<Node>) = std::mem::take(&mut self.nodes)
            .into_iter()
            .partition(|node| node.name == name);
        self.nodes = kept;
        removed
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
