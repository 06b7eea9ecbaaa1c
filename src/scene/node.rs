//! Scene-graph nodes

use std::sync::Arc;

use glam::Mat4;

use crate::resources::{Geometry, SharedMaterial};

use super::Transform;

/// Renderable leaf: geometry drawn with a material
#[derive(Debug, Clone)]
pub struct MeshLeaf {
    pub geometry: Arc<Geometry>,
    pub material: SharedMaterial,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Group,
    Mesh(MeshLeaf),
}

/// Hierarchical transform node. Cloning copies the hierarchy and shares
/// geometry and material handles with the original.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub children: Vec<Node>,
}

impl Node {
    pub fn group(name: &str) -> Self {
        Self {
            name: name.to_string(),
            transform: Transform::default(),
            kind: NodeKind::Group,
            children: Vec::new(),
        }
    }

    pub fn mesh(name: &str, geometry: Arc<Geometry>, material: SharedMaterial) -> Self {
        Self {
            name: name.to_string(),
            transform: Transform::default(),
            kind: NodeKind::Mesh(MeshLeaf {
                geometry,
                material,
                cast_shadow: false,
                receive_shadow: false,
            }),
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    pub fn as_mesh(&self) -> Option<&MeshLeaf> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            NodeKind::Group => None,
        }
    }

    /// Visit every mesh leaf with its accumulated world matrix, `parent`
    /// being the world matrix of this node's parent
    pub fn visit_meshes(&self, parent: Mat4, f: &mut impl FnMut(&MeshLeaf, Mat4)) {
        let world = parent * self.transform.matrix();
        if let NodeKind::Mesh(mesh) = &self.kind {
            f(mesh, world);
        }
        for child in &self.children {
            child.visit_meshes(world, f);
        }
    }

    pub fn visit_meshes_mut(&mut self, f: &mut impl FnMut(&mut MeshLeaf)) {
        if let NodeKind::Mesh(mesh) = &mut self.kind {
            f(mesh);
        }
        for child in &mut self.children {
            child.visit_meshes_mut(f);
        }
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.visit_meshes(Mat4::IDENTITY, &mut |_, _| count += 1);
        count
    }
}
