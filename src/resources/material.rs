//! Material definitions

use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;

use super::{MaterialId, Texture};

/// Materials are shared between the perspective node and its orthographic
/// clones, and adjusted in place by normalization
pub type SharedMaterial = Arc<RwLock<Material>>;

/// Shading model of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    /// Unlit, flat color
    Basic,
    /// Lit, physically based (metalness/roughness)
    Standard,
}

#[derive(Debug, Clone)]
pub struct Material {
    id: MaterialId,
    pub name: String,
    pub kind: MaterialKind,
    pub color: Vec3,
    pub opacity: f32,
    pub metalness: f32,
    pub roughness: f32,
    /// Base color image map
    pub map: Option<Arc<Texture>>,
    /// Set when parameters changed and backends must refresh cached state
    pub needs_update: bool,
    disposed: bool,
}

impl Material {
    fn with_kind(name: &str, kind: MaterialKind, color: Vec3) -> Self {
        Self {
            id: MaterialId::next(),
            name: name.to_string(),
            kind,
            color,
            opacity: 1.0,
            metalness: 0.0,
            roughness: 1.0,
            map: None,
            needs_update: false,
            disposed: false,
        }
    }

    pub fn basic(color: Vec3) -> Self {
        Self::with_kind("basic", MaterialKind::Basic, color)
    }

    pub fn standard(name: &str, color: Vec3) -> Self {
        Self::with_kind(name, MaterialKind::Standard, color)
    }

    pub fn with_metalness(mut self, metalness: f32) -> Self {
        self.metalness = metalness;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_map(mut self, map: Arc<Texture>) -> Self {
        self.map = Some(map);
        self
    }

    pub fn into_shared(self) -> SharedMaterial {
        Arc::new(RwLock::new(self))
    }

    pub fn id(&self) -> MaterialId {
        self.id
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Flag the material as disposed. Returns false if it already was.
    pub(crate) fn mark_disposed(&mut self) -> bool {
        !std::mem::replace(&mut self.disposed, true)
    }

    /// Whether every color channel lies below `threshold`
    pub fn is_dark(&self, threshold: f32) -> bool {
        self.color.max_element() < threshold
    }
}

/// Build a linear color from a `0xRRGGBB` literal
pub fn color_from_hex(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors() {
        assert_eq!(color_from_hex(0xffffff), Vec3::ONE);
        let green = color_from_hex(0x4caf50);
        assert!((green.y - 175.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn dark_detection_needs_all_channels_below_threshold() {
        assert!(Material::standard("m", Vec3::splat(0.1)).is_dark(0.2));
        assert!(!Material::standard("m", Vec3::new(0.1, 0.5, 0.1)).is_dark(0.2));
    }

    #[test]
    fn clones_share_the_id() {
        let material = Material::basic(Vec3::ONE);
        assert_eq!(material.clone().id(), material.id());
    }
}
