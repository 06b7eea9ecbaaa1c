//! Light types for the scene

use glam::Vec3;

/// Directional light (like the sun) shining from `position` towards the origin
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    /// Stored for parity with the scene description; the wgpu backend does
    /// not render shadow maps
    pub cast_shadow: bool,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.5, 1.0, 0.5),
            color: Vec3::ONE,
            intensity: 1.0,
            cast_shadow: false,
        }
    }
}

impl DirectionalLight {
    pub fn new(position: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            position,
            color,
            intensity,
            cast_shadow: false,
        }
    }

    pub fn with_shadow(mut self) -> Self {
        self.cast_shadow = true;
        self
    }

    /// Unit vector pointing from the scene towards the light
    pub fn direction_to_light(&self) -> Vec3 {
        self.position.normalize_or_zero()
    }
}

/// Ambient light applied uniformly to every lit surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 0.03,
        }
    }
}

impl AmbientLight {
    pub fn new(color: Vec3, intensity: f32) -> Self {
        Self { color, intensity }
    }

    pub fn radiance(&self) -> Vec3 {
        self.color * self.intensity
    }
}
