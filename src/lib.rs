//! quadview - four synchronized views of one 3D asset
//!
//! The viewer shows a model in a free-orbit perspective viewport and in three
//! fixed orthographic viewports (top, front, side).
//!
//! # Features
//! - Asynchronous model loading with a deterministic fallback primitive
//! - Disposal of GPU resources owned by replaced content
//! - Shared bounding volume used to frame all four cameras
//! - Dirty-flag render scheduling: one redraw per animation frame, only when
//!   something visible changed
//! - wgpu backend rendering the viewports as quadrants of one window

pub mod assets;
pub mod backend;
pub mod bounds;
pub mod camera_sync;
pub mod navigation;
pub mod resources;
pub mod scene;
pub mod scheduler;
pub mod surface;
pub mod viewer;
pub mod viewport;
pub mod window;

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

pub use assets::{AssetLoader, GltfSource, MeshSource};
pub use backend::{DummyBackend, RenderBackend, WgpuBackend};
pub use viewer::{ModelLabel, Viewer};
pub use viewport::{ViewportId, ViewportSet};
pub use window::ViewerWindow;

/// Errors raised while reading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Names of the four drawing surfaces the viewer binds to
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SurfaceNames {
    pub main: String,
    pub top: String,
    pub front: String,
    pub side: String,
}

impl Default for SurfaceNames {
    fn default() -> Self {
        Self {
            main: "canvas-3d".to_string(),
            top: "canvas-top".to_string(),
            front: "canvas-front".to_string(),
            side: "canvas-side".to_string(),
        }
    }
}

/// Perspective scene setup
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Grid helper size and number of divisions
    pub grid_size: u32,
    /// Key light position (also the perspective camera's home position)
    pub main_light_pos: [f32; 3],
    pub main_light_intensity: f32,
    pub fill_light_pos: [f32; 3],
    pub fill_light_intensity: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            grid_size: 10,
            main_light_pos: [10.0, 10.0, 5.0],
            main_light_intensity: 0.9,
            fill_light_pos: [-5.0, -5.0, -5.0],
            fill_light_intensity: 0.4,
        }
    }
}

/// Orthographic viewport setup
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrthographicConfig {
    /// Frustum padding relative to the model's characteristic scale
    pub margin_factor: f32,
    /// Half extent of the frustum before any model is fitted
    pub size: f32,
    pub light_intensity: f32,
    pub fill_intensity: f32,
}

impl Default for OrthographicConfig {
    fn default() -> Self {
        Self {
            margin_factor: 0.6,
            size: 5.0,
            light_intensity: 1.1,
            fill_intensity: 0.3,
        }
    }
}

/// Material normalization applied to loaded models
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    /// Colors with every channel below this value count as near-black
    pub dark_threshold: f32,
    /// Multiplier applied to near-black colors
    pub brightness_multiplier: f32,
    /// Roughness forced onto physically based materials
    pub roughness: f32,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            dark_threshold: 0.2,
            brightness_multiplier: 2.5,
            roughness: 0.8,
        }
    }
}

/// Static viewer configuration, read once before initialization
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Directory model identifiers are resolved against
    pub model_path: String,
    /// Upper bound on the number of models a navigator offers
    pub max_models: usize,
    /// Duration of the fade-in played after a model is displayed (seconds)
    pub animation_duration: f32,
    pub surfaces: SurfaceNames,
    pub scene: SceneConfig,
    pub orthographic: OrthographicConfig,
    pub material: MaterialConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model_path: "models/".to_string(),
            max_models: 100,
            animation_duration: 1.5,
            surfaces: SurfaceNames::default(),
            scene: SceneConfig::default(),
            orthographic: OrthographicConfig::default(),
            material: MaterialConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_layout() {
        let config = ViewerConfig::default();
        assert_eq!(config.scene.grid_size, 10);
        assert_eq!(config.scene.main_light_pos, [10.0, 10.0, 5.0]);
        assert_eq!(config.orthographic.margin_factor, 0.6);
        assert_eq!(config.orthographic.size, 5.0);
        assert_eq!(config.surfaces.main, "canvas-3d");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ViewerConfig::from_toml_str(
            r#"
            model_path = "assets/"

            [orthographic]
            margin_factor = 0.75

            [surfaces]
            side = "right-pane"
            "#,
        )
        .unwrap();

        assert_eq!(config.model_path, "assets/");
        assert_eq!(config.orthographic.margin_factor, 0.75);
        assert_eq!(config.orthographic.size, 5.0);
        assert_eq!(config.surfaces.side, "right-pane");
        assert_eq!(config.surfaces.top, "canvas-top");
        assert_eq!(config.material.dark_threshold, 0.2);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let err = ViewerConfig::from_toml_str("grid_size = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ViewerConfig::load("/nonexistent/quadview.toml").unwrap_err();
        match err {
            ConfigError::Io { path, .. } => assert!(path.contains("quadview.toml")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
