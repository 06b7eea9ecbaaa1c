//! Asset loading
//!
//! [`AssetLoader`] turns an optional model identifier into a displayable node.
//! It never fails: a missing identifier or a failed load resolves to the
//! fallback primitive, and successful loads are normalized so dark or glossy
//! materials stay readable under the viewer's lighting.

mod gltf_source;

pub use gltf_source::GltfSource;

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use crate::resources::{color_from_hex, Geometry, Material, MaterialKind};
use crate::scene::Node;
use crate::MaterialConfig;

/// Display name tagging the model node in every scene
pub const MODEL_NODE_NAME: &str = "model";

/// Dimensions of the fallback box
pub const FALLBACK_SIZE: [f32; 3] = [2.0, 3.0, 1.0];

const FALLBACK_COLOR: u32 = 0x4caf50;

/// Errors that can occur while loading a model.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("model file not found: {0}")]
    NotFound(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("glTF parse error: {0}")]
    Gltf(#[from] ::gltf::Error),
    #[error("glTF document has no scene")]
    NoScene,
    #[error("mesh {mesh} primitive {primitive} has no POSITION attribute")]
    MissingPositions { mesh: usize, primitive: usize },
    #[error("loader worker exited without a result")]
    WorkerLost,
}

/// Delegate resolving a model identifier into a scene-graph node
pub trait MeshSource {
    fn load(&self, identifier: &str) -> impl Future<Output = Result<Node, AssetError>>;
}

/// Replace CR/LF in text headed for the log
pub fn sanitize_log_message(message: &str) -> String {
    message.replace(['\r', '\n'], " ")
}

/// Box shown when no model is available or loading failed
pub fn fallback_model() -> Node {
    let [width, height, depth] = FALLBACK_SIZE;
    Node::mesh(
        MODEL_NODE_NAME,
        Arc::new(Geometry::cuboid(width, height, depth)),
        Material::basic(color_from_hex(FALLBACK_COLOR)).into_shared(),
    )
}

pub struct AssetLoader<S> {
    source: S,
    settings: MaterialConfig,
}

impl<S: MeshSource> AssetLoader<S> {
    pub fn new(source: S, settings: MaterialConfig) -> Self {
        Self { source, settings }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Resolve `identifier` into a normalized model, or the fallback
    pub async fn load(&self, identifier: Option<&str>) -> Node {
        let Some(identifier) = identifier else {
            log::debug!("no model to load, showing fallback");
            return fallback_model();
        };

        match self.source.load(identifier).await {
            Ok(mut node) => {
                node.name = MODEL_NODE_NAME.to_string();
                let materials = self.normalize(&mut node);
                log::debug!(
                    "loaded {} ({} meshes, {} materials)",
                    sanitize_log_message(identifier),
                    node.mesh_count(),
                    materials
                );
                node
            }
            Err(err) => {
                log::warn!(
                    "failed to load model {}: {}",
                    sanitize_log_message(identifier),
                    sanitize_log_message(&err.to_string())
                );
                fallback_model()
            }
        }
    }

    /// Adjust materials and shadow flags of a freshly loaded model. Each
    /// material is processed once even when shared by several meshes.
    /// Returns the number of distinct materials.
    pub fn normalize(&self, node: &mut Node) -> usize {
        let settings = &self.settings;
        let mut seen = HashSet::new();

        node.visit_meshes_mut(&mut |mesh| {
            mesh.cast_shadow = true;
            mesh.receive_shadow = true;

            let mut material = mesh.material.write();
            if !seen.insert(material.id()) {
                return;
            }
            if material.is_dark(settings.dark_threshold) {
                material.color *= settings.brightness_multiplier;
            }
            if material.kind == MaterialKind::Standard {
                material.roughness = settings.roughness;
                material.metalness = 0.0;
                material.needs_update = true;
            }
        });

        seen.len()
    }
}
