//! Release of resources owned by replaced scene content

use crate::backend::ReleaseResources;
use crate::scene::Node;
use glam::Mat4;

/// Counts of resources released by one [`ResourceLifecycle::dispose`] call
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DisposeStats {
    pub geometries: usize,
    pub materials: usize,
    pub textures: usize,
}

impl DisposeStats {
    pub fn total(&self) -> usize {
        self.geometries + self.materials + self.textures
    }
}

/// Walks a subtree and releases the geometry, material and image map of every
/// mesh leaf.
///
/// Resources are flagged as they are released, so disposing the same subtree
/// (or a clone sharing its handles) again releases nothing. Call this before
/// detaching the node from its scene.
#[derive(Debug, Default)]
pub struct ResourceLifecycle {
    totals: DisposeStats,
}

impl ResourceLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispose<R: ReleaseResources + ?Sized>(
        &mut self,
        node: Option<&Node>,
        backend: &mut R,
    ) -> DisposeStats {
        let Some(node) = node else {
            return DisposeStats::default();
        };

        let mut stats = DisposeStats::default();
        node.visit_meshes(Mat4::IDENTITY, &mut |mesh, _| {
            if mesh.geometry.mark_disposed() {
                backend.release_geometry(mesh.geometry.id());
                stats.geometries += 1;
            }

            let mut material = mesh.material.write();
            if material.mark_disposed() {
                backend.release_material(material.id());
                stats.materials += 1;
            }
            if let Some(map) = &material.map {
                if map.mark_disposed() {
                    backend.release_texture(map.id());
                    stats.textures += 1;
                }
            }
        });

        if stats.total() > 0 {
            log::debug!(
                "disposed '{}': {} geometries, {} materials, {} textures",
                node.name,
                stats.geometries,
                stats.materials,
                stats.textures
            );
        }

        self.totals.geometries += stats.geometries;
        self.totals.materials += stats.materials;
        self.totals.textures += stats.textures;
        stats
    }

    /// Everything released over the lifetime of this manager
    pub fn totals(&self) -> DisposeStats {
        self.totals
    }
}
