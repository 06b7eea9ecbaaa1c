//! Dummy backend for testing and headless hosts.
//!
//! This backend doesn't perform GPU operations. It mirrors the caching a real
//! backend does (every resource referenced by a drawn scene becomes "live"
//! until released) and records the draws of each frame so callers can
//! inspect what would have been rendered.

use std::collections::HashSet;

use glam::Vec3;

use crate::resources::{GeometryId, MaterialId, TextureId};
use crate::scene::{Camera, Scene};
use crate::viewport::RasterTarget;

use super::traits::{ReleaseResources, RenderBackend, RenderError, RenderResult};

/// One `draw` call as seen by the dummy backend
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub surface: String,
    pub mesh_count: usize,
    pub camera_position: Vec3,
}

#[derive(Debug, Default)]
pub struct DummyBackend {
    in_frame: bool,
    frames: u64,
    current_frame: Vec<DrawRecord>,
    last_frame: Vec<DrawRecord>,
    live_geometries: HashSet<GeometryId>,
    live_materials: HashSet<MaterialId>,
    live_textures: HashSet<TextureId>,
    released: usize,
    size: (u32, u32),
}

impl DummyBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    /// Number of completed frames
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Draws issued during the last completed frame, in order
    pub fn last_frame(&self) -> &[DrawRecord] {
        &self.last_frame
    }

    pub fn live_geometry_count(&self) -> usize {
        self.live_geometries.len()
    }

    pub fn live_material_count(&self) -> usize {
        self.live_materials.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.live_textures.len()
    }

    pub fn is_geometry_live(&self, id: GeometryId) -> bool {
        self.live_geometries.contains(&id)
    }

    /// Number of release calls that dropped a live resource
    pub fn released_count(&self) -> usize {
        self.released
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

impl ReleaseResources for DummyBackend {
    fn release_geometry(&mut self, geometry: GeometryId) {
        if self.live_geometries.remove(&geometry) {
            log::trace!("DummyBackend: released geometry {:?}", geometry);
            self.released += 1;
        }
    }

    fn release_material(&mut self, material: MaterialId) {
        if self.live_materials.remove(&material) {
            log::trace!("DummyBackend: released material {:?}", material);
            self.released += 1;
        }
    }

    fn release_texture(&mut self, texture: TextureId) {
        if self.live_textures.remove(&texture) {
            log::trace!("DummyBackend: released texture {:?}", texture);
            self.released += 1;
        }
    }
}

impl RenderBackend for DummyBackend {
    fn begin_frame(&mut self) -> RenderResult<()> {
        self.in_frame = true;
        self.current_frame.clear();
        Ok(())
    }

    fn draw(&mut self, target: &RasterTarget, scene: &Scene, camera: &Camera) -> RenderResult<()> {
        if !self.in_frame {
            return Err(RenderError::NoActiveFrame);
        }

        let mut mesh_count = 0;
        for node in scene.nodes() {
            node.visit_meshes(glam::Mat4::IDENTITY, &mut |mesh, _| {
                if mesh.geometry.is_disposed() {
                    return;
                }
                mesh_count += 1;
                self.live_geometries.insert(mesh.geometry.id());
                let material = mesh.material.read();
                self.live_materials.insert(material.id());
                if let Some(map) = &material.map {
                    self.live_textures.insert(map.id());
                }
            });
        }

        log::trace!(
            "DummyBackend: drawing {} meshes into {}",
            mesh_count,
            target.surface()
        );
        self.current_frame.push(DrawRecord {
            surface: target.surface().to_string(),
            mesh_count,
            camera_position: camera.position,
        });
        Ok(())
    }

    fn end_frame(&mut self) -> RenderResult<()> {
        if !self.in_frame {
            return Err(RenderError::NoActiveFrame);
        }
        self.in_frame = false;
        self.frames += 1;
        self.last_frame = std::mem::take(&mut self.current_frame);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }
}
