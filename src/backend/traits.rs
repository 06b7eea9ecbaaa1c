//! Core backend abstraction traits
//!
//! These traits define the interface the viewer drives every frame. Both the
//! wgpu backend and the dummy backend implement them.

use crate::resources::{GeometryId, MaterialId, TextureId};
use crate::scene::{Camera, Scene};
use crate::viewport::RasterTarget;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create surface: {0}")]
    SurfaceCreationFailed(String),
    #[error("Failed to create device: {0}")]
    DeviceCreationFailed(String),
    #[error("Failed to acquire next image: {0}")]
    AcquireImageFailed(String),
    #[error("Draw issued outside of a frame")]
    NoActiveFrame,
    #[error("Surface lost")]
    SurfaceLost,
    #[error("Out of memory")]
    OutOfMemory,
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Release of GPU-side objects backing scene resources.
///
/// Called by the resource lifecycle when content is replaced. Releasing an id
/// the backend never uploaded is a no-op.
pub trait ReleaseResources {
    fn release_geometry(&mut self, geometry: GeometryId);
    fn release_material(&mut self, material: MaterialId);
    fn release_texture(&mut self, texture: TextureId);
}

/// A renderer able to draw viewports into their raster targets
pub trait RenderBackend: ReleaseResources {
    /// Start a frame. Every `draw` between `begin_frame` and `end_frame` lands
    /// in the same presented image.
    fn begin_frame(&mut self) -> RenderResult<()>;

    /// Draw `scene` as seen by `camera` into `target`
    fn draw(&mut self, target: &RasterTarget, scene: &Scene, camera: &Camera) -> RenderResult<()>;

    /// Submit and present the frame
    fn end_frame(&mut self) -> RenderResult<()>;

    /// The host surface changed size
    fn resize(&mut self, width: u32, height: u32);
}
