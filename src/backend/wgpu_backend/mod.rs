//! wgpu backend implementation
//!
//! All four viewports share one window surface. Each `draw` records a render
//! pass restricted to the viewport's rectangle: a fullscreen triangle paints
//! the background and resets depth, then the grid and meshes are drawn.
//! GPU copies of geometries, materials and textures are cached by resource id
//! and dropped when the resource lifecycle releases them.

mod pipelines;

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use bytemuck::Pod;
use glam::{Mat4, Vec4};
use wgpu::util::DeviceExt;

use self::pipelines::{Layouts, Pipelines, DEPTH_FORMAT};
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::resources::{
    Geometry, GeometryId, Material, MaterialId, MaterialKind, Texture, TextureId,
};
use crate::scene::{Camera, GridHelper, Scene};
use crate::viewport::RasterTarget;

/// Uploaded vertex and index buffers of a geometry
struct GpuGeometry {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

struct GpuTexture {
    #[allow(dead_code)]
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Material bind group and the texture it was built with
struct GpuMaterial {
    texture: Option<TextureId>,
    bind_group: wgpu::BindGroup,
}

struct GpuGrid {
    key: (u32, u32),
    vertices: wgpu::Buffer,
    vertex_count: u32,
}

/// Dynamic-offset uniform buffer filled front to back during a frame
struct UniformRing {
    label: &'static str,
    element_size: u64,
    capacity: u32,
    cursor: u32,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl UniformRing {
    fn new<T: Pod>(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        label: &'static str,
        capacity: u32,
    ) -> Self {
        let element_size = std::mem::size_of::<T>() as u64;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity as u64 * UNIFORM_ALIGNMENT,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(element_size),
                }),
            }],
        });
        Self {
            label,
            element_size,
            capacity,
            cursor: 0,
            buffer,
            bind_group,
        }
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Make room for `count` more slots. Growing allocates a fresh buffer;
    /// passes already recorded keep the old one alive.
    fn reserve<T: Pod>(&mut self, device: &wgpu::Device, layout: &wgpu::BindGroupLayout, count: u32) {
        if self.cursor + count <= self.capacity {
            return;
        }
        let capacity = (self.cursor + count).next_power_of_two().max(self.capacity * 2);
        log::debug!("growing {} to {} slots", self.label, capacity);
        *self = Self::new::<T>(device, layout, self.label, capacity);
    }

    /// Write `value` into the next slot and return its dynamic offset
    fn push<T: Pod>(&mut self, queue: &wgpu::Queue, value: &T) -> u32 {
        debug_assert_eq!(std::mem::size_of::<T>() as u64, self.element_size);
        let offset = self.cursor as u64 * UNIFORM_ALIGNMENT;
        queue.write_buffer(&self.buffer, offset, bytemuck::bytes_of(value));
        self.cursor += 1;
        offset as u32
    }
}

/// Surface image being rendered this frame
struct ActiveFrame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
    cleared: bool,
}

/// One mesh ready to be recorded
struct DrawItem {
    geometry: GeometryId,
    material: MaterialId,
    object_offset: u32,
}

/// wgpu backend implementation
pub struct WgpuBackend {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    surface: wgpu::Surface<'static>,
    #[allow(dead_code)]
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,

    layouts: Layouts,
    pipelines: Pipelines,
    sampler: wgpu::Sampler,
    white: GpuTexture,
    frame_uniforms: UniformRing,
    object_uniforms: UniformRing,

    // Resource caches keyed by scene resource id
    geometries: HashMap<GeometryId, GpuGeometry>,
    materials: HashMap<MaterialId, GpuMaterial>,
    textures: HashMap<TextureId, GpuTexture>,
    grid: Option<GpuGrid>,

    frame: Option<ActiveFrame>,
}

impl WgpuBackend {
    /// Create a backend rendering into `window`
    pub fn new(window: Arc<winit::window::Window>) -> RenderResult<Self> {
        pollster::block_on(Self::new_async(window))
    }

    pub async fn new_async(window: Arc<winit::window::Window>) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| RenderError::SurfaceCreationFailed(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| RenderError::InitializationFailed("No suitable adapter found".into()))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?} backend)",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Viewer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::DeviceCreationFailed(e.to_string()))?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        // Colors are authored as display values; keep them unconverted
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| RenderError::SurfaceCreationFailed("Surface has no formats".into()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let (width, height) = clamp_size(&device, size.width, size.height);
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let layouts = Layouts::new(&device);
        let pipelines = Pipelines::new(&device, &layouts, surface_format);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let white = upload_texture(&device, &queue, &Texture::white());
        let frame_uniforms =
            UniformRing::new::<FrameUniformData>(&device, &layouts.frame, "Frame Uniforms", 4);
        let object_uniforms =
            UniformRing::new::<ObjectUniformData>(&device, &layouts.object, "Object Uniforms", 64);
        let depth_view = create_depth_view(&device, width, height);

        Ok(Self {
            instance,
            surface,
            adapter,
            device,
            queue,
            surface_config,
            depth_view,
            layouts,
            pipelines,
            sampler,
            white,
            frame_uniforms,
            object_uniforms,
            geometries: HashMap::new(),
            materials: HashMap::new(),
            textures: HashMap::new(),
            grid: None,
            frame: None,
        })
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn acquire(&mut self) -> RenderResult<wgpu::SurfaceTexture> {
        match self.surface.get_current_texture() {
            Ok(texture) => Ok(texture),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("surface outdated, reconfiguring");
                self.surface.configure(&self.device, &self.surface_config);
                self.surface.get_current_texture().map_err(map_surface_error)
            }
            Err(e) => Err(map_surface_error(e)),
        }
    }

    fn ensure_geometry(&mut self, geometry: &Geometry) {
        if self.geometries.contains_key(&geometry.id()) {
            return;
        }
        let vertices = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(geometry.name.as_str()),
                contents: geometry.vertex_bytes(),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let indices = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(geometry.name.as_str()),
                contents: geometry.index_bytes(),
                usage: wgpu::BufferUsages::INDEX,
            });
        log::trace!(
            "uploaded geometry {} ({} vertices)",
            geometry.name,
            geometry.vertex_count()
        );
        self.geometries.insert(
            geometry.id(),
            GpuGeometry {
                vertices,
                indices,
                index_count: geometry.index_count() as u32,
            },
        );
    }

    fn ensure_material(&mut self, material: &Material) {
        let map = material.map.as_ref().filter(|map| !map.is_disposed());
        let texture = map.map(|map| map.id());
        if let Some(cached) = self.materials.get(&material.id()) {
            if cached.texture == texture {
                return;
            }
        }

        if let Some(map) = map {
            if !self.textures.contains_key(&map.id()) {
                let uploaded = upload_texture(&self.device, &self.queue, map);
                self.textures.insert(map.id(), uploaded);
            }
        }
        let view = texture
            .and_then(|id| self.textures.get(&id))
            .map(|gpu| &gpu.view)
            .unwrap_or(&self.white.view);

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(material.name.as_str()),
            layout: &self.layouts.material,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        self.materials
            .insert(material.id(), GpuMaterial { texture, bind_group });
    }

    fn ensure_grid(&mut self, grid: &GridHelper) {
        let key = (grid.size.to_bits(), grid.divisions);
        if self.grid.as_ref().is_some_and(|cached| cached.key == key) {
            return;
        }
        let lines = grid.line_vertices();
        let vertices = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Grid Vertices"),
                contents: bytemuck::cast_slice(&lines),
                usage: wgpu::BufferUsages::VERTEX,
            });
        self.grid = Some(GpuGrid {
            key,
            vertices,
            vertex_count: lines.len() as u32,
        });
    }

    /// Upload what `scene` needs and write its uniforms
    fn prepare(&mut self, scene: &Scene, camera: &Camera) -> (u32, Vec<DrawItem>) {
        let mut meshes = Vec::new();
        for node in scene.nodes() {
            node.visit_meshes(Mat4::IDENTITY, &mut |mesh, world| {
                if !mesh.geometry.is_disposed() {
                    meshes.push((mesh.geometry.clone(), mesh.material.clone(), world));
                }
            });
        }

        self.frame_uniforms
            .reserve::<FrameUniformData>(&self.device, &self.layouts.frame, 1);
        self.object_uniforms.reserve::<ObjectUniformData>(
            &self.device,
            &self.layouts.object,
            meshes.len() as u32,
        );

        let frame_offset = self
            .frame_uniforms
            .push(&self.queue, &frame_uniforms(scene, camera));

        if let Some(grid) = &scene.grid {
            self.ensure_grid(grid);
        }

        let mut items = Vec::with_capacity(meshes.len());
        for (geometry, material, world) in meshes {
            self.ensure_geometry(&geometry);
            let material = material.read();
            self.ensure_material(&material);

            let textured = material
                .map
                .as_ref()
                .is_some_and(|map| !map.is_disposed());
            let object = ObjectUniformData {
                model: world,
                normal_matrix: world.inverse().transpose(),
                base_color: material.color.extend(material.opacity),
                params: Vec4::new(
                    material.metalness,
                    material.roughness,
                    if material.kind == MaterialKind::Standard { 1.0 } else { 0.0 },
                    if textured { 1.0 } else { 0.0 },
                ),
            };
            items.push(DrawItem {
                geometry: geometry.id(),
                material: material.id(),
                object_offset: self.object_uniforms.push(&self.queue, &object),
            });
        }

        (frame_offset, items)
    }

    fn record(
        &self,
        frame: &mut ActiveFrame,
        rect: ViewportRect,
        draw_grid: bool,
        frame_offset: u32,
        items: &[DrawItem],
    ) {
        let (color_load, depth_load) = if frame.cleared {
            (wgpu::LoadOp::Load, wgpu::LoadOp::Load)
        } else {
            (wgpu::LoadOp::Clear(wgpu::Color::WHITE), wgpu::LoadOp::Clear(1.0))
        };
        frame.cleared = true;

        let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Viewport Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_viewport(
            rect.x as f32,
            rect.y as f32,
            rect.width as f32,
            rect.height as f32,
            0.0,
            1.0,
        );
        pass.set_scissor_rect(rect.x, rect.y, rect.width, rect.height);
        pass.set_bind_group(0, &self.frame_uniforms.bind_group, &[frame_offset]);

        pass.set_pipeline(&self.pipelines.background);
        pass.draw(0..3, 0..1);

        if draw_grid {
            if let Some(grid) = &self.grid {
                pass.set_pipeline(&self.pipelines.line);
                pass.set_vertex_buffer(0, grid.vertices.slice(..));
                pass.draw(0..grid.vertex_count, 0..1);
            }
        }

        pass.set_pipeline(&self.pipelines.mesh);
        for item in items {
            let (Some(geometry), Some(material)) = (
                self.geometries.get(&item.geometry),
                self.materials.get(&item.material),
            ) else {
                continue;
            };
            pass.set_bind_group(1, &self.object_uniforms.bind_group, &[item.object_offset]);
            pass.set_bind_group(2, &material.bind_group, &[]);
            pass.set_vertex_buffer(0, geometry.vertices.slice(..));
            pass.set_index_buffer(geometry.indices.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..geometry.index_count, 0, 0..1);
        }
    }

    /// Clip `rect` to the surface
    fn clip(&self, rect: ViewportRect) -> ViewportRect {
        let (width, height) = self.surface_size();
        let x = rect.x.min(width);
        let y = rect.y.min(height);
        ViewportRect::new(
            x,
            y,
            rect.width.min(width - x),
            rect.height.min(height - y),
        )
    }
}

impl ReleaseResources for WgpuBackend {
    fn release_geometry(&mut self, geometry: GeometryId) {
        if self.geometries.remove(&geometry).is_some() {
            log::trace!("released geometry {:?}", geometry);
        }
    }

    fn release_material(&mut self, material: MaterialId) {
        if self.materials.remove(&material).is_some() {
            log::trace!("released material {:?}", material);
        }
    }

    fn release_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() {
            log::trace!("released texture {:?}", texture);
        }
    }
}

impl RenderBackend for WgpuBackend {
    fn begin_frame(&mut self) -> RenderResult<()> {
        let texture = self.acquire()?;
        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        self.frame_uniforms.reset();
        self.object_uniforms.reset();
        self.frame = Some(ActiveFrame {
            texture,
            view,
            encoder,
            cleared: false,
        });
        Ok(())
    }

    fn draw(&mut self, target: &RasterTarget, scene: &Scene, camera: &Camera) -> RenderResult<()> {
        if self.frame.is_none() {
            return Err(RenderError::NoActiveFrame);
        }
        let rect = self.clip(target.rect());
        if rect.is_empty() {
            log::trace!("skipping {}: empty viewport", target.surface());
            return Ok(());
        }

        let (frame_offset, items) = self.prepare(scene, camera);
        let mut frame = self.frame.take().ok_or(RenderError::NoActiveFrame)?;
        self.record(&mut frame, rect, scene.grid.is_some(), frame_offset, &items);
        self.frame = Some(frame);
        Ok(())
    }

    fn end_frame(&mut self) -> RenderResult<()> {
        let mut frame = self.frame.take().ok_or(RenderError::NoActiveFrame)?;
        if !frame.cleared {
            // nothing drawn: still present a cleared image
            frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }

        self.queue.submit(std::iter::once(frame.encoder.finish()));
        frame.texture.present();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let (width, height) = clamp_size(&self.device, width, height);
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, width, height);
    }
}

fn map_surface_error(e: wgpu::SurfaceError) -> RenderError {
    match e {
        wgpu::SurfaceError::Lost => RenderError::SurfaceLost,
        wgpu::SurfaceError::OutOfMemory => RenderError::OutOfMemory,
        _ => RenderError::AcquireImageFailed(e.to_string()),
    }
}

/// Clamp to device limits while maintaining aspect ratio
fn clamp_size(device: &wgpu::Device, width: u32, height: u32) -> (u32, u32) {
    let max_size = device.limits().max_texture_dimension_2d;
    if width > max_size || height > max_size {
        let scale = (max_size as f32 / width as f32).min(max_size as f32 / height as f32);
        (
            ((width as f32 * scale) as u32).max(1),
            ((height as f32 * scale) as u32).max(1),
        )
    } else {
        (width.max(1), height.max(1))
    }
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Buffer"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn upload_texture(device: &wgpu::Device, queue: &wgpu::Queue, source: &Texture) -> GpuTexture {
    let expected = source.width as usize * source.height as usize * 4;
    let (width, height, data) = if source.width == 0 || source.height == 0 || source.data().len() != expected {
        log::warn!("texture {} has invalid dimensions, using white", source.name);
        (1, 1, &[255u8, 255, 255, 255][..])
    } else {
        (source.width, source.height, source.data())
    };

    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(source.name.as_str()),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture { texture, view }
}

/// Camera and lighting of one viewport in shader layout
fn frame_uniforms(scene: &Scene, camera: &Camera) -> FrameUniformData {
    let mut light_directions = [Vec4::ZERO; MAX_DIRECTIONAL_LIGHTS];
    let mut count = 0;
    for (slot, light) in light_directions.iter_mut().zip(&scene.lights) {
        *slot = light.direction_to_light().extend(light.intensity);
        count += 1;
    }
    if scene.lights.len() > MAX_DIRECTIONAL_LIGHTS {
        log::warn!(
            "scene has {} directional lights, only {} are rendered",
            scene.lights.len(),
            MAX_DIRECTIONAL_LIGHTS
        );
    }

    FrameUniformData {
        view_proj: camera.view_projection_matrix(),
        camera_position: camera.position.extend(1.0),
        background: scene.background.extend(1.0),
        ambient: scene.ambient_light.radiance().extend(1.0),
        light_directions,
        light_count: [count, 0, 0, 0],
    }
}
