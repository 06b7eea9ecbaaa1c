//! The four viewports: one orbit perspective view and three orthographic
//! projections (top, front, side) of the same content

use glam::Vec3;
use thiserror::Error;

use crate::backend::ViewportRect;
use crate::resources::color_from_hex;
use crate::scene::{Camera, DirectionalLight, GridHelper, Projection, Scene};
use crate::surface::SurfaceProvider;
use crate::{SurfaceNames, ViewerConfig};

const PERSPECTIVE_BACKGROUND: u32 = 0xf0f0f0;
const PERSPECTIVE_AMBIENT: f32 = 0.8;
const PERSPECTIVE_FOV_DEGREES: f32 = 75.0;
const PERSPECTIVE_NEAR: f32 = 0.1;
const PERSPECTIVE_FAR: f32 = 1000.0;

const ORTHOGRAPHIC_AMBIENT: f32 = 0.9;
const ORTHOGRAPHIC_NEAR: f32 = 0.1;
const ORTHOGRAPHIC_FAR: f32 = 100.0;
const ORTHOGRAPHIC_KEY_DISTANCE: f32 = 10.0;
const ORTHOGRAPHIC_FILL_DISTANCE: f32 = 8.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InitError {
    #[error("missing drawing surface(s): {}", .0.join(", "))]
    MissingSurface(Vec<String>),
    #[error("viewer has no configuration")]
    MissingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewportId {
    Perspective,
    Top,
    Front,
    Side,
}

impl ViewportId {
    /// Every viewport, in draw order
    pub const ALL: [ViewportId; 4] = [
        ViewportId::Perspective,
        ViewportId::Top,
        ViewportId::Front,
        ViewportId::Side,
    ];

    pub const ORTHOGRAPHIC: [ViewportId; 3] = [ViewportId::Top, ViewportId::Front, ViewportId::Side];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ViewportId::Perspective => "perspective",
            ViewportId::Top => "top",
            ViewportId::Front => "front",
            ViewportId::Side => "side",
        }
    }

    pub fn is_orthographic(self) -> bool {
        self != ViewportId::Perspective
    }

    /// Name of the host surface this viewport binds to
    pub fn surface_name(self, names: &SurfaceNames) -> &str {
        match self {
            ViewportId::Perspective => &names.main,
            ViewportId::Top => &names.top,
            ViewportId::Front => &names.front,
            ViewportId::Side => &names.side,
        }
    }

    /// Fixed camera position and up vector of an orthographic viewport
    fn orthographic_pose(self) -> Option<(Vec3, Vec3)> {
        match self {
            ViewportId::Perspective => None,
            ViewportId::Top => Some((Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, 0.0, -1.0))),
            ViewportId::Front => Some((Vec3::new(0.0, 0.0, 10.0), Vec3::Y)),
            ViewportId::Side => Some((Vec3::new(10.0, 0.0, 0.0), Vec3::Y)),
        }
    }
}

/// Cached size of the element hosting a viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContainerSize {
    pub width: u32,
    pub height: u32,
}

impl ContainerSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height, 1 when the container has no height
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Where a viewport is rasterized: a named surface and its pixel rectangle
#[derive(Debug, Clone, PartialEq)]
pub struct RasterTarget {
    surface: String,
    rect: ViewportRect,
}

impl RasterTarget {
    pub fn new(surface: &str, rect: ViewportRect) -> Self {
        Self {
            surface: surface.to_string(),
            rect,
        }
    }

    pub fn surface(&self) -> &str {
        &self.surface
    }

    pub fn rect(&self) -> ViewportRect {
        self.rect
    }
}

#[derive(Debug)]
pub struct Viewport {
    id: ViewportId,
    scene: Scene,
    camera: Camera,
    target: RasterTarget,
    container: ContainerSize,
}

impl Viewport {
    pub fn id(&self) -> ViewportId {
        self.id
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn target(&self) -> &RasterTarget {
        &self.target
    }

    pub fn container(&self) -> ContainerSize {
        self.container
    }

    /// Update the cached container and the raster rectangle. The perspective
    /// camera's aspect follows; orthographic frusta are refit by the caller.
    pub fn set_container(&mut self, container: ContainerSize, rect: ViewportRect) {
        self.container = container;
        self.target.rect = rect;
        if !self.id.is_orthographic() {
            self.camera
                .set_aspect(container.width as f32, container.height as f32);
        }
    }
}

/// The fixed table of four viewports, indexed by [`ViewportId`]
#[derive(Debug)]
pub struct ViewportSet {
    viewports: [Viewport; 4],
}

impl ViewportSet {
    /// Bind every viewport to its surface and build its scene and camera.
    /// Fails without side effects if any surface is missing.
    pub fn new(config: &ViewerConfig, surfaces: &dyn SurfaceProvider) -> Result<Self, InitError> {
        let mut missing = Vec::new();
        let found = ViewportId::ALL.map(|id| {
            let name = id.surface_name(&config.surfaces);
            let info = surfaces.surface(name);
            if info.is_none() {
                missing.push(name.to_string());
            }
            info
        });
        if !missing.is_empty() {
            return Err(InitError::MissingSurface(missing));
        }

        let mut viewports = Vec::with_capacity(4);
        for (id, info) in ViewportId::ALL.into_iter().zip(found) {
            let info = info.ok_or_else(|| InitError::MissingSurface(vec![id.name().to_string()]))?;
            let (scene, camera) = match id {
                ViewportId::Perspective => perspective_view(config, info.container),
                _ => orthographic_view(id, config, info.container),
            };
            viewports.push(Viewport {
                id,
                scene,
                camera,
                target: RasterTarget::new(&info.name, info.rect),
                container: info.container,
            });
        }

        let viewports: [Viewport; 4] = viewports
            .try_into()
            .map_err(|_| InitError::MissingSurface(Vec::new()))?;
        Ok(Self { viewports })
    }

    pub fn get(&self, id: ViewportId) -> &Viewport {
        &self.viewports[id.index()]
    }

    pub fn get_mut(&mut self, id: ViewportId) -> &mut Viewport {
        &mut self.viewports[id.index()]
    }

    /// All viewports in draw order
    pub fn iter(&self) -> impl Iterator<Item = &Viewport> {
        self.viewports.iter()
    }

    pub fn perspective(&self) -> &Viewport {
        self.get(ViewportId::Perspective)
    }

    pub fn perspective_mut(&mut self) -> &mut Viewport {
        self.get_mut(ViewportId::Perspective)
    }

    pub fn orthographic_mut(&mut self) -> impl Iterator<Item = &mut Viewport> {
        self.viewports[1..].iter_mut()
    }
}

fn perspective_view(config: &ViewerConfig, container: ContainerSize) -> (Scene, Camera) {
    let scene_config = &config.scene;
    let grid_size = scene_config.grid_size;

    let mut scene = Scene::new()
        .with_background(color_from_hex(PERSPECTIVE_BACKGROUND))
        .with_ambient_light(Vec3::ONE, PERSPECTIVE_AMBIENT)
        .with_grid(GridHelper::new(grid_size as f32, grid_size));
    scene.add_directional_light(
        DirectionalLight::new(
            Vec3::from(scene_config.main_light_pos),
            Vec3::ONE,
            scene_config.main_light_intensity,
        )
        .with_shadow(),
    );
    scene.add_directional_light(DirectionalLight::new(
        Vec3::from(scene_config.fill_light_pos),
        Vec3::ONE,
        scene_config.fill_light_intensity,
    ));

    let camera = Camera::new(Vec3::from(scene_config.main_light_pos), Vec3::ZERO).with_projection(
        Projection::perspective(
            PERSPECTIVE_FOV_DEGREES,
            container.aspect(),
            PERSPECTIVE_NEAR,
            PERSPECTIVE_FAR,
        ),
    );

    (scene, camera)
}

fn orthographic_view(
    id: ViewportId,
    config: &ViewerConfig,
    container: ContainerSize,
) -> (Scene, Camera) {
    let ortho = &config.orthographic;
    let (position, up) = id.orthographic_pose().unwrap_or((Vec3::Z * 10.0, Vec3::Y));
    let axis = position.normalize_or_zero();

    let mut scene = Scene::new()
        .with_background(Vec3::ONE)
        .with_ambient_light(Vec3::ONE, ORTHOGRAPHIC_AMBIENT);
    scene.add_directional_light(DirectionalLight::new(
        axis * ORTHOGRAPHIC_KEY_DISTANCE,
        Vec3::ONE,
        ortho.light_intensity,
    ));
    scene.add_directional_light(DirectionalLight::new(
        -axis * ORTHOGRAPHIC_FILL_DISTANCE,
        Vec3::ONE,
        ortho.fill_intensity,
    ));

    let aspect = container.aspect();
    let camera = Camera::new(position, Vec3::ZERO)
        .with_up(up)
        .with_projection(Projection::orthographic(
            ortho.size * aspect,
            ortho.size,
            ORTHOGRAPHIC_NEAR,
            ORTHOGRAPHIC_FAR,
        ));

    (scene, camera)
}
