//! Display orchestration
//!
//! [`Viewer`] ties the pieces together: it loads a model, replaces the content
//! of all four viewports, frames the cameras around it and asks for a redraw.
//!
//! The viewer is single-threaded. Its mutable state lives in a `RefCell`, so
//! several `display` futures may be alive at once; no borrow is held across
//! the load's await point. Every `display` takes a ticket and a load that
//! resolves after a newer `display` started is disposed instead of shown.

use std::cell::{Ref, RefCell, RefMut};

use glam::Vec3;

use crate::assets::{sanitize_log_message, AssetLoader, MeshSource, MODEL_NODE_NAME};
use crate::backend::RenderBackend;
use crate::bounds::{BoundingVolume, BoundsFitter};
use crate::camera_sync::CameraSynchronizer;
use crate::navigation::ModelNavigator;
use crate::resources::ResourceLifecycle;
use crate::scene::{CameraInput, Node, OrbitControls};
use crate::scheduler::{FrameRequester, RenderScheduler};
use crate::surface::SurfaceProvider;
use crate::viewport::{ContainerSize, ViewportId, ViewportSet};
use crate::ViewerConfig;

pub use crate::viewport::InitError;

/// Model counter shown next to the navigation controls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLabel {
    /// One-based index of the current model
    pub value: usize,
    /// Number of models
    pub max: usize,
    pub text: String,
}

struct ViewerState<B> {
    viewports: Option<ViewportSet>,
    backend: B,
    lifecycle: ResourceLifecycle,
    fitter: BoundsFitter,
    scheduler: RenderScheduler,
    controls: OrbitControls,
    label: Option<ModelLabel>,
    bounds: Option<BoundingVolume>,
    generation: u64,
}

pub struct Viewer<S, B> {
    config: Option<ViewerConfig>,
    loader: AssetLoader<S>,
    sync: CameraSynchronizer,
    home: Vec3,
    state: RefCell<ViewerState<B>>,
}

impl<S: MeshSource, B: RenderBackend> Viewer<S, B> {
    /// Build an inert viewer. Nothing is drawn until [`Viewer::initialize`]
    /// succeeds; without a configuration it never does.
    pub fn new(
        config: Option<ViewerConfig>,
        source: S,
        backend: B,
        frames: Box<dyn FrameRequester>,
    ) -> Self {
        let defaults = config.clone().unwrap_or_default();
        Self {
            loader: AssetLoader::new(source, defaults.material.clone()),
            sync: CameraSynchronizer::new(&defaults.orthographic),
            home: Vec3::from(defaults.scene.main_light_pos),
            config,
            state: RefCell::new(ViewerState {
                viewports: None,
                backend,
                lifecycle: ResourceLifecycle::new(),
                fitter: BoundsFitter::new(),
                scheduler: RenderScheduler::new(frames),
                controls: OrbitControls::new(Vec3::ZERO),
                label: None,
                bounds: None,
                generation: 0,
            }),
        }
    }

    /// Bind the viewports to the host's surfaces. Returns false, logs the
    /// reason and leaves the viewer inert if the configuration or a surface
    /// is missing.
    pub fn initialize(&self, surfaces: &dyn SurfaceProvider) -> bool {
        let Some(config) = &self.config else {
            log::error!("viewer initialization failed: {}", InitError::MissingConfig);
            return false;
        };

        let mut state = self.state.borrow_mut();
        if state.viewports.is_some() {
            log::warn!("viewer already initialized");
            return true;
        }

        match ViewportSet::new(config, surfaces) {
            Ok(viewports) => {
                state.viewports = Some(viewports);
                state.scheduler.mark_dirty();
                log::info!("viewer initialized");
                true
            }
            Err(err) => {
                log::error!("viewer initialization failed: {}", err);
                false
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.borrow().viewports.is_some()
    }

    pub fn config(&self) -> Option<&ViewerConfig> {
        self.config.as_ref()
    }

    pub fn source(&self) -> &S {
        self.loader.source()
    }

    /// Number of `display` requests taken so far
    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    /// Show the model named by `identifier`, or the fallback box for `None`
    /// or a failed load. Never fails.
    pub async fn display(&self, identifier: Option<&str>) {
        let ticket = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let Some(viewports) = state.viewports.as_mut() else {
                log::warn!("display requested before initialization");
                return;
            };

            state.generation += 1;
            let scene = viewports.perspective_mut().scene_mut();
            state
                .lifecycle
                .dispose(scene.find_named(MODEL_NODE_NAME), &mut state.backend);
            scene.remove_named(MODEL_NODE_NAME);
            state.generation
        };

        let mut node = self.loader.load(identifier).await;

        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        if ticket != state.generation {
            log::debug!(
                "discarding {}: superseded by a newer request",
                identifier.map(sanitize_log_message).unwrap_or_default()
            );
            state.lifecycle.dispose(Some(&node), &mut state.backend);
            return;
        }
        let Some(viewports) = state.viewports.as_mut() else {
            return;
        };

        state.fitter.center_in_place(&mut node);
        viewports.perspective_mut().scene_mut().add(node.clone());
        attach_clones(viewports, &node, &mut state.lifecycle, &mut state.backend);

        let volume = state.fitter.compute_bounds(&node);
        state
            .controls
            .reset(viewports.perspective_mut().camera_mut(), self.home);
        if self.sync.fit(viewports, volume.characteristic_scale) {
            state.bounds = Some(volume);
        }
        state.scheduler.mark_dirty();

        log::info!(
            "displaying {} (scale {:.3})",
            identifier
                .map(sanitize_log_message)
                .unwrap_or_else(|| "fallback".to_string()),
            volume.characteristic_scale
        );
    }

    /// Update the label and display the navigator's current model
    pub async fn show_current(&self, navigator: &dyn ModelNavigator) {
        self.update_model_number(navigator.current_index(), navigator.model_count());
        let url = navigator.current_model_url();
        self.display(url.as_deref()).await;
    }

    pub fn update_model_number(&self, current: usize, total: usize) {
        let value = current + 1;
        self.state.borrow_mut().label = Some(ModelLabel {
            value,
            max: total,
            text: format!("{}/{}", value, total),
        });
    }

    pub fn model_label(&self) -> Option<ModelLabel> {
        self.state.borrow().label.clone()
    }

    /// Bounds of the displayed model, if one was fitted
    pub fn bounds(&self) -> Option<BoundingVolume> {
        self.state.borrow().bounds
    }

    /// Feed orbit input to the perspective viewport
    pub fn orbit(&self, input: &CameraInput) {
        let mut state = self.state.borrow_mut();
        if state.viewports.is_none() {
            return;
        }
        state.controls.handle_input(input);
        state.scheduler.mark_dirty();
    }

    /// A viewport's container changed size. The perspective aspect follows
    /// and the orthographic frusta are refit to the displayed model.
    pub fn resize(&self, id: ViewportId, width: u32, height: u32) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let Some(viewports) = state.viewports.as_mut() else {
            return;
        };

        let viewport = viewports.get_mut(id);
        let mut rect = viewport.target().rect();
        rect.width = width;
        rect.height = height;
        viewport.set_container(ContainerSize::new(width, height), rect);

        self.refit_orthographic(viewports, state.bounds);
        state.scheduler.mark_dirty();
    }

    /// The host window changed size: re-read every surface and resize the
    /// backend
    pub fn relayout(&self, surfaces: &dyn SurfaceProvider, width: u32, height: u32) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.backend.resize(width, height);
        let Some(viewports) = state.viewports.as_mut() else {
            return;
        };
        let Some(config) = &self.config else {
            return;
        };

        for id in ViewportId::ALL {
            if let Some(info) = surfaces.surface(id.surface_name(&config.surfaces)) {
                viewports.get_mut(id).set_container(info.container, info.rect);
            }
        }
        self.refit_orthographic(viewports, state.bounds);
        state.scheduler.mark_dirty();
    }

    /// Deliver an animation frame. Returns true if the viewports were redrawn.
    pub fn on_animation_frame(&self) -> bool {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;

        if let Some(viewports) = state.viewports.as_mut() {
            state.controls.update(viewports.perspective_mut().camera_mut());
        }

        let drawn = match state
            .scheduler
            .on_animation_frame(state.viewports.as_ref(), &mut state.backend)
        {
            Ok(drawn) => drawn,
            Err(err) => {
                log::error!("frame failed: {}", err);
                false
            }
        };

        if state.controls.is_settling() {
            state.scheduler.mark_dirty();
        }
        drawn
    }

    pub fn scheduler(&self) -> Ref<'_, RenderScheduler> {
        Ref::map(self.state.borrow(), |state| &state.scheduler)
    }

    /// Viewports, once initialized
    pub fn viewports(&self) -> Option<Ref<'_, ViewportSet>> {
        Ref::filter_map(self.state.borrow(), |state| state.viewports.as_ref()).ok()
    }

    pub fn backend(&self) -> Ref<'_, B> {
        Ref::map(self.state.borrow(), |state| &state.backend)
    }

    pub fn backend_mut(&self) -> RefMut<'_, B> {
        RefMut::map(self.state.borrow_mut(), |state| &mut state.backend)
    }

    pub fn lifecycle(&self) -> Ref<'_, ResourceLifecycle> {
        Ref::map(self.state.borrow(), |state| &state.lifecycle)
    }

    fn refit_orthographic(&self, viewports: &mut ViewportSet, bounds: Option<BoundingVolume>) {
        match bounds {
            Some(volume) => {
                self.sync
                    .fit_orthographic_all(viewports, volume.characteristic_scale);
            }
            None => {
                // nothing fitted yet: keep the configured base half extent
                let size = self
                    .config
                    .as_ref()
                    .map(|config| config.orthographic.size)
                    .unwrap_or_default();
                let margin = self.sync.margin_factor();
                if margin > 0.0 {
                    self.sync.fit_orthographic_all(viewports, size / margin);
                }
            }
        }
    }
}

/// Replace the "model" node of each orthographic scene with a clone of `node`
fn attach_clones<B: RenderBackend>(
    viewports: &mut ViewportSet,
    node: &Node,
    lifecycle: &mut ResourceLifecycle,
    backend: &mut B,
) {
    for viewport in viewports.orthographic_mut() {
        let scene = viewport.scene_mut();
        lifecycle.dispose(scene.find_named(MODEL_NODE_NAME), backend);
        scene.remove_named(MODEL_NODE_NAME);
        scene.add(node.clone());
    }
}
