//! Window management using winit
//!
//! [`ViewerWindow`] owns the winit window the four viewports share. It keeps
//! track of size and close requests and turns mouse events over the
//! perspective quadrant into orbit input.

use std::sync::Arc;

use glam::Vec2;
use winit::{
    dpi::{PhysicalPosition, PhysicalSize},
    error::OsError,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::EventLoopWindowTarget,
    window::{Window as WinitWindow, WindowBuilder},
};

use crate::scene::CameraInput;
use crate::scheduler::FrameRequester;
use crate::surface::QuadLayout;
use crate::viewport::ViewportId;

/// Wrapper around the winit window with input and resize state
pub struct ViewerWindow {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
    resized: bool,
    close_requested: bool,
    cursor: Option<PhysicalPosition<f64>>,
    dragging: bool,
    input: CameraInput,
}

impl ViewerWindow {
    /// Create a new window with the given title and dimensions
    pub fn new<T>(
        target: &EventLoopWindowTarget<T>,
        title: &str,
        width: u32,
        height: u32,
    ) -> Result<Self, OsError> {
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(title)
                .with_inner_size(PhysicalSize::new(width, height))
                .build(target)?,
        );
        let size = window.inner_size();

        Ok(Self {
            window,
            width: size.width,
            height: size.height,
            resized: false,
            close_requested: false,
            cursor: None,
            dragging: false,
            input: CameraInput::new(),
        })
    }

    /// Get the raw window for backend initialization
    pub fn window(&self) -> &WinitWindow {
        &self.window
    }

    pub fn window_arc(&self) -> Arc<WinitWindow> {
        Arc::clone(&self.window)
    }

    /// Get current window dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Check if window was resized since last frame
    pub fn was_resized(&self) -> bool {
        self.resized
    }

    pub fn clear_resize_flag(&mut self) {
        self.resized = false;
    }

    pub fn should_close(&self) -> bool {
        self.close_requested
    }

    /// Frame requester redrawing this window, for the render scheduler
    pub fn frame_requester(&self) -> Box<dyn FrameRequester> {
        let window = self.window_arc();
        Box::new(move || window.request_redraw())
    }

    /// Handle window events. Drags only orbit when they start inside the
    /// perspective quadrant of `layout`.
    pub fn handle_event(&mut self, event: &WindowEvent, layout: &QuadLayout) {
        match event {
            WindowEvent::Resized(size) => {
                self.width = size.width;
                self.height = size.height;
                self.resized = true;
            }
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let (true, Some(previous)) = (self.dragging, self.cursor) {
                    self.input.mouse_delta += Vec2::new(
                        (position.x - previous.x) as f32,
                        (position.y - previous.y) as f32,
                    );
                }
                self.cursor = Some(*position);
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.dragging = false;
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.dragging = match state {
                    ElementState::Pressed => self.over_perspective(layout),
                    ElementState::Released => false,
                };
            }
            WindowEvent::MouseWheel { delta, .. } if self.over_perspective(layout) => {
                self.input.scroll_delta += match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32,
                };
            }
            _ => {}
        }
        self.input.mouse_look_active = self.dragging;
    }

    /// Orbit input gathered since the last call, if any
    pub fn take_input(&mut self) -> Option<CameraInput> {
        let input = &self.input;
        if input.mouse_delta == Vec2::ZERO && input.scroll_delta == 0.0 {
            return None;
        }
        let taken = input.clone();
        self.input.reset_deltas();
        Some(taken)
    }

    /// Request a redraw
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    fn over_perspective(&self, layout: &QuadLayout) -> bool {
        self.cursor
            .is_some_and(|cursor| layout.viewport_at(cursor.x, cursor.y) == ViewportId::Perspective)
    }
}

impl FrameRequester for ViewerWindow {
    fn request_frame(&self) {
        self.request_redraw();
    }
}
