//! Orbit camera controls for the perspective viewport
//!
//! Input accumulates rotation/zoom deltas; [`OrbitControls::update`] applies
//! them to the camera. With damping enabled only a fraction of the pending
//! rotation is applied per update, so the camera keeps settling for a few
//! frames after the input stops.

use glam::{Vec2, Vec3};

use super::Camera;

const SETTLE_EPSILON: f32 = 1e-5;

/// Input state for camera controllers
#[derive(Debug, Clone, Default)]
pub struct CameraInput {
    /// Mouse delta since last event (in pixels)
    pub mouse_delta: Vec2,

    /// Mouse scroll delta (positive = scroll up)
    pub scroll_delta: f32,

    /// Whether an orbit drag is active (e.g. left mouse button held)
    pub mouse_look_active: bool,
}

impl CameraInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drag(delta: Vec2) -> Self {
        Self {
            mouse_delta: delta,
            mouse_look_active: true,
            ..Default::default()
        }
    }

    pub fn scroll(delta: f32) -> Self {
        Self {
            scroll_delta: delta,
            ..Default::default()
        }
    }

    /// Reset per-frame deltas (call after the input was consumed)
    pub fn reset_deltas(&mut self) {
        self.mouse_delta = Vec2::ZERO;
        self.scroll_delta = 0.0;
    }
}

/// Orbit controls rotating a camera around a target point
#[derive(Debug, Clone)]
pub struct OrbitControls {
    /// Point the camera orbits around and looks at
    pub target: Vec3,
    pub enable_damping: bool,
    /// Fraction of the pending rotation applied per update
    pub damping_factor: f32,
    /// Minimum distance
    pub min_distance: f32,
    /// Maximum distance
    pub max_distance: f32,
    /// Orbit sensitivity (radians per pixel)
    pub orbit_sensitivity: f32,
    /// Zoom factor per scroll unit
    pub zoom_factor: f32,
    /// Elevation is clamped to +-(PI/2 - margin) to avoid flipping over the pole
    pub pole_margin: f32,

    azimuth_delta: f32,
    elevation_delta: f32,
    zoom_scale: f32,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            enable_damping: true,
            damping_factor: 0.05,
            min_distance: 0.01,
            max_distance: 10_000.0,
            orbit_sensitivity: 0.005,
            zoom_factor: 1.1,
            pole_margin: 0.01,
            azimuth_delta: 0.0,
            elevation_delta: 0.0,
            zoom_scale: 1.0,
        }
    }
}

impl OrbitControls {
    pub fn new(target: Vec3) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    /// Accumulate drag and scroll input
    pub fn handle_input(&mut self, input: &CameraInput) {
        if input.mouse_look_active && input.mouse_delta != Vec2::ZERO {
            self.azimuth_delta -= input.mouse_delta.x * self.orbit_sensitivity;
            self.elevation_delta += input.mouse_delta.y * self.orbit_sensitivity;
        }

        if input.scroll_delta > 0.0 {
            self.zoom_scale /= self.zoom_factor;
        } else if input.scroll_delta < 0.0 {
            self.zoom_scale *= self.zoom_factor;
        }
    }

    /// Apply pending motion to the camera. Returns true if the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let offset = camera.position - self.target;
        let radius = offset.length();
        if radius <= f32::EPSILON {
            self.clear_motion();
            camera.target = self.target;
            return false;
        }

        let mut azimuth = offset.z.atan2(offset.x);
        let mut elevation = (offset.y / radius).clamp(-1.0, 1.0).asin();

        let step = if self.enable_damping {
            self.damping_factor
        } else {
            1.0
        };
        azimuth += self.azimuth_delta * step;
        elevation += self.elevation_delta * step;

        let max_elevation = std::f32::consts::FRAC_PI_2 - self.pole_margin;
        elevation = elevation.clamp(-max_elevation, max_elevation);

        let distance = (radius * self.zoom_scale).clamp(self.min_distance, self.max_distance);

        let position = self.target
            + Vec3::new(
                distance * elevation.cos() * azimuth.cos(),
                distance * elevation.sin(),
                distance * elevation.cos() * azimuth.sin(),
            );

        let moved = position.distance_squared(camera.position) > SETTLE_EPSILON * SETTLE_EPSILON
            || camera.target != self.target;

        camera.position = position;
        camera.target = self.target;

        if self.enable_damping {
            self.azimuth_delta *= 1.0 - self.damping_factor;
            self.elevation_delta *= 1.0 - self.damping_factor;
            if !self.is_settling() {
                self.azimuth_delta = 0.0;
                self.elevation_delta = 0.0;
            }
        } else {
            self.azimuth_delta = 0.0;
            self.elevation_delta = 0.0;
        }
        self.zoom_scale = 1.0;

        moved
    }

    /// Whether damped rotation is still pending
    pub fn is_settling(&self) -> bool {
        self.azimuth_delta.abs() > SETTLE_EPSILON || self.elevation_delta.abs() > SETTLE_EPSILON
    }

    /// Put the camera back at `home`, looking at the origin, and drop any
    /// pending motion
    pub fn reset(&mut self, camera: &mut Camera, home: Vec3) {
        self.target = Vec3::ZERO;
        self.clear_motion();
        camera.position = home;
        camera.target = self.target;
    }

    fn clear_motion(&mut self) {
        self.azimuth_delta = 0.0;
        self.elevation_delta = 0.0;
        self.zoom_scale = 1.0;
    }
}
