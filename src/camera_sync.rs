//! Frames all four cameras around a model of a given characteristic scale

use glam::Vec3;

use crate::scene::{Camera, Frustum};
use crate::viewport::{Viewport, ViewportSet};
use crate::OrthographicConfig;

/// Perspective distance from the origin, in multiples of the model scale
pub const PERSPECTIVE_DISTANCE_FACTOR: f32 = 3.0;

#[derive(Debug, Clone)]
pub struct CameraSynchronizer {
    margin_factor: f32,
    distance_factor: f32,
}

impl CameraSynchronizer {
    pub fn new(config: &OrthographicConfig) -> Self {
        Self {
            margin_factor: config.margin_factor,
            distance_factor: PERSPECTIVE_DISTANCE_FACTOR,
        }
    }

    pub fn margin_factor(&self) -> f32 {
        self.margin_factor
    }

    /// Fit every camera to a model of `scale`. Non-finite or non-positive
    /// scales leave the cameras untouched and return false.
    pub fn fit(&self, viewports: &mut ViewportSet, scale: f32) -> bool {
        if !Self::is_usable(scale) {
            log::debug!("ignoring camera fit for scale {}", scale);
            return false;
        }
        self.fit_perspective(viewports.perspective_mut().camera_mut(), scale);
        self.fit_orthographic_all(viewports, scale);
        true
    }

    /// Refit the three orthographic cameras only, e.g. after a resize
    pub fn fit_orthographic_all(&self, viewports: &mut ViewportSet, scale: f32) -> bool {
        if !Self::is_usable(scale) {
            return false;
        }
        for viewport in viewports.orthographic_mut() {
            self.fit_orthographic(viewport, scale);
        }
        true
    }

    /// Move the camera to `scale * 3` from the origin along its current
    /// direction and point it at the origin
    pub fn fit_perspective(&self, camera: &mut Camera, scale: f32) {
        let direction = camera.position.try_normalize().unwrap_or(Vec3::Z);
        camera.position = direction * scale * self.distance_factor;
        camera.look_at(Vec3::ZERO);
    }

    pub fn fit_orthographic(&self, viewport: &mut Viewport, scale: f32) {
        let margin = scale * self.margin_factor;
        let aspect = viewport.container().aspect();
        viewport.camera_mut().set_frustum(Frustum {
            left: -margin * aspect,
            right: margin * aspect,
            top: margin,
            bottom: -margin,
        });
    }

    fn is_usable(scale: f32) -> bool {
        scale.is_finite() && scale > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ViewportRect;
    use crate::surface::QuadLayout;
    use crate::viewport::{ContainerSize, ViewportId};
    use crate::ViewerConfig;

    fn setup() -> (CameraSynchronizer, ViewportSet) {
        let config = ViewerConfig::default();
        let layout = QuadLayout::new(config.surfaces.clone(), 800, 600);
        (
            CameraSynchronizer::new(&config.orthographic),
            ViewportSet::new(&config, &layout).unwrap(),
        )
    }

    #[test]
    fn perspective_distance_is_three_scales() {
        let (sync, mut viewports) = setup();
        assert!(sync.fit(&mut viewports, 6.0));
        let camera = viewports.perspective().camera();
        assert!((camera.position.length() - 18.0).abs() < 1e-4);
        assert_eq!(camera.target, Vec3::ZERO);
        let home = Vec3::new(10.0, 10.0, 5.0).normalize();
        assert!((camera.position.normalize() - home).length() < 1e-5);
    }

    #[test]
    fn orthographic_extents_follow_margin_and_aspect() {
        let (sync, mut viewports) = setup();
        sync.fit(&mut viewports, 6.0);
        for id in ViewportId::ORTHOGRAPHIC {
            let frustum = viewports.get(id).camera().frustum().unwrap();
            let margin = 6.0 * 0.6;
            assert!((frustum.top - margin).abs() < 1e-5);
            assert!((frustum.bottom + margin).abs() < 1e-5);
            assert!((frustum.right - margin * 400.0 / 300.0).abs() < 1e-5);
            assert!((frustum.left + margin * 400.0 / 300.0).abs() < 1e-5);
        }
    }

    #[test]
    fn zero_height_container_uses_unit_aspect() {
        let (sync, mut viewports) = setup();
        viewports
            .get_mut(ViewportId::Top)
            .set_container(ContainerSize::new(400, 0), ViewportRect::new(400, 0, 400, 0));
        sync.fit(&mut viewports, 2.0);
        let frustum = viewports.get(ViewportId::Top).camera().frustum().unwrap();
        assert!((frustum.right - frustum.top).abs() < 1e-6);
    }

    #[test]
    fn degenerate_scales_are_ignored() {
        let (sync, mut viewports) = setup();
        let before = viewports.perspective().camera().position;
        for scale in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(!sync.fit(&mut viewports, scale));
        }
        assert_eq!(viewports.perspective().camera().position, before);
        assert_eq!(
            viewports.get(ViewportId::Side).camera().frustum().unwrap().top,
            5.0
        );
    }
}
