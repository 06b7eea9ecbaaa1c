//! Host surfaces the viewports render into

use std::collections::HashMap;

use crate::backend::ViewportRect;
use crate::viewport::{ContainerSize, ViewportId};
use crate::SurfaceNames;

/// A named drawing surface: where on the window it sits and how large its
/// container is
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceInfo {
    pub name: String,
    pub rect: ViewportRect,
    pub container: ContainerSize,
}

/// Host lookup of drawing surfaces by name
pub trait SurfaceProvider {
    fn surface(&self, name: &str) -> Option<SurfaceInfo>;
}

impl SurfaceProvider for HashMap<String, SurfaceInfo> {
    fn surface(&self, name: &str) -> Option<SurfaceInfo> {
        self.get(name).cloned()
    }
}

/// Splits one window into four quadrants:
///
/// ```text
/// +-------------+-----+
/// | perspective | top |
/// +-------------+-----+
/// |    front    | side|
/// +-------------+-----+
/// ```
#[derive(Debug, Clone)]
pub struct QuadLayout {
    names: SurfaceNames,
    width: u32,
    height: u32,
}

impl QuadLayout {
    pub fn new(names: SurfaceNames, width: u32, height: u32) -> Self {
        Self {
            names,
            width,
            height,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Pixel rectangle of a viewport's quadrant
    pub fn rect_of(&self, id: ViewportId) -> ViewportRect {
        let left = self.width / 2;
        let right = self.width - left;
        let upper = self.height / 2;
        let lower = self.height - upper;
        match id {
            ViewportId::Perspective => ViewportRect::new(0, 0, left, upper),
            ViewportId::Top => ViewportRect::new(left, 0, right, upper),
            ViewportId::Front => ViewportRect::new(0, upper, left, lower),
            ViewportId::Side => ViewportRect::new(left, upper, right, lower),
        }
    }

    /// Viewport whose quadrant contains the window position
    pub fn viewport_at(&self, x: f64, y: f64) -> ViewportId {
        let right = x >= (self.width / 2) as f64;
        let lower = y >= (self.height / 2) as f64;
        match (right, lower) {
            (false, false) => ViewportId::Perspective,
            (true, false) => ViewportId::Top,
            (false, true) => ViewportId::Front,
            (true, true) => ViewportId::Side,
        }
    }

    fn id_of(&self, name: &str) -> Option<ViewportId> {
        ViewportId::ALL
            .into_iter()
            .find(|id| id.surface_name(&self.names) == name)
    }
}

impl SurfaceProvider for QuadLayout {
    fn surface(&self, name: &str) -> Option<SurfaceInfo> {
        let id = self.id_of(name)?;
        let rect = self.rect_of(id);
        Some(SurfaceInfo {
            name: name.to_string(),
            rect,
            container: ContainerSize::new(rect.width, rect.height),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadrants_cover_the_window() {
        let layout = QuadLayout::new(SurfaceNames::default(), 801, 601);
        let area: u32 = ViewportId::ALL
            .into_iter()
            .map(|id| {
                let rect = layout.rect_of(id);
                rect.width * rect.height
            })
            .sum();
        assert_eq!(area, 801 * 601);
    }

    #[test]
    fn surfaces_resolve_by_configured_name() {
        let layout = QuadLayout::new(SurfaceNames::default(), 800, 600);
        let side = layout.surface("canvas-side").unwrap();
        assert_eq!(side.rect, ViewportRect::new(400, 300, 400, 300));
        assert_eq!(side.container, ContainerSize::new(400, 300));
        assert!(layout.surface("canvas-missing").is_none());
    }

    #[test]
    fn hit_testing_picks_quadrants() {
        let layout = QuadLayout::new(SurfaceNames::default(), 800, 600);
        assert_eq!(layout.viewport_at(10.0, 10.0), ViewportId::Perspective);
        assert_eq!(layout.viewport_at(790.0, 590.0), ViewportId::Side);
    }
}
