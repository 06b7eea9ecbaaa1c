//! Dirty-flag render scheduling
//!
//! Mutations mark the scheduler dirty; the host delivers animation frames and
//! each frame redraws all four viewports once, only if something changed.
//! Any number of mutations between two frames coalesce into one request.

use crate::backend::{RenderBackend, RenderResult};
use crate::viewport::ViewportSet;

/// Host facility delivering animation frames (e.g. a window redraw request)
pub trait FrameRequester {
    fn request_frame(&self);
}

impl<F: Fn()> FrameRequester for F {
    fn request_frame(&self) {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Clean,
    Dirty,
}

pub struct RenderScheduler {
    state: RenderState,
    frame_pending: bool,
    frames: Box<dyn FrameRequester>,
    redraws: u64,
}

impl RenderScheduler {
    pub fn new(frames: Box<dyn FrameRequester>) -> Self {
        Self {
            state: RenderState::Clean,
            frame_pending: false,
            frames,
            redraws: 0,
        }
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.state == RenderState::Dirty
    }

    /// Whether a frame was requested and not delivered yet
    pub fn frame_pending(&self) -> bool {
        self.frame_pending
    }

    /// Number of frames that actually redrew
    pub fn redraw_count(&self) -> u64 {
        self.redraws
    }

    /// Something visible changed; make sure a frame is coming
    pub fn mark_dirty(&mut self) {
        self.state = RenderState::Dirty;
        if !self.frame_pending {
            self.frame_pending = true;
            self.frames.request_frame();
            log::trace!("animation frame requested");
        }
    }

    /// Handle a delivered animation frame. Returns true if the viewports were
    /// redrawn.
    ///
    /// Without viewports (viewer not initialized) the frame is consumed and
    /// the state stays dirty until the next mutation asks again. A failed draw
    /// also leaves the state dirty.
    pub fn on_animation_frame<B: RenderBackend + ?Sized>(
        &mut self,
        viewports: Option<&ViewportSet>,
        backend: &mut B,
    ) -> RenderResult<bool> {
        self.frame_pending = false;
        if self.state == RenderState::Clean {
            return Ok(false);
        }
        let Some(viewports) = viewports else {
            log::trace!("animation frame before initialization, nothing to draw");
            return Ok(false);
        };

        backend.begin_frame()?;
        for viewport in viewports.iter() {
            backend.draw(viewport.target(), viewport.scene(), viewport.camera())?;
        }
        backend.end_frame()?;

        self.state = RenderState::Clean;
        self.redraws += 1;
        Ok(true)
    }
}

impl std::fmt::Debug for RenderScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderScheduler")
            .field("state", &self.state)
            .field("frame_pending", &self.frame_pending)
            .field("redraws", &self.redraws)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::surface::QuadLayout;
    use crate::ViewerConfig;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting_scheduler() -> (RenderScheduler, Rc<Cell<u32>>) {
        let requests = Rc::new(Cell::new(0));
        let counter = requests.clone();
        let scheduler = RenderScheduler::new(Box::new(move || counter.set(counter.get() + 1)));
        (scheduler, requests)
    }

    fn viewports() -> ViewportSet {
        let config = ViewerConfig::default();
        let layout = QuadLayout::new(config.surfaces.clone(), 800, 600);
        ViewportSet::new(&config, &layout).unwrap()
    }

    #[test]
    fn mutations_coalesce_into_one_request() {
        let (mut scheduler, requests) = counting_scheduler();
        for _ in 0..5 {
            scheduler.mark_dirty();
        }
        assert_eq!(requests.get(), 1);
        assert!(scheduler.frame_pending());
    }

    #[test]
    fn frame_redraws_all_viewports_in_order() {
        let (mut scheduler, requests) = counting_scheduler();
        let viewports = viewports();
        let mut backend = DummyBackend::new();

        scheduler.mark_dirty();
        assert!(scheduler
            .on_animation_frame(Some(&viewports), &mut backend)
            .unwrap());
        assert_eq!(scheduler.state(), RenderState::Clean);

        let surfaces: Vec<_> = backend
            .last_frame()
            .iter()
            .map(|draw| draw.surface.as_str())
            .collect();
        assert_eq!(
            surfaces,
            ["canvas-3d", "canvas-top", "canvas-front", "canvas-side"]
        );

        // Clean frames draw nothing
        assert!(!scheduler
            .on_animation_frame(Some(&viewports), &mut backend)
            .unwrap());
        assert_eq!(backend.frame_count(), 1);

        scheduler.mark_dirty();
        assert_eq!(requests.get(), 2);
    }

    #[test]
    fn uninitialized_frame_stays_dirty_and_reschedules_on_next_mutation() {
        let (mut scheduler, requests) = counting_scheduler();
        let mut backend = DummyBackend::new();

        scheduler.mark_dirty();
        assert!(!scheduler.on_animation_frame(None, &mut backend).unwrap());
        assert!(scheduler.is_dirty());
        assert!(!scheduler.frame_pending());

        scheduler.mark_dirty();
        assert_eq!(requests.get(), 2);
    }
}
