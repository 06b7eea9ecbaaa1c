//! Shared fixtures for the viewer integration tests.
//!
//! Everything here runs without a GPU or a window: the viewer draws into a
//! [`DummyBackend`], surfaces come from a [`QuadLayout`] or a plain map, and
//! mesh sources build cuboid models in memory.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::{Arc, Once};
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use glam::Vec3;
use log::{Level, LevelFilter, Log, Metadata, Record};

use quadview::assets::{AssetError, MeshSource};
use quadview::resources::{Geometry, Material};
use quadview::scene::{Node, Transform};
use quadview::surface::{QuadLayout, SurfaceInfo, SurfaceProvider};
use quadview::{DummyBackend, Viewer, ViewerConfig, ViewportId};

pub const WIDTH: u32 = 800;
pub const HEIGHT: u32 = 600;

// ============================================================================
// Models
// ============================================================================

/// Cuboid model whose box is offset from the origin, so centering is
/// observable
pub fn cuboid_model(name: &str, size: Vec3, offset: Vec3) -> Node {
    Node::group(name).with_child(
        Node::mesh(
            "body",
            Arc::new(Geometry::cuboid(size.x, size.y, size.z)),
            Material::standard(name, Vec3::new(0.6, 0.4, 0.3)).into_shared(),
        )
        .with_transform(Transform::from_position(offset)),
    )
}

/// What a scripted identifier resolves to
#[derive(Debug, Clone, Copy)]
pub enum Script {
    Cuboid { size: Vec3, offset: Vec3 },
    Fail,
}

/// Resolves identifiers from a fixed table. Every load builds fresh
/// resources, as a real loader does.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: HashMap<String, Script>,
    calls: Cell<usize>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, identifier: &str, script: Script) -> Self {
        self.scripts.insert(identifier.to_string(), script);
        self
    }

    pub fn cuboid(self, identifier: &str, size: Vec3) -> Self {
        self.with(
            identifier,
            Script::Cuboid {
                size,
                offset: Vec3::new(3.0, 1.0, -2.0),
            },
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl MeshSource for ScriptedSource {
    async fn load(&self, identifier: &str) -> Result<Node, AssetError> {
        self.calls.set(self.calls.get() + 1);
        match self.scripts.get(identifier) {
            Some(Script::Cuboid { size, offset }) => Ok(cuboid_model(identifier, *size, *offset)),
            Some(Script::Fail) => Err(AssetError::NoScene),
            None => Err(AssetError::NotFound(identifier.to_string())),
        }
    }
}

/// Identifiers released by the test; loads stay pending until then
#[derive(Default)]
pub struct Gate {
    released: RefCell<HashSet<String>>,
}

impl Gate {
    pub fn release(&self, identifier: &str) {
        self.released.borrow_mut().insert(identifier.to_string());
    }

    fn is_released(&self, identifier: &str) -> bool {
        self.released.borrow().contains(identifier)
    }
}

/// Mesh source whose loads complete in an order the test chooses. The
/// identifier doubles as the cuboid's size: `"4x2x6"`.
pub struct GatedSource {
    pub gate: Rc<Gate>,
}

impl GatedSource {
    pub fn new() -> (Self, Rc<Gate>) {
        let gate = Rc::new(Gate::default());
        (Self { gate: gate.clone() }, gate)
    }
}

impl MeshSource for GatedSource {
    async fn load(&self, identifier: &str) -> Result<Node, AssetError> {
        std::future::poll_fn(|_| {
            if self.gate.is_released(identifier) {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await;

        let dims: Vec<f32> = identifier
            .split('x')
            .filter_map(|part| part.parse().ok())
            .collect();
        match dims.as_slice() {
            [w, h, d] => Ok(cuboid_model(identifier, Vec3::new(*w, *h, *d), Vec3::X)),
            _ => Err(AssetError::NotFound(identifier.to_string())),
        }
    }
}

// ============================================================================
// Viewer construction
// ============================================================================

pub fn layout() -> QuadLayout {
    QuadLayout::new(ViewerConfig::default().surfaces, WIDTH, HEIGHT)
}

/// Surfaces of `layout()` minus the ones named in `missing`
pub fn surfaces_without(missing: &[ViewportId]) -> HashMap<String, SurfaceInfo> {
    let names = ViewerConfig::default().surfaces;
    let layout = layout();
    ViewportId::ALL
        .into_iter()
        .filter(|id| !missing.contains(id))
        .filter_map(|id| layout.surface(id.surface_name(&names)))
        .map(|info| (info.name.clone(), info))
        .collect()
}

/// Viewer over a dummy backend, plus a counter of frame requests
pub fn viewer<S: MeshSource>(source: S) -> (Viewer<S, DummyBackend>, Rc<Cell<u32>>) {
    let requests = Rc::new(Cell::new(0));
    let counter = requests.clone();
    let viewer = Viewer::new(
        Some(ViewerConfig::default()),
        source,
        DummyBackend::new(),
        Box::new(move || counter.set(counter.get() + 1)),
    );
    (viewer, requests)
}

/// Initialized viewer over the default quad layout
pub fn ready_viewer<S: MeshSource>(source: S) -> (Viewer<S, DummyBackend>, Rc<Cell<u32>>) {
    let (viewer, requests) = viewer(source);
    assert!(viewer.initialize(&layout()));
    (viewer, requests)
}

// ============================================================================
// Manual polling
// ============================================================================

pub fn noop_waker() -> Waker {
    fn noop(_: *const ()) {}
    fn clone(p: *const ()) -> RawWaker {
        RawWaker::new(p, &VTABLE)
    }
    static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
    unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) }
}

/// Poll once; true when the future completed
pub fn poll_once<F: Future + ?Sized>(future: Pin<&mut F>) -> bool {
    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);
    future.poll(&mut cx).is_ready()
}

// ============================================================================
// Log capture
// ============================================================================

thread_local! {
    static CAPTURED: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
}

/// Records log output per test thread
struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !record.target().starts_with("quadview") {
            return;
        }
        CAPTURED.with(|logs| {
            logs.borrow_mut()
                .push((record.level(), record.args().to_string()))
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

/// Install the capturing logger and clear this thread's records
pub fn capture_logs() {
    INIT.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
    CAPTURED.with(|logs| logs.borrow_mut().clear());
}

/// Messages this thread logged at `level` since `capture_logs`
pub fn logged(level: Level) -> Vec<String> {
    CAPTURED.with(|logs| {
        logs.borrow()
            .iter()
            .filter(|(record_level, _)| *record_level == level)
            .map(|(_, message)| message.clone())
            .collect()
    })
}
