//! Integration tests driving the viewer end to end without a GPU.
//!
//! ```bash
//! cargo test --test viewer
//! ```

mod common;

use std::sync::Arc;

use glam::{Vec2, Vec3};
use log::Level;
use rstest::rstest;

use common::{
    capture_logs, layout, logged, poll_once, ready_viewer, surfaces_without, viewer, GatedSource,
    Script, ScriptedSource,
};
use quadview::assets::MODEL_NODE_NAME;
use quadview::bounds::BoundsFitter;
use quadview::navigation::ModelNavigator;
use quadview::resources::Geometry;
use quadview::scene::CameraInput;
use quadview::scheduler::RenderState;
use quadview::surface::QuadLayout;
use quadview::{DummyBackend, GltfSource, Viewer, ViewerConfig, ViewportId};

const EPSILON: f32 = 1e-4;

fn model_geometries<S>(viewer: &Viewer<S, DummyBackend>, id: ViewportId) -> Vec<Arc<Geometry>>
where
    S: quadview::MeshSource,
{
    let viewports = viewer.viewports().expect("initialized");
    let mut geometries = Vec::new();
    if let Some(node) = viewports.get(id).scene().find_named(MODEL_NODE_NAME) {
        node.visit_meshes(glam::Mat4::IDENTITY, &mut |mesh, _| {
            geometries.push(mesh.geometry.clone())
        });
    }
    geometries
}

fn perspective_distance<S: quadview::MeshSource>(viewer: &Viewer<S, DummyBackend>) -> f32 {
    let viewports = viewer.viewports().expect("initialized");
    viewports.perspective().camera().position.length()
}

// ============================================================================
// Content replacement
// ============================================================================

#[test]
fn every_scene_holds_exactly_one_model() {
    let source = ScriptedSource::new()
        .cuboid("a", Vec3::new(4.0, 2.0, 6.0))
        .cuboid("b", Vec3::new(1.0, 1.0, 1.0))
        .with("broken", Script::Fail);
    let (viewer, _) = ready_viewer(source);

    for identifier in [Some("a"), Some("b"), Some("broken"), None, Some("a")] {
        pollster::block_on(viewer.display(identifier));

        let viewports = viewer.viewports().unwrap();
        for viewport in viewports.iter() {
            assert_eq!(
                viewport.scene().count_named(MODEL_NODE_NAME),
                1,
                "{:?} after {:?}",
                viewport.id(),
                identifier
            );
        }
    }
}

#[test]
fn displayed_model_is_centered_on_origin() {
    let (viewer, _) = ready_viewer(ScriptedSource::new().cuboid("a", Vec3::new(4.0, 2.0, 6.0)));
    pollster::block_on(viewer.display(Some("a")));

    let viewports = viewer.viewports().unwrap();
    let mut fitter = BoundsFitter::new();
    for viewport in viewports.iter() {
        let model = viewport.scene().find_named(MODEL_NODE_NAME).unwrap();
        let volume = fitter.compute_bounds(model);
        assert!(volume.center.length() < EPSILON, "{:?}", viewport.id());
        assert!((volume.size - Vec3::new(4.0, 2.0, 6.0)).length() < EPSILON);
    }
}

#[test]
fn replaced_content_is_disposed_once() {
    let source = ScriptedSource::new()
        .cuboid("a", Vec3::new(4.0, 2.0, 6.0))
        .cuboid("b", Vec3::new(1.0, 1.0, 1.0));
    let (viewer, _) = ready_viewer(source);

    pollster::block_on(viewer.display(Some("a")));
    assert!(viewer.on_animation_frame());
    let first = model_geometries(&viewer, ViewportId::Perspective);
    assert_eq!(first.len(), 1);
    // orthographic clones share the perspective model's geometry
    let top = model_geometries(&viewer, ViewportId::Top);
    assert!(Arc::ptr_eq(&first[0], &top[0]));
    assert!(viewer.backend().is_geometry_live(first[0].id()));

    pollster::block_on(viewer.display(Some("b")));
    assert!(first[0].is_disposed());
    assert!(!viewer.backend().is_geometry_live(first[0].id()));

    // four scenes referenced "a", but each resource is released once
    let totals = viewer.lifecycle().totals();
    assert_eq!(totals.geometries, 1);
    assert_eq!(totals.materials, 1);
    assert_eq!(totals.textures, 0);
    assert_eq!(viewer.backend().released_count(), 2);

    assert!(viewer.on_animation_frame());
    assert_eq!(viewer.backend().live_geometry_count(), 1);
}

#[test]
fn superseded_load_is_discarded() {
    let (source, gate) = GatedSource::new();
    let (viewer, _) = ready_viewer(source);

    let mut slow = Box::pin(viewer.display(Some("2x2x2")));
    assert!(!poll_once(slow.as_mut()));
    let mut fast = Box::pin(viewer.display(Some("4x2x6")));
    assert!(!poll_once(fast.as_mut()));
    assert_eq!(viewer.generation(), 2);

    gate.release("4x2x6");
    assert!(poll_once(fast.as_mut()));
    gate.release("2x2x2");
    assert!(poll_once(slow.as_mut()));

    let volume = viewer.bounds().unwrap();
    assert!((volume.characteristic_scale - 6.0).abs() < EPSILON);

    let viewports = viewer.viewports().unwrap();
    for viewport in viewports.iter() {
        assert_eq!(viewport.scene().count_named(MODEL_NODE_NAME), 1);
        let model = viewport.scene().find_named(MODEL_NODE_NAME).unwrap();
        let size = BoundsFitter::new().compute_bounds(model).size;
        assert!((size - Vec3::new(4.0, 2.0, 6.0)).length() < EPSILON);
    }
    assert_eq!(viewer.lifecycle().totals().geometries, 1);
}

// ============================================================================
// Camera framing
// ============================================================================

#[rstest]
#[case::model(Some("a"), 18.0)]
#[case::fallback(None, 9.0)]
#[case::failed_load(Some("broken"), 9.0)]
fn perspective_camera_backs_off_three_scales(
    #[case] identifier: Option<&str>,
    #[case] distance: f32,
) {
    let source = ScriptedSource::new()
        .cuboid("a", Vec3::new(4.0, 2.0, 6.0))
        .with("broken", Script::Fail);
    let (viewer, _) = ready_viewer(source);
    pollster::block_on(viewer.display(identifier));

    assert!((perspective_distance(&viewer) - distance).abs() < EPSILON);
    let viewports = viewer.viewports().unwrap();
    assert!(viewports.perspective().camera().target.length() < EPSILON);
}

#[rstest]
#[case::top(ViewportId::Top)]
#[case::front(ViewportId::Front)]
#[case::side(ViewportId::Side)]
fn orthographic_frustum_fits_model(#[case] id: ViewportId) {
    let (viewer, _) = ready_viewer(ScriptedSource::new().cuboid("a", Vec3::new(4.0, 2.0, 6.0)));
    pollster::block_on(viewer.display(Some("a")));

    let viewports = viewer.viewports().unwrap();
    let viewport = viewports.get(id);
    let frustum = viewport.camera().frustum().unwrap();
    // scale 6 * margin 0.6, quadrant aspect 400/300
    assert!((frustum.top - 3.6).abs() < EPSILON);
    assert!((frustum.bottom + 3.6).abs() < EPSILON);
    assert!((frustum.right - 4.8).abs() < EPSILON);
    assert!((frustum.left + 4.8).abs() < EPSILON);
}

#[test]
fn view_reset_before_fitting() {
    let (viewer, _) = ready_viewer(ScriptedSource::new().cuboid("a", Vec3::new(4.0, 2.0, 6.0)));
    pollster::block_on(viewer.display(Some("a")));
    let initial = viewer.viewports().unwrap().perspective().camera().position;

    viewer.orbit(&CameraInput::drag(Vec2::new(120.0, 40.0)));
    for _ in 0..20 {
        viewer.on_animation_frame();
    }
    let orbited = viewer.viewports().unwrap().perspective().camera().position;
    assert!((orbited - initial).length() > EPSILON);

    pollster::block_on(viewer.display(Some("a")));
    let reframed = viewer.viewports().unwrap().perspective().camera().position;
    assert!((reframed - initial).length() < EPSILON);
}

#[test]
fn failed_load_shows_fallback_with_one_warning() {
    capture_logs();
    let (viewer, _) = ready_viewer(ScriptedSource::new().with("broken", Script::Fail));
    pollster::block_on(viewer.display(Some("broken")));

    let warnings = logged(Level::Warn);
    assert_eq!(warnings.len(), 1, "{:?}", warnings);
    assert!(warnings[0].contains("broken"));

    let volume = viewer.bounds().unwrap();
    assert!((volume.size - Vec3::new(2.0, 3.0, 1.0)).length() < EPSILON);
}

// ============================================================================
// Render scheduling
// ============================================================================

#[test]
fn mutations_between_frames_coalesce() {
    let (viewer, requests) = ready_viewer(ScriptedSource::new().cuboid("a", Vec3::ONE));
    assert_eq!(requests.get(), 1);

    pollster::block_on(viewer.display(Some("a")));
    viewer.resize(ViewportId::Top, 300, 300);
    viewer.update_model_number(0, 1);
    assert_eq!(requests.get(), 1);

    assert!(viewer.on_animation_frame());
    assert_eq!(viewer.scheduler().state(), RenderState::Clean);
    assert_eq!(viewer.backend().frame_count(), 1);
    assert_eq!(viewer.backend().last_frame().len(), 4);

    assert!(!viewer.on_animation_frame());
    assert_eq!(viewer.backend().frame_count(), 1);
}

#[test]
fn orbit_keeps_redrawing_until_settled() {
    let (viewer, _) = ready_viewer(ScriptedSource::new().cuboid("a", Vec3::new(4.0, 2.0, 6.0)));
    pollster::block_on(viewer.display(Some("a")));
    viewer.on_animation_frame();

    viewer.orbit(&CameraInput::drag(Vec2::new(40.0, 0.0)));
    let mut frames = 0;
    while viewer.scheduler().is_dirty() && frames < 2000 {
        assert!(viewer.on_animation_frame());
        frames += 1;
    }

    assert!(frames > 1, "damping should spread the motion over frames");
    assert!(!viewer.scheduler().is_dirty());
    assert!((perspective_distance(&viewer) - 18.0).abs() < 1e-2);
}

// ============================================================================
// Initialization and layout
// ============================================================================

#[test]
fn missing_surface_leaves_viewer_inert() {
    capture_logs();
    let (viewer, requests) = viewer(ScriptedSource::new().cuboid("a", Vec3::ONE));
    let surfaces = surfaces_without(&[ViewportId::Side]);

    assert!(!viewer.initialize(&surfaces));
    let errors = logged(Level::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("canvas-side"));

    pollster::block_on(viewer.display(Some("a")));
    assert!(!viewer.on_animation_frame());
    assert_eq!(viewer.backend().frame_count(), 0);
    assert_eq!(requests.get(), 0);
    assert_eq!(viewer.source().calls(), 0);
}

#[test]
fn container_resize_refits_orthographic_frustum() {
    let (viewer, _) = ready_viewer(ScriptedSource::new().cuboid("a", Vec3::new(4.0, 2.0, 6.0)));
    pollster::block_on(viewer.display(Some("a")));

    viewer.resize(ViewportId::Top, 300, 300);
    let viewports = viewer.viewports().unwrap();
    let top = viewports.get(ViewportId::Top).camera().frustum().unwrap();
    assert!((top.right - 3.6).abs() < EPSILON);
    let front = viewports.get(ViewportId::Front).camera().frustum().unwrap();
    assert!((front.right - 4.8).abs() < EPSILON);
}

#[test]
fn window_relayout_updates_every_viewport() {
    let (viewer, _) = ready_viewer(ScriptedSource::new().cuboid("a", Vec3::new(4.0, 2.0, 6.0)));
    pollster::block_on(viewer.display(Some("a")));

    let mut resized = layout();
    resized.resize(1000, 400);
    viewer.relayout(&resized, 1000, 400);
    assert_eq!(viewer.backend().size(), (1000, 400));

    let viewports = viewer.viewports().unwrap();
    for id in ViewportId::ORTHOGRAPHIC {
        let viewport = viewports.get(id);
        assert_eq!(viewport.target().rect(), resized.rect_of(id));
        let frustum = viewport.camera().frustum().unwrap();
        // quadrants are 500x200
        assert!((frustum.right - 9.0).abs() < EPSILON);
    }
    let perspective = viewports.perspective();
    assert_eq!(perspective.container().width, 500);
}

// ============================================================================
// Navigation and loading from disk
// ============================================================================

struct Playlist(Vec<&'static str>, usize);

impl ModelNavigator for Playlist {
    fn current_model_url(&self) -> Option<String> {
        self.0.get(self.1).map(|name| name.to_string())
    }

    fn current_index(&self) -> usize {
        self.1
    }

    fn model_count(&self) -> usize {
        self.0.len()
    }
}

#[test]
fn show_current_follows_navigator() {
    let source = ScriptedSource::new()
        .cuboid("a", Vec3::ONE)
        .cuboid("b", Vec3::new(4.0, 2.0, 6.0));
    let (viewer, _) = ready_viewer(source);

    pollster::block_on(viewer.show_current(&Playlist(vec!["a", "b"], 1)));
    let label = viewer.model_label().unwrap();
    assert_eq!((label.value, label.max), (2, 2));
    assert_eq!(label.text, "2/2");
    assert!((viewer.bounds().unwrap().characteristic_scale - 6.0).abs() < EPSILON);

    pollster::block_on(viewer.show_current(&Playlist(Vec::new(), 0)));
    assert!((perspective_distance(&viewer) - 9.0).abs() < EPSILON);
}

#[test]
fn displays_gltf_from_disk() {
    let dir = std::env::temp_dir().join("quadview_viewer_test_gltf");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    let json = r#"{
        "asset": {"version": "2.0"},
        "scene": 0,
        "scenes": [{"nodes": [0]}],
        "nodes": [{"name": "tri", "mesh": 0, "translation": [5.0, 0.0, 0.0]}],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]}],
        "buffers": [{
            "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAQAAAAAAAAAAAAAAAAAAAAEAAAAAAAAABAAIAAAA=",
            "byteLength": 44
        }],
        "bufferViews": [
            {"buffer": 0, "byteOffset": 0, "byteLength": 36},
            {"buffer": 0, "byteOffset": 36, "byteLength": 6}
        ],
        "accessors": [
            {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
             "min": [0.0, 0.0, 0.0], "max": [4.0, 2.0, 0.0]},
            {"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}
        ]
    }"#;
    std::fs::write(dir.join("tri.gltf"), json).unwrap();

    let viewer = Viewer::new(
        Some(ViewerConfig::default()),
        GltfSource::new(&dir),
        DummyBackend::new(),
        Box::new(|| {}),
    );
    assert!(viewer.initialize(&QuadLayout::new(Default::default(), 800, 600)));
    pollster::block_on(viewer.display(Some("tri.gltf")));

    let volume = viewer.bounds().unwrap();
    assert!((volume.characteristic_scale - 4.0).abs() < EPSILON);
    assert!(volume.center.length() < EPSILON);
    assert!((perspective_distance(&viewer) - 12.0).abs() < EPSILON);

    let _ = std::fs::remove_dir_all(&dir);
}
