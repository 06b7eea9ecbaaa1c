//! Four-viewport model viewer.
//!
//! Shows one glTF model at a time: orbit the perspective view (top-left) with
//! the left mouse button and the wheel, switch models with the arrow keys.
//!
//! ```bash
//! # Every .gltf/.glb in the configured model directory
//! cargo run --example quadview
//!
//! # Explicit files, resolved against --root
//! cargo run --example quadview -- --root assets helmet.glb box.gltf
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Wake, Waker};

use clap::Parser;
use parking_lot::Mutex;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use winit::keyboard::{Key, NamedKey};

use quadview::navigation::ModelNavigator;
use quadview::surface::QuadLayout;
use quadview::{GltfSource, Viewer, ViewerConfig, ViewerWindow, WgpuBackend};

#[derive(Parser, Debug)]
#[command(name = "quadview", about = "Four synchronized views of a glTF model")]
struct Args {
    /// Model files, relative to the model directory
    files: Vec<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model directory (overrides `model_path` from the configuration)
    #[arg(short, long)]
    root: Option<PathBuf>,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 960)]
    height: u32,
}

#[derive(Debug, Clone, Copy)]
enum UserEvent {
    /// A pending load made progress
    Wake,
}

/// Wakes the event loop so pending display tasks get polled again
struct ProxyWaker(Mutex<EventLoopProxy<UserEvent>>);

impl Wake for ProxyWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        // the loop may already be gone during shutdown
        let _ = self.0.lock().send_event(UserEvent::Wake);
    }
}

/// Wrap-around cursor over the model list
struct ModelList {
    files: Vec<String>,
    index: usize,
}

impl ModelList {
    fn step(&mut self, forward: bool) {
        let count = self.files.len();
        if count == 0 {
            return;
        }
        self.index = if forward {
            (self.index + 1) % count
        } else {
            (self.index + count - 1) % count
        };
    }
}

impl ModelNavigator for ModelList {
    fn current_model_url(&self) -> Option<String> {
        self.files.get(self.index).cloned()
    }

    fn current_index(&self) -> usize {
        self.index
    }

    fn model_count(&self) -> usize {
        self.files.len()
    }
}

type Task = Pin<Box<dyn Future<Output = ()>>>;
type DemoViewer = Viewer<GltfSource, WgpuBackend>;

fn discover_models(root: &Path, limit: usize) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(root) else {
        log::warn!("cannot list model directory {}", root.display());
        return Vec::new();
    };
    let mut files: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("gltf") || ext.eq_ignore_ascii_case("glb"))
        })
        .filter_map(|path| path.file_name().and_then(|name| name.to_str()).map(String::from))
        .collect();
    files.sort();
    files.truncate(limit);
    files
}

fn show_current(viewer: &Rc<DemoViewer>, models: &ModelList, tasks: &mut Vec<Task>) {
    let viewer = Rc::clone(viewer);
    let index = models.current_index();
    let count = models.model_count();
    let url = models.current_model_url();
    tasks.push(Box::pin(async move {
        viewer.update_model_number(index, count);
        viewer.display(url.as_deref()).await;
    }));
}

fn poll_tasks(tasks: &mut Vec<Task>, waker: &Waker) {
    let mut cx = Context::from_waker(waker);
    tasks.retain_mut(|task| task.as_mut().poll(&mut cx).is_pending());
}

fn update_title(window: &ViewerWindow, viewer: &DemoViewer, models: &ModelList) {
    let title = match (viewer.model_label(), models.current_model_url()) {
        (Some(label), Some(name)) => format!("quadview - {} {}", label.text, name),
        _ => "quadview".to_string(),
    };
    window.window().set_title(&title);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };
    let root = args
        .root
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.model_path));

    let mut files = if args.files.is_empty() {
        discover_models(&root, config.max_models)
    } else {
        args.files.clone()
    };
    if files.len() > config.max_models {
        log::warn!("only the first {} models are offered", config.max_models);
        files.truncate(config.max_models);
    }
    log::info!("{} models under {}", files.len(), root.display());

    let event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build()?;
    let mut window = ViewerWindow::new(&event_loop, "quadview", args.width, args.height)?;
    let backend = WgpuBackend::new(window.window_arc())?;

    let (width, height) = window.dimensions();
    let mut layout = QuadLayout::new(config.surfaces.clone(), width, height);
    let viewer = Rc::new(Viewer::new(
        Some(config),
        GltfSource::new(root),
        backend,
        window.frame_requester(),
    ));
    if !viewer.initialize(&layout) {
        return Err("viewer initialization failed".into());
    }

    let waker = Waker::from(Arc::new(ProxyWaker(Mutex::new(event_loop.create_proxy()))));
    let mut models = ModelList { files, index: 0 };
    let mut tasks: Vec<Task> = Vec::new();

    show_current(&viewer, &models, &mut tasks);
    poll_tasks(&mut tasks, &waker);

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Wait);

        match event {
            Event::UserEvent(UserEvent::Wake) => {
                poll_tasks(&mut tasks, &waker);
                update_title(&window, &viewer, &models);
            }
            Event::WindowEvent { event, .. } => {
                window.handle_event(&event, &layout);

                match &event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::Resized(size) => {
                        layout.resize(size.width, size.height);
                        viewer.relayout(&layout, size.width, size.height);
                        window.clear_resize_flag();
                    }
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                logical_key: Key::Named(key),
                                state: ElementState::Pressed,
                                ..
                            },
                        ..
                    } => {
                        let forward = match key {
                            NamedKey::ArrowRight | NamedKey::ArrowDown => Some(true),
                            NamedKey::ArrowLeft | NamedKey::ArrowUp => Some(false),
                            NamedKey::Escape => {
                                elwt.exit();
                                None
                            }
                            _ => None,
                        };
                        if let Some(forward) = forward {
                            models.step(forward);
                            show_current(&viewer, &models, &mut tasks);
                            poll_tasks(&mut tasks, &waker);
                            update_title(&window, &viewer, &models);
                        }
                    }
                    WindowEvent::RedrawRequested => {
                        viewer.on_animation_frame();
                    }
                    _ => {}
                }

                if let Some(input) = window.take_input() {
                    viewer.orbit(&input);
                }
            }
            _ => {}
        }
    })?;

    Ok(())
}
