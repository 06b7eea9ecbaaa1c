//! Backend abstraction layer
//!
//! Provides the traits the viewer renders through, the wgpu implementation
//! and a GPU-less dummy used by tests and headless hosts.

pub mod dummy;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use dummy::DummyBackend;
pub use traits::*;
pub use types::*;
pub use wgpu_backend::WgpuBackend;
