//! Resource management
//!
//! Geometry, materials and textures referenced by scene nodes, plus the
//! lifecycle manager that releases their GPU objects when content is replaced.
//! Every resource carries a process-unique id used by backends as a cache key.

mod lifecycle;
mod material;
mod mesh;
mod texture;

pub use lifecycle::*;
pub use material::*;
pub use mesh::*;
pub use texture::*;

use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! resource_id {
    ($name:ident, $counter:ident) => {
        static $counter: AtomicU64 = AtomicU64::new(1);

        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u64);

        impl $name {
            pub(crate) fn next() -> Self {
                Self($counter.fetch_add(1, Ordering::Relaxed))
            }

            pub fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

resource_id!(GeometryId, NEXT_GEOMETRY_ID);
resource_id!(MaterialId, NEXT_MATERIAL_ID);
resource_id!(TextureId, NEXT_TEXTURE_ID);
