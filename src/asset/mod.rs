pub mod cache;
pub mod handle;

pub use cache::AssetCache;
pub use handle::Handle;

use crate::renderer::{Geometry, Material, Pass};

/// Opaque GPU texture owned by the graphics layer. Only handles to it pass
/// through this crate.
pub struct Texture;

/// Opaque GPU vertex/index buffer owned by the graphics layer.
pub struct Buffer;

/// Opaque compiled shader variant owned by the graphics layer.
pub struct ShaderVariation;

/// The pooled render resources a frame's batches refer to by handle.
pub struct RenderAssets {
    pub geometries: AssetCache<Geometry>,
    pub materials: AssetCache<Material>,
    pub passes: AssetCache<Pass>,
}

impl RenderAssets {
    pub fn new() -> Self {
        Self {
            geometries: AssetCache::new(),
            materials: AssetCache::new(),
            passes: AssetCache::new(),
        }
    }
}

impl Default for RenderAssets {
    fn default() -> Self {
        Self::new()
    }
}
