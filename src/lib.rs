//! Batch compilation and draw submission for a forward renderer.
//!
//! Scene traversal produces [`Batch`](renderer::Batch) values describing
//! single draws. A [`BatchQueue`](renderer::BatchQueue) accumulates them per
//! pass, merges repeats of the same geometry/material/pass into instance
//! groups, and sorts for either blending correctness or overdraw reduction.
//! Submission walks the sorted queue and pushes render state, shader
//! parameters, and textures through the [`GraphicsDevice`]
//! abstraction, skipping pushes the device reports as already current.

pub mod asset;
pub mod graphics;
pub mod renderer;
pub mod settings;

pub use asset::{AssetCache, Handle, RenderAssets};
pub use graphics::{
    BackendConventions, Direct3dConventions, GraphicsDevice, InstanceTransform, InstancingBuffer,
    OpenGlConventions, ParamId, ParamSource,
};
pub use renderer::{Batch, BatchGroup, BatchQueue, Camera, RendererContext};
pub use settings::RenderSettings;
