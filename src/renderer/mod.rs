pub mod batch;
pub mod camera;
pub mod context;
pub mod geometry;
pub mod lights;
pub mod material;
pub mod queue;

pub use batch::{
    Batch, GeometryType, ALPHA_TEST_REF, EPSILON, LARGE_VALUE, MAX_LIGHT_VS_VARIATIONS,
};
pub use camera::Camera;
pub use context::RendererContext;
pub use geometry::Geometry;
pub use lights::{
    CascadeParameters, IntRect, Light, LightQueue, LightType, ShadowMap, ShadowSplit,
    MAX_CASCADE_SPLITS,
};
pub use material::{Material, Pass, PassType};
pub use queue::{BatchGroup, BatchQueue, GroupKey, InstanceData};
