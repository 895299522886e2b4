pub mod backend;
pub mod instancing;

pub use backend::{BackendConventions, Direct3dConventions, OpenGlConventions};
pub use instancing::{InstanceTransform, InstancingBuffer};

use bitflags::bitflags;
use glam::{Mat4, Vec4};

use crate::asset::{Buffer, Handle, ShaderVariation, Texture};

/// Blend modes a pass can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Replace,
    Add,
    Multiply,
    Alpha,
    AddAlpha,
    PremultipliedAlpha,
    InverseDestinationAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Clockwise,
    CounterClockwise,
}

/// Comparison function for alpha and depth tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareMode {
    Always,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    TriangleList,
    LineList,
    TriangleStrip,
    TriangleFan,
}

/// Texture sampler units the shader variants may bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureUnit {
    Diffuse,
    Normal,
    Detail,
    Environment,
    ShadowMap,
    LightRamp,
    LightShape,
}

/// Shader constant identifiers. Built-ins cover the camera, transform, light
/// and shadow parameters the submission path pushes; materials may define
/// their own under application-assigned [`Custom`](ParamId::Custom) ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    CameraPos,
    CameraRot,
    ViewProj,
    ViewRight,
    ViewUp,
    Model,
    SkinMatrices,
    LightAtten,
    LightDir,
    LightPos,
    LightVecRot,
    SpotProj,
    ShadowProj,
    LightColor,
    SampleOffsets,
    ShadowCubeAdjust,
    ShadowCubeProj,
    ShadowFade,
    ShadowIntensity,
    ShadowSplits,
    Custom(u32),
}

/// Identity of the logical owner of a shader constant's value.
///
/// The graphics layer keys its change tracking on `(ParamId, ParamSource)`:
/// a constant is re-pushed only when the same parameter last came from a
/// different owner. Owners are identified by address, which is stable for
/// the frame since all batch collaborators outlive submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamSource(usize);

impl ParamSource {
    pub fn of<T: ?Sized>(value: &T) -> Self {
        Self(value as *const T as *const () as usize)
    }

    /// Distinguishes derived values sharing one owner (e.g. the camera's
    /// projection vs. its full view-projection).
    pub fn offset(self, n: usize) -> Self {
        Self(self.0.wrapping_add(n))
    }
}

bitflags! {
    /// Per-stream vertex element mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ElementMask: u32 {
        const POSITION       = 1 << 0;
        const NORMAL         = 1 << 1;
        const COLOR          = 1 << 2;
        const TEXCOORD1      = 1 << 3;
        const TEXCOORD2      = 1 << 4;
        const CUBETEXCOORD1  = 1 << 5;
        const CUBETEXCOORD2  = 1 << 6;
        const TANGENT        = 1 << 7;
        const BLENDWEIGHTS   = 1 << 8;
        const BLENDINDICES   = 1 << 9;
        const INSTANCEMATRIX1 = 1 << 10;
        const INSTANCEMATRIX2 = 1 << 11;
        const INSTANCEMATRIX3 = 1 << 12;
    }
}

impl ElementMask {
    pub const INSTANCE_MATRIX: Self = Self::INSTANCEMATRIX1
        .union(Self::INSTANCEMATRIX2)
        .union(Self::INSTANCEMATRIX3);
}

/// One bindable vertex stream: a buffer plus the elements it provides.
///
/// Draw submission composes transient stream lists (the geometry's own
/// streams, optionally followed by the instancing stream) and hands the
/// whole list to [`GraphicsDevice::set_vertex_streams`]; geometry state is
/// never mutated to splice the instancing stream in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexStream {
    pub buffer: Handle<Buffer>,
    pub element_mask: ElementMask,
}

/// The GPU abstraction this crate submits to.
///
/// Implemented by the real device outside this crate and by recording mocks
/// in tests. All setters are expected to be cheap when the requested state
/// already matches; the parameter oracle additionally lets the submission
/// path skip building constants whose source has not changed.
pub trait GraphicsDevice {
    fn set_alpha_test(&mut self, enable: bool, mode: CompareMode, reference: f32);
    fn set_blend_mode(&mut self, mode: BlendMode);
    fn set_cull_mode(&mut self, mode: CullMode);
    fn set_depth_test(&mut self, mode: CompareMode);
    fn set_depth_write(&mut self, enable: bool);

    fn set_shaders(&mut self, vs: Handle<ShaderVariation>, ps: Handle<ShaderVariation>);

    /// Change-tracking oracle: true when `param` must be re-pushed because
    /// its last push came from a different `source`.
    fn needs_parameter_update(&mut self, param: ParamId, source: ParamSource) -> bool;

    fn set_parameter_vector(&mut self, param: ParamId, value: Vec4);
    fn set_parameter_matrix(&mut self, param: ParamId, value: &Mat4);
    fn set_parameter_matrix_array(&mut self, param: ParamId, values: &[Mat4]);
    fn set_parameter_floats(&mut self, param: ParamId, values: &[f32]);

    /// True when the currently bound shader pair samples `unit`.
    fn needs_texture_unit(&self, unit: TextureUnit) -> bool;
    fn set_texture(&mut self, unit: TextureUnit, texture: Handle<Texture>);

    fn set_index_buffer(&mut self, buffer: Handle<Buffer>);
    /// Binds a composed stream list. `instance_offset` is the start vertex
    /// within any per-instance stream in the list.
    fn set_vertex_streams(&mut self, streams: &[VertexStream], instance_offset: u32);

    fn draw(
        &mut self,
        primitive: PrimitiveType,
        index_start: u32,
        index_count: u32,
        vertex_start: u32,
        vertex_count: u32,
    );

    #[allow(clippy::too_many_arguments)]
    fn draw_instanced(
        &mut self,
        primitive: PrimitiveType,
        index_start: u32,
        index_count: u32,
        vertex_start: u32,
        vertex_count: u32,
        instance_count: u32,
    );

    /// Forgets the tracked model-transform source, forcing the next model
    /// push through. Called after per-instance fallback loops.
    fn clear_transform_sources(&mut self);

    fn depth_constant_bias(&self) -> f32;
    fn depth_slope_scaled_bias(&self) -> f32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_source_identity_follows_address() {
        let a = 1.0f32;
        let b = 2.0f32;
        assert_eq!(ParamSource::of(&a), ParamSource::of(&a));
        assert_ne!(ParamSource::of(&a), ParamSource::of(&b));
        assert_ne!(ParamSource::of(&a), ParamSource::of(&a).offset(1));
    }

    #[test]
    fn instance_matrix_mask_covers_three_rows() {
        assert!(ElementMask::INSTANCE_MATRIX.contains(ElementMask::INSTANCEMATRIX1));
        assert!(ElementMask::INSTANCE_MATRIX.contains(ElementMask::INSTANCEMATRIX2));
        assert!(ElementMask::INSTANCE_MATRIX.contains(ElementMask::INSTANCEMATRIX3));
        assert!(!ElementMask::INSTANCE_MATRIX.contains(ElementMask::POSITION));
    }
}
