use std::collections::HashMap;

use glam::Vec4;

use crate::asset::{Handle, ShaderVariation, Texture};
use crate::graphics::{BlendMode, CompareMode, CullMode, ParamId, TextureUnit};

/// A named rendering stage of a material's technique, with its own render
/// state and shader variant lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassType {
    /// Unlit/ambient base.
    Base,
    /// Base pass that also applies the first per-pixel light.
    LitBase,
    /// Additive per-light pass.
    Light,
    /// Transparent/blended pass.
    Alpha,
    /// Shadow map rendering.
    Shadow,
}

impl PassType {
    /// Forward-lit passes index their vertex shader lists by both geometry
    /// type and light variation, so the instancing variant lives at a
    /// different stride than in other passes.
    pub fn is_forward_lit(self) -> bool {
        matches!(self, Self::LitBase | Self::Light)
    }
}

#[derive(Debug, Clone)]
pub struct Pass {
    pass_type: PassType,
    alpha_test: bool,
    blend_mode: BlendMode,
    depth_test: CompareMode,
    depth_write: bool,
    vertex_shaders: Vec<Handle<ShaderVariation>>,
    pixel_shaders: Vec<Handle<ShaderVariation>>,
}

impl Pass {
    pub fn new(pass_type: PassType) -> Self {
        Self {
            pass_type,
            alpha_test: false,
            blend_mode: BlendMode::Replace,
            depth_test: CompareMode::LessEqual,
            depth_write: true,
            vertex_shaders: Vec::new(),
            pixel_shaders: Vec::new(),
        }
    }

    pub fn with_alpha_test(mut self, enable: bool) -> Self {
        self.alpha_test = enable;
        self
    }

    pub fn with_blend_mode(mut self, mode: BlendMode) -> Self {
        self.blend_mode = mode;
        self
    }

    pub fn with_depth_test(mut self, mode: CompareMode) -> Self {
        self.depth_test = mode;
        self
    }

    pub fn with_depth_write(mut self, enable: bool) -> Self {
        self.depth_write = enable;
        self
    }

    pub fn with_shaders(
        mut self,
        vertex: Vec<Handle<ShaderVariation>>,
        pixel: Vec<Handle<ShaderVariation>>,
    ) -> Self {
        self.vertex_shaders = vertex;
        self.pixel_shaders = pixel;
        self
    }

    pub fn pass_type(&self) -> PassType {
        self.pass_type
    }

    pub fn alpha_test(&self) -> bool {
        self.alpha_test
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn depth_test(&self) -> CompareMode {
        self.depth_test
    }

    pub fn depth_write(&self) -> bool {
        self.depth_write
    }

    pub fn vertex_shaders(&self) -> &[Handle<ShaderVariation>] {
        &self.vertex_shaders
    }

    pub fn pixel_shaders(&self) -> &[Handle<ShaderVariation>] {
        &self.pixel_shaders
    }
}

/// Read-only material state consumed during submission: face culling,
/// shader parameter overrides, and the textures bound to material units.
#[derive(Debug, Clone)]
pub struct Material {
    cull_mode: CullMode,
    shadow_cull_mode: CullMode,
    shader_parameters: HashMap<ParamId, Vec4>,
    diffuse_texture: Option<Handle<Texture>>,
    normal_texture: Option<Handle<Texture>>,
    detail_texture: Option<Handle<Texture>>,
    environment_texture: Option<Handle<Texture>>,
}

impl Material {
    pub fn new() -> Self {
        Self {
            cull_mode: CullMode::CounterClockwise,
            shadow_cull_mode: CullMode::CounterClockwise,
            shader_parameters: HashMap::new(),
            diffuse_texture: None,
            normal_texture: None,
            detail_texture: None,
            environment_texture: None,
        }
    }

    pub fn with_cull_mode(mut self, mode: CullMode) -> Self {
        self.cull_mode = mode;
        self
    }

    /// Shadow passes often cull the opposite faces to reduce peter-panning.
    pub fn with_shadow_cull_mode(mut self, mode: CullMode) -> Self {
        self.shadow_cull_mode = mode;
        self
    }

    pub fn with_parameter(mut self, param: ParamId, value: Vec4) -> Self {
        self.shader_parameters.insert(param, value);
        self
    }

    pub fn with_texture(mut self, unit: TextureUnit, texture: Handle<Texture>) -> Self {
        match unit {
            TextureUnit::Diffuse => self.diffuse_texture = Some(texture),
            TextureUnit::Normal => self.normal_texture = Some(texture),
            TextureUnit::Detail => self.detail_texture = Some(texture),
            TextureUnit::Environment => self.environment_texture = Some(texture),
            _ => log::warn!("Unit {unit:?} is not a material texture unit"),
        }
        self
    }

    pub fn cull_mode(&self) -> CullMode {
        self.cull_mode
    }

    pub fn shadow_cull_mode(&self) -> CullMode {
        self.shadow_cull_mode
    }

    pub fn shader_parameters(&self) -> &HashMap<ParamId, Vec4> {
        &self.shader_parameters
    }

    pub fn texture(&self, unit: TextureUnit) -> Option<Handle<Texture>> {
        match unit {
            TextureUnit::Diffuse => self.diffuse_texture,
            TextureUnit::Normal => self.normal_texture,
            TextureUnit::Detail => self.detail_texture,
            TextureUnit::Environment => self.environment_texture,
            _ => None,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new()
    }
}
