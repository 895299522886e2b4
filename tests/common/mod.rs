//! Shared test doubles: a call-recording graphics device and an in-memory
//! instancing buffer.

// Each test binary uses its own subset of these helpers.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use glam::{Mat4, Quat, Vec4, Vec3};

use render_batch::asset::{Buffer, Handle, RenderAssets, ShaderVariation, Texture};
use render_batch::graphics::{
    BlendMode, CompareMode, CullMode, ElementMask, GraphicsDevice, InstanceTransform,
    InstancingBuffer, ParamId, ParamSource, PrimitiveType, TextureUnit, VertexStream,
};
use render_batch::renderer::{Camera, Geometry, Material, Pass, PassType};

/// Captures warnings from the submission path in test output.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Everything the device was asked to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    AlphaTest {
        enable: bool,
        mode: CompareMode,
        reference: f32,
    },
    BlendMode(BlendMode),
    CullMode(CullMode),
    DepthTest(CompareMode),
    DepthWrite(bool),
    Shaders {
        vs: Handle<ShaderVariation>,
        ps: Handle<ShaderVariation>,
    },
    Vector {
        param: ParamId,
        value: Vec4,
    },
    Matrix {
        param: ParamId,
        value: Mat4,
    },
    MatrixArray {
        param: ParamId,
        count: usize,
    },
    Floats {
        param: ParamId,
        count: usize,
    },
    Texture {
        unit: TextureUnit,
        texture: Handle<Texture>,
    },
    IndexBuffer(Handle<Buffer>),
    VertexStreams {
        streams: Vec<VertexStream>,
        instance_offset: u32,
    },
    Draw {
        primitive: PrimitiveType,
        index_count: u32,
    },
    DrawInstanced {
        index_count: u32,
        instance_count: u32,
    },
    ClearTransformSources,
}

/// GraphicsDevice stand-in that records every call and implements the
/// parameter oracle the way a real device does: a parameter needs a push
/// when its last push came from a different source.
#[derive(Default)]
pub struct RecordingDevice {
    pub calls: Vec<Call>,
    sampled_units: HashSet<TextureUnit>,
    param_sources: HashMap<ParamId, ParamSource>,
    pub constant_bias: f32,
    pub slope_scaled_bias: f32,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device whose bound shaders sample the given texture units.
    pub fn sampling(units: &[TextureUnit]) -> Self {
        Self {
            sampled_units: units.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn vector_pushes(&self, param: ParamId) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::Vector { param: p, .. } if *p == param))
            .count()
    }

    pub fn matrix_pushes(&self, param: ParamId) -> Vec<Mat4> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Matrix { param: p, value } if *p == param => Some(*value),
                _ => None,
            })
            .collect()
    }

    pub fn draw_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::Draw { .. }))
            .count()
    }

    pub fn instanced_draws(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::DrawInstanced { instance_count, .. } => Some(*instance_count),
                _ => None,
            })
            .collect()
    }

    pub fn textures_set(&self) -> Vec<(TextureUnit, Handle<Texture>)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Texture { unit, texture } => Some((*unit, *texture)),
                _ => None,
            })
            .collect()
    }
}

impl GraphicsDevice for RecordingDevice {
    fn set_alpha_test(&mut self, enable: bool, mode: CompareMode, reference: f32) {
        self.calls.push(Call::AlphaTest {
            enable,
            mode,
            reference,
        });
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.calls.push(Call::BlendMode(mode));
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.calls.push(Call::CullMode(mode));
    }

    fn set_depth_test(&mut self, mode: CompareMode) {
        self.calls.push(Call::DepthTest(mode));
    }

    fn set_depth_write(&mut self, enable: bool) {
        self.calls.push(Call::DepthWrite(enable));
    }

    fn set_shaders(&mut self, vs: Handle<ShaderVariation>, ps: Handle<ShaderVariation>) {
        self.calls.push(Call::Shaders { vs, ps });
    }

    fn needs_parameter_update(&mut self, param: ParamId, source: ParamSource) -> bool {
        if self.param_sources.get(&param) == Some(&source) {
            return false;
        }
        self.param_sources.insert(param, source);
        true
    }

    fn set_parameter_vector(&mut self, param: ParamId, value: Vec4) {
        self.calls.push(Call::Vector { param, value });
    }

    fn set_parameter_matrix(&mut self, param: ParamId, value: &Mat4) {
        self.calls.push(Call::Matrix {
            param,
            value: *value,
        });
    }

    fn set_parameter_matrix_array(&mut self, param: ParamId, values: &[Mat4]) {
        self.calls.push(Call::MatrixArray {
            param,
            count: values.len(),
        });
    }

    fn set_parameter_floats(&mut self, param: ParamId, values: &[f32]) {
        self.calls.push(Call::Floats {
            param,
            count: values.len(),
        });
    }

    fn needs_texture_unit(&self, unit: TextureUnit) -> bool {
        self.sampled_units.contains(&unit)
    }

    fn set_texture(&mut self, unit: TextureUnit, texture: Handle<Texture>) {
        self.calls.push(Call::Texture { unit, texture });
    }

    fn set_index_buffer(&mut self, buffer: Handle<Buffer>) {
        self.calls.push(Call::IndexBuffer(buffer));
    }

    fn set_vertex_streams(&mut self, streams: &[VertexStream], instance_offset: u32) {
        self.calls.push(Call::VertexStreams {
            streams: streams.to_vec(),
            instance_offset,
        });
    }

    fn draw(
        &mut self,
        primitive: PrimitiveType,
        _index_start: u32,
        index_count: u32,
        _vertex_start: u32,
        _vertex_count: u32,
    ) {
        self.calls.push(Call::Draw {
            primitive,
            index_count,
        });
    }

    fn draw_instanced(
        &mut self,
        _primitive: PrimitiveType,
        _index_start: u32,
        index_count: u32,
        _vertex_start: u32,
        _vertex_count: u32,
        instance_count: u32,
    ) {
        self.calls.push(Call::DrawInstanced {
            index_count,
            instance_count,
        });
    }

    fn clear_transform_sources(&mut self) {
        self.param_sources.remove(&ParamId::Model);
        self.calls.push(Call::ClearTransformSources);
    }

    fn depth_constant_bias(&self) -> f32 {
        self.constant_bias
    }

    fn depth_slope_scaled_bias(&self) -> f32 {
        self.slope_scaled_bias
    }
}

/// Instancing buffer backed by a Vec, recording every locked write.
pub struct MockInstancingBuffer {
    pub capacity: u32,
    pub fail_lock: bool,
    pub writes: Vec<Vec<InstanceTransform>>,
}

impl MockInstancingBuffer {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            fail_lock: false,
            writes: Vec::new(),
        }
    }

    pub fn failing(capacity: u32) -> Self {
        Self {
            fail_lock: true,
            ..Self::new(capacity)
        }
    }
}

impl InstancingBuffer for MockInstancingBuffer {
    fn transform_count(&self) -> u32 {
        self.capacity
    }

    fn stream(&self) -> VertexStream {
        VertexStream {
            buffer: Handle::new(usize::MAX),
            element_mask: ElementMask::INSTANCE_MATRIX,
        }
    }

    fn write_discard(
        &mut self,
        count: u32,
        fill: &mut dyn FnMut(&mut [InstanceTransform]),
    ) -> bool {
        if self.fail_lock || count > self.capacity {
            return false;
        }
        let mut region = vec![InstanceTransform::from_matrix(&Mat4::ZERO); count as usize];
        fill(&mut region);
        self.writes.push(region);
        true
    }
}

/// Baseline scene fixture: one triangle-list geometry, a default material,
/// and a base pass carrying a full set of shader variant handles. Each
/// handle is returned so tests can build batches against the caches.
pub struct Fixture {
    pub assets: RenderAssets,
    pub geometry: Handle<Geometry>,
    pub material: Handle<Material>,
    pub pass: Handle<Pass>,
}

pub fn fixture() -> Fixture {
    fixture_with(PassType::Base, 300)
}

pub fn fixture_with(pass_type: PassType, index_count: u32) -> Fixture {
    let mut assets = RenderAssets::new();

    let geometry = assets.geometries.insert(Geometry::new(
        vec![VertexStream {
            buffer: Handle::new(0),
            element_mask: ElementMask::POSITION | ElementMask::NORMAL,
        }],
        Handle::new(1),
        PrimitiveType::TriangleList,
        0,
        index_count,
        0,
        index_count,
    ));
    let material = assets.materials.insert(Material::new());

    // Enough variant slots for every geometry-type/light combination.
    let variants: Vec<Handle<ShaderVariation>> = (0..16).map(Handle::new).collect();
    let pass = assets.passes.insert(
        Pass::new(pass_type).with_shaders(variants.clone(), variants),
    );

    Fixture {
        assets,
        geometry,
        material,
        pass,
    }
}

pub fn perspective_camera() -> Camera {
    Camera::new(
        Vec3::new(0.0, 0.0, 5.0),
        Quat::IDENTITY,
        Mat4::perspective_rh(std::f32::consts::FRAC_PI_3, 16.0 / 9.0, 0.1, 100.0),
        0.1,
        100.0,
    )
}
