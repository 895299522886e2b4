use std::collections::HashMap;

use glam::{Mat4, Vec2, Vec4};

use crate::asset::{Handle, RenderAssets, ShaderVariation};
use crate::graphics::{
    BackendConventions, CompareMode, GraphicsDevice, ParamId, ParamSource, TextureUnit,
};
use crate::renderer::lights::{Light, LightQueue, LightType, ShadowMap, ShadowSplit};
use crate::renderer::material::PassType;
use crate::renderer::{Camera, Geometry, Material, Pass, RendererContext, MAX_CASCADE_SPLITS};
use crate::settings::ShadowQuality;

/// Smallest range/divisor the lighting math clamps to.
pub const EPSILON: f32 = 1e-6;

/// Padding for unused cascade split distances.
pub const LARGE_VALUE: f32 = 1e8;

/// Alpha-test reference value used when a pass enables alpha testing.
pub const ALPHA_TEST_REF: f32 = 0.5;

/// Stride of the light-variation dimension in a forward-lit pass's vertex
/// shader list; the instancing variant block starts at
/// `GeometryType::Instanced as usize * MAX_LIGHT_VS_VARIATIONS`.
pub const MAX_LIGHT_VS_VARIATIONS: usize = 4;

/// How a drawable sources its vertex data. Only `Static` geometry is
/// eligible for automatic instancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryType {
    Static = 0,
    Skinned = 1,
    Instanced = 2,
    Billboard = 3,
}

/// One renderable surface's complete recipe for one draw call.
///
/// All references are to externally owned frame data and must stay valid
/// through submission. Batches are value types: copied into queues, never
/// shared.
#[derive(Clone)]
pub struct Batch<'f> {
    pub geometry: Handle<Geometry>,
    pub material: Handle<Material>,
    pub pass: Handle<Pass>,
    pub vertex_shader: Option<Handle<ShaderVariation>>,
    pub pixel_shader: Option<Handle<ShaderVariation>>,
    /// Index of the current variant within the pass's shader lists.
    pub vertex_shader_index: usize,
    pub geometry_type: GeometryType,
    pub world_transform: &'f Mat4,
    pub camera: &'f Camera,
    pub light_queue: Option<&'f LightQueue<'f>>,
    /// Per-instance shader constants (e.g. skinning matrices). Presence
    /// disqualifies auto-instancing.
    pub shader_data: Option<&'f [f32]>,
    /// The draw supplies its own projection instead of the camera's
    /// view-projection. Disqualifies auto-instancing.
    pub override_view: bool,
    /// Renders in fixed relative order ahead of normal batches.
    pub has_priority: bool,
    pub distance: f32,
    pub sort_key: u64,
}

impl<'f> Batch<'f> {
    pub fn new(
        geometry: Handle<Geometry>,
        material: Handle<Material>,
        pass: Handle<Pass>,
        camera: &'f Camera,
        world_transform: &'f Mat4,
    ) -> Self {
        Self {
            geometry,
            material,
            pass,
            vertex_shader: None,
            pixel_shader: None,
            vertex_shader_index: 0,
            geometry_type: GeometryType::Static,
            world_transform,
            camera,
            light_queue: None,
            shader_data: None,
            override_view: false,
            has_priority: false,
            distance: 0.0,
            sort_key: 0,
        }
    }

    /// True when this batch may be merged into an instance group.
    pub fn is_instancing_eligible(&self) -> bool {
        self.geometry_type == GeometryType::Static
            && !self.override_view
            && self.shader_data.is_none()
    }

    /// Packs the light-queue/pass/material/geometry slot indices into a
    /// 64-bit key so that sorting clusters state-compatible draws. The
    /// priority flag occupies the top bit so priority batches order ahead
    /// of everything else under the front-to-back comparator.
    pub fn calculate_sort_key(&mut self) {
        let light_queue = (self.light_queue.map(|q| q.slot).unwrap_or(0) as u64 & 0x7fff)
            | if self.has_priority { 0x8000 } else { 0 };
        let pass = self.pass.index() as u64 & 0xffff;
        let material = self.material.index() as u64 & 0xffff;
        let geometry = self.geometry.index() as u64 & 0xffff;
        self.sort_key = (light_queue << 48) | (pass << 32) | (material << 16) | geometry;
    }

    /// Pushes every piece of GPU state this draw needs: render states,
    /// shaders, frame/camera/model constants, light and shadow constants,
    /// and textures. Constants are pushed only when the device's change
    /// tracking reports their source stale; a batch with no valid shader
    /// pair silently no-ops.
    pub fn prepare(
        &self,
        graphics: &mut dyn GraphicsDevice,
        renderer: &RendererContext,
        assets: &RenderAssets,
        global_params: &HashMap<ParamId, Vec4>,
        set_model_transform: bool,
    ) {
        let (Some(vs), Some(ps)) = (self.vertex_shader, self.pixel_shader) else {
            return;
        };

        // Pass / material-specific render states
        if let (Some(pass), Some(material)) =
            (assets.passes.get(self.pass), assets.materials.get(self.material))
        {
            if pass.alpha_test() {
                graphics.set_alpha_test(true, CompareMode::GreaterEqual, ALPHA_TEST_REF);
            } else {
                graphics.set_alpha_test(false, CompareMode::Always, 0.0);
            }
            graphics.set_blend_mode(pass.blend_mode());
            let cull = if pass.pass_type() == PassType::Shadow {
                material.shadow_cull_mode()
            } else {
                material.cull_mode()
            };
            graphics.set_cull_mode(cull);
            graphics.set_depth_test(pass.depth_test());
            graphics.set_depth_write(pass.depth_write());
        }

        graphics.set_shaders(vs, ps);

        // Global frame-scope parameters
        let globals_source = ParamSource::of(global_params);
        for (&param, &value) in global_params {
            if graphics.needs_parameter_update(param, globals_source) {
                graphics.set_parameter_vector(param, value);
            }
        }

        // Camera parameters
        let camera = self.camera;
        let camera_source = ParamSource::of(camera);
        if graphics.needs_parameter_update(ParamId::CameraPos, camera_source) {
            graphics
                .set_parameter_vector(ParamId::CameraPos, camera.world_position().extend(1.0));
        }
        if graphics.needs_parameter_update(ParamId::CameraRot, camera_source) {
            let rotation = Mat4::from_mat3(camera.rotation_matrix());
            graphics.set_parameter_matrix(ParamId::CameraRot, &rotation);
        }
        if self.override_view {
            // The projection-only push tracks a distinct source so it is
            // not confused with the full view-projection of the same camera
            if graphics.needs_parameter_update(ParamId::ViewProj, camera_source.offset(1)) {
                graphics.set_parameter_matrix(ParamId::ViewProj, &camera.projection());
            }
        } else if graphics.needs_parameter_update(ParamId::ViewProj, camera_source) {
            graphics.set_parameter_matrix(ParamId::ViewProj, &camera.view_projection());
        }
        if graphics.needs_parameter_update(ParamId::ViewRight, camera_source) {
            graphics.set_parameter_vector(ParamId::ViewRight, camera.right().extend(0.0));
        }
        if graphics.needs_parameter_update(ParamId::ViewUp, camera_source) {
            graphics.set_parameter_vector(ParamId::ViewUp, camera.up().extend(0.0));
        }

        // Model transform (instanced draws take it from the instance stream)
        if set_model_transform
            && graphics
                .needs_parameter_update(ParamId::Model, ParamSource::of(self.world_transform))
        {
            graphics.set_parameter_matrix(ParamId::Model, self.world_transform);
        }

        // Skinning / per-instance constants
        if let Some(shader_data) = self.shader_data {
            if graphics.needs_parameter_update(ParamId::SkinMatrices, ParamSource::of(shader_data))
            {
                graphics.set_parameter_floats(ParamId::SkinMatrices, shader_data);
            }
        }

        // Light parameters
        if let Some(queue) = self.light_queue {
            self.prepare_light(graphics, renderer, queue);
        }

        // Material parameters and textures
        if let Some(material) = assets.materials.get(self.material) {
            let material_source = ParamSource::of(material);
            for (&param, &value) in material.shader_parameters() {
                if graphics.needs_parameter_update(param, material_source) {
                    graphics.set_parameter_vector(param, value);
                }
            }
            for unit in [
                TextureUnit::Diffuse,
                TextureUnit::Normal,
                TextureUnit::Detail,
                TextureUnit::Environment,
            ] {
                if graphics.needs_texture_unit(unit) {
                    if let Some(texture) = material.texture(unit) {
                        graphics.set_texture(unit, texture);
                    }
                }
            }
        }

        // Light textures, falling back to renderer-wide defaults
        if let Some(queue) = self.light_queue {
            let light = queue.light;
            if let Some(shadow_map) = queue.shadow_map {
                if graphics.needs_texture_unit(TextureUnit::ShadowMap) {
                    graphics.set_texture(TextureUnit::ShadowMap, shadow_map.texture);
                }
            }
            if graphics.needs_texture_unit(TextureUnit::LightRamp) {
                if let Some(ramp) = light.ramp_texture().or(renderer.default_light_ramp()) {
                    graphics.set_texture(TextureUnit::LightRamp, ramp);
                }
            }
            if graphics.needs_texture_unit(TextureUnit::LightShape) {
                let shape = light.shape_texture().or_else(|| {
                    if light.light_type() == LightType::Spot {
                        renderer.default_light_spot()
                    } else {
                        None
                    }
                });
                if let Some(shape) = shape {
                    graphics.set_texture(TextureUnit::LightShape, shape);
                }
            }
        }
    }

    fn prepare_light(
        &self,
        graphics: &mut dyn GraphicsDevice,
        renderer: &RendererContext,
        queue: &LightQueue,
    ) {
        let light = queue.light;
        let camera = self.camera;
        let light_source = ParamSource::of(light);

        if graphics.needs_parameter_update(ParamId::LightAtten, light_source) {
            let atten = Vec4::new(1.0 / light.range().max(EPSILON), 0.0, 0.0, 0.0);
            graphics.set_parameter_vector(ParamId::LightAtten, atten);
        }

        if graphics.needs_parameter_update(ParamId::LightDir, light_source) {
            graphics.set_parameter_vector(ParamId::LightDir, light.direction().extend(0.0));
        }

        if graphics.needs_parameter_update(ParamId::LightPos, light_source) {
            let relative = light.world_position() - camera.world_position();
            graphics.set_parameter_vector(ParamId::LightPos, relative.extend(0.0));
        }

        if graphics.needs_parameter_update(ParamId::LightVecRot, light_source) {
            let rotation = Mat4::from_quat(light.world_rotation());
            graphics.set_parameter_matrix(ParamId::LightVecRot, &rotation);
        }

        if graphics.needs_parameter_update(ParamId::SpotProj, light_source) {
            let matrix = spot_projection_matrix(light, renderer.backend());
            graphics.set_parameter_matrix(ParamId::SpotProj, &matrix);
        }

        if graphics.needs_parameter_update(ParamId::LightColor, light_source) {
            let mut fade = 1.0;
            let fade_end = light.draw_distance();
            let fade_start = light.fade_distance();

            // Fade the light out near its draw distance when both are set
            if light.light_type() != LightType::Directional
                && fade_end > 0.0
                && fade_start > 0.0
                && fade_start < fade_end
            {
                fade = (1.0 - (light.distance() - fade_start) / (fade_end - fade_start)).min(1.0);
            }

            let color = light.color();
            let value =
                Vec4::new(color.x, color.y, color.z, light.specular_intensity()) * fade;
            graphics.set_parameter_vector(ParamId::LightColor, value);
        }

        if let Some(shadow_map) = queue.shadow_map {
            self.prepare_shadow(graphics, renderer, queue, shadow_map, light_source);
        }
    }

    fn prepare_shadow(
        &self,
        graphics: &mut dyn GraphicsDevice,
        renderer: &RendererContext,
        queue: &LightQueue,
        shadow_map: &ShadowMap,
        light_source: ParamSource,
    ) {
        let light = queue.light;
        let camera = self.camera;
        let high_quality = renderer.shadow_quality().contains(ShadowQuality::HIGH_SAMPLES);
        let width = shadow_map.width as f32;
        let height = shadow_map.height as f32;

        if graphics.needs_parameter_update(ParamId::ShadowProj, light_source) {
            let num_splits = if light.light_type() == LightType::Directional {
                queue.shadow_splits.len().min(MAX_CASCADE_SPLITS)
            } else {
                1
            };

            let mut matrices = [Mat4::IDENTITY; MAX_CASCADE_SPLITS];
            for (matrix, split) in matrices.iter_mut().zip(&queue.shadow_splits).take(num_splits)
            {
                *matrix =
                    shadow_split_matrix(split, shadow_map, high_quality, renderer.backend());
            }
            graphics.set_parameter_matrix_array(ParamId::ShadowProj, &matrices[..num_splits]);
        }

        if graphics
            .needs_parameter_update(ParamId::SampleOffsets, ParamSource::of(shadow_map))
        {
            graphics.set_parameter_vector(
                ParamId::SampleOffsets,
                Vec4::new(1.0 / width, 1.0 / height, 0.0, 0.0),
            );
        }

        if graphics.needs_parameter_update(ParamId::ShadowCubeAdjust, light_source) {
            let adjust = renderer
                .backend()
                .cube_face_adjust(width, height, high_quality);
            graphics.set_parameter_vector(ParamId::ShadowCubeAdjust, adjust);
        }

        if graphics.needs_parameter_update(ParamId::ShadowCubeProj, light_source) {
            if let Some(first) = queue.shadow_splits.first() {
                // All cube faces are built from one shadow camera's clip
                // planes; the split setup upstream must keep them in sync.
                debug_assert!(queue.shadow_splits.iter().all(|split| {
                    split.shadow_camera.near_clip() == first.shadow_camera.near_clip()
                        && split.shadow_camera.far_clip() == first.shadow_camera.far_clip()
                }));
                let near = first.shadow_camera.near_clip();
                let far = first.shadow_camera.far_clip();
                let q = far / (far - near);
                let r = -q * near;
                graphics
                    .set_parameter_vector(ParamId::ShadowCubeProj, Vec4::new(q, r, 0.0, 0.0));
            }
        }

        if graphics.needs_parameter_update(ParamId::ShadowFade, light_source) {
            let parameters = light.cascade();
            let far_clip = camera.far_clip();
            let shadow_range = parameters.shadow_range();
            let fade_start = parameters.fade_start * shadow_range / far_clip;
            let fade_end = shadow_range / far_clip;
            let fade_range = fade_end - fade_start;
            graphics.set_parameter_vector(
                ParamId::ShadowFade,
                Vec4::new(fade_start, 1.0 / fade_range, 0.0, 0.0),
            );
        }

        if graphics.needs_parameter_update(ParamId::ShadowIntensity, light_source) {
            let mut intensity = light.shadow_intensity();
            let fade_start = light.shadow_fade_distance();
            let fade_end = light.shadow_distance();
            if fade_start > 0.0 && fade_end > 0.0 && fade_end > fade_start {
                let t = ((light.distance() - fade_start) / (fade_end - fade_start)).clamp(0.0, 1.0);
                intensity = intensity + (1.0 - intensity) * t;
            }
            let pcf_values = 1.0 - intensity;
            // Fallback-mode depth biasing folds the constant and slope-scaled
            // bias into one fudged constant
            let constant_bias = graphics.depth_constant_bias();
            let slope_scaled_bias = graphics.depth_slope_scaled_bias();
            graphics.set_parameter_vector(
                ParamId::ShadowIntensity,
                Vec4::new(
                    pcf_values,
                    pcf_values * 0.25,
                    intensity,
                    constant_bias + slope_scaled_bias * constant_bias,
                ),
            );
        }

        if graphics.needs_parameter_update(ParamId::ShadowSplits, light_source) {
            let mut splits = Vec4::splat(LARGE_VALUE);
            let far_clip = camera.far_clip();
            if queue.shadow_splits.len() > 1 {
                splits.x = queue.shadow_splits[0].far_split / far_clip;
            }
            if queue.shadow_splits.len() > 2 {
                splits.y = queue.shadow_splits[1].far_split / far_clip;
            }
            if queue.shadow_splits.len() > 3 {
                splits.z = queue.shadow_splits[2].far_split / far_clip;
            }
            graphics.set_parameter_vector(ParamId::ShadowSplits, splits);
        }
    }

    /// Prepares all state, binds the geometry, and issues the indexed draw.
    pub fn draw(
        &self,
        graphics: &mut dyn GraphicsDevice,
        renderer: &RendererContext,
        assets: &RenderAssets,
        global_params: &HashMap<ParamId, Vec4>,
    ) {
        if self.vertex_shader.is_none() || self.pixel_shader.is_none() {
            return;
        }
        let Some(geometry) = assets.geometries.get(self.geometry) else {
            return;
        };

        self.prepare(graphics, renderer, assets, global_params, true);

        graphics.set_index_buffer(geometry.index_buffer());
        graphics.set_vertex_streams(geometry.streams(), 0);
        graphics.draw(
            geometry.primitive_type(),
            geometry.index_start(),
            geometry.index_count(),
            geometry.vertex_start(),
            geometry.vertex_count(),
        );
    }
}

/// Builds the matrix that maps world space into a spot light's projected
/// texture space. The 1.005 factor shrinks the projected cone slightly so
/// the shadow texel footprint never spills past the light's visible cone.
pub(crate) fn spot_projection_matrix(light: &Light, backend: &dyn BackendConventions) -> Mat4 {
    let h = 1.005 / (light.fov() * 0.5).tan();
    let w = h / light.aspect_ratio();
    let range = light.range().max(EPSILON);

    let spot_proj = Mat4::from_cols(
        Vec4::new(w, 0.0, 0.0, 0.0),
        Vec4::new(0.0, h, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0 / range, 1.0),
        Vec4::ZERO,
    );

    backend.spot_tex_adjust() * spot_proj * light.world_transform().inverse()
}

/// Builds the matrix that maps world space into one shadow split's atlas
/// sub-rectangle, the per-pixel shadow lookup transform.
pub(crate) fn shadow_split_matrix(
    split: &ShadowSplit,
    shadow_map: &ShadowMap,
    high_quality: bool,
    backend: &dyn BackendConventions,
) -> Mat4 {
    let width = shadow_map.width as f32;
    let height = shadow_map.height as f32;
    let viewport = split.viewport;

    let offset = Vec2::new(
        viewport.left as f32 / width,
        viewport.top as f32 / height,
    );
    let scale = Vec2::new(
        0.5 * (viewport.right - viewport.left) as f32 / width,
        0.5 * (viewport.bottom - viewport.top) as f32 / height,
    );

    let adjust = backend.shadow_tex_adjust(offset, scale, width, height, high_quality);
    adjust * split.shadow_camera.projection() * split.shadow_camera.inverse_world_transform()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::OpenGlConventions;
    use crate::renderer::lights::IntRect;
    use glam::{Quat, Vec3};

    const EPS: f32 = 1e-5;

    #[test]
    fn sort_key_packs_slots_in_state_priority_order() {
        let camera = Camera::new(Vec3::ZERO, Quat::IDENTITY, Mat4::IDENTITY, 0.1, 100.0);
        let transform = Mat4::IDENTITY;
        let mut batch = Batch::new(
            Handle::new(3),
            Handle::new(2),
            Handle::new(1),
            &camera,
            &transform,
        );
        batch.calculate_sort_key();
        assert_eq!(batch.sort_key, (1 << 32) | (2 << 16) | 3);

        // The same identities with priority set must sort strictly higher.
        let plain_key = batch.sort_key;
        batch.has_priority = true;
        batch.calculate_sort_key();
        assert_eq!(batch.sort_key, (0x8000 << 48) | plain_key);
        assert!(batch.sort_key > plain_key);
    }

    #[test]
    fn sort_key_truncates_slots_to_field_width() {
        let camera = Camera::new(Vec3::ZERO, Quat::IDENTITY, Mat4::IDENTITY, 0.1, 100.0);
        let transform = Mat4::IDENTITY;
        let mut batch = Batch::new(
            Handle::new(0x1_0002),
            Handle::new(0x1_0001),
            Handle::new(0),
            &camera,
            &transform,
        );
        batch.calculate_sort_key();
        assert_eq!(batch.sort_key, (1 << 16) | 2);
    }

    #[test]
    fn instancing_eligibility_invariant() {
        let camera = Camera::new(Vec3::ZERO, Quat::IDENTITY, Mat4::IDENTITY, 0.1, 100.0);
        let transform = Mat4::IDENTITY;
        let data = [0.0f32; 12];

        let mut batch = Batch::new(
            Handle::new(0),
            Handle::new(0),
            Handle::new(0),
            &camera,
            &transform,
        );
        assert!(batch.is_instancing_eligible());

        batch.geometry_type = GeometryType::Skinned;
        assert!(!batch.is_instancing_eligible());

        batch.geometry_type = GeometryType::Static;
        batch.override_view = true;
        assert!(!batch.is_instancing_eligible());

        batch.override_view = false;
        batch.shader_data = Some(&data);
        assert!(!batch.is_instancing_eligible());
    }

    #[test]
    fn spot_projection_embeds_light_bleed_guard() {
        let fov = std::f32::consts::FRAC_PI_2;
        let light = Light::new(LightType::Spot)
            .with_cone(fov, 1.0)
            .with_range(20.0);
        let matrix = spot_projection_matrix(&light, &OpenGlConventions);

        // Undo the texture-space remap to inspect the raw projection.
        let proj = OpenGlConventions.spot_tex_adjust().inverse() * matrix
            * light.world_transform();
        let expected_h = 1.005 / (fov * 0.5).tan();
        assert!((proj.y_axis.y - expected_h).abs() < EPS);
        assert!((proj.x_axis.x - expected_h).abs() < EPS);
        assert!((proj.z_axis.z - 1.0 / 20.0).abs() < EPS);
        // w' = z: perspective divide by distance along the light axis.
        assert!((proj.z_axis.w - 1.0).abs() < EPS);
    }

    #[test]
    fn spot_projection_clamps_degenerate_range() {
        let light = Light::new(LightType::Spot).with_range(0.0);
        let matrix = spot_projection_matrix(&light, &OpenGlConventions);
        assert!(matrix.is_finite());
    }

    #[test]
    fn shadow_split_matrix_targets_atlas_viewport() {
        // Shadow camera at origin looking down -Z with a unit-cube ortho
        // projection; the split owns the top-left 512x512 of a 1024 map.
        let shadow_camera = Camera::new(
            Vec3::ZERO,
            Quat::IDENTITY,
            Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, 0.0, 10.0),
            0.0,
            10.0,
        );
        let shadow_map = ShadowMap {
            texture: Handle::new(0),
            width: 1024,
            height: 1024,
        };
        let split = ShadowSplit {
            shadow_camera: &shadow_camera,
            viewport: IntRect::new(0, 0, 512, 512),
            far_split: 10.0,
        };

        let matrix = shadow_split_matrix(&split, &shadow_map, false, &OpenGlConventions);
        let center = matrix * Vec3::new(0.0, 0.0, -5.0).extend(1.0);

        // The view center lands in the middle of the 512x512 sub-rectangle.
        assert!((center.x - 0.25).abs() < EPS);
        assert!((center.y - 0.75).abs() < EPS);
    }
}
