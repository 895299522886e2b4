use glam::{Mat4, Quat, Vec3};

use crate::asset::{Handle, Texture};
use crate::renderer::Camera;

/// Maximum directional-light cascade splits sharing one shadow atlas.
pub const MAX_CASCADE_SPLITS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightType {
    Directional,
    Spot,
    Point,
}

/// Cascade split distances and the in-shadow fade start, as fractions used
/// against the view camera's far clip.
#[derive(Debug, Clone, Copy)]
pub struct CascadeParameters {
    pub splits: [f32; MAX_CASCADE_SPLITS],
    pub fade_start: f32,
}

impl CascadeParameters {
    /// Distance the furthest cascade reaches.
    pub fn shadow_range(&self) -> f32 {
        self.splits.iter().copied().fold(0.0, f32::max)
    }
}

impl Default for CascadeParameters {
    fn default() -> Self {
        Self {
            splits: [10.0, 50.0, 150.0, 0.0],
            fade_start: 0.8,
        }
    }
}

/// Read-only light state consumed during submission.
#[derive(Debug, Clone)]
pub struct Light {
    light_type: LightType,
    world_position: Vec3,
    world_rotation: Quat,
    /// Spot cone angle, radians.
    fov: f32,
    aspect_ratio: f32,
    range: f32,
    color: Vec3,
    specular_intensity: f32,
    /// Distance from the view camera, updated by the culling pass.
    distance: f32,
    fade_distance: f32,
    draw_distance: f32,
    shadow_intensity: f32,
    shadow_fade_distance: f32,
    shadow_distance: f32,
    cascade: CascadeParameters,
    ramp_texture: Option<Handle<Texture>>,
    shape_texture: Option<Handle<Texture>>,
}

impl Light {
    pub fn new(light_type: LightType) -> Self {
        Self {
            light_type,
            world_position: Vec3::ZERO,
            world_rotation: Quat::IDENTITY,
            fov: std::f32::consts::FRAC_PI_2,
            aspect_ratio: 1.0,
            range: 10.0,
            color: Vec3::ONE,
            specular_intensity: 1.0,
            distance: 0.0,
            fade_distance: 0.0,
            draw_distance: 0.0,
            shadow_intensity: 0.0,
            shadow_fade_distance: 0.0,
            shadow_distance: 0.0,
            cascade: CascadeParameters::default(),
            ramp_texture: None,
            shape_texture: None,
        }
    }

    pub fn with_transform(mut self, position: Vec3, rotation: Quat) -> Self {
        self.world_position = position;
        self.world_rotation = rotation;
        self
    }

    pub fn with_cone(mut self, fov: f32, aspect_ratio: f32) -> Self {
        self.fov = fov;
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_range(mut self, range: f32) -> Self {
        self.range = range;
        self
    }

    pub fn with_color(mut self, color: Vec3, specular_intensity: f32) -> Self {
        self.color = color;
        self.specular_intensity = specular_intensity;
        self
    }

    pub fn with_distance(mut self, distance: f32) -> Self {
        self.distance = distance;
        self
    }

    pub fn with_fade(mut self, fade_distance: f32, draw_distance: f32) -> Self {
        self.fade_distance = fade_distance;
        self.draw_distance = draw_distance;
        self
    }

    pub fn with_shadow(
        mut self,
        intensity: f32,
        fade_distance: f32,
        shadow_distance: f32,
    ) -> Self {
        self.shadow_intensity = intensity;
        self.shadow_fade_distance = fade_distance;
        self.shadow_distance = shadow_distance;
        self
    }

    pub fn with_cascade(mut self, cascade: CascadeParameters) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn with_ramp_texture(mut self, texture: Handle<Texture>) -> Self {
        self.ramp_texture = Some(texture);
        self
    }

    pub fn with_shape_texture(mut self, texture: Handle<Texture>) -> Self {
        self.shape_texture = Some(texture);
        self
    }

    pub fn light_type(&self) -> LightType {
        self.light_type
    }

    pub fn world_position(&self) -> Vec3 {
        self.world_position
    }

    pub fn world_rotation(&self) -> Quat {
        self.world_rotation
    }

    pub fn world_transform(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.world_rotation, self.world_position)
    }

    /// Direction the light shines, world space.
    pub fn direction(&self) -> Vec3 {
        self.world_rotation * Vec3::NEG_Z
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    pub fn range(&self) -> f32 {
        self.range
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    pub fn specular_intensity(&self) -> f32 {
        self.specular_intensity
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn fade_distance(&self) -> f32 {
        self.fade_distance
    }

    pub fn draw_distance(&self) -> f32 {
        self.draw_distance
    }

    pub fn shadow_intensity(&self) -> f32 {
        self.shadow_intensity
    }

    pub fn shadow_fade_distance(&self) -> f32 {
        self.shadow_fade_distance
    }

    pub fn shadow_distance(&self) -> f32 {
        self.shadow_distance
    }

    pub fn cascade(&self) -> &CascadeParameters {
        &self.cascade
    }

    pub fn ramp_texture(&self) -> Option<Handle<Texture>> {
        self.ramp_texture
    }

    pub fn shape_texture(&self) -> Option<Handle<Texture>> {
        self.shape_texture
    }
}

/// A shadow map texture plus its dimensions, needed for texel-space offsets.
#[derive(Debug, Clone, Copy)]
pub struct ShadowMap {
    pub texture: Handle<Texture>,
    pub width: u32,
    pub height: u32,
}

/// Sub-rectangle of a shadow map, texel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl IntRect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

/// One shadow rendering of a light: a cascade split for directional lights,
/// the single view for spot lights, one cube face for point lights. The
/// shadow camera and viewport are computed upstream and consumed here as-is.
pub struct ShadowSplit<'f> {
    pub shadow_camera: &'f Camera,
    pub viewport: IntRect,
    pub far_split: f32,
}

/// Per-light drawing context for one frame: the light itself plus its shadow
/// map and splits, if it casts shadows. The `slot` is the queue's index in
/// the frame's light-queue list and is packed into batch sort keys.
pub struct LightQueue<'f> {
    pub slot: u16,
    pub light: &'f Light,
    pub shadow_map: Option<&'f ShadowMap>,
    pub shadow_splits: Vec<ShadowSplit<'f>>,
}

impl<'f> LightQueue<'f> {
    pub fn new(slot: u16, light: &'f Light) -> Self {
        Self {
            slot,
            light,
            shadow_map: None,
            shadow_splits: Vec::new(),
        }
    }

    pub fn with_shadow(
        mut self,
        shadow_map: &'f ShadowMap,
        shadow_splits: Vec<ShadowSplit<'f>>,
    ) -> Self {
        self.shadow_map = Some(shadow_map);
        self.shadow_splits = shadow_splits;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadow_range_takes_furthest_split() {
        let cascade = CascadeParameters {
            splits: [10.0, 50.0, 25.0, 0.0],
            fade_start: 0.8,
        };
        assert_eq!(cascade.shadow_range(), 50.0);
    }

    #[test]
    fn light_direction_follows_rotation() {
        let light = Light::new(LightType::Spot)
            .with_transform(Vec3::ZERO, Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2));
        // Rotated 90 degrees down: forward -Z maps to -Y.
        assert!(light.direction().abs_diff_eq(-Vec3::Y, 1e-6));
    }
}
