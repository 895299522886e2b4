use glam::{Mat4, Vec2, Vec3, Vec4};

/// Backend-specific texture-coordinate and depth-range conventions.
///
/// Shadow and projected-light lookups map clip space into texture space, and
/// the remap differs between the OpenGL convention (depth in [-1, 1], origin
/// at the bottom-left) and the Direct3D convention (depth in [0, 1], origin
/// at the top-left, half-texel center offset). Exactly these two variants
/// exist; one is selected when the renderer starts and held for the lifetime
/// of the device.
pub trait BackendConventions {
    fn name(&self) -> &'static str;

    /// Clip-to-texture remap composed onto spot light projections.
    fn spot_tex_adjust(&self) -> Mat4;

    /// Clip-to-texture remap for one shadow split, mapping into its atlas
    /// sub-rectangle. `offset` and `scale` are the viewport's normalized
    /// origin and half-extent within the map; `width`/`height` are the map
    /// dimensions in texels. `high_quality` nudges the lookup diagonally by
    /// half a texel for 4-sample filtering.
    fn shadow_tex_adjust(
        &self,
        offset: Vec2,
        scale: Vec2,
        width: f32,
        height: f32,
        high_quality: bool,
    ) -> Mat4;

    /// Per-face (mul.x, mul.y, add.x, add.y) constants for cube shadow map
    /// lookups in a 2x3 face atlas, inset from face borders to keep bilinear
    /// filtering inside the face.
    fn cube_face_adjust(&self, width: f32, height: f32, high_quality: bool) -> Vec4;
}

fn translate_scale(translation: Vec3, scale: Vec3) -> Mat4 {
    Mat4::from_translation(translation) * Mat4::from_scale(scale)
}

pub struct OpenGlConventions;

impl BackendConventions for OpenGlConventions {
    fn name(&self) -> &'static str {
        "open_gl"
    }

    fn spot_tex_adjust(&self) -> Mat4 {
        translate_scale(Vec3::new(0.5, 0.5, 0.5), Vec3::new(0.5, -0.5, 0.5))
    }

    fn shadow_tex_adjust(
        &self,
        offset: Vec2,
        scale: Vec2,
        width: f32,
        height: f32,
        high_quality: bool,
    ) -> Mat4 {
        let mut offset = offset + scale;
        offset.y = 1.0 - offset.y;
        if high_quality {
            offset.x -= 0.5 / width;
            offset.y -= 0.5 / height;
        }
        translate_scale(
            Vec3::new(offset.x, offset.y, 0.5),
            Vec3::new(scale.x, scale.y, 0.5),
        )
    }

    fn cube_face_adjust(&self, width: f32, height: f32, high_quality: bool) -> Vec4 {
        let face_width = (width / 2.0).floor();
        let face_height = (height / 3.0).floor();
        let mul_x = (face_width - 3.0) / width;
        let mul_y = (face_height - 3.0) / height;
        let mut add_x = 1.5 / width;
        let mut add_y = 1.5 / height;
        if high_quality {
            add_x -= 0.5 / width;
            add_y -= 0.5 / height;
        }
        Vec4::new(mul_x, mul_y, add_x, add_y)
    }
}

pub struct Direct3dConventions;

impl BackendConventions for Direct3dConventions {
    fn name(&self) -> &'static str {
        "direct3d"
    }

    fn spot_tex_adjust(&self) -> Mat4 {
        translate_scale(Vec3::new(0.5, 0.5, 0.0), Vec3::new(0.5, -0.5, 1.0))
    }

    fn shadow_tex_adjust(
        &self,
        offset: Vec2,
        scale: Vec2,
        width: f32,
        height: f32,
        high_quality: bool,
    ) -> Mat4 {
        let mut offset = offset + scale + Vec2::new(0.5 / width, 0.5 / height);
        if high_quality {
            offset.x -= 0.5 / width;
            offset.y -= 0.5 / height;
        }
        let scale = Vec2::new(scale.x, -scale.y);
        translate_scale(
            Vec3::new(offset.x, offset.y, 0.0),
            Vec3::new(scale.x, scale.y, 1.0),
        )
    }

    fn cube_face_adjust(&self, width: f32, height: f32, high_quality: bool) -> Vec4 {
        let face_width = (width / 2.0).floor();
        let face_height = (height / 3.0).floor();
        let mul_x = (face_width - 4.0) / width;
        let mul_y = (face_height - 4.0) / height;
        let mut add_x = 2.5 / width;
        let mut add_y = 2.5 / height;
        if high_quality {
            add_x -= 0.5 / width;
            add_y -= 0.5 / height;
        }
        Vec4::new(mul_x, mul_y, add_x, add_y)
    }
}
