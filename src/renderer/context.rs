use crate::asset::{Handle, Texture};
use crate::graphics::BackendConventions;
use crate::settings::{RenderSettings, ShadowQuality};

/// Frame-wide renderer services the submission path consults: instancing
/// thresholds, shadow filtering quality, fallback light textures, and the
/// backend conventions chosen at startup.
pub struct RendererContext<'f> {
    min_instance_group_size: u32,
    max_instance_triangles: u32,
    shadow_quality: ShadowQuality,
    default_light_ramp: Option<Handle<Texture>>,
    default_light_spot: Option<Handle<Texture>>,
    backend: &'f dyn BackendConventions,
}

impl<'f> RendererContext<'f> {
    pub fn new(settings: &RenderSettings, backend: &'f dyn BackendConventions) -> Self {
        Self {
            min_instance_group_size: settings.min_instance_group_size,
            max_instance_triangles: settings.max_instance_triangles,
            shadow_quality: settings.shadow_quality_flags(),
            default_light_ramp: None,
            default_light_spot: None,
            backend,
        }
    }

    /// Renderer-wide fallback textures used when a light specifies none.
    pub fn with_default_light_textures(
        mut self,
        ramp: Handle<Texture>,
        spot: Handle<Texture>,
    ) -> Self {
        self.default_light_ramp = Some(ramp);
        self.default_light_spot = Some(spot);
        self
    }

    pub fn min_instance_group_size(&self) -> u32 {
        self.min_instance_group_size
    }

    pub fn max_instance_triangles(&self) -> u32 {
        self.max_instance_triangles
    }

    /// Largest index count a geometry may have and still be auto-instanced.
    pub fn max_instance_indices(&self) -> u32 {
        self.max_instance_triangles * 3
    }

    pub fn shadow_quality(&self) -> ShadowQuality {
        self.shadow_quality
    }

    pub fn default_light_ramp(&self) -> Option<Handle<Texture>> {
        self.default_light_ramp
    }

    pub fn default_light_spot(&self) -> Option<Handle<Texture>> {
        self.default_light_spot
    }

    pub fn backend(&self) -> &dyn BackendConventions {
        self.backend
    }
}
