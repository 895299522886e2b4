use bitflags::bitflags;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::graphics::{
    BackendConventions, Direct3dConventions, InstanceTransform, OpenGlConventions,
};

bitflags! {
    /// Shadow filtering quality flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ShadowQuality: u32 {
        /// 24-bit shadow map depth instead of 16-bit.
        const DEPTH_24BIT = 1 << 0;
        /// 4-sample filtering; shifts lookups diagonally by half a texel.
        const HIGH_SAMPLES = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowQualitySetting {
    Low16Bit,
    Low24Bit,
    High16Bit,
    High24Bit,
}

impl ShadowQualitySetting {
    pub fn to_flags(self) -> ShadowQuality {
        match self {
            ShadowQualitySetting::Low16Bit => ShadowQuality::empty(),
            ShadowQualitySetting::Low24Bit => ShadowQuality::DEPTH_24BIT,
            ShadowQualitySetting::High16Bit => ShadowQuality::HIGH_SAMPLES,
            ShadowQualitySetting::High24Bit => {
                ShadowQuality::DEPTH_24BIT | ShadowQuality::HIGH_SAMPLES
            }
        }
    }
}

impl Default for ShadowQualitySetting {
    fn default() -> Self {
        ShadowQualitySetting::Low16Bit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphicsBackendSetting {
    OpenGl,
    Direct3d,
}

impl GraphicsBackendSetting {
    /// The conventions strategy for this backend, fixed for the process
    /// lifetime once the device is created.
    pub fn conventions(self) -> &'static dyn BackendConventions {
        match self {
            GraphicsBackendSetting::OpenGl => &OpenGlConventions,
            GraphicsBackendSetting::Direct3d => &Direct3dConventions,
        }
    }
}

impl Default for GraphicsBackendSetting {
    fn default() -> Self {
        GraphicsBackendSetting::Direct3d
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Groups smaller than this render as individual draws; driver overhead
    /// makes instancing a net loss for tiny batches.
    #[serde(default = "RenderSettings::default_min_instance_group_size")]
    pub min_instance_group_size: u32,
    /// Geometries above this triangle count are not worth instancing.
    #[serde(default = "RenderSettings::default_max_instance_triangles")]
    pub max_instance_triangles: u32,
    #[serde(default)]
    pub shadow_quality: ShadowQualitySetting,
    #[serde(default)]
    pub graphics_backend: GraphicsBackendSetting,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            min_instance_group_size: Self::default_min_instance_group_size(),
            max_instance_triangles: Self::default_max_instance_triangles(),
            shadow_quality: ShadowQualitySetting::default(),
            graphics_backend: GraphicsBackendSetting::default(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path("render_settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RenderSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded render settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default render settings.",
                        path, err
                    );
                    RenderSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                RenderSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }
        }
    }

    pub fn validate(mut self) -> Self {
        if self.min_instance_group_size < 2 {
            warn!("Instance group size minimum must be at least 2. Using default value.");
            self.min_instance_group_size = Self::default_min_instance_group_size();
        }

        if self.max_instance_triangles == 0 {
            warn!("Max instance triangles must be greater than zero. Using default value.");
            self.max_instance_triangles = Self::default_max_instance_triangles();
        }

        self
    }

    pub fn shadow_quality_flags(&self) -> ShadowQuality {
        self.shadow_quality.to_flags()
    }

    /// Byte size an instancing buffer needs to hold `count` transforms, for
    /// sizing the buffer before locking it.
    pub fn instance_buffer_bytes(count: u32) -> u64 {
        count as u64 * std::mem::size_of::<InstanceTransform>() as u64
    }

    const fn default_min_instance_group_size() -> u32 {
        4
    }

    const fn default_max_instance_triangles() -> u32 {
        500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_replaces_invalid_values_with_defaults() {
        let validated = RenderSettings {
            min_instance_group_size: 0,
            max_instance_triangles: 0,
            shadow_quality: ShadowQualitySetting::High24Bit,
            graphics_backend: GraphicsBackendSetting::OpenGl,
        }
        .validate();

        assert_eq!(
            validated.min_instance_group_size,
            RenderSettings::default().min_instance_group_size
        );
        assert_eq!(
            validated.max_instance_triangles,
            RenderSettings::default().max_instance_triangles
        );
        // Non-numeric settings pass through untouched.
        assert_eq!(validated.shadow_quality, ShadowQualitySetting::High24Bit);
        assert_eq!(validated.graphics_backend, GraphicsBackendSetting::OpenGl);
    }

    #[test]
    fn validate_preserves_valid_values() {
        let valid = RenderSettings {
            min_instance_group_size: 8,
            max_instance_triangles: 1000,
            shadow_quality: ShadowQualitySetting::Low24Bit,
            graphics_backend: GraphicsBackendSetting::Direct3d,
        };
        let validated = valid.clone().validate();
        assert_eq!(
            validated.min_instance_group_size,
            valid.min_instance_group_size
        );
        assert_eq!(validated.max_instance_triangles, valid.max_instance_triangles);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: RenderSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.min_instance_group_size, 4);
        assert_eq!(settings.max_instance_triangles, 500);
        assert_eq!(settings.shadow_quality, ShadowQualitySetting::Low16Bit);
    }

    #[test]
    fn quality_settings_map_to_flags() {
        assert!(ShadowQualitySetting::Low16Bit.to_flags().is_empty());
        assert!(ShadowQualitySetting::High16Bit
            .to_flags()
            .contains(ShadowQuality::HIGH_SAMPLES));
        assert!(ShadowQualitySetting::High24Bit
            .to_flags()
            .contains(ShadowQuality::DEPTH_24BIT | ShadowQuality::HIGH_SAMPLES));
    }

    #[test]
    fn buffer_sizing_matches_transform_stride() {
        assert_eq!(RenderSettings::instance_buffer_bytes(0), 0);
        assert_eq!(RenderSettings::instance_buffer_bytes(10), 480);
    }
}
