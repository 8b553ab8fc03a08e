use crate::rendering::common::types::{AlbedoType, Emission, PbrMaterial, RenderMaterial, TransparencyType};
use crate::simulation::types::{MaterialSource, StandardMaterialDesc, TransparencyMode};
use glam::Vec4;
use log::{error, warn};

pub struct MaterialImporter {}

impl MaterialImporter {
    /// Never fails: materials we can't map become [`RenderMaterial::placeholder`].
    ///
    /// `emission_intensity_divisor` scales the simulation's emission intensity (nits) into the render engine's
    /// unit-less intensity. There is no exact conversion between the two.
    pub fn convert(material: &MaterialSource, emission_intensity_divisor: f32) -> RenderMaterial {
        match material {
            MaterialSource::Standard(desc) => {
                RenderMaterial::Pbr(Self::convert_standard(desc, emission_intensity_divisor))
            }
            MaterialSource::Unsupported { class_name } => {
                error!("Can't convert material of type {}, using the placeholder", class_name);
                RenderMaterial::placeholder()
            }
        }
    }

    fn convert_standard(desc: &StandardMaterialDesc, emission_intensity_divisor: f32) -> PbrMaterial {
        let color = desc.albedo_color;
        let transparency = match desc.transparency {
            TransparencyMode::Disabled => TransparencyType::Opaque,
            TransparencyMode::Alpha => TransparencyType::Blend { opacity: color.w },
            TransparencyMode::AlphaScissor { threshold } => TransparencyType::Cutout { cutout: threshold },
        };

        let albedo = match desc.albedo_texture {
            Some(texture) => AlbedoType::Texture { texture, tint: color },
            // the opacity is carried by the blend mode
            None if matches!(transparency, TransparencyType::Blend { .. }) => {
                AlbedoType::Value(Vec4::new(color.x, color.y, color.z, 1.0))
            }
            None => AlbedoType::Value(color),
        };

        let emission = if desc.emission_enabled {
            let divisor = if emission_intensity_divisor > 0.0 {
                emission_intensity_divisor
            } else {
                warn!("Invalid emission intensity divisor {}", emission_intensity_divisor);
                1.0
            };

            Some(Emission {
                color: desc.emission.truncate(),
                texture: desc.emission_texture,
                intensity: desc.emission_intensity / divisor,
            })
        } else {
            None
        };

        PbrMaterial {
            albedo,
            transparency,
            metallic: desc.metallic,
            roughness: desc.roughness,
            uv_offset: desc.uv1_offset.truncate(),
            uv_scale: desc.uv1_scale.truncate(),
            emission,
        }
    }
}
