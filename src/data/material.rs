use std::sync::Arc;

use crate::data::texture::Texture;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

/// The uber-shader family the host should instantiate.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum MaterialVariant {
    #[default]
    Opaque,
    Translucent,
    TwoSided,
    TwoSidedTranslucent,
}

impl MaterialVariant {
    pub fn select(two_sided: bool, translucent: bool) -> Self {
        match (two_sided, translucent) {
            (false, false) => MaterialVariant::Opaque,
            (false, true) => MaterialVariant::Translucent,
            (true, false) => MaterialVariant::TwoSided,
            (true, true) => MaterialVariant::TwoSidedTranslucent,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShadingModel {
    #[default]
    MetallicRoughness,
    SpecularGlossiness,
    Unlit,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TextureTransform {
    pub offset: [f32; 2],
    pub scale: [f32; 2],
    pub rotation: f32,
}

impl Default for TextureTransform {
    fn default() -> Self {
        Self {
            offset: [0.0, 0.0],
            scale: [1.0, 1.0],
            rotation: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextureReference {
    pub index: usize,
    pub tex_coord: usize,
    pub transform: TextureTransform,
    pub srgb: bool,
    /// Decoded pixels, absent when texture loading was skipped or failed.
    pub texture: Option<Arc<Texture>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpecularGlossiness {
    pub diffuse_factor: [f32; 4],
    pub diffuse_texture: Option<TextureReference>,
    pub specular_factor: [f32; 3],
    pub glossiness_factor: f32,
    pub specular_glossiness_texture: Option<TextureReference>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transmission {
    pub factor: f32,
    pub texture: Option<TextureReference>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Specular {
    pub factor: f32,
    pub color_factor: [f32; 3],
    pub texture: Option<TextureReference>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub index: Option<usize>,
    pub name: String,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<TextureReference>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<TextureReference>,
    pub normal_texture: Option<TextureReference>,
    pub normal_scale: f32,
    pub occlusion_texture: Option<TextureReference>,
    pub occlusion_strength: f32,
    pub emissive_factor: [f32; 3],
    pub emissive_strength: f32,
    pub emissive_texture: Option<TextureReference>,
    pub specular_glossiness: Option<SpecularGlossiness>,
    pub transmission: Option<Transmission>,
    pub specular: Option<Specular>,
    pub ior: Option<f32>,
    pub unlit: bool,
    pub use_vertex_colors: bool,
    pub variant: MaterialVariant,
    pub shading_model: ShadingModel,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            index: None,
            name: String::new(),
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
            normal_texture: None,
            normal_scale: 1.0,
            occlusion_texture: None,
            occlusion_strength: 1.0,
            emissive_factor: [0.0, 0.0, 0.0],
            emissive_strength: 1.0,
            emissive_texture: None,
            specular_glossiness: None,
            transmission: None,
            specular: None,
            ior: None,
            unlit: false,
            use_vertex_colors: true,
            variant: MaterialVariant::Opaque,
            shading_model: ShadingModel::MetallicRoughness,
        }
    }
}

impl Material {
    pub fn is_masked(&self) -> bool {
        self.alpha_mode == AlphaMode::Mask
    }

    /// Scales the named factor in place. Returns false when no factor has that name.
    pub fn multiply_param(&mut self, name: &str, multiplier: f32) -> bool {
        fn scale<const N: usize>(values: &mut [f32; N], multiplier: f32) {
            values.iter_mut().for_each(|value| *value *= multiplier);
        }

        match name {
            "baseColorFactor" => scale(&mut self.base_color_factor, multiplier),
            "metallicFactor" => self.metallic_factor *= multiplier,
            "roughnessFactor" => self.roughness_factor *= multiplier,
            "normalTexScale" => self.normal_scale *= multiplier,
            "occlusionStrength" => self.occlusion_strength *= multiplier,
            "emissiveFactor" => scale(&mut self.emissive_factor, multiplier),
            "emissiveStrength" => self.emissive_strength *= multiplier,
            "alphaCutoff" => self.alpha_cutoff *= multiplier,
            "ior" => match self.ior.as_mut() {
                Some(ior) => *ior *= multiplier,
                None => return false,
            },
            "transmissionFactor" => match self.transmission.as_mut() {
                Some(transmission) => transmission.factor *= multiplier,
                None => return false,
            },
            "specularFactor" => match (self.specular.as_mut(), self.specular_glossiness.as_mut()) {
                (Some(specular), _) => specular.factor *= multiplier,
                (None, Some(specular_glossiness)) => {
                    scale(&mut specular_glossiness.specular_factor, multiplier)
                }
                (None, None) => return false,
            },
            "glossinessFactor" => match self.specular_glossiness.as_mut() {
                Some(specular_glossiness) => specular_glossiness.glossiness_factor *= multiplier,
                None => return false,
            },
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_selection() {
        assert_eq!(MaterialVariant::select(false, false), MaterialVariant::Opaque);
        assert_eq!(
            MaterialVariant::select(true, true),
            MaterialVariant::TwoSidedTranslucent
        );
    }

    #[test]
    fn multiply_known_and_unknown_params() {
        let mut material = Material::default();

        assert!(material.multiply_param("roughnessFactor", 0.5));
        assert_eq!(material.roughness_factor, 0.5);

        assert!(material.multiply_param("baseColorFactor", 0.5));
        assert_eq!(material.base_color_factor, [0.5, 0.5, 0.5, 0.5]);

        assert!(!material.multiply_param("glossinessFactor", 2.0));
        assert!(!material.multiply_param("unknown", 2.0));
    }
}
