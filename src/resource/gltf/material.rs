use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use crate::config::MaterialsConfig;
use crate::data::material::{
    AlphaMode, Material, MaterialVariant, ShadingModel, Specular, SpecularGlossiness,
    TextureReference, TextureTransform, Transmission,
};
use crate::resource::gltf::asset::GltfAsset;
use crate::resource::gltf::extension::{
    KHR_MATERIALS_EMISSIVE_STRENGTH, KHR_MATERIALS_IOR, KHR_MATERIALS_PBR_SPECULAR_GLOSSINESS,
    KHR_MATERIALS_SPECULAR, KHR_MATERIALS_TRANSMISSION, KHR_MATERIALS_UNLIT,
    KHR_TEXTURE_TRANSFORM,
};
use crate::resource::json::{root_item, JsonValueExt};

/// Highest UV set a texture may sample from.
const MAX_TEX_COORD: usize = 3;

fn alpha_mode(value: Option<&str>) -> AlphaMode {
    match value {
        None | Some("OPAQUE") => AlphaMode::Opaque,
        Some("MASK") => AlphaMode::Mask,
        Some("BLEND") => AlphaMode::Blend,
        Some(other) => {
            log::warn!("Unknown alpha mode {other}, falling back to OPAQUE");
            AlphaMode::Opaque
        }
    }
}

fn texture_transform(json: &Value) -> (TextureTransform, Option<usize>) {
    let Some(extension) = json.get_extension(KHR_TEXTURE_TRANSFORM) else {
        return (TextureTransform::default(), None);
    };

    let defaults = TextureTransform::default();
    let transform = TextureTransform {
        offset: extension
            .get_f32_array::<2>("offset")
            .unwrap_or(defaults.offset),
        scale: extension.get_f32_array::<2>("scale").unwrap_or(defaults.scale),
        rotation: extension.get_f32_or("rotation", defaults.rotation),
    };
    (transform, extension.get_index("texCoord"))
}

impl GltfAsset {
    /// Reads a textureInfo object, loading its pixels unless textures are skipped.
    ///
    /// A texture that fails to load is recorded in the error log and left empty, so the rest of
    /// the material still loads.
    fn texture_reference(
        &self,
        json: Option<&Value>,
        srgb: bool,
        config: &MaterialsConfig,
    ) -> Option<TextureReference> {
        let json = json?;
        let index = json.get_index("index")?;

        let (transform, tex_coord_override) = texture_transform(json);
        let mut tex_coord = tex_coord_override
            .or_else(|| json.get_index("texCoord"))
            .unwrap_or(0);
        if tex_coord > MAX_TEX_COORD {
            log::warn!("Texture {index} samples UV set {tex_coord}, using UV set 0");
            tex_coord = 0;
        }

        let texture = match config.skip_textures {
            true => None,
            false => self
                .report("LoadTexture()", self.texture(index, srgb, config))
                .ok(),
        };

        Some(TextureReference {
            index,
            tex_coord,
            transform,
            srgb,
            texture,
        })
    }

    fn build_material(
        &self,
        index: usize,
        json: &Value,
        config: &MaterialsConfig,
    ) -> Material {
        let mut material = Material {
            index: Some(index),
            name: json
                .get_name()
                .map_or_else(|| index.to_string(), String::from),
            alpha_mode: alpha_mode(json.get_string("alphaMode")),
            alpha_cutoff: json.get_f32_or("alphaCutoff", 0.5),
            double_sided: json.get_bool_or("doubleSided", false),
            emissive_factor: json
                .get_f32_array::<3>("emissiveFactor")
                .unwrap_or([0.0, 0.0, 0.0]),
            emissive_texture: self.texture_reference(json.get("emissiveTexture"), true, config),
            normal_texture: self.texture_reference(json.get("normalTexture"), false, config),
            normal_scale: json
                .get("normalTexture")
                .map_or(1.0, |texture| texture.get_f32_or("scale", 1.0)),
            occlusion_texture: self.texture_reference(json.get("occlusionTexture"), false, config),
            occlusion_strength: json
                .get("occlusionTexture")
                .map_or(1.0, |texture| texture.get_f32_or("strength", 1.0)),
            use_vertex_colors: !config.disable_vertex_colors,
            ..Default::default()
        };

        if let Some(pbr) = json.get("pbrMetallicRoughness") {
            material.base_color_factor = pbr
                .get_f32_array::<4>("baseColorFactor")
                .unwrap_or([1.0, 1.0, 1.0, 1.0]);
            material.base_color_texture =
                self.texture_reference(pbr.get("baseColorTexture"), true, config);
            material.metallic_factor = pbr.get_f32_or("metallicFactor", 1.0);
            material.roughness_factor = pbr.get_f32_or("roughnessFactor", 1.0);
            material.metallic_roughness_texture =
                self.texture_reference(pbr.get("metallicRoughnessTexture"), false, config);
        }

        if let Some(extension) = json.get_extension(KHR_MATERIALS_PBR_SPECULAR_GLOSSINESS) {
            material.shading_model = ShadingModel::SpecularGlossiness;
            material.specular_glossiness = Some(SpecularGlossiness {
                diffuse_factor: extension
                    .get_f32_array::<4>("diffuseFactor")
                    .unwrap_or([1.0, 1.0, 1.0, 1.0]),
                diffuse_texture: self.texture_reference(
                    extension.get("diffuseTexture"),
                    true,
                    config,
                ),
                specular_factor: extension
                    .get_f32_array::<3>("specularFactor")
                    .unwrap_or([1.0, 1.0, 1.0]),
                glossiness_factor: extension.get_f32_or("glossinessFactor", 1.0),
                specular_glossiness_texture: self.texture_reference(
                    extension.get("specularGlossinessTexture"),
                    true,
                    config,
                ),
            });
        }

        if let Some(extension) = json.get_extension(KHR_MATERIALS_TRANSMISSION) {
            material.transmission = Some(Transmission {
                factor: extension.get_f32_or("transmissionFactor", 0.0),
                texture: self.texture_reference(
                    extension.get("transmissionTexture"),
                    false,
                    config,
                ),
            });
        }

        if let Some(extension) = json.get_extension(KHR_MATERIALS_SPECULAR) {
            material.specular = Some(Specular {
                factor: extension.get_f32_or("specularFactor", 1.0),
                color_factor: extension
                    .get_f32_array::<3>("specularColorFactor")
                    .unwrap_or([1.0, 1.0, 1.0]),
                texture: self.texture_reference(extension.get("specularTexture"), false, config),
            });
        }

        if let Some(extension) = json.get_extension(KHR_MATERIALS_IOR) {
            material.ior = Some(extension.get_f32_or("ior", 1.5));
        }

        if let Some(extension) = json.get_extension(KHR_MATERIALS_EMISSIVE_STRENGTH) {
            material.emissive_strength = extension.get_f32_or("emissiveStrength", 1.0);
        }

        if json.get_extension(KHR_MATERIALS_UNLIT).is_some() {
            material.unlit = true;
            material.shading_model = ShadingModel::Unlit;
        }

        if let Some(factor) = config.specular_factor {
            match material.specular.as_mut() {
                Some(specular) => specular.factor = factor,
                None => {
                    material.specular = Some(Specular {
                        factor,
                        color_factor: [1.0, 1.0, 1.0],
                        texture: None,
                    })
                }
            }
        }

        for (name, multiplier) in &config.params_multiplier {
            if !material.multiply_param(name, *multiplier) {
                log::warn!("Material {} has no parameter {name} to multiply", material.name);
            }
        }

        let translucent =
            material.alpha_mode == AlphaMode::Blend || material.transmission.is_some();
        material.variant = MaterialVariant::select(material.double_sided, translucent);
        material
    }

    pub(crate) fn material(
        &self,
        index: usize,
        config: &MaterialsConfig,
    ) -> Result<Arc<Material>> {
        if let Some(material) = config.materials_override_by_index.get(&index) {
            return Ok(material.clone());
        }

        let json = root_item(self.root(), "materials", index)?;
        if let Some(material) = json
            .get_name()
            .and_then(|name| config.materials_override_by_name.get(name))
        {
            return Ok(material.clone());
        }

        if let Some(material) = self.cache().materials.get(&index, config.cache_mode) {
            log::debug!(
                "Skipping duplicate load of glTF material: {} - [{index}]",
                material.name
            );
            return Ok(material);
        }

        log::debug!(
            "Loading glTF material: {} - [{index}]",
            json.get_name().unwrap_or("<UNNAMED>")
        );

        let material = Arc::new(self.build_material(index, json, config));
        Ok(self
            .cache()
            .materials
            .insert(index, material, config.cache_mode))
    }

    /// Decodes `materials[index]` into a host-neutral descriptor.
    pub fn load_material(&self, index: usize, config: &MaterialsConfig) -> Result<Arc<Material>> {
        self.report("LoadMaterial()", self.material(index, config))
    }

    /// Name of every material, defaulting to the index.
    pub fn get_material_names(&self) -> Vec<String> {
        self.root()
            .get_array("materials")
            .map_or_else(Vec::new, |materials| {
                materials
                    .iter()
                    .enumerate()
                    .map(|(index, material)| {
                        material
                            .get_name()
                            .map_or_else(|| index.to_string(), String::from)
                    })
                    .collect()
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use crate::config::CacheMode;
    use crate::error::{kind_of, ErrorKind};
    use crate::resource::gltf::fixture::{identity_config, png, DocumentBuilder};

    fn material_asset() -> GltfAsset {
        let mut builder = DocumentBuilder::new();
        let view = builder.view(&png(2, 2, [255, 255, 255, 255]));
        builder.asset(
            json!({
                "images": [{"bufferView": view, "mimeType": "image/png"}],
                "textures": [{"source": 0}, {"source": 5}],
                "materials": [
                    {
                        "name": "metal",
                        "pbrMetallicRoughness": {
                            "baseColorFactor": [0.5, 0.5, 0.5, 1.0],
                            "baseColorTexture": {"index": 0, "texCoord": 1},
                            "metallicRoughnessTexture": {
                                "index": 0,
                                "extensions": {
                                    "KHR_texture_transform": {
                                        "offset": [0.5, 0.0],
                                        "scale": [2.0, 2.0],
                                        "texCoord": 2
                                    }
                                }
                            }
                        },
                        "normalTexture": {"index": 0, "scale": 0.5},
                        "doubleSided": true,
                        "alphaMode": "BLEND"
                    },
                    {
                        "name": "gloss",
                        "alphaMode": "MASK",
                        "alphaCutoff": 0.25,
                        "extensions": {
                            "KHR_materials_pbrSpecularGlossiness": {
                                "diffuseFactor": [1.0, 0.0, 0.0, 1.0],
                                "glossinessFactor": 0.2,
                                "diffuseTexture": {"index": 1}
                            },
                            "KHR_materials_ior": {},
                            "KHR_materials_emissive_strength": {"emissiveStrength": 4.0}
                        }
                    },
                    {
                        "extensions": {
                            "KHR_materials_transmission": {"transmissionFactor": 0.8},
                            "KHR_materials_specular": {"specularColorFactor": [0.5, 0.5, 0.5]},
                            "KHR_materials_unlit": {}
                        }
                    }
                ]
            }),
            identity_config(),
        )
    }

    #[test]
    fn metallic_roughness_with_textures() {
        let asset = material_asset();
        let material = asset.load_material(0, &MaterialsConfig::default()).unwrap();

        assert_eq!(material.name, "metal");
        assert_eq!(material.base_color_factor, [0.5, 0.5, 0.5, 1.0]);
        assert_eq!(material.metallic_factor, 1.0);
        assert_eq!(material.variant, MaterialVariant::TwoSidedTranslucent);
        assert_eq!(material.normal_scale, 0.5);

        let base_color = material.base_color_texture.as_ref().unwrap();
        assert_eq!(base_color.tex_coord, 1);
        assert!(base_color.srgb);
        assert!(base_color.texture.is_some());

        let metallic_roughness = material.metallic_roughness_texture.as_ref().unwrap();
        assert!(!metallic_roughness.srgb);
        assert_eq!(metallic_roughness.tex_coord, 2);
        assert_eq!(metallic_roughness.transform.scale, [2.0, 2.0]);
        assert!(!material.normal_texture.as_ref().unwrap().srgb);

        let again = asset.load_material(0, &MaterialsConfig::default()).unwrap();
        assert!(Arc::ptr_eq(&material, &again));
    }

    #[test]
    fn specular_glossiness_and_broken_textures() {
        let asset = material_asset();
        let material = asset.load_material(1, &MaterialsConfig::default()).unwrap();

        assert_eq!(material.shading_model, ShadingModel::SpecularGlossiness);
        assert_eq!(material.variant, MaterialVariant::Opaque);
        assert!(material.is_masked());
        assert_eq!(material.alpha_cutoff, 0.25);
        assert_eq!(material.ior, Some(1.5));
        assert_eq!(material.emissive_strength, 4.0);

        let specular_glossiness = material.specular_glossiness.as_ref().unwrap();
        assert_eq!(specular_glossiness.glossiness_factor, 0.2);
        // the diffuse texture points at a missing image: kept as a reference, logged, no pixels
        let diffuse = specular_glossiness.diffuse_texture.as_ref().unwrap();
        assert!(diffuse.texture.is_none());
        assert!(asset.get_errors()[0].starts_with("LoadTexture(): "));
    }

    #[test]
    fn extensions_and_config_adjustments() {
        let asset = material_asset();
        let config = MaterialsConfig {
            cache_mode: CacheMode::None,
            skip_textures: true,
            specular_factor: Some(0.25),
            disable_vertex_colors: true,
            params_multiplier: HashMap::from([(String::from("transmissionFactor"), 0.5)]),
            ..Default::default()
        };

        let material = asset.load_material(2, &config).unwrap();
        assert_eq!(material.name, "2");
        assert!(material.unlit);
        assert_eq!(material.shading_model, ShadingModel::Unlit);
        assert_eq!(material.variant, MaterialVariant::Translucent);
        assert!((material.transmission.as_ref().unwrap().factor - 0.4).abs() < 1e-6);
        let specular = material.specular.as_ref().unwrap();
        assert_eq!(specular.factor, 0.25);
        assert_eq!(specular.color_factor, [0.5, 0.5, 0.5]);
        assert!(!material.use_vertex_colors);

        let textured = asset.load_material(0, &config).unwrap();
        assert!(textured.base_color_texture.as_ref().unwrap().texture.is_none());
        assert!(asset.get_errors().is_empty());
    }

    #[test]
    fn overrides_and_errors() {
        let asset = material_asset();
        let replacement = Arc::new(Material {
            name: String::from("replacement"),
            ..Default::default()
        });
        let config = MaterialsConfig {
            materials_override_by_index: HashMap::from([(1, replacement.clone())]),
            materials_override_by_name: HashMap::from([(
                String::from("metal"),
                replacement.clone(),
            )]),
            ..Default::default()
        };

        assert!(Arc::ptr_eq(&asset.load_material(0, &config).unwrap(), &replacement));
        assert!(Arc::ptr_eq(&asset.load_material(1, &config).unwrap(), &replacement));

        let error = asset.load_material(3, &config).unwrap_err();
        assert_eq!(kind_of(&error), Some(ErrorKind::IndexOutOfRange));
        assert!(asset.get_errors()[0].starts_with("LoadMaterial(): "));

        assert_eq!(asset.get_material_names(), vec!["metal", "gloss", "2"]);
    }
}
