use std::collections::BTreeSet;

use anyhow::Result;
use serde_json::Value;

use crate::config::LightConfig;
use crate::data::extension::{AudioClip, AudioEmitter, LightKind, MeshInstances, PunctualLight};
use crate::data::mesh::MaterialVariantMapping;
use crate::data::transform::{normalize_quaternion, Transform};
use crate::error::{Error, ErrorKind};
use crate::resource::blob::data_uri_mime_type;
use crate::resource::gltf::asset::GltfAsset;
use crate::resource::gltf::loader::accessor::{
    accessor_count, read_floats, AccessorConstraints, Normalization,
};
use crate::resource::json::{root_extension_item, JsonValueExt};

pub const KHR_LIGHTS_PUNCTUAL: &str = "KHR_lights_punctual";
pub const KHR_MATERIALS_EMISSIVE_STRENGTH: &str = "KHR_materials_emissive_strength";
pub const KHR_MATERIALS_IOR: &str = "KHR_materials_ior";
pub const KHR_MATERIALS_PBR_SPECULAR_GLOSSINESS: &str = "KHR_materials_pbrSpecularGlossiness";
pub const KHR_MATERIALS_SPECULAR: &str = "KHR_materials_specular";
pub const KHR_MATERIALS_TRANSMISSION: &str = "KHR_materials_transmission";
pub const KHR_MATERIALS_UNLIT: &str = "KHR_materials_unlit";
pub const KHR_MATERIALS_VARIANTS: &str = "KHR_materials_variants";
pub const KHR_MESH_QUANTIZATION: &str = "KHR_mesh_quantization";
pub const KHR_TEXTURE_BASISU: &str = "KHR_texture_basisu";
pub const KHR_TEXTURE_TRANSFORM: &str = "KHR_texture_transform";
pub const EXT_MESH_GPU_INSTANCING: &str = "EXT_mesh_gpu_instancing";
pub const MSFT_AUDIO_EMITTER: &str = "MSFT_audio_emitter";
pub const MSFT_LOD: &str = "MSFT_lod";
pub const MSFT_SCREENCOVERAGE: &str = "MSFT_screencoverage";

const HANDLED_EXTENSIONS: [&str; 15] = [
    KHR_LIGHTS_PUNCTUAL,
    KHR_MATERIALS_EMISSIVE_STRENGTH,
    KHR_MATERIALS_IOR,
    KHR_MATERIALS_PBR_SPECULAR_GLOSSINESS,
    KHR_MATERIALS_SPECULAR,
    KHR_MATERIALS_TRANSMISSION,
    KHR_MATERIALS_UNLIT,
    KHR_MATERIALS_VARIANTS,
    KHR_MESH_QUANTIZATION,
    KHR_TEXTURE_BASISU,
    KHR_TEXTURE_TRANSFORM,
    EXT_MESH_GPU_INSTANCING,
    MSFT_AUDIO_EMITTER,
    MSFT_LOD,
    MSFT_SCREENCOVERAGE,
];

/// Extension names this runtime (or the caller) knows how to honor.
#[derive(Clone, Debug)]
pub struct ExtensionRegistry {
    supported: BTreeSet<String>,
}

impl ExtensionRegistry {
    pub fn new(additional: &[String]) -> Self {
        let mut supported: BTreeSet<String> =
            HANDLED_EXTENSIONS.iter().map(|name| String::from(*name)).collect();
        supported.extend(additional.iter().cloned());
        Self { supported }
    }

    pub fn is_supported(&self, name: &str) -> bool {
        self.supported.contains(name)
    }

    pub fn supported(&self) -> impl Iterator<Item = &str> {
        self.supported.iter().map(String::as_str)
    }

    /// Fails on the first `extensionsRequired` entry without a handler.
    pub fn check_required(&self, root: &Value) -> Result<()> {
        for name in root.get_array("extensionsRequired").into_iter().flatten() {
            let name = name.as_str().unwrap_or_default();
            if !self.is_supported(name) {
                return Err(Error::new(
                    ErrorKind::UnsupportedRequiredExtension,
                    String::from(name),
                )
                .into());
            }
        }

        for name in root.get_array("extensionsUsed").into_iter().flatten() {
            if let Some(name) = name.as_str().filter(|name| !self.is_supported(name)) {
                log::debug!("Ignoring unsupported glTF extension: {name}");
            }
        }

        Ok(())
    }
}

impl GltfAsset {
    fn light(&self, index: usize, config: &LightConfig) -> Result<PunctualLight> {
        let json = match root_extension_item(self.root(), KHR_LIGHTS_PUNCTUAL, "lights", index) {
            Some(json) => json,
            None => {
                return Err(Error::new(
                    ErrorKind::IndexOutOfRange,
                    format!("The given punctual light index is invalid: {index}"),
                )
                .into())
            }
        };

        let intensity = json.get_f32_or("intensity", 1.0);
        let range = match json.get_number("range") {
            Some(range) => range as f32 * self.basis().scale(),
            None => intensity * config.default_attenuation_multiplier,
        };

        let kind = match json.get_string("type") {
            Some("directional") => LightKind::Directional,
            Some("point") => LightKind::Point,
            Some("spot") => {
                let spot = json.get("spot");
                LightKind::Spot {
                    inner_cone_angle: spot
                        .map_or(0.0, |spot| spot.get_f32_or("innerConeAngle", 0.0)),
                    outer_cone_angle: spot.map_or(std::f32::consts::FRAC_PI_4, |spot| {
                        spot.get_f32_or("outerConeAngle", std::f32::consts::FRAC_PI_4)
                    }),
                }
            }
            other => {
                return Err(Error::new(
                    ErrorKind::MalformedJson,
                    format!("Unsupported punctual light type: {other:?}"),
                )
                .into())
            }
        };

        Ok(PunctualLight {
            index,
            name: json.get_name().unwrap_or_default().to_string(),
            kind,
            color: json.get_f32_array::<3>("color").unwrap_or([1.0, 1.0, 1.0]),
            intensity,
            range,
        })
    }

    pub fn load_punctual_light(&self, index: usize, config: &LightConfig) -> Result<PunctualLight> {
        self.report("LoadPunctualLight()", self.light(index, config))
    }

    /// The light attached to a node through `KHR_lights_punctual`, if any.
    pub fn load_node_light(
        &self,
        node_index: usize,
        config: &LightConfig,
    ) -> Result<Option<PunctualLight>> {
        let light = self
            .node(node_index)
            .and_then(|node| node.light.map(|light| self.light(light, config)).transpose());
        self.report("LoadNodeLight()", light)
    }

    fn mesh_instances(&self, node_index: usize) -> Result<MeshInstances> {
        let node = crate::resource::json::root_item(self.root(), "nodes", node_index)?;
        let attributes = match node
            .get_extension(EXT_MESH_GPU_INSTANCING)
            .and_then(|extension| extension.get("attributes"))
        {
            Some(attributes) => attributes,
            None => {
                return Ok(MeshInstances {
                    node: node_index,
                    transforms: vec![],
                })
            }
        };

        let mut count = 0;
        for semantic in ["TRANSLATION", "ROTATION", "SCALE"] {
            if let Some(accessor) = attributes.get_index(semantic) {
                count = count.max(accessor_count(self.loader(), accessor)?);
            }
        }

        let read = |semantic: &str, elements: usize| match attributes.get_index(semantic) {
            Some(accessor) => {
                let constraints = AccessorConstraints::animated(elements).with_count(count);
                read_floats(self.loader(), accessor, &constraints, Normalization::Auto)
                    .map(|stream| stream.values)
            }
            None => Ok(vec![]),
        };
        // every stream is checked against its bufferView before the instances are sized
        let translations = read("TRANSLATION", 3)?;
        let rotations = read("ROTATION", 4)?;
        let scales = read("SCALE", 3)?;

        let mut transforms = vec![Transform::default(); count];
        for (transform, item) in transforms.iter_mut().zip(translations.chunks_exact(3)) {
            transform.translation = cgmath::Vector3::new(item[0], item[1], item[2]);
        }
        for (transform, item) in transforms.iter_mut().zip(rotations.chunks_exact(4)) {
            let rotation = cgmath::Quaternion::new(item[3], item[0], item[1], item[2]);
            transform.rotation = normalize_quaternion(rotation);
        }
        for (transform, item) in transforms.iter_mut().zip(scales.chunks_exact(3)) {
            transform.scale = cgmath::Vector3::new(item[0], item[1], item[2]);
        }

        Ok(MeshInstances {
            node: node_index,
            transforms: transforms
                .iter()
                .map(|transform| self.basis().transform(transform))
                .collect(),
        })
    }

    /// Per-instance transforms from `EXT_mesh_gpu_instancing`; empty when the node has none.
    pub fn load_mesh_instances(&self, node_index: usize) -> Result<MeshInstances> {
        self.report("LoadMeshInstances()", self.mesh_instances(node_index))
    }

    /// Mesh indices of the node followed by its `MSFT_lod` alternates.
    ///
    /// The chain stops at the first alternate that is not a valid node with a mesh.
    pub(crate) fn lod_chain(&self, node_index: usize) -> Result<Vec<usize>> {
        let nodes = self.nodes()?;
        let node_json = crate::resource::json::root_item(self.root(), "nodes", node_index)?;

        let mut meshes = match nodes[node_index].mesh {
            Some(mesh) => vec![mesh],
            None => {
                return Err(Error::new(
                    ErrorKind::IndexOutOfRange,
                    format!("Node {node_index} has no mesh"),
                )
                .into())
            }
        };

        let ids = node_json
            .get_extension(MSFT_LOD)
            .map_or_else(Vec::new, |extension| extension.get_indices("ids"));
        for id in ids {
            match nodes.get(id).and_then(|node| node.mesh) {
                Some(mesh) => meshes.push(mesh),
                None => break,
            }
        }

        Ok(meshes)
    }

    /// `MSFT_screencoverage` hints stored in the node's extras.
    pub fn get_screen_coverages(&self, node_index: usize) -> Vec<f32> {
        self.get_extras("nodes", node_index)
            .and_then(|extras| extras.get_f32_vec(MSFT_SCREENCOVERAGE))
            .unwrap_or_default()
    }

    pub fn get_material_variants(&self) -> Vec<String> {
        self.root()
            .get_extension(KHR_MATERIALS_VARIANTS)
            .and_then(|extension| extension.get_array("variants"))
            .map_or_else(Vec::new, |variants| {
                variants
                    .iter()
                    .enumerate()
                    .map(|(index, variant)| {
                        variant
                            .get_name()
                            .map_or_else(|| index.to_string(), String::from)
                    })
                    .collect()
            })
    }

    pub(crate) fn primitive_variant_mappings(
        &self,
        primitive: &Value,
    ) -> Vec<MaterialVariantMapping> {
        primitive
            .get_extension(KHR_MATERIALS_VARIANTS)
            .and_then(|extension| extension.get_array("mappings"))
            .map_or_else(Vec::new, |mappings| {
                mappings
                    .iter()
                    .filter_map(|mapping| {
                        Some(MaterialVariantMapping {
                            material: mapping.get_index("material")?,
                            variants: mapping.get_indices("variants"),
                        })
                    })
                    .collect()
            })
    }

    fn audio_clip(&self, index: usize) -> Result<AudioClip> {
        let json = match root_extension_item(self.root(), MSFT_AUDIO_EMITTER, "clips", index) {
            Some(json) => json,
            None => {
                return Err(Error::new(
                    ErrorKind::IndexOutOfRange,
                    format!("The given audio clip index is invalid: {index}"),
                )
                .into())
            }
        };

        let mime_type = json.get_string("mimeType").map(String::from).or_else(|| {
            let uri = json.get_string("uri")?;
            match data_uri_mime_type(uri) {
                Some(mime_type) => Some(String::from(mime_type)),
                None if uri.ends_with(".wav") => Some(String::from("audio/wav")),
                None if uri.ends_with(".ogg") => Some(String::from("audio/ogg")),
                None => None,
            }
        });

        Ok(AudioClip {
            index,
            mime_type,
            bytes: self.load_object_bytes(json)?,
        })
    }

    fn audio_emitter(&self, index: usize) -> Result<AudioEmitter> {
        let json = match root_extension_item(self.root(), MSFT_AUDIO_EMITTER, "emitters", index) {
            Some(json) => json,
            None => {
                return Err(Error::new(
                    ErrorKind::IndexOutOfRange,
                    format!("The given audio emitter index is invalid: {index}"),
                )
                .into())
            }
        };

        let mut clips = vec![];
        for clip in json.get_array("clips").into_iter().flatten() {
            // entries are either `{"clip": n}` objects or bare indices
            let clip_index = clip.get_index("clip").or(clip.as_u64().map(|index| index as usize));
            match clip_index {
                Some(clip_index) => clips.push(self.audio_clip(clip_index)?),
                None => log::warn!("Skipping malformed clip entry of audio emitter {index}"),
            }
        }

        Ok(AudioEmitter {
            index,
            name: json.get_name().unwrap_or_default().to_string(),
            volume: json.get_f32_or("volume", 1.0),
            looping: json.get_bool_or("loop", false),
            clips,
        })
    }

    pub fn load_audio_emitter(&self, index: usize) -> Result<AudioEmitter> {
        self.report("LoadAudioEmitter()", self.audio_emitter(index))
    }
}
