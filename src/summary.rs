use std::fmt;

use anyhow::Result;

use crate::config::mesh::PrimitiveOptions;
use crate::config::{SkeletonConfig, StaticMeshConfig};
use crate::resource::gltf::animation::frame_count;
use crate::resource::gltf::asset::GltfAsset;
use crate::resource::json::{root_item, root_len, JsonValueExt};

pub struct MeshSummary {
    pub name: String,
    pub primitives: usize,
    pub vertices: usize,
    pub indices: usize,
    pub morph_targets: usize,
    /// Size of the packed vertex and index streams.
    pub bytes: usize,
}

pub struct AnimationSummary {
    pub name: String,
    pub duration: f32,
    pub frames: usize,
}

/// What the inspector prints for one document. Items that fail to load are left out and their
/// errors are listed instead.
pub struct Summary {
    pub scenes: Vec<String>,
    pub default_scene: Option<usize>,
    pub node_count: usize,
    pub meshes: Vec<MeshSummary>,
    /// Skin name and bone count.
    pub skins: Vec<(String, usize)>,
    pub animations: Vec<AnimationSummary>,
    pub materials: Vec<String>,
    pub errors: Vec<String>,
}

impl Summary {
    pub fn new(asset: &GltfAsset, frames_per_second: f32) -> Result<Self> {
        let scenes = asset.get_scenes()?;
        let node_count = asset.get_nodes()?.len();

        let options = PrimitiveOptions::from(&StaticMeshConfig::default());
        let meshes = (0..root_len(asset.root(), "meshes"))
            .filter_map(|index| asset.load_mesh_primitives(index, &options).ok())
            .map(|mesh| MeshSummary {
                name: mesh.name,
                primitives: mesh.primitives.len(),
                vertices: mesh.primitives.iter().map(|p| p.vertex_count()).sum(),
                indices: mesh.primitives.iter().map(|p| p.indices.len()).sum(),
                morph_targets: mesh.morph_target_names.len(),
                bytes: mesh
                    .primitives
                    .iter()
                    .map(|p| p.vertex_buffer().bytes.len() + p.index_bytes().len())
                    .sum(),
            })
            .collect();

        let skeleton_config = SkeletonConfig::default();
        let skins = (0..root_len(asset.root(), "skins"))
            .filter_map(|index| {
                let skeleton = asset.load_skeleton(index, &skeleton_config).ok()?;
                let name = root_item(asset.root(), "skins", index)
                    .ok()
                    .and_then(|skin| skin.get_name())
                    .map_or_else(|| format!("skin_{index}"), String::from);
                Some((name, skeleton.reference.len()))
            })
            .collect();

        let animations = (0..root_len(asset.root(), "animations"))
            .filter_map(|index| match asset.animation_channels(index) {
                Ok(channels) => Some(AnimationSummary {
                    frames: frame_count(channels.duration, frames_per_second),
                    name: channels.name,
                    duration: channels.duration,
                }),
                Err(error) => {
                    asset.add_error("LoadAnimation()", format!("{error:#}"));
                    None
                }
            })
            .collect();

        Ok(Self {
            scenes: scenes.into_iter().map(|scene| scene.name).collect(),
            default_scene: asset.get_default_scene(),
            node_count,
            meshes,
            skins,
            animations,
            materials: asset.get_material_names(),
            errors: asset.get_errors(),
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "scenes: {}", self.scenes.len())?;
        for (index, name) in self.scenes.iter().enumerate() {
            let marker = match self.default_scene == Some(index) {
                true => " (default)",
                false => "",
            };
            writeln!(f, "  [{index}] {name}{marker}")?;
        }
        writeln!(f, "nodes: {}", self.node_count)?;

        writeln!(f, "meshes: {}", self.meshes.len())?;
        for mesh in &self.meshes {
            writeln!(
                f,
                "  {}: {} primitives, {} vertices, {} indices, {} morph targets, {} bytes",
                mesh.name,
                mesh.primitives,
                mesh.vertices,
                mesh.indices,
                mesh.morph_targets,
                mesh.bytes
            )?;
        }

        writeln!(f, "skins: {}", self.skins.len())?;
        for (name, bones) in &self.skins {
            writeln!(f, "  {name}: {bones} bones")?;
        }

        writeln!(f, "animations: {}", self.animations.len())?;
        for animation in &self.animations {
            writeln!(
                f,
                "  {}: {:.3}s, {} frames",
                animation.name, animation.duration, animation.frames
            )?;
        }

        writeln!(f, "materials: {}", self.materials.len())?;
        for name in &self.materials {
            writeln!(f, "  {name}")?;
        }

        if !self.errors.is_empty() {
            writeln!(f, "errors: {}", self.errors.len())?;
            for error in &self.errors {
                writeln!(f, "  {error}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::resource::gltf::fixture::{identity_config, DocumentBuilder};

    #[test]
    fn summarizes_meshes_and_materials() {
        let mut builder = DocumentBuilder::new();
        let positions = builder.floats(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], "VEC3");
        let indices = builder.u16s(&[0, 1, 2], "SCALAR");
        let asset = builder.asset(
            json!({
                "scene": 0,
                "scenes": [{"name": "main", "nodes": [0]}],
                "nodes": [{"mesh": 0}],
                "meshes": [{
                    "name": "tri",
                    "primitives": [{"attributes": {"POSITION": positions}, "indices": indices}]
                }],
                "materials": [{"name": "plain"}]
            }),
            identity_config(),
        );

        let summary = Summary::new(&asset, 30.0).unwrap();
        assert_eq!(summary.scenes, vec![String::from("main")]);
        assert_eq!(summary.node_count, 1);
        assert_eq!(summary.meshes[0].vertices, 3);
        assert_eq!(summary.meshes[0].indices, 3);
        assert_eq!(summary.materials, vec![String::from("plain")]);
        assert!(summary.errors.is_empty());

        let printed = summary.to_string();
        assert!(printed.contains("[0] main (default)"));
        assert!(printed.contains("tri: 1 primitives, 3 vertices, 3 indices"));
        assert!(!printed.contains("errors:"));
    }

    #[test]
    fn failed_items_show_up_as_errors() {
        let asset = DocumentBuilder::new().asset(
            json!({
                "meshes": [{"name": "broken", "primitives": [{"attributes": {"POSITION": 9}}]}]
            }),
            identity_config(),
        );

        let summary = Summary::new(&asset, 30.0).unwrap();
        assert!(summary.meshes.is_empty());
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.to_string().contains("errors: 1"));
    }
}
