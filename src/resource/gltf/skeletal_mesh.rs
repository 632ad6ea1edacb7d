use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::Result;

use crate::config::mesh::PrimitiveOptions;
use crate::config::SkeletalMeshConfig;
use crate::data::mesh::{BoundingBox, Primitive, SkeletalMesh};
use crate::data::skeleton::{ReferenceSkeleton, Skeleton};
use crate::data::transform::Transform;
use crate::error::{Error, ErrorKind};
use crate::resource::gltf::asset::GltfAsset;
use crate::resource::gltf::skeleton::{custom_skeleton, post_process};

/// Where the bones of a skeletal mesh came from; decides how JOINTS values are resolved.
enum SkeletonSource {
    Skin { joint_count: usize },
    NodeTree { mesh_node: Option<usize> },
    Custom,
    Fake,
}

impl GltfAsset {
    /// The first node instancing `mesh_index`, if any.
    fn mesh_node(&self, mesh_index: usize) -> Result<Option<usize>> {
        Ok(self
            .nodes()?
            .iter()
            .find(|node| node.mesh == Some(mesh_index))
            .map(|node| node.index))
    }

    fn mesh_skeleton(
        &self,
        mesh_index: usize,
        skin_index: Option<usize>,
        config: &SkeletalMeshConfig,
    ) -> Result<(Arc<Skeleton>, SkeletonSource)> {
        if !config.custom_skeleton.is_empty() {
            let mut reference = custom_skeleton(&config.custom_skeleton)?;
            post_process(&mut reference, &config.skeleton_config);
            let bone_map = reference
                .bones()
                .iter()
                .enumerate()
                .map(|(index, bone)| (index, bone.name.clone()))
                .collect();
            let skeleton = Skeleton::new(reference, bone_map, HashMap::new(), None);
            return Ok((Arc::new(skeleton), SkeletonSource::Custom));
        }

        if let Some(skin_index) = skin_index {
            let skeleton = self.skeleton(skin_index, &config.skeleton_config)?;
            let joint_count = skeleton.bone_map.len();
            return Ok((skeleton, SkeletonSource::Skin { joint_count }));
        }

        if config.skeleton_config.fallback_to_node_tree {
            let mesh_node = self.mesh_node(mesh_index)?;
            let root = match (config.skeleton_config.root_node_index, mesh_node) {
                (Some(root), _) => root,
                (None, Some(node)) => self.node_ancestors(node)?.last().copied().unwrap_or(node),
                (None, None) => {
                    return Err(Error::new(
                        ErrorKind::SkeletonBuildFailure,
                        format!(
                            "No node instances mesh {mesh_index}, unable to pick a skeleton root"
                        ),
                    )
                    .into())
                }
            };
            let skeleton = self.node_tree_skeleton(root, &config.skeleton_config)?;
            return Ok((Arc::new(skeleton), SkeletonSource::NodeTree { mesh_node }));
        }

        let mut reference = ReferenceSkeleton::new();
        let name = match config.skeleton_config.root_bone_name.is_empty() {
            true => String::from("root"),
            false => config.skeleton_config.root_bone_name.clone(),
        };
        reference.add_bone(name.clone(), None, Transform::default());
        let skeleton = Skeleton::new(reference, BTreeMap::from([(0, name)]), HashMap::new(), None);
        Ok((Arc::new(skeleton), SkeletonSource::Fake))
    }

    /// Bone index that a JOINTS value of the mesh refers to.
    fn resolve_joint(
        &self,
        joint: usize,
        skeleton: &Skeleton,
        source: &SkeletonSource,
        config: &SkeletalMeshConfig,
    ) -> Result<Option<usize>> {
        match source {
            SkeletonSource::Skin { joint_count } => {
                if joint >= *joint_count {
                    return Ok(None);
                }
                Ok(skeleton.bone_index_for_joint(joint))
            }
            SkeletonSource::NodeTree { .. } => {
                let mut node = Some(joint);
                while let Some(index) = node {
                    if let Some(name) = skeleton.node_bone_map.get(&index) {
                        return Ok(skeleton.reference.find_bone(name));
                    }
                    if !config.skeleton_config.assign_unmapped_bones_to_parent {
                        break;
                    }
                    node = match self.node(index) {
                        Ok(node) => node.parent,
                        Err(_) => None,
                    };
                }
                Ok(None)
            }
            SkeletonSource::Custom => Ok((joint < skeleton.reference.len()).then_some(joint)),
            SkeletonSource::Fake => Ok(Some(0)),
        }
    }

    /// Rewrites JOINTS from skin slots to bone indices; skinless primitives are bound rigidly.
    fn bind_primitive(
        &self,
        primitive: &mut Primitive,
        skeleton: &Skeleton,
        source: &SkeletonSource,
        config: &SkeletalMeshConfig,
    ) -> Result<()> {
        if primitive.joints.is_empty() {
            let rigid_bone = match source {
                SkeletonSource::NodeTree { mesh_node: Some(node) } => skeleton
                    .node_bone_map
                    .get(node)
                    .and_then(|name| skeleton.reference.find_bone(name))
                    .unwrap_or(0),
                _ => 0,
            } as u16;
            let vertex_count = primitive.vertex_count();
            primitive.joints = vec![vec![[rigid_bone, 0, 0, 0]; vertex_count]];
            primitive.weights = vec![vec![[1.0, 0.0, 0.0, 0.0]; vertex_count]];
            return Ok(());
        }

        let mut resolved: HashMap<u16, u16> = HashMap::new();
        for (joints, weights) in primitive.joints.iter_mut().zip(&primitive.weights) {
            for (influences, influence_weights) in joints.iter_mut().zip(weights) {
                for (joint, weight) in influences.iter_mut().zip(influence_weights) {
                    if let Some(bone) = resolved.get(joint) {
                        *joint = *bone;
                        continue;
                    }
                    match self.resolve_joint(*joint as usize, skeleton, source, config)? {
                        Some(bone) => {
                            resolved.insert(*joint, bone as u16);
                            *joint = bone as u16;
                        }
                        None if *weight == 0.0 => *joint = 0,
                        None => {
                            return Err(Error::new(
                                ErrorKind::JointOutOfRange,
                                format!("Vertex joint {joint} has no matching bone"),
                            )
                            .into())
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn build_skeletal_mesh(
        &self,
        mesh_index: usize,
        skin_index: Option<usize>,
        config: &SkeletalMeshConfig,
    ) -> Result<SkeletalMesh> {
        let mut mesh = self.mesh_primitives(mesh_index, &PrimitiveOptions::from(config))?;
        log::debug!("Loading glTF skeletal mesh: {} - [{mesh_index}]", mesh.name);

        let (skeleton, source) = self.mesh_skeleton(mesh_index, skin_index, config)?;
        for primitive in mesh.primitives.iter_mut() {
            self.bind_primitive(primitive, &skeleton, &source, config)?;
        }

        let bounding_box = BoundingBox::from_points(
            mesh.primitives
                .iter()
                .flat_map(|primitive| primitive.positions.iter()),
        );
        let materials = self.primitive_materials(&mesh.primitives, &config.materials_config);

        Ok(SkeletalMesh {
            name: mesh.name,
            primitives: mesh.primitives,
            bone_map: skeleton.bone_map.clone(),
            skeleton,
            morph_target_names: mesh.morph_target_names,
            bounding_box,
            materials,
        })
    }

    pub(crate) fn skeletal_mesh(
        &self,
        mesh_index: usize,
        skin_index: Option<usize>,
        config: &SkeletalMeshConfig,
    ) -> Result<Arc<SkeletalMesh>> {
        let skin_index = match config.ignore_skin {
            true => None,
            false => config.override_skin_index.or(skin_index),
        };
        let key = (mesh_index, skin_index);

        if let Some(mesh) = self.cache().skeletal_meshes.get(&key, config.cache_mode) {
            log::debug!(
                "Skipping duplicate load of glTF skeletal mesh: {} - [{mesh_index}]",
                mesh.name
            );
            return Ok(mesh);
        }

        let mesh = Arc::new(self.build_skeletal_mesh(mesh_index, skin_index, config)?);
        Ok(self.cache().skeletal_meshes.insert(key, mesh, config.cache_mode))
    }

    /// Decodes a mesh bound to the skeleton of `skin_index`.
    ///
    /// Without a skin, the skeleton comes from `custom_skeleton`, the node tree, or a single
    /// root bone, in that order of preference.
    pub fn load_skeletal_mesh(
        &self,
        mesh_index: usize,
        skin_index: Option<usize>,
        config: &SkeletalMeshConfig,
    ) -> Result<Arc<SkeletalMesh>> {
        self.report(
            "LoadSkeletalMesh()",
            self.skeletal_mesh(mesh_index, skin_index, config),
        )
    }

    /// Uses the mesh and skin a node references.
    pub fn load_skeletal_mesh_from_node(
        &self,
        node_index: usize,
        config: &SkeletalMeshConfig,
    ) -> Result<Arc<SkeletalMesh>> {
        let mesh = self.node(node_index).and_then(|node| match node.mesh {
            Some(mesh_index) => self.skeletal_mesh(mesh_index, node.skin, config),
            None => Err(Error::new(
                ErrorKind::InvalidPrimitive,
                format!("Node {} has no mesh", node.name),
            )
            .into()),
        });
        self.report("LoadSkeletalMeshFromNode()", mesh)
    }

    /// Looks the mesh up by name and pairs it with the skin of the first node instancing it.
    pub fn load_skeletal_mesh_by_name(
        &self,
        name: &str,
        config: &SkeletalMeshConfig,
    ) -> Result<Arc<SkeletalMesh>> {
        let mesh = self.mesh_index_by_name(name).and_then(|mesh_index| {
            let skin = self
                .nodes()?
                .iter()
                .find(|node| node.mesh == Some(mesh_index) && node.skin.is_some())
                .and_then(|node| node.skin);
            self.skeletal_mesh(mesh_index, skin, config)
        });
        self.report("LoadSkeletalMeshByName()", mesh)
    }
}
