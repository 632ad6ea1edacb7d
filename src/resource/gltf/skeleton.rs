use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use cgmath::{One, SquareMatrix};

use crate::config::mesh::CustomBone;
use crate::config::SkeletonConfig;
use crate::data::skeleton::{ReferenceSkeleton, Skeleton};
use crate::data::transform::{matrix_from_column_major, Transform};
use crate::error::{Error, ErrorKind};
use crate::resource::gltf::asset::GltfAsset;
use crate::resource::gltf::loader::accessor::{read_floats, AccessorConstraints, Normalization};
use crate::resource::gltf::node::read_node_transform;
use crate::resource::json::{root_item, root_len, JsonValueExt};

fn bone_name(name: &str, config: &SkeletonConfig) -> Result<String> {
    match config.bones_name_map.get(name) {
        Some(mapped) if mapped.is_empty() => Err(Error::new(
            ErrorKind::SkeletonBuildFailure,
            format!("Invalid bone name map for {name}"),
        )
        .into()),
        Some(mapped) => Ok(mapped.clone()),
        None => Ok(String::from(name)),
    }
}

fn add_root_bone(reference: &mut ReferenceSkeleton, config: &SkeletonConfig) -> Option<usize> {
    if !config.add_root_bone {
        return None;
    }
    let name = match config.root_bone_name.is_empty() {
        true => String::from("root"),
        false => config.root_bone_name.clone(),
    };
    Some(reference.add_bone(name, None, Transform::default()))
}

/// Bakes parent scales into translations and resets every scale to one.
fn normalize_scale(reference: &mut ReferenceSkeleton) {
    let mut accumulated = vec![cgmath::Vector3::new(1.0, 1.0, 1.0); reference.len()];

    for index in 0..reference.len() {
        let Some(bone) = reference.bone(index) else {
            continue;
        };
        let parent_scale = bone
            .parent
            .map_or(cgmath::Vector3::new(1.0, 1.0, 1.0), |parent| accumulated[parent]);
        let mut transform = bone.transform;

        accumulated[index] = cgmath::Vector3::new(
            parent_scale.x * transform.scale.x,
            parent_scale.y * transform.scale.y,
            parent_scale.z * transform.scale.z,
        );
        transform.translation = cgmath::Vector3::new(
            transform.translation.x * parent_scale.x,
            transform.translation.y * parent_scale.y,
            transform.translation.z * parent_scale.z,
        );
        transform.scale = cgmath::Vector3::new(1.0, 1.0, 1.0);
        reference.set_transform(index, transform);
    }
}

/// Pushes every rotation down into the child translations, leaving identity rotations.
fn clear_rotations(reference: &mut ReferenceSkeleton) {
    let mut accumulated = vec![cgmath::Quaternion::one(); reference.len()];

    for index in 0..reference.len() {
        let Some(bone) = reference.bone(index) else {
            continue;
        };
        let parent_rotation = bone
            .parent
            .map_or(cgmath::Quaternion::one(), |parent| accumulated[parent]);
        let mut transform = bone.transform;

        transform.translation = parent_rotation * transform.translation;
        accumulated[index] = parent_rotation * transform.rotation;
        transform.rotation = cgmath::Quaternion::one();
        reference.set_transform(index, transform);
    }
}

/// Takes rotations from the same-named bone of `source`, falling back to the nearest ancestor
/// that `source` knows.
fn copy_rotations(reference: &mut ReferenceSkeleton, source: &ReferenceSkeleton) {
    for index in 0..reference.len() {
        let mut candidate = Some(index);
        let mut source_index = None;
        while let Some(current) = candidate {
            let Some(bone) = reference.bone(current) else {
                break;
            };
            source_index = source.find_bone(&bone.name);
            if source_index.is_some() {
                break;
            }
            candidate = bone.parent;
        }

        let (Some(source_index), Some(bone)) = (source_index, reference.bone(index)) else {
            continue;
        };
        let Some(source_bone) = source.bone(source_index) else {
            continue;
        };

        let mut parent_rotations = cgmath::Quaternion::one();
        let mut source_parent = source_bone.parent;
        while let Some(parent) = source_parent {
            let Some(parent_bone) = source.bone(parent) else {
                break;
            };
            parent_rotations = parent_bone.transform.rotation * parent_rotations;
            source_parent = parent_bone.parent;
        }

        let mut transform = bone.transform;
        transform.rotation = source_bone.transform.rotation;
        transform.translation = parent_rotations.conjugate() * transform.translation;
        reference.set_transform(index, transform);
    }
}

fn apply_deltas(reference: &mut ReferenceSkeleton, deltas: &HashMap<String, Transform>) {
    for index in 0..reference.len() {
        let Some(bone) = reference.bone(index) else {
            continue;
        };
        if let Some(delta) = deltas.get(&bone.name) {
            let transform = delta.compose(&bone.transform);
            reference.set_transform(index, transform);
        }
    }
}

/// Post-processing shared by every skeleton source, in a fixed order.
pub(crate) fn post_process(reference: &mut ReferenceSkeleton, config: &SkeletonConfig) {
    if config.normalize_skeleton_scale {
        normalize_scale(reference);
    }
    if config.clear_rotations || config.copy_rotations_from.is_some() {
        clear_rotations(reference);
    }
    if let Some(source) = &config.copy_rotations_from {
        copy_rotations(reference, source);
    }
    if !config.bones_delta_transform_map.is_empty() {
        apply_deltas(reference, &config.bones_delta_transform_map);
    }
}

/// Builds a reference skeleton from an explicit bone list. Parents must precede children.
pub(crate) fn custom_skeleton(bones: &[CustomBone]) -> Result<ReferenceSkeleton> {
    let mut reference = ReferenceSkeleton::new();

    for (index, bone) in bones.iter().enumerate() {
        if let Some(parent) = bone.parent {
            if parent >= index {
                return Err(Error::new(
                    ErrorKind::SkeletonBuildFailure,
                    format!(
                        "Custom bone {} has parent {parent} which does not precede it",
                        bone.name
                    ),
                )
                .into());
            }
        }
        let name = reference.unique_name(&bone.name);
        reference.add_bone(name, bone.parent, bone.transform);
    }

    if reference.is_empty() {
        return Err(Error::new(
            ErrorKind::SkeletonBuildFailure,
            String::from("The custom skeleton has no bones"),
        )
        .into());
    }

    Ok(reference)
}

impl GltfAsset {
    fn skeleton_root(
        &self,
        skin: &serde_json::Value,
        joints: &[usize],
        config: &SkeletonConfig,
    ) -> Result<usize> {
        if let Some(root) = config.root_node_index.or_else(|| skin.get_index("skeleton")) {
            self.node(root)?;
            return Ok(root);
        }

        let mut root = self.common_root(joints)?;
        if config.promote_joint_ancestors {
            let skin_joints: HashSet<usize> = (0..root_len(self.root(), "skins"))
                .filter_map(|index| root_item(self.root(), "skins", index).ok())
                .flat_map(|skin| skin.get_indices("joints"))
                .collect();
            while let Some(parent) = self.node(root)?.parent {
                if !skin_joints.contains(&parent) {
                    break;
                }
                root = parent;
            }
        }
        Ok(root)
    }

    /// Inverse-bind matrices in glTF space, keyed by joint node.
    fn inverse_bind_matrices(
        &self,
        skin: &serde_json::Value,
        joints: &[usize],
    ) -> Result<HashMap<usize, cgmath::Matrix4<f32>>> {
        let Some(accessor) = skin.get_index("inverseBindMatrices") else {
            return Ok(HashMap::new());
        };

        let stream = read_floats(
            self.loader(),
            accessor,
            &AccessorConstraints::matrices(),
            Normalization::Never,
        )?;
        if stream.len() != joints.len() {
            return Err(Error::new(
                ErrorKind::InverseBindMatrixAccessorMismatch,
                format!(
                    "Found {} inverse bind matrices for {} joints",
                    stream.len(),
                    joints.len()
                ),
            )
            .into());
        }

        Ok(joints
            .iter()
            .zip(stream.items())
            .filter_map(|(joint, values)| Some((*joint, matrix_from_column_major(values)?)))
            .collect())
    }

    fn build_skeleton(&self, skin_index: usize, config: &SkeletonConfig) -> Result<Skeleton> {
        let skin = root_item(self.root(), "skins", skin_index)?;
        let nodes = self.nodes()?;

        log::debug!(
            "Loading glTF skin: {} - [{skin_index}]",
            skin.get_name().unwrap_or("<UNNAMED>")
        );

        let joints = skin.get_indices("joints");
        if joints.is_empty() {
            return Err(Error::new(
                ErrorKind::EmptyJoints,
                format!("Skin {skin_index} has no joints"),
            )
            .into());
        }
        if let Some(invalid) = joints.iter().find(|joint| **joint >= nodes.len()) {
            return Err(Error::new(
                ErrorKind::JointOutOfRange,
                format!("Skin {skin_index} references joint node {invalid} of {}", nodes.len()),
            )
            .into());
        }

        let root = self.skeleton_root(skin, &joints, config)?;
        let inverse_bind_matrices = self.inverse_bind_matrices(skin, &joints)?;
        if inverse_bind_matrices.is_empty() {
            log::warn!("Skin {skin_index} has no inverse bind matrices, using node transforms");
        }

        let joint_slots: HashMap<usize, usize> = joints
            .iter()
            .enumerate()
            .map(|(slot, node)| (*node, slot))
            .collect();

        let mut reference = ReferenceSkeleton::new();
        let mut bone_map = BTreeMap::new();
        let mut node_bone_map = HashMap::new();
        let mut visited = HashSet::new();

        let root_parent = add_root_bone(&mut reference, config);
        let mut stack = vec![(root, root_parent, cgmath::Matrix4::<f32>::identity())];

        while let Some((node_index, parent_bone, parent_world)) = stack.pop() {
            if !visited.insert(node_index) {
                return Err(Error::new(
                    ErrorKind::MalformedNodeGraph,
                    format!("Node {node_index} is reachable twice from skeleton root {root}"),
                )
                .into());
            }

            let node = &nodes[node_index];
            let json = root_item(self.root(), "nodes", node_index)?;
            let local = read_node_transform(json).to_matrix();

            let world = match inverse_bind_matrices.get(&node_index) {
                Some(inverse_bind) if !config.node_bones_delta_transform => inverse_bind
                    .invert()
                    .unwrap_or_else(|| parent_world * local),
                _ => parent_world * local,
            };
            let bone_local = parent_world
                .invert()
                .unwrap_or_else(cgmath::Matrix4::identity)
                * world;

            let name = reference.unique_name(&bone_name(&node.name, config)?);
            let transform = Transform::from(self.basis().matrix4(&bone_local));
            let bone = reference.add_bone(name.clone(), parent_bone, transform);

            if let Some(slot) = joint_slots.get(&node_index) {
                bone_map.insert(*slot, name.clone());
            }
            node_bone_map.insert(node_index, name);

            for child in node.children.iter().rev() {
                stack.push((*child, Some(bone), world));
            }
        }

        if let Some((slot, node)) = joints
            .iter()
            .enumerate()
            .find(|(slot, _)| !bone_map.contains_key(slot))
        {
            return Err(Error::new(
                ErrorKind::SkeletonBuildFailure,
                format!("Joint {slot} (node {node}) is not reachable from skeleton root {root}"),
            )
            .into());
        }

        post_process(&mut reference, config);

        Ok(Skeleton::new(reference, bone_map, node_bone_map, Some(root)))
    }

    pub(crate) fn skeleton(
        &self,
        skin_index: usize,
        config: &SkeletonConfig,
    ) -> Result<Arc<Skeleton>> {
        if let Some(skeleton) = self.cache().skeletons.get(&skin_index, config.cache_mode) {
            log::debug!("Skipping duplicate load of glTF skin: [{skin_index}]");
            return Ok(skeleton);
        }

        let skeleton = Arc::new(self.build_skeleton(skin_index, config)?);
        Ok(self.cache().skeletons.insert(skin_index, skeleton, config.cache_mode))
    }

    /// Builds the reference skeleton of a skin.
    pub fn load_skeleton(
        &self,
        skin_index: usize,
        config: &SkeletonConfig,
    ) -> Result<Arc<Skeleton>> {
        self.report("LoadSkeleton()", self.skeleton(skin_index, config))
    }

    /// Flattens the subtree under `root` into bones, using node transforms as rest poses.
    pub(crate) fn node_tree_skeleton(
        &self,
        root: usize,
        config: &SkeletonConfig,
    ) -> Result<Skeleton> {
        let nodes = self.nodes()?;
        self.node(root)?;

        let mut reference = ReferenceSkeleton::new();
        let mut node_bone_map = HashMap::new();
        let mut visited = HashSet::new();

        let root_parent = add_root_bone(&mut reference, config);
        let mut stack = vec![(root, root_parent)];

        while let Some((node_index, parent_bone)) = stack.pop() {
            if !visited.insert(node_index) {
                return Err(Error::new(
                    ErrorKind::MalformedNodeGraph,
                    format!("Node {node_index} is reachable twice from node {root}"),
                )
                .into());
            }

            let node = &nodes[node_index];
            let name = reference.unique_name(&bone_name(&node.name, config)?);
            let bone = reference.add_bone(name.clone(), parent_bone, node.transform);
            node_bone_map.insert(node_index, name);

            for child in node.children.iter().rev() {
                stack.push((*child, Some(bone)));
            }
        }

        post_process(&mut reference, config);

        Ok(Skeleton::new(reference, BTreeMap::new(), node_bone_map, Some(root)))
    }

    pub fn load_node_tree_skeleton(
        &self,
        root: usize,
        config: &SkeletonConfig,
    ) -> Result<Skeleton> {
        self.report("LoadNodeTreeSkeleton()", self.node_tree_skeleton(root, config))
    }
}
