use std::collections::HashMap;
use std::sync::Arc;

use crate::config::CacheMode;
use crate::data::skeleton::ReferenceSkeleton;
use crate::data::transform::Transform;

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct SkeletonConfig {
    pub cache_mode: CacheMode,
    /// Forces the skeleton root to this node instead of the skin's `skeleton` or the common root.
    pub root_node_index: Option<usize>,
    /// Builds the skeleton from the node tree when the mesh has no usable skin.
    pub fallback_to_node_tree: bool,
    /// Takes bone rest poses from node transforms even when inverse-bind matrices exist.
    pub node_bones_delta_transform: bool,
    pub add_root_bone: bool,
    pub root_bone_name: String,
    pub bones_name_map: HashMap<String, String>,
    pub assign_unmapped_bones_to_parent: bool,
    pub normalize_skeleton_scale: bool,
    pub clear_rotations: bool,
    #[serde(skip)]
    pub copy_rotations_from: Option<Arc<ReferenceSkeleton>>,
    pub bones_delta_transform_map: HashMap<String, Transform>,
    /// Walks the computed common root further up while its ancestors are joints themselves.
    pub promote_joint_ancestors: bool,
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            cache_mode: CacheMode::ReadWrite,
            root_node_index: None,
            fallback_to_node_tree: false,
            node_bones_delta_transform: false,
            add_root_bone: false,
            root_bone_name: String::from("root"),
            bones_name_map: HashMap::new(),
            assign_unmapped_bones_to_parent: false,
            normalize_skeleton_scale: false,
            clear_rotations: false,
            copy_rotations_from: None,
            bones_delta_transform_map: HashMap::new(),
            promote_joint_ancestors: false,
        }
    }
}
