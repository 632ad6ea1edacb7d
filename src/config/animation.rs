use std::sync::Arc;

use crate::config::CacheMode;
use crate::data::skeleton::ReferenceSkeleton;

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct SkeletalAnimationConfig {
    pub cache_mode: CacheMode,
    pub frames_per_second: f32,
    /// Node whose composed world transform drives the root bone when `root_motion` is set.
    pub root_node_index: Option<usize>,
    pub root_motion: bool,
    pub remove_root_motion: bool,
    pub remove_translations: bool,
    pub remove_rotations: bool,
    pub remove_scales: bool,
    pub remove_morph_targets: bool,
    #[serde(skip)]
    pub retarget_to: Option<Arc<ReferenceSkeleton>>,
}

impl Default for SkeletalAnimationConfig {
    fn default() -> Self {
        Self {
            cache_mode: CacheMode::ReadWrite,
            frames_per_second: 30.0,
            root_node_index: None,
            root_motion: false,
            remove_root_motion: false,
            remove_translations: false,
            remove_rotations: false,
            remove_scales: false,
            remove_morph_targets: false,
            retarget_to: None,
        }
    }
}
