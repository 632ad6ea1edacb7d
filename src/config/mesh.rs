use std::collections::HashMap;

use crate::config::material::MaterialsConfig;
use crate::config::skeleton::SkeletonConfig;
use crate::config::CacheMode;
use crate::data::transform::Transform;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
pub enum NormalsGenerationStrategy {
    Never,
    #[default]
    IfMissing,
    Always,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
pub enum TangentsGenerationStrategy {
    Never,
    #[default]
    IfMissing,
    Always,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
pub enum PivotPosition {
    #[default]
    Asset,
    Center,
    Top,
    Bottom,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
pub enum MorphTargetsDuplicateStrategy {
    #[default]
    Ignore,
    Merge,
    AppendDuplicateCounter,
    AppendMorphIndex,
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct StaticMeshConfig {
    pub cache_mode: CacheMode,
    pub reverse_winding: bool,
    pub pivot_position: PivotPosition,
    pub normals_generation_strategy: NormalsGenerationStrategy,
    pub tangents_generation_strategy: TangentsGenerationStrategy,
    /// Multiplier applied to the handedness of generated tangents.
    pub tangents_sign: f32,
    pub reverse_tangents: bool,
    pub lod_screen_size: HashMap<usize, f32>,
    pub lod_screen_size_multiplier: f32,
    pub merge_primitives: bool,
    pub materials_config: MaterialsConfig,
}

impl Default for StaticMeshConfig {
    fn default() -> Self {
        Self {
            cache_mode: CacheMode::ReadWrite,
            reverse_winding: false,
            pivot_position: PivotPosition::Asset,
            normals_generation_strategy: NormalsGenerationStrategy::IfMissing,
            tangents_generation_strategy: TangentsGenerationStrategy::IfMissing,
            tangents_sign: 1.0,
            reverse_tangents: false,
            lod_screen_size: HashMap::new(),
            lod_screen_size_multiplier: 1.0,
            merge_primitives: false,
            materials_config: MaterialsConfig::default(),
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct CustomBone {
    pub name: String,
    pub parent: Option<usize>,
    #[serde(default)]
    pub transform: Transform,
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct SkeletalMeshConfig {
    pub cache_mode: CacheMode,
    pub skeleton_config: SkeletonConfig,
    pub ignore_skin: bool,
    pub override_skin_index: Option<usize>,
    pub custom_skeleton: Vec<CustomBone>,
    pub morph_targets_duplicate_strategy: MorphTargetsDuplicateStrategy,
    pub ignore_empty_morph_targets: bool,
    pub normals_generation_strategy: NormalsGenerationStrategy,
    pub tangents_generation_strategy: TangentsGenerationStrategy,
    pub tangents_sign: f32,
    pub reverse_tangents: bool,
    pub materials_config: MaterialsConfig,
}

impl Default for SkeletalMeshConfig {
    fn default() -> Self {
        Self {
            cache_mode: CacheMode::ReadWrite,
            skeleton_config: SkeletonConfig::default(),
            ignore_skin: false,
            override_skin_index: None,
            custom_skeleton: vec![],
            morph_targets_duplicate_strategy: MorphTargetsDuplicateStrategy::Ignore,
            ignore_empty_morph_targets: false,
            normals_generation_strategy: NormalsGenerationStrategy::IfMissing,
            tangents_generation_strategy: TangentsGenerationStrategy::IfMissing,
            tangents_sign: 1.0,
            reverse_tangents: false,
            materials_config: MaterialsConfig::default(),
        }
    }
}

/// The subset of settings the primitive assembler needs, shared by static and skeletal meshes.
#[derive(Copy, Clone, Debug)]
pub struct PrimitiveOptions {
    pub normals_generation_strategy: NormalsGenerationStrategy,
    pub tangents_generation_strategy: TangentsGenerationStrategy,
    pub tangents_sign: f32,
    pub reverse_tangents: bool,
    pub reverse_winding: bool,
    pub morph_targets_duplicate_strategy: MorphTargetsDuplicateStrategy,
    pub ignore_empty_morph_targets: bool,
}

impl From<&StaticMeshConfig> for PrimitiveOptions {
    fn from(value: &StaticMeshConfig) -> Self {
        Self {
            normals_generation_strategy: value.normals_generation_strategy,
            tangents_generation_strategy: value.tangents_generation_strategy,
            tangents_sign: value.tangents_sign,
            reverse_tangents: value.reverse_tangents,
            reverse_winding: value.reverse_winding,
            morph_targets_duplicate_strategy: MorphTargetsDuplicateStrategy::Ignore,
            ignore_empty_morph_targets: false,
        }
    }
}

impl From<&SkeletalMeshConfig> for PrimitiveOptions {
    fn from(value: &SkeletalMeshConfig) -> Self {
        Self {
            normals_generation_strategy: value.normals_generation_strategy,
            tangents_generation_strategy: value.tangents_generation_strategy,
            tangents_sign: value.tangents_sign,
            reverse_tangents: value.reverse_tangents,
            reverse_winding: false,
            morph_targets_duplicate_strategy: value.morph_targets_duplicate_strategy,
            ignore_empty_morph_targets: value.ignore_empty_morph_targets,
        }
    }
}

impl Default for PrimitiveOptions {
    fn default() -> Self {
        Self::from(&StaticMeshConfig::default())
    }
}
