use std::path::PathBuf;

use anyhow::Result;

use crate::data::basis::Basis;

pub mod animation;
pub mod material;
pub mod mesh;
pub mod skeleton;

pub use animation::SkeletalAnimationConfig;
pub use material::{ImagesConfig, MaterialsConfig};
pub use mesh::{
    MorphTargetsDuplicateStrategy, NormalsGenerationStrategy, PivotPosition, SkeletalMeshConfig,
    StaticMeshConfig, TangentsGenerationStrategy,
};
pub use skeleton::SkeletonConfig;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
pub enum CacheMode {
    #[default]
    ReadWrite,
    None,
    Read,
    Write,
}

impl CacheMode {
    pub fn can_read(&self) -> bool {
        matches!(self, CacheMode::Read | CacheMode::ReadWrite)
    }

    pub fn can_write(&self) -> bool {
        matches!(self, CacheMode::Write | CacheMode::ReadWrite)
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct LightConfig {
    /// Attenuation radius per unit of intensity, in host units, for lights without a `range`.
    pub default_attenuation_multiplier: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            default_attenuation_multiplier: 1.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
pub enum BasisType {
    /// Left-handed, Z-up.
    #[default]
    Default,
    Identity,
    YForward,
    /// Row-major 3x3 matrix mapping glTF axes to host axes.
    Matrix([[f32; 3]; 3]),
}

/// Document-wide settings, fixed at ingest time.
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub basis_type: BasisType,
    pub scene_scale: f32,
    pub allow_external_files: bool,
    pub base_directory: Option<PathBuf>,
    pub archive_entry_point: Option<String>,
    pub archive_additional_entry_points: Vec<String>,
    /// Extensions the caller handles itself; they count as supported for `extensionsRequired`.
    pub additional_supported_extensions: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            basis_type: BasisType::Default,
            scene_scale: 100.0,
            allow_external_files: true,
            base_directory: None,
            archive_entry_point: None,
            archive_additional_entry_points: vec![],
            additional_supported_extensions: vec![],
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn basis(&self) -> Result<Basis> {
        match &self.basis_type {
            BasisType::Default => Basis::new(Basis::z_up(1.0).matrix(), self.scene_scale),
            BasisType::Identity => Basis::new(Basis::identity(1.0).matrix(), self.scene_scale),
            BasisType::YForward => Basis::new(Basis::y_forward(1.0).matrix(), self.scene_scale),
            BasisType::Matrix(rows) => {
                let matrix = cgmath::Matrix3::new(
                    rows[0][0], rows[1][0], rows[2][0], rows[0][1], rows[1][1], rows[2][1],
                    rows[0][2], rows[1][2], rows[2][2],
                );
                Basis::new(matrix, self.scene_scale)
            }
        }
    }
}
