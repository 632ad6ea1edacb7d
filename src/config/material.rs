use std::collections::HashMap;
use std::sync::Arc;

use crate::config::CacheMode;
use crate::data::material::Material;

#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub max_width: u32,
    pub max_height: u32,
    /// Forces the color space of every decoded image instead of deriving it from its usage.
    pub srgb: Option<bool>,
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct MaterialsConfig {
    pub cache_mode: CacheMode,
    pub generate_mip_maps: bool,
    pub skip_textures: bool,
    #[serde(skip)]
    pub materials_override_by_index: HashMap<usize, Arc<Material>>,
    #[serde(skip)]
    pub materials_override_by_name: HashMap<String, Arc<Material>>,
    pub specular_factor: Option<f32>,
    pub images_config: ImagesConfig,
    pub disable_vertex_colors: bool,
    pub params_multiplier: HashMap<String, f32>,
}

impl Default for MaterialsConfig {
    fn default() -> Self {
        Self {
            cache_mode: CacheMode::ReadWrite,
            generate_mip_maps: false,
            skip_textures: false,
            materials_override_by_index: HashMap::new(),
            materials_override_by_name: HashMap::new(),
            specular_factor: None,
            images_config: ImagesConfig::default(),
            disable_vertex_colors: false,
            params_multiplier: HashMap::new(),
        }
    }
}
