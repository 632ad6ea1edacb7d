use anyhow::Result;

use crate::args::Args;
use crate::config::RuntimeConfig;

pub mod args;
pub mod config;
pub mod data;
pub mod error;
pub mod resource;
mod summary;

pub use crate::error::{Error, ErrorKind};
pub use crate::resource::gltf::asset::GltfAsset;
pub use crate::resource::task::{HostQueue, TaskHandle, TaskStatus};
pub use crate::summary::Summary;

pub fn run(args: Args) -> Result<()> {
    env_logger::init();

    let mut config = match &args.config {
        Some(path) => RuntimeConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => RuntimeConfig::default(),
    };
    if let Some(scene_scale) = args.scene_scale {
        config.scene_scale = scene_scale;
    }
    if let Some(entry) = args.archive_entry {
        config.archive_entry_point = Some(entry);
    }

    let asset = GltfAsset::load_from_file(&args.path, config)?;
    let summary = Summary::new(&asset, args.frames_per_second)?;
    log::info!(
        "Loaded {}: {} scenes, {} nodes, {} meshes, {} skins, {} animations, {} materials",
        args.path.display(),
        summary.scenes.len(),
        summary.node_count,
        summary.meshes.len(),
        summary.skins.len(),
        summary.animations.len(),
        summary.materials.len(),
    );
    print!("{summary}");
    Ok(())
}
