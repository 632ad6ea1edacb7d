use std::path::PathBuf;

use clap::{Args, Parser};

/// Loads a glTF 2.0 asset and prints a summary of its contents
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a .gltf, .glb, gzip or zip file
    pub path: PathBuf,

    #[command(flatten)]
    pub loading: LoadingOptions,

    /// Sampling rate used to report animation frame counts
    #[arg(short = 'f', long, default_value_t = 30.0)]
    pub frames_per_second: f32,
}

#[derive(Args, Debug, Clone)]
pub struct LoadingOptions {
    /// Path to a JSON file holding the runtime configuration
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Multiplier applied to every length after the basis change
    #[arg(short = 's', long)]
    pub scene_scale: Option<f32>,

    /// Name of the glTF entry inside a zip archive
    #[arg(short = 'e', long)]
    pub archive_entry: Option<String>,
}

impl From<Cli> for gltf_runtime::args::Args {
    fn from(value: Cli) -> Self {
        gltf_runtime::args::Args {
            path: value.path,
            config: value.loading.config,
            scene_scale: value.loading.scene_scale,
            frames_per_second: value.frames_per_second,
            archive_entry: value.loading.archive_entry,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn converts_to_args() {
        let cli = Cli::parse_from([
            "gltf_inspect",
            "scene.glb",
            "--scene-scale",
            "1",
            "-e",
            "a.gltf",
        ]);
        let args: gltf_runtime::args::Args = cli.into();
        assert_eq!(args.path, PathBuf::from("scene.glb"));
        assert_eq!(args.scene_scale, Some(1.0));
        assert_eq!(args.archive_entry.as_deref(), Some("a.gltf"));
        assert_eq!(args.frames_per_second, 30.0);
        assert!(args.config.is_none());
    }
}
