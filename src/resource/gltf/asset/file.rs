use std::path::Path;

use anyhow::Result;

use crate::config::RuntimeConfig;
use crate::resource::blob::file::FileSystemBlobSource;
use crate::resource::gltf::asset::GltfAsset;

impl GltfAsset {
    /// Loads a document from disk; sibling URIs resolve against its directory, or against
    /// `config.base_directory` when set.
    pub fn load_from_file(path: &Path, config: RuntimeConfig) -> Result<Self> {
        log::debug!("Loading glTF file: {}", path.display());

        let (data, mut source) = FileSystemBlobSource::from_path(path)?;
        if let Some(base_directory) = &config.base_directory {
            source.root = base_directory.clone();
        }

        Self::load_from_source(data, config, Box::new(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::blob::glb;

    #[test]
    fn loads_glb_from_disk() {
        let directory =
            std::env::temp_dir().join(format!("gltf_runtime_asset_{}", std::process::id()));
        std::fs::create_dir_all(&directory).unwrap();

        let json = br#"{"asset":{"version":"2.0"},"buffers":[{"byteLength":4}]}"#;
        let path = directory.join("model.glb");
        std::fs::write(&path, glb::write(json, Some(&[1u8, 2, 3, 4][..])).unwrap()).unwrap();

        let asset = GltfAsset::load_from_file(&path, RuntimeConfig::default()).unwrap();
        assert_eq!(*asset.loader().load_buffer(0).unwrap(), vec![1, 2, 3, 4]);

        std::fs::remove_dir_all(&directory).unwrap();
    }

    #[test]
    fn missing_file_fails() {
        let path = std::env::temp_dir().join("gltf_runtime_missing_model.gltf");
        assert!(GltfAsset::load_from_file(&path, RuntimeConfig::default()).is_err());
    }
}
