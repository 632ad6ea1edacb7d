use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::error::{Error, ErrorKind};
use crate::resource::blob::{read_relative_file, BlobSource};

/// Resolves URIs relative to the directory of a document on disk.
#[derive(Debug)]
pub struct FileSystemBlobSource {
    pub root: PathBuf,
}

impl FileSystemBlobSource {
    /// Reads the document at `path`, returning its bytes and a source rooted at its directory.
    pub fn from_path(path: &Path) -> Result<(Vec<u8>, Self)> {
        let absolute_path = match path.canonicalize() {
            Ok(absolute_path) => absolute_path,
            Err(error) => {
                return Err(Error::new(
                    ErrorKind::Io,
                    format!("Unable to resolve the given path {}: {error}", path.display()),
                )
                .into())
            }
        };

        if !absolute_path.is_file() {
            return Err(Error::new(
                ErrorKind::Io,
                format!("The given path is not a file: {}", path.display()),
            )
            .into());
        }

        let root = match absolute_path.parent() {
            Some(root) => root.to_path_buf(),
            None => {
                return Err(Error::new(
                    ErrorKind::Io,
                    format!(
                        "Unable to find the parent directory of the given path: {}",
                        path.display()
                    ),
                )
                .into())
            }
        };

        let data = match std::fs::read(&absolute_path) {
            Ok(data) => data,
            Err(error) => {
                return Err(Error::new(
                    ErrorKind::Io,
                    format!("Unable to read {}: {error}", absolute_path.display()),
                )
                .into())
            }
        };

        Ok((data, Self { root }))
    }
}

impl BlobSource for FileSystemBlobSource {
    fn read_uri(&self, uri: &str, allow_external_files: bool) -> Result<Vec<u8>> {
        read_relative_file(&self.root, uri, allow_external_files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind_of;

    #[test]
    fn reads_siblings_of_document() {
        let directory =
            std::env::temp_dir().join(format!("gltf_runtime_blob_{}", std::process::id()));
        std::fs::create_dir_all(&directory).unwrap();
        std::fs::write(directory.join("scene.gltf"), b"{}").unwrap();
        std::fs::write(directory.join("data.bin"), [1u8, 2, 3]).unwrap();

        let (document, source) =
            FileSystemBlobSource::from_path(&directory.join("scene.gltf")).unwrap();
        assert_eq!(document, b"{}");
        assert_eq!(source.read_uri("data.bin", true).unwrap(), vec![1, 2, 3]);

        let error = source.read_uri("data.bin", false).unwrap_err();
        assert_eq!(kind_of(&error), Some(ErrorKind::MissingSource));

        std::fs::remove_dir_all(&directory).unwrap();
    }

    #[test]
    fn rejects_directories() {
        let error = FileSystemBlobSource::from_path(&std::env::temp_dir()).unwrap_err();
        assert_eq!(kind_of(&error), Some(ErrorKind::Io));
    }
}
