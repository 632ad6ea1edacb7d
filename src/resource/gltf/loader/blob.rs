use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use crate::config::CacheMode;
use crate::error::{Error, ErrorKind};
use crate::resource::blob::{decode_data_uri, is_data_uri, BlobSource};
use crate::resource::cache::Registry;
use crate::resource::gltf::loader::GltfLoader;
use crate::resource::json::{root_item, JsonValueExt};

/// Loader over any `BlobSource` plus the optional GLB binary chunk.
pub struct BlobGltfLoader {
    root: Arc<Value>,
    source: Box<dyn BlobSource>,
    binary_chunk: Option<Arc<Vec<u8>>>,
    allow_external_files: bool,
    buffer_registry: Registry<usize, Vec<u8>>,
}

impl BlobGltfLoader {
    pub fn new(
        root: Arc<Value>,
        source: Box<dyn BlobSource>,
        binary_chunk: Option<Vec<u8>>,
        allow_external_files: bool,
    ) -> Self {
        Self {
            root,
            source,
            binary_chunk: binary_chunk.map(Arc::new),
            allow_external_files,
            buffer_registry: Registry::default(),
        }
    }

    fn read_buffer(&self, buffer_index: usize) -> Result<Arc<Vec<u8>>> {
        let buffer = root_item(&self.root, "buffers", buffer_index)?;

        // only the first buffer may refer to the BIN chunk
        let data = match (buffer.get_string("uri"), &self.binary_chunk) {
            (Some(uri), _) => Arc::new(self.load_uri(uri)?),
            (None, Some(binary_chunk)) if buffer_index == 0 => binary_chunk.clone(),
            (None, _) => {
                return Err(Error::new(
                    ErrorKind::MissingSource,
                    format!("Buffer {buffer_index} has no uri and no BIN chunk to refer to"),
                )
                .into())
            }
        };

        // the BIN chunk may carry up to 3 bytes of padding past byteLength
        let declared = buffer.get_index("byteLength").unwrap_or(data.len());
        if data.len() < declared {
            return Err(Error::new(
                ErrorKind::MissingSource,
                format!(
                    "Buffer {buffer_index} declares {declared} bytes but its source holds {}",
                    data.len()
                ),
            )
            .into());
        }

        Ok(data)
    }
}

impl GltfLoader for BlobGltfLoader {
    fn root(&self) -> &Value {
        &self.root
    }

    fn load_buffer(&self, buffer_index: usize) -> Result<Arc<Vec<u8>>> {
        if let Some(data) = self.buffer_registry.get(&buffer_index, CacheMode::ReadWrite) {
            return Ok(data);
        }

        log::debug!("Loading glTF buffer: [{buffer_index}]");
        let data = self.read_buffer(buffer_index)?;
        Ok(self
            .buffer_registry
            .insert(buffer_index, data, CacheMode::ReadWrite))
    }

    fn load_uri(&self, uri: &str) -> Result<Vec<u8>> {
        if is_data_uri(uri) {
            return decode_data_uri(uri);
        }
        self.source.read_uri(uri, self.allow_external_files)
    }

    fn clear_buffers(&self) {
        self.buffer_registry.clear();
    }
}
