use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use crate::error::{Error, ErrorKind};
use crate::resource::json::{root_item, JsonValueExt};

pub mod accessor;
pub mod blob;

/// A bufferView resolved against its (shared) buffer bytes.
#[derive(Clone, Debug)]
pub struct BufferViewSlice {
    pub buffer: Arc<Vec<u8>>,
    pub offset: usize,
    pub length: usize,
    pub stride: Option<usize>,
}

impl BufferViewSlice {
    pub fn bytes(&self) -> &[u8] {
        &self.buffer[self.offset..self.offset + self.length]
    }
}

/// Raw byte access for a parsed document; everything above this works on decoded values.
pub trait GltfLoader: Send + Sync {
    fn root(&self) -> &Value;

    /// Bytes of `buffers[index]`, decoded once and shared afterwards.
    fn load_buffer(&self, buffer_index: usize) -> Result<Arc<Vec<u8>>>;

    /// Resolves a data URI or a URI relative to the document.
    fn load_uri(&self, uri: &str) -> Result<Vec<u8>>;

    fn clear_buffers(&self);

    fn load_buffer_view(&self, view_index: usize) -> Result<BufferViewSlice> {
        let view = root_item(self.root(), "bufferViews", view_index)?;

        let buffer_index = match view.get_index("buffer") {
            Some(buffer_index) => buffer_index,
            None => {
                return Err(Error::new(
                    ErrorKind::MalformedJson,
                    format!("The bufferView has no buffer: {view_index}"),
                )
                .into())
            }
        };

        let length = match view.get_index("byteLength") {
            Some(length) => length,
            None => {
                return Err(Error::new(
                    ErrorKind::MalformedJson,
                    format!("The bufferView has no byteLength: {view_index}"),
                )
                .into())
            }
        };

        let offset = view.get_index("byteOffset").unwrap_or(0);
        let buffer = self.load_buffer(buffer_index)?;

        if !matches!(offset.checked_add(length), Some(end) if end <= buffer.len()) {
            return Err(Error::new(
                ErrorKind::OutOfRange,
                format!(
                    "bufferView {view_index} spans {length} bytes from {offset}, buffer {buffer_index} has {}",
                    buffer.len()
                ),
            )
            .into());
        }

        Ok(BufferViewSlice {
            buffer,
            offset,
            length,
            stride: view.get_index("byteStride").filter(|stride| *stride > 0),
        })
    }
}
