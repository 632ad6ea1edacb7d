use base64::Engine;
use serde_json::{json, Value};

use crate::config::{BasisType, RuntimeConfig};
use crate::resource::gltf::asset::GltfAsset;

/// Assembles a single-buffer document with one bufferView per accessor.
#[derive(Default)]
pub(crate) struct DocumentBuilder {
    bytes: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(
        &mut self,
        data: &[u8],
        component_type: u32,
        accessor_type: &str,
        count: usize,
    ) -> usize {
        while self.bytes.len() % 4 != 0 {
            self.bytes.push(0);
        }

        self.views.push(json!({
            "buffer": 0,
            "byteOffset": self.bytes.len(),
            "byteLength": data.len()
        }));
        self.bytes.extend_from_slice(data);

        self.accessors.push(json!({
            "bufferView": self.views.len() - 1,
            "componentType": component_type,
            "count": count,
            "type": accessor_type
        }));
        self.accessors.len() - 1
    }

    fn elements(accessor_type: &str) -> usize {
        match accessor_type {
            "VEC2" => 2,
            "VEC3" => 3,
            "VEC4" => 4,
            "MAT4" => 16,
            _ => 1,
        }
    }

    pub fn floats(&mut self, values: &[f32], accessor_type: &str) -> usize {
        let data: Vec<u8> = values.iter().flat_map(|value| value.to_le_bytes()).collect();
        let count = values.len() / Self::elements(accessor_type);
        self.push(&data, 5126, accessor_type, count)
    }

    pub fn u16s(&mut self, values: &[u16], accessor_type: &str) -> usize {
        let data: Vec<u8> = values.iter().flat_map(|value| value.to_le_bytes()).collect();
        let count = values.len() / Self::elements(accessor_type);
        self.push(&data, 5123, accessor_type, count)
    }

    pub fn u8s(&mut self, values: &[u8], accessor_type: &str) -> usize {
        let count = values.len() / Self::elements(accessor_type);
        self.push(values, 5121, accessor_type, count)
    }

    /// Raw bytes exposed through a bufferView only (images, audio).
    pub fn view(&mut self, data: &[u8]) -> usize {
        while self.bytes.len() % 4 != 0 {
            self.bytes.push(0);
        }
        self.views.push(json!({
            "buffer": 0,
            "byteOffset": self.bytes.len(),
            "byteLength": data.len()
        }));
        self.bytes.extend_from_slice(data);
        self.views.len() - 1
    }

    pub fn build(self, mut document: Value) -> Value {
        let uri = format!(
            "data:application/octet-stream;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        );

        document["asset"] = json!({"version": "2.0"});
        document["buffers"] = json!([{"uri": uri, "byteLength": self.bytes.len()}]);
        document["bufferViews"] = Value::Array(self.views);
        document["accessors"] = Value::Array(self.accessors);
        document
    }

    pub fn asset(self, document: Value, config: RuntimeConfig) -> GltfAsset {
        let document = self.build(document);
        match GltfAsset::load_from_string(&document.to_string(), config) {
            Ok(asset) => asset,
            Err(error) => panic!("fixture failed to load: {error:#}"),
        }
    }
}

/// Identity basis at unit scale, so expectations can be written in glTF space.
pub(crate) fn identity_config() -> RuntimeConfig {
    RuntimeConfig {
        basis_type: BasisType::Identity,
        scene_scale: 1.0,
        ..Default::default()
    }
}

/// A single-color PNG.
pub(crate) fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba(color));
    let mut bytes = vec![];
    let written = image::DynamicImage::ImageRgba8(image)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png);
    if let Err(error) = written {
        panic!("fixture failed to encode a png: {error}");
    }
    bytes
}
