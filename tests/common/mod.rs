use base64::Engine;
use serde_json::{json, Value};

/// Builds a single-buffer document, embedding the buffer either as a data URI or as a GLB chunk.
#[derive(Default)]
pub struct Document {
    bytes: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    fn accessor(&mut self, data: &[u8], component_type: u32, kind: &str, count: usize) -> usize {
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
            "type": kind
        }));
        self.accessors.len() - 1
    }

    fn width(kind: &str) -> usize {
        match kind {
            "VEC2" => 2,
            "VEC3" => 3,
            "VEC4" => 4,
            "MAT4" => 16,
            _ => 1,
        }
    }

    pub fn floats(&mut self, values: &[f32], kind: &str) -> usize {
        let data: Vec<u8> = values.iter().flat_map(|value| value.to_le_bytes()).collect();
        self.accessor(&data, 5126, kind, values.len() / Self::width(kind))
    }

    pub fn u8s(&mut self, values: &[u8], kind: &str) -> usize {
        self.accessor(values, 5121, kind, values.len() / Self::width(kind))
    }

    fn finish(&mut self, document: &mut Value) {
        document["asset"] = json!({"version": "2.0"});
        document["bufferViews"] = Value::Array(std::mem::take(&mut self.views));
        document["accessors"] = Value::Array(std::mem::take(&mut self.accessors));
    }

    /// JSON text with the buffer inlined as base64.
    pub fn gltf(mut self, mut document: Value) -> String {
        self.finish(&mut document);
        let uri = format!(
            "data:application/octet-stream;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        );
        document["buffers"] = json!([{"uri": uri, "byteLength": self.bytes.len()}]);
        document.to_string()
    }

    /// A binary container with the buffer stored in the BIN chunk.
    pub fn glb(mut self, mut document: Value) -> Vec<u8> {
        self.finish(&mut document);
        document["buffers"] = json!([{"byteLength": self.bytes.len()}]);

        let mut json = document.to_string().into_bytes();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut binary = self.bytes;
        while binary.len() % 4 != 0 {
            binary.push(0);
        }

        let total = 12 + 8 + json.len() + 8 + binary.len();
        let mut glb = vec![];
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total as u32).to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(&json);
        glb.extend_from_slice(&(binary.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"BIN\0");
        glb.extend_from_slice(&binary);
        glb
    }
}

pub const TRIANGLE: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

pub fn close(a: &[f32], b: &[f32], epsilon: f32) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| (a - b).abs() <= epsilon)
}
