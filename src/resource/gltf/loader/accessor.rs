use anyhow::Result;
use serde_json::Value;

use crate::error::{Error, ErrorKind};
use crate::resource::gltf::loader::GltfLoader;
use crate::resource::json::{root_item, JsonValueExt};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
}

impl ComponentType {
    pub fn from_gl(value: u64) -> Result<Self> {
        match value {
            5120 => Ok(ComponentType::I8),
            5121 => Ok(ComponentType::U8),
            5122 => Ok(ComponentType::I16),
            5123 => Ok(ComponentType::U16),
            5124 => Ok(ComponentType::I32),
            5125 => Ok(ComponentType::U32),
            5126 => Ok(ComponentType::F32),
            _ => Err(Error::new(
                ErrorKind::UnsupportedComponentType,
                format!("Unknown accessor componentType: {value}"),
            )
            .into()),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            ComponentType::I8 | ComponentType::U8 => 1,
            ComponentType::I16 | ComponentType::U16 => 2,
            ComponentType::I32 | ComponentType::U32 | ComponentType::F32 => 4,
        }
    }

    fn read(&self, bytes: &[u8]) -> f64 {
        match self {
            ComponentType::I8 => bytes[0] as i8 as f64,
            ComponentType::U8 => bytes[0] as f64,
            ComponentType::I16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            ComponentType::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            ComponentType::I32 => {
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            ComponentType::U32 => {
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            ComponentType::F32 => {
                f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
        }
    }

    /// Maps an integer to [0, 1] (unsigned) or [-1, 1] (signed).
    fn normalize(&self, value: f64) -> f64 {
        match self {
            ComponentType::I8 => (value / 127.0).max(-1.0),
            ComponentType::U8 => value / 255.0,
            ComponentType::I16 => (value / 32767.0).max(-1.0),
            ComponentType::U16 => value / 65535.0,
            ComponentType::I32 => (value / i32::MAX as f64).max(-1.0),
            ComponentType::U32 => value / u32::MAX as f64,
            ComponentType::F32 => value,
        }
    }
}

pub fn element_count(accessor_type: &str) -> Result<usize> {
    match accessor_type {
        "SCALAR" => Ok(1),
        "VEC2" => Ok(2),
        "VEC3" => Ok(3),
        "VEC4" | "MAT2" => Ok(4),
        "MAT3" => Ok(9),
        "MAT4" => Ok(16),
        _ => Err(Error::new(
            ErrorKind::TypeMismatch,
            format!("Unknown accessor type: {accessor_type}"),
        )
        .into()),
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Normalization {
    /// Follow the accessor's `normalized` flag.
    #[default]
    Auto,
    Always,
    /// Keep raw component values.
    Never,
}

/// What a caller accepts from an accessor.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessorConstraints {
    pub element_counts: Vec<usize>,
    /// Allowed component types; `Some(flag)` additionally pins the `normalized` flag.
    pub component_types: Vec<(ComponentType, Option<bool>)>,
    pub expected_count: Option<usize>,
}

impl AccessorConstraints {
    pub fn new(element_counts: &[usize], component_types: &[ComponentType]) -> Self {
        Self {
            element_counts: element_counts.to_vec(),
            component_types: component_types.iter().map(|ct| (*ct, None)).collect(),
            expected_count: None,
        }
    }

    pub fn normalized(mut self, component_types: &[ComponentType]) -> Self {
        self.component_types
            .extend(component_types.iter().map(|ct| (*ct, Some(true))));
        self
    }

    pub fn unnormalized(mut self, component_types: &[ComponentType]) -> Self {
        self.component_types
            .extend(component_types.iter().map(|ct| (*ct, Some(false))));
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.expected_count = Some(count);
        self
    }

    fn allows(&self, component_type: ComponentType, normalized: bool) -> bool {
        self.component_types.iter().any(|(allowed, flag)| {
            *allowed == component_type && flag.map_or(true, |flag| flag == normalized)
        })
    }

    pub fn position(quantized: bool) -> Self {
        let constraints = Self::new(&[3], &[ComponentType::F32]);
        match quantized {
            true => {
                let quantized_types = [
                    ComponentType::I8,
                    ComponentType::U8,
                    ComponentType::I16,
                    ComponentType::U16,
                ];
                constraints
                    .unnormalized(&quantized_types)
                    .normalized(&quantized_types)
            }
            false => constraints,
        }
    }

    /// NORMAL (3 elements) or TANGENT (4 elements).
    pub fn direction(elements: usize, quantized: bool) -> Self {
        let constraints = Self::new(&[elements], &[ComponentType::F32]);
        match quantized {
            true => constraints.normalized(&[ComponentType::I8, ComponentType::I16]),
            false => constraints,
        }
    }

    pub fn texcoord(quantized: bool) -> Self {
        let constraints = Self::new(&[2], &[ComponentType::F32])
            .normalized(&[ComponentType::U8, ComponentType::U16]);
        match quantized {
            true => constraints
                .unnormalized(&[ComponentType::U8, ComponentType::U16])
                .normalized(&[ComponentType::I8, ComponentType::I16]),
            false => constraints,
        }
    }

    pub fn color() -> Self {
        Self::new(&[3, 4], &[ComponentType::F32])
            .normalized(&[ComponentType::U8, ComponentType::U16])
    }

    pub fn joints() -> Self {
        Self::new(&[4], &[ComponentType::U8, ComponentType::U16])
    }

    pub fn weights() -> Self {
        Self::new(&[4], &[ComponentType::F32])
            .normalized(&[ComponentType::U8, ComponentType::U16])
    }

    pub fn indices() -> Self {
        Self::new(
            &[1],
            &[ComponentType::U8, ComponentType::U16, ComponentType::U32],
        )
    }

    pub fn matrices() -> Self {
        Self::new(&[16], &[ComponentType::F32])
    }

    /// Animation outputs and instancing attributes: floats or any normalized integer.
    pub fn animated(elements: usize) -> Self {
        Self::new(&[elements], &[ComponentType::F32]).normalized(&[
            ComponentType::I8,
            ComponentType::U8,
            ComponentType::I16,
            ComponentType::U16,
        ])
    }
}

/// Decoded accessor items, `elements` values per item.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementStream<T> {
    pub elements: usize,
    pub count: usize,
    pub values: Vec<T>,
}

impl<T: Copy> ElementStream<T> {
    pub fn items(&self) -> std::slice::ChunksExact<'_, T> {
        self.values.chunks_exact(self.elements.max(1))
    }

    pub fn item(&self, index: usize) -> Option<&[T]> {
        self.values
            .get(index * self.elements..(index + 1) * self.elements)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

struct RawAccessor {
    component_type: ComponentType,
    normalized: bool,
    elements: usize,
    count: usize,
    /// Tightly packed items with sparse overlays already applied.
    bytes: Vec<u8>,
}

pub fn accessor_count(loader: &dyn GltfLoader, accessor_index: usize) -> Result<usize> {
    let accessor = root_item(loader.root(), "accessors", accessor_index)?;
    required_index(accessor, "count", accessor_index)
}

/// Reads an accessor as floats, converting integers per `normalization`.
pub fn read_floats(
    loader: &dyn GltfLoader,
    accessor_index: usize,
    constraints: &AccessorConstraints,
    normalization: Normalization,
) -> Result<ElementStream<f32>> {
    let raw = read_raw(loader, accessor_index, constraints)?;
    let size = raw.component_type.size();

    let normalize = match normalization {
        Normalization::Auto => raw.normalized,
        Normalization::Always => true,
        Normalization::Never => false,
    };

    let values = raw
        .bytes
        .chunks_exact(size)
        .map(|component| {
            let value = raw.component_type.read(component);
            match normalize {
                true => raw.component_type.normalize(value) as f32,
                false => value as f32,
            }
        })
        .collect();

    Ok(ElementStream {
        elements: raw.elements,
        count: raw.count,
        values,
    })
}

/// Reads an integer accessor (indices, joints) widened to u32.
pub fn read_integers(
    loader: &dyn GltfLoader,
    accessor_index: usize,
    constraints: &AccessorConstraints,
) -> Result<ElementStream<u32>> {
    let raw = read_raw(loader, accessor_index, constraints)?;
    let size = raw.component_type.size();

    let values = match raw.component_type {
        ComponentType::U8 => raw.bytes.iter().map(|value| *value as u32).collect(),
        ComponentType::U16 => raw
            .bytes
            .chunks_exact(size)
            .map(|value| u16::from_le_bytes([value[0], value[1]]) as u32)
            .collect(),
        ComponentType::U32 => raw
            .bytes
            .chunks_exact(size)
            .map(|value| u32::from_le_bytes([value[0], value[1], value[2], value[3]]))
            .collect(),
        other => {
            return Err(Error::new(
                ErrorKind::TypeMismatch,
                format!("Accessor {accessor_index} holds {other:?}, expected unsigned integers"),
            )
            .into())
        }
    };

    Ok(ElementStream {
        elements: raw.elements,
        count: raw.count,
        values,
    })
}

fn required_index(object: &Value, key: &str, accessor_index: usize) -> Result<usize> {
    match object.get_index(key) {
        Some(value) => Ok(value),
        None => Err(Error::new(
            ErrorKind::MalformedJson,
            format!("Accessor {accessor_index} is missing {key}"),
        )
        .into()),
    }
}

fn read_raw(
    loader: &dyn GltfLoader,
    accessor_index: usize,
    constraints: &AccessorConstraints,
) -> Result<RawAccessor> {
    let accessor = root_item(loader.root(), "accessors", accessor_index)?;

    let component_type =
        ComponentType::from_gl(required_index(accessor, "componentType", accessor_index)? as u64)?;
    let normalized = accessor.get_bool_or("normalized", false);
    let count = required_index(accessor, "count", accessor_index)?;

    let elements = match accessor.get_string("type") {
        Some(accessor_type) => element_count(accessor_type)?,
        None => {
            return Err(Error::new(
                ErrorKind::MalformedJson,
                format!("Accessor {accessor_index} is missing type"),
            )
            .into())
        }
    };

    if !constraints.element_counts.contains(&elements) {
        return Err(Error::new(
            ErrorKind::TypeMismatch,
            format!(
                "Accessor {accessor_index} has {elements} elements per item, expected one of {:?}",
                constraints.element_counts
            ),
        )
        .into());
    }

    if !constraints.allows(component_type, normalized) {
        return Err(Error::new(
            ErrorKind::UnsupportedComponentType,
            format!(
                "Accessor {accessor_index} uses {component_type:?} (normalized: {normalized}), which is not allowed here"
            ),
        )
        .into());
    }

    if let Some(expected_count) = constraints.expected_count {
        if expected_count != count {
            return Err(Error::new(
                ErrorKind::OutOfRange,
                format!("Accessor {accessor_index} has {count} items, expected {expected_count}"),
            )
            .into());
        }
    }

    let item_size = elements * component_type.size();
    let length = checked_span(accessor_index, "its items", 0, count, item_size)?;

    let view = match accessor.get_index("bufferView") {
        Some(view_index) => {
            let view = loader.load_buffer_view(view_index)?;
            let stride = view.stride.unwrap_or(item_size);
            let offset = accessor.get_index("byteOffset").unwrap_or(0);

            let end = match count {
                0 => Some(0),
                _ => stride
                    .checked_mul(count - 1)
                    .and_then(|span| span.checked_add(offset))
                    .and_then(|span| span.checked_add(item_size)),
            };
            if !matches!(end, Some(end) if end <= view.length) {
                return Err(Error::new(
                    ErrorKind::OutOfRange,
                    format!(
                        "Accessor {accessor_index} reads past bufferView {view_index} ({} bytes)",
                        view.length
                    ),
                )
                .into());
            }
            Some((view, stride, offset))
        }
        None => None,
    };

    let mut bytes = Vec::new();
    if bytes.try_reserve_exact(length).is_err() {
        return Err(Error::new(
            ErrorKind::OutOfRange,
            format!("Accessor {accessor_index} needs {length} bytes, which cannot be allocated"),
        )
        .into());
    }
    bytes.resize(length, 0);

    if let Some((view, stride, offset)) = view {
        let source = view.bytes();
        for (index, item) in bytes.chunks_exact_mut(item_size.max(1)).enumerate() {
            let start = offset + index * stride;
            item.copy_from_slice(&source[start..start + item_size]);
        }
    }

    if let Some(sparse) = accessor.get("sparse") {
        apply_sparse(loader, accessor_index, sparse, count, item_size, &mut bytes)?;
    }

    Ok(RawAccessor {
        component_type,
        normalized,
        elements,
        count,
        bytes,
    })
}

fn apply_sparse(
    loader: &dyn GltfLoader,
    accessor_index: usize,
    sparse: &Value,
    count: usize,
    item_size: usize,
    bytes: &mut [u8],
) -> Result<()> {
    let sparse_count = required_index(sparse, "count", accessor_index)?;
    if sparse_count == 0 {
        return Err(Error::new(
            ErrorKind::MalformedJson,
            format!("Accessor {accessor_index} has an empty sparse section"),
        )
        .into());
    }

    let (indices, values) = match (sparse.get("indices"), sparse.get("values")) {
        (Some(indices), Some(values)) => (indices, values),
        _ => {
            return Err(Error::new(
                ErrorKind::MalformedJson,
                format!("Accessor {accessor_index} has incomplete sparse indices or values"),
            )
            .into())
        }
    };

    let index_type =
        ComponentType::from_gl(required_index(indices, "componentType", accessor_index)? as u64)?;
    if !matches!(
        index_type,
        ComponentType::U8 | ComponentType::U16 | ComponentType::U32
    ) {
        return Err(Error::new(
            ErrorKind::UnsupportedComponentType,
            format!("Accessor {accessor_index} has sparse indices of type {index_type:?}"),
        )
        .into());
    }

    let index_length = checked_span(
        accessor_index,
        "its sparse indices",
        0,
        sparse_count,
        index_type.size(),
    )?;
    let value_length =
        checked_span(accessor_index, "its sparse values", 0, sparse_count, item_size)?;
    let index_bytes = sparse_bytes(loader, accessor_index, indices, index_length)?;
    let value_bytes = sparse_bytes(loader, accessor_index, values, value_length)?;

    for (slot, index_chunk) in index_bytes.chunks_exact(index_type.size()).enumerate() {
        let target = index_type.read(index_chunk) as usize;
        if target >= count {
            return Err(Error::new(
                ErrorKind::OutOfRange,
                format!("Accessor {accessor_index} has sparse index {target} but only {count} items"),
            )
            .into());
        }

        let value = &value_bytes[slot * item_size..(slot + 1) * item_size];
        bytes[target * item_size..(target + 1) * item_size].copy_from_slice(value);
    }

    Ok(())
}

fn sparse_bytes(
    loader: &dyn GltfLoader,
    accessor_index: usize,
    section: &Value,
    length: usize,
) -> Result<Vec<u8>> {
    let view = loader.load_buffer_view(required_index(section, "bufferView", accessor_index)?)?;
    let offset = section.get_index("byteOffset").unwrap_or(0);

    let end = checked_span(accessor_index, "its sparse section", offset, 1, length)?;
    if end > view.length {
        return Err(Error::new(
            ErrorKind::OutOfRange,
            format!("Accessor {accessor_index} has a sparse section past the end of its bufferView"),
        )
        .into());
    }

    Ok(view.bytes()[offset..end].to_vec())
}

/// `base + count * size`, or `OutOfRange` when the JSON values overflow.
fn checked_span(
    accessor_index: usize,
    what: &str,
    base: usize,
    count: usize,
    size: usize,
) -> Result<usize> {
    match count.checked_mul(size).and_then(|span| span.checked_add(base)) {
        Some(span) => Ok(span),
        None => Err(Error::new(
            ErrorKind::OutOfRange,
            format!("Accessor {accessor_index} overflows while sizing {what}"),
        )
        .into()),
    }
}
