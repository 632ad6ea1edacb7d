use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;

use crate::data::material::Material;
use crate::data::skeleton::Skeleton;
use crate::error::{Error, ErrorKind};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MorphTarget {
    pub name: String,
    pub positions: Vec<cgmath::Vector3<f32>>,
    pub normals: Vec<cgmath::Vector3<f32>>,
    pub tangents: Vec<cgmath::Vector3<f32>>,
}

impl MorphTarget {
    pub fn is_empty(&self) -> bool {
        let zero = cgmath::Vector3::new(0.0, 0.0, 0.0);
        self.positions.iter().all(|delta| *delta == zero)
            && self.normals.iter().all(|delta| *delta == zero)
            && self.tangents.iter().all(|delta| *delta == zero)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialVariantMapping {
    pub material: usize,
    pub variants: Vec<usize>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Semantic {
    Position,
    Normal,
    Tangent,
    TexCoord(u32),
    Color,
    Joints(u32),
    Weights(u32),
}

pub struct VertexBufferSegment {
    pub semantic: Semantic,
    pub offset: usize,
    pub length: usize,
}

/// Non-interleaved vertex streams packed back to back, one segment per attribute.
#[derive(Default)]
pub struct VertexBuffer {
    pub bytes: Vec<u8>,
    pub segments: Vec<VertexBufferSegment>,
}

impl VertexBuffer {
    fn push<T: bytemuck::Pod>(&mut self, semantic: Semantic, values: &[T]) {
        if values.is_empty() {
            return;
        }
        let bytes: &[u8] = bytemuck::cast_slice(values);
        self.segments.push(VertexBufferSegment {
            semantic,
            offset: self.bytes.len(),
            length: bytes.len(),
        });
        self.bytes.extend_from_slice(bytes);
    }

    pub fn segment(&self, semantic: Semantic) -> Option<&[u8]> {
        self.segments
            .iter()
            .find(|segment| segment.semantic == semantic)
            .map(|segment| &self.bytes[segment.offset..segment.offset + segment.length])
    }
}

/// One drawable triangle list. Missing attributes are empty vectors, never zero-filled.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Primitive {
    pub positions: Vec<cgmath::Vector3<f32>>,
    pub normals: Vec<cgmath::Vector3<f32>>,
    /// xyz direction plus the bitangent sign in `w`.
    pub tangents: Vec<cgmath::Vector4<f32>>,
    pub uvs: Vec<Vec<cgmath::Vector2<f32>>>,
    pub colors: Vec<cgmath::Vector4<f32>>,
    pub joints: Vec<Vec<[u16; 4]>>,
    pub weights: Vec<Vec<[f32; 4]>>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
    pub morph_targets: Vec<MorphTarget>,
    pub material_variants: Vec<MaterialVariantMapping>,
    pub extras: Option<serde_json::Value>,
}

impl Primitive {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_buffer(&self) -> VertexBuffer {
        let mut buffer = VertexBuffer::default();

        let positions: Vec<[f32; 3]> = self.positions.iter().map(|v| (*v).into()).collect();
        buffer.push(Semantic::Position, &positions);
        let normals: Vec<[f32; 3]> = self.normals.iter().map(|v| (*v).into()).collect();
        buffer.push(Semantic::Normal, &normals);
        let tangents: Vec<[f32; 4]> = self.tangents.iter().map(|v| (*v).into()).collect();
        buffer.push(Semantic::Tangent, &tangents);

        for (set, uvs) in self.uvs.iter().enumerate() {
            let uvs: Vec<[f32; 2]> = uvs.iter().map(|v| (*v).into()).collect();
            buffer.push(Semantic::TexCoord(set as u32), &uvs);
        }

        let colors: Vec<[f32; 4]> = self.colors.iter().map(|v| (*v).into()).collect();
        buffer.push(Semantic::Color, &colors);

        for (set, joints) in self.joints.iter().enumerate() {
            buffer.push(Semantic::Joints(set as u32), joints);
        }
        for (set, weights) in self.weights.iter().enumerate() {
            buffer.push(Semantic::Weights(set as u32), weights);
        }

        buffer
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn has_same_layout(&self, other: &Primitive) -> bool {
        self.normals.is_empty() == other.normals.is_empty()
            && self.tangents.is_empty() == other.tangents.is_empty()
            && self.uvs.len() == other.uvs.len()
            && self.colors.is_empty() == other.colors.is_empty()
            && self.joints.len() == other.joints.len()
            && self.weights.len() == other.weights.len()
            && self.morph_targets.len() == other.morph_targets.len()
    }

    /// Checks that every per-vertex stream matches the position count and indices stay in range.
    pub fn validate(&self) -> Result<()> {
        let vertex_count = self.vertex_count();

        let mut lengths = vec![("NORMAL", self.normals.len()), ("TANGENT", self.tangents.len())];
        lengths.push(("COLOR_0", self.colors.len()));
        lengths.extend(self.uvs.iter().map(|uvs| ("TEXCOORD", uvs.len())));
        lengths.extend(self.joints.iter().map(|joints| ("JOINTS", joints.len())));
        lengths.extend(self.weights.iter().map(|weights| ("WEIGHTS", weights.len())));

        for (semantic, length) in lengths {
            if length != 0 && length != vertex_count {
                return Err(Error::new(
                    ErrorKind::InvalidPrimitive,
                    format!("{semantic} has {length} elements but POSITION has {vertex_count}"),
                )
                .into());
            }
        }

        if self.joints.len() != self.weights.len() {
            return Err(Error::new(
                ErrorKind::InvalidPrimitive,
                format!(
                    "Found {} JOINTS sets but {} WEIGHTS sets",
                    self.joints.len(),
                    self.weights.len()
                ),
            )
            .into());
        }

        if let Some(index) = self.indices.iter().find(|index| **index as usize >= vertex_count) {
            return Err(Error::new(
                ErrorKind::InvalidPrimitive,
                format!("Index {index} is out of range for {vertex_count} vertices"),
            )
            .into());
        }

        Ok(())
    }

    /// Appends `other`, offsetting its indices. Both primitives must share the same layout.
    pub fn append(&mut self, other: &Primitive) {
        let offset = self.positions.len() as u32;

        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.tangents.extend_from_slice(&other.tangents);
        self.colors.extend_from_slice(&other.colors);
        for (uvs, other_uvs) in self.uvs.iter_mut().zip(&other.uvs) {
            uvs.extend_from_slice(other_uvs);
        }
        for (joints, other_joints) in self.joints.iter_mut().zip(&other.joints) {
            joints.extend_from_slice(other_joints);
        }
        for (weights, other_weights) in self.weights.iter_mut().zip(&other.weights) {
            weights.extend_from_slice(other_weights);
        }
        for (target, other_target) in self.morph_targets.iter_mut().zip(&other.morph_targets) {
            target.positions.extend_from_slice(&other_target.positions);
            target.normals.extend_from_slice(&other_target.normals);
            target.tangents.extend_from_slice(&other_target.tangents);
        }
        self.indices
            .extend(other.indices.iter().map(|index| index + offset));
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: cgmath::Vector3<f32>,
    pub max: cgmath::Vector3<f32>,
}

impl BoundingBox {
    pub fn from_points<'a>(
        points: impl IntoIterator<Item = &'a cgmath::Vector3<f32>>,
    ) -> Option<Self> {
        let mut points = points.into_iter();
        let first = *points.next()?;
        Some(points.fold(
            Self {
                min: first,
                max: first,
            },
            |bounds, point| Self {
                min: cgmath::Vector3::new(
                    bounds.min.x.min(point.x),
                    bounds.min.y.min(point.y),
                    bounds.min.z.min(point.z),
                ),
                max: cgmath::Vector3::new(
                    bounds.max.x.max(point.x),
                    bounds.max.y.max(point.y),
                    bounds.max.z.max(point.z),
                ),
            },
        ))
    }

    pub fn center(&self) -> cgmath::Vector3<f32> {
        (self.min + self.max) * 0.5
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StaticMeshLod {
    pub primitives: Vec<Primitive>,
    pub screen_size: f32,
}

#[derive(Clone, Debug)]
pub struct StaticMesh {
    pub name: String,
    pub lods: Vec<StaticMeshLod>,
    pub morph_target_names: Vec<String>,
    pub bounding_box: Option<BoundingBox>,
    /// Offset subtracted from every position by the pivot policy.
    pub pivot_offset: cgmath::Vector3<f32>,
    /// Decoded materials keyed by glTF material index.
    pub materials: BTreeMap<usize, Arc<Material>>,
}

impl StaticMesh {
    pub fn primitives(&self) -> &[Primitive] {
        match self.lods.first() {
            Some(lod) => &lod.primitives,
            None => &[],
        }
    }
}

#[derive(Clone, Debug)]
pub struct SkeletalMesh {
    pub name: String,
    pub primitives: Vec<Primitive>,
    pub skeleton: Arc<Skeleton>,
    pub morph_target_names: Vec<String>,
    /// Skin joint index to bone name for this mesh.
    pub bone_map: BTreeMap<usize, String>,
    pub bounding_box: Option<BoundingBox>,
    pub materials: BTreeMap<usize, Arc<Material>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Primitive {
        Primitive {
            positions: vec![
                cgmath::Vector3::new(0.0, 0.0, 0.0),
                cgmath::Vector3::new(1.0, 0.0, 0.0),
                cgmath::Vector3::new(0.0, 1.0, 0.0),
            ],
            indices: vec![0, 1, 2],
            ..Default::default()
        }
    }

    #[test]
    fn validate_rejects_out_of_range_index() {
        let mut primitive = triangle();
        primitive.indices[2] = 3;

        let error = primitive.validate().unwrap_err();
        assert_eq!(
            crate::error::kind_of(&error),
            Some(ErrorKind::InvalidPrimitive)
        );
    }

    #[test]
    fn validate_rejects_short_stream() {
        let mut primitive = triangle();
        primitive.normals = vec![cgmath::Vector3::new(0.0, 0.0, 1.0)];

        assert!(primitive.validate().is_err());
    }

    #[test]
    fn append_offsets_indices() {
        let mut merged = triangle();
        merged.append(&triangle());

        assert_eq!(merged.vertex_count(), 6);
        assert_eq!(merged.indices, vec![0, 1, 2, 3, 4, 5]);
        assert!(merged.validate().is_ok());
    }

    #[test]
    fn vertex_buffer_packs_present_streams() {
        let mut primitive = triangle();
        primitive.weights = vec![vec![[1.0, 0.0, 0.0, 0.0]; 3]];
        primitive.joints = vec![vec![[2, 0, 0, 0]; 3]];

        let buffer = primitive.vertex_buffer();
        let semantics: Vec<Semantic> = buffer.segments.iter().map(|s| s.semantic).collect();
        assert_eq!(
            semantics,
            vec![Semantic::Position, Semantic::Joints(0), Semantic::Weights(0)]
        );
        assert_eq!(buffer.segment(Semantic::Position).unwrap().len(), 36);
        assert_eq!(&buffer.segment(Semantic::Joints(0)).unwrap()[..2], &2u16.to_ne_bytes());
        assert!(buffer.segment(Semantic::Normal).is_none());
        assert_eq!(primitive.index_bytes().len(), 12);
    }

    #[test]
    fn bounding_box_center() {
        let primitive = triangle();
        let bounds = BoundingBox::from_points(&primitive.positions).unwrap();

        assert_eq!(bounds.center(), cgmath::Vector3::new(0.5, 0.5, 0.0));
    }
}
