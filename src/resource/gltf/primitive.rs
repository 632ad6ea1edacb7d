use std::collections::HashMap;

use anyhow::Result;
use cgmath::{InnerSpace, Zero};
use rayon::prelude::*;
use serde_json::Value;

use crate::config::mesh::PrimitiveOptions;
use crate::config::{
    MorphTargetsDuplicateStrategy, NormalsGenerationStrategy, TangentsGenerationStrategy,
};
use crate::data::mesh::{MorphTarget, Primitive};
use crate::error::{Error, ErrorKind};
use crate::resource::gltf::asset::GltfAsset;
use crate::resource::gltf::extension::KHR_MESH_QUANTIZATION;
use crate::resource::gltf::loader::accessor::{
    read_floats, read_integers, AccessorConstraints, ElementStream, Normalization,
};
use crate::resource::json::{root_item, JsonValueExt};

const MODE_TRIANGLES: u64 = 4;
const MODE_TRIANGLE_STRIP: u64 = 5;
const MODE_TRIANGLE_FAN: u64 = 6;

/// Primitives of one mesh plus the morph target names they share.
#[derive(Clone, Debug)]
pub struct MeshPrimitives {
    pub name: String,
    pub primitives: Vec<Primitive>,
    pub morph_target_names: Vec<String>,
}

fn to_vec2(stream: &ElementStream<f32>) -> Vec<cgmath::Vector2<f32>> {
    stream
        .items()
        .map(|item| cgmath::Vector2::new(item[0], item[1]))
        .collect()
}

fn to_vec3(stream: &ElementStream<f32>) -> Vec<cgmath::Vector3<f32>> {
    stream
        .items()
        .map(|item| cgmath::Vector3::new(item[0], item[1], item[2]))
        .collect()
}

fn to_vec4(stream: &ElementStream<f32>) -> Vec<cgmath::Vector4<f32>> {
    stream
        .items()
        .map(|item| match item.len() {
            3 => cgmath::Vector4::new(item[0], item[1], item[2], 1.0),
            _ => cgmath::Vector4::new(item[0], item[1], item[2], item[3]),
        })
        .collect()
}

/// Expands strips and fans into a plain triangle list.
fn triangulate(mode: u64, indices: Vec<u32>) -> Result<Vec<u32>> {
    match mode {
        MODE_TRIANGLES => Ok(indices),
        MODE_TRIANGLE_STRIP => Ok((0..indices.len().saturating_sub(2))
            .flat_map(|i| match i % 2 {
                0 => [indices[i], indices[i + 1], indices[i + 2]],
                _ => [indices[i + 1], indices[i], indices[i + 2]],
            })
            .collect()),
        MODE_TRIANGLE_FAN => Ok((1..indices.len().saturating_sub(1))
            .flat_map(|i| [indices[i], indices[i + 1], indices[0]])
            .collect()),
        _ => Err(Error::new(
            ErrorKind::InvalidPrimitive,
            format!("Unsupported primitive mode: {mode}"),
        )
        .into()),
    }
}

/// Face normals replicated to their vertices; a vertex keeps the first non-degenerate face
/// normal it is part of.
pub(crate) fn generate_normals(
    positions: &[cgmath::Vector3<f32>],
    indices: &[u32],
) -> Vec<cgmath::Vector3<f32>> {
    let face_normals: Vec<cgmath::Vector3<f32>> = indices
        .par_chunks_exact(3)
        .map(|triangle| {
            let a = positions[triangle[0] as usize];
            let b = positions[triangle[1] as usize];
            let c = positions[triangle[2] as usize];
            let normal = (b - a).cross(c - a);
            match normal.magnitude2() > f32::EPSILON * f32::EPSILON {
                true => normal.normalize(),
                false => cgmath::Vector3::zero(),
            }
        })
        .collect();

    let mut normals = vec![cgmath::Vector3::zero(); positions.len()];
    for (triangle, face_normal) in indices.chunks_exact(3).zip(face_normals) {
        if face_normal.is_zero() {
            continue;
        }
        for vertex in triangle {
            let normal = &mut normals[*vertex as usize];
            if normal.is_zero() {
                *normal = face_normal;
            }
        }
    }
    normals
}

/// A unit tangent perpendicular to `normal`, or +X when the normal is degenerate.
fn fallback_tangent(normal: cgmath::Vector3<f32>) -> cgmath::Vector3<f32> {
    [cgmath::Vector3::unit_y(), cgmath::Vector3::unit_z()]
        .into_iter()
        .map(|axis| normal.cross(axis))
        .find(|tangent| tangent.magnitude2() > 1e-8)
        .map_or(cgmath::Vector3::unit_x(), |tangent| tangent.normalize())
}

/// Per-vertex tangents from UV0 deltas, orthonormalized against the normal.
///
/// Without UV0 the tangent is derived from the normal and the up axis.
pub(crate) fn generate_tangents(
    positions: &[cgmath::Vector3<f32>],
    normals: &[cgmath::Vector3<f32>],
    uvs: Option<&[cgmath::Vector2<f32>]>,
    indices: &[u32],
    sign: f32,
) -> Vec<cgmath::Vector4<f32>> {
    let mut accumulated = vec![cgmath::Vector3::zero(); positions.len()];

    if let Some(uvs) = uvs {
        let face_tangents: Vec<cgmath::Vector3<f32>> = indices
            .par_chunks_exact(3)
            .map(|triangle| {
                let [i0, i1, i2] = [0, 1, 2].map(|corner| triangle[corner] as usize);
                let delta_position0 = positions[i1] - positions[i0];
                let delta_position1 = positions[i2] - positions[i0];
                let delta_uv0 = uvs[i1] - uvs[i0];
                let delta_uv1 = uvs[i2] - uvs[i0];

                let determinant = delta_uv0.x * delta_uv1.y - delta_uv0.y * delta_uv1.x;
                if determinant.abs() <= f32::EPSILON {
                    return cgmath::Vector3::zero();
                }
                (delta_position0 * delta_uv1.y - delta_position1 * delta_uv0.y) / determinant
            })
            .collect();

        for (triangle, tangent) in indices.chunks_exact(3).zip(face_tangents) {
            for vertex in triangle {
                accumulated[*vertex as usize] += tangent;
            }
        }
    }

    accumulated
        .par_iter()
        .zip(normals.par_iter())
        .map(|(tangent, normal)| {
            // Gram-Schmidt
            let orthogonal = tangent - normal * normal.dot(*tangent);
            let tangent = match orthogonal.magnitude2() > 1e-12 {
                true => orthogonal.normalize(),
                false => fallback_tangent(*normal),
            };
            tangent.extend(sign)
        })
        .collect()
}

fn is_quantized(root: &Value) -> bool {
    root.get_array("extensionsUsed")
        .into_iter()
        .flatten()
        .any(|name| name.as_str() == Some(KHR_MESH_QUANTIZATION))
}

/// Applies the duplicate-name policy and drops empty targets; returns the final names.
pub(crate) fn resolve_morph_targets(
    names: Vec<String>,
    primitives: &mut [Primitive],
    strategy: MorphTargetsDuplicateStrategy,
    ignore_empty: bool,
) -> Vec<String> {
    let mut keep = vec![true; names.len()];
    let mut final_names = names.clone();
    let mut first_index: HashMap<&str, usize> = HashMap::new();
    let mut duplicates: HashMap<&str, usize> = HashMap::new();
    let mut merges: Vec<(usize, usize)> = vec![];

    for (index, name) in names.iter().enumerate() {
        let first = match first_index.get(name.as_str()) {
            Some(first) => *first,
            None => {
                first_index.insert(name, index);
                continue;
            }
        };

        match strategy {
            MorphTargetsDuplicateStrategy::Ignore => keep[index] = false,
            MorphTargetsDuplicateStrategy::Merge => {
                keep[index] = false;
                merges.push((first, index));
            }
            MorphTargetsDuplicateStrategy::AppendDuplicateCounter => {
                let counter = duplicates.entry(name).or_insert(0);
                *counter += 1;
                final_names[index] = format!("{name}_{counter}");
            }
            MorphTargetsDuplicateStrategy::AppendMorphIndex => {
                final_names[index] = format!("{name}_{index}");
            }
        }
    }

    for primitive in primitives.iter_mut() {
        for (into, from) in &merges {
            if *into >= primitive.morph_targets.len() {
                continue;
            }
            let Some(source) = primitive.morph_targets.get(*from).cloned() else {
                continue;
            };
            let target = &mut primitive.morph_targets[*into];
            merge_deltas(&mut target.positions, &source.positions);
            merge_deltas(&mut target.normals, &source.normals);
            merge_deltas(&mut target.tangents, &source.tangents);
        }
    }

    if ignore_empty {
        for (index, keep) in keep.iter_mut().enumerate() {
            let empty = primitives.iter().all(|primitive| {
                primitive
                    .morph_targets
                    .get(index)
                    .map_or(true, MorphTarget::is_empty)
            });
            if empty {
                *keep = false;
            }
        }
    }

    for primitive in primitives.iter_mut() {
        let targets = std::mem::take(&mut primitive.morph_targets);
        primitive.morph_targets = targets
            .into_iter()
            .enumerate()
            .filter(|(index, _)| keep.get(*index).copied().unwrap_or(false))
            .map(|(index, mut target)| {
                target.name = final_names[index].clone();
                target
            })
            .collect();
    }

    final_names
        .into_iter()
        .zip(keep)
        .filter_map(|(name, keep)| keep.then_some(name))
        .collect()
}

fn merge_deltas(into: &mut Vec<cgmath::Vector3<f32>>, from: &[cgmath::Vector3<f32>]) {
    if into.is_empty() {
        into.extend_from_slice(from);
        return;
    }
    for (delta, other) in into.iter_mut().zip(from) {
        *delta += *other;
    }
}

impl GltfAsset {
    fn read_vec3_attribute(
        &self,
        accessor: usize,
        constraints: &AccessorConstraints,
    ) -> Result<Vec<cgmath::Vector3<f32>>> {
        Ok(to_vec3(&read_floats(self.loader(), accessor, constraints, Normalization::Auto)?))
    }

    fn load_morph_target(
        &self,
        target: &Value,
        name: &str,
        quantized: bool,
    ) -> Result<MorphTarget> {
        let mut morph_target = MorphTarget {
            name: String::from(name),
            ..Default::default()
        };

        if let Some(accessor) = target.get_index("POSITION") {
            morph_target.positions =
                self.read_vec3_attribute(accessor, &AccessorConstraints::position(quantized))?;
        }
        if let Some(accessor) = target.get_index("NORMAL") {
            morph_target.normals =
                self.read_vec3_attribute(accessor, &AccessorConstraints::direction(3, quantized))?;
        }
        if let Some(accessor) = target.get_index("TANGENT") {
            morph_target.tangents =
                self.read_vec3_attribute(accessor, &AccessorConstraints::direction(3, quantized))?;
        }

        Ok(morph_target)
    }

    fn load_primitive(
        &self,
        json: &Value,
        target_names: &[String],
        options: &PrimitiveOptions,
    ) -> Result<Primitive> {
        let quantized = is_quantized(self.root());
        let attributes = match json.get("attributes") {
            Some(attributes) => attributes,
            None => {
                return Err(Error::new(
                    ErrorKind::InvalidPrimitive,
                    String::from("The primitive has no attributes"),
                )
                .into())
            }
        };

        let mut primitive = Primitive {
            material: json.get_index("material"),
            material_variants: self.primitive_variant_mappings(json),
            extras: json.get_extras().cloned(),
            ..Default::default()
        };

        primitive.positions = match attributes.get_index("POSITION") {
            Some(accessor) => {
                self.read_vec3_attribute(accessor, &AccessorConstraints::position(quantized))?
            }
            None => {
                return Err(Error::new(
                    ErrorKind::InvalidPrimitive,
                    String::from("The primitive has no POSITION attribute"),
                )
                .into())
            }
        };
        let vertex_count = primitive.vertex_count();

        if options.normals_generation_strategy != NormalsGenerationStrategy::Always {
            if let Some(accessor) = attributes.get_index("NORMAL") {
                let constraints = AccessorConstraints::direction(3, quantized);
                primitive.normals = self.read_vec3_attribute(accessor, &constraints)?;
            }
        }

        if options.tangents_generation_strategy != TangentsGenerationStrategy::Always {
            if let Some(accessor) = attributes.get_index("TANGENT") {
                let stream = read_floats(
                    self.loader(),
                    accessor,
                    &AccessorConstraints::direction(4, quantized),
                    Normalization::Auto,
                )?;
                primitive.tangents = to_vec4(&stream);
            }
        }

        while let Some(accessor) =
            attributes.get_index(&format!("TEXCOORD_{}", primitive.uvs.len()))
        {
            let stream = read_floats(
                self.loader(),
                accessor,
                &AccessorConstraints::texcoord(quantized),
                Normalization::Auto,
            )?;
            primitive.uvs.push(to_vec2(&stream));
        }

        if let Some(accessor) = attributes.get_index("COLOR_0") {
            let stream = read_floats(
                self.loader(),
                accessor,
                &AccessorConstraints::color(),
                Normalization::Auto,
            )?;
            primitive.colors = to_vec4(&stream);
        }

        while let Some(accessor) =
            attributes.get_index(&format!("JOINTS_{}", primitive.joints.len()))
        {
            let stream = read_integers(self.loader(), accessor, &AccessorConstraints::joints())?;
            primitive.joints.push(
                stream
                    .items()
                    .map(|item| [item[0] as u16, item[1] as u16, item[2] as u16, item[3] as u16])
                    .collect(),
            );
        }

        while let Some(accessor) =
            attributes.get_index(&format!("WEIGHTS_{}", primitive.weights.len()))
        {
            let stream = read_floats(
                self.loader(),
                accessor,
                &AccessorConstraints::weights(),
                Normalization::Auto,
            )?;
            primitive
                .weights
                .push(stream.items().map(|item| [item[0], item[1], item[2], item[3]]).collect());
        }

        let indices = match json.get_index("indices") {
            Some(accessor) => {
                read_integers(self.loader(), accessor, &AccessorConstraints::indices())?.values
            }
            None => (0..vertex_count as u32).collect(),
        };
        let mode = json.get("mode").and_then(Value::as_u64).unwrap_or(MODE_TRIANGLES);
        primitive.indices = triangulate(mode, indices)?;

        for (index, target) in json.get_array("targets").into_iter().flatten().enumerate() {
            let name = target_names
                .get(index)
                .cloned()
                .unwrap_or_else(|| format!("MorphTarget_{index}"));
            primitive
                .morph_targets
                .push(self.load_morph_target(target, &name, quantized)?);
        }

        // indices must be sane before they drive generation
        primitive.validate()?;

        let can_generate_normals = match options.normals_generation_strategy {
            NormalsGenerationStrategy::Never => false,
            NormalsGenerationStrategy::IfMissing => primitive.normals.is_empty(),
            NormalsGenerationStrategy::Always => true,
        };
        if can_generate_normals && primitive.indices.len() % 3 == 0 {
            primitive.normals = generate_normals(&primitive.positions, &primitive.indices);
        }

        let can_generate_tangents = match options.tangents_generation_strategy {
            TangentsGenerationStrategy::Never => false,
            TangentsGenerationStrategy::IfMissing => primitive.tangents.is_empty(),
            TangentsGenerationStrategy::Always => true,
        };
        if can_generate_tangents
            && !primitive.normals.is_empty()
            && primitive.indices.len() % 3 == 0
        {
            primitive.tangents = generate_tangents(
                &primitive.positions,
                &primitive.normals,
                primitive.uvs.first().map(Vec::as_slice),
                &primitive.indices,
                options.tangents_sign,
            );
        }

        if options.reverse_tangents {
            primitive.tangents.iter_mut().for_each(|tangent| tangent.w = -tangent.w);
        }

        self.rebase_primitive(&mut primitive);

        if options.reverse_winding && primitive.indices.len() % 3 == 0 {
            primitive.indices.chunks_exact_mut(3).for_each(|triangle| triangle.swap(1, 2));
        }

        Ok(primitive)
    }

    /// Moves every geometric stream of a glTF-space primitive into host space.
    fn rebase_primitive(&self, primitive: &mut Primitive) {
        let basis = *self.basis();

        primitive
            .positions
            .par_iter_mut()
            .for_each(|position| *position = basis.point(*position));
        primitive
            .normals
            .par_iter_mut()
            .for_each(|normal| *normal = basis.normal(*normal));
        primitive
            .tangents
            .par_iter_mut()
            .for_each(|tangent| *tangent = basis.tangent(*tangent));

        for target in primitive.morph_targets.iter_mut() {
            target
                .positions
                .par_iter_mut()
                .for_each(|delta| *delta = basis.point(*delta));
            target
                .normals
                .par_iter_mut()
                .for_each(|delta| *delta = basis.direction(*delta));
            target
                .tangents
                .par_iter_mut()
                .for_each(|delta| *delta = basis.direction(*delta));
        }
    }

    pub(crate) fn mesh_primitives(
        &self,
        mesh_index: usize,
        options: &PrimitiveOptions,
    ) -> Result<MeshPrimitives> {
        let json = root_item(self.root(), "meshes", mesh_index)?;
        let name = json
            .get_name()
            .map_or_else(|| mesh_index.to_string(), String::from);

        log::debug!("Loading glTF mesh primitives: {name} - [{mesh_index}]");

        let target_count = json
            .get_array("primitives")
            .into_iter()
            .flatten()
            .filter_map(|primitive| primitive.get_array("targets").map(Vec::len))
            .max()
            .unwrap_or(0);

        let explicit_names: Vec<String> = json
            .get_extras()
            .and_then(|extras| extras.get_array("targetNames"))
            .map_or_else(Vec::new, |names| {
                names
                    .iter()
                    .map(|name| name.as_str().unwrap_or_default().to_string())
                    .collect()
            });
        let target_names: Vec<String> = (0..target_count)
            .map(|index| match explicit_names.get(index) {
                Some(name) if !name.is_empty() => name.clone(),
                _ => format!("MorphTarget_{index}"),
            })
            .collect();

        let mut primitives = vec![];
        for (index, primitive) in json.get_array("primitives").into_iter().flatten().enumerate() {
            match self.load_primitive(primitive, &target_names, options) {
                Ok(primitive) => primitives.push(primitive),
                Err(error) => {
                    return Err(error.context(format!(
                        "Unable to load primitive {index} of mesh {mesh_index}"
                    )))
                }
            }
        }

        if primitives.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidPrimitive,
                format!("Mesh {mesh_index} has no primitives"),
            )
            .into());
        }

        let morph_target_names = resolve_morph_targets(
            target_names,
            &mut primitives,
            options.morph_targets_duplicate_strategy,
            options.ignore_empty_morph_targets,
        );

        Ok(MeshPrimitives {
            name,
            primitives,
            morph_target_names,
        })
    }

    /// Decodes every primitive of a mesh without building a host mesh.
    pub fn load_mesh_primitives(
        &self,
        mesh_index: usize,
        options: &PrimitiveOptions,
    ) -> Result<MeshPrimitives> {
        self.report("LoadMeshPrimitives()", self.mesh_primitives(mesh_index, options))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::RuntimeConfig;
    use crate::error::kind_of;
    use crate::resource::gltf::fixture::{identity_config, DocumentBuilder};

    const TRIANGLE: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

    fn triangle_asset(
        primitive: Value,
        builder: DocumentBuilder,
        config: RuntimeConfig,
    ) -> GltfAsset {
        builder.asset(json!({"meshes": [{"primitives": [primitive]}]}), config)
    }

    #[test]
    fn synthesizes_indices_and_normals() {
        let mut builder = DocumentBuilder::new();
        let positions = builder.floats(&TRIANGLE, "VEC3");
        let primitive = json!({"attributes": {"POSITION": positions}});
        let asset = triangle_asset(primitive, builder, identity_config());

        let mesh = asset.load_mesh_primitives(0, &PrimitiveOptions::default()).unwrap();
        let primitive = &mesh.primitives[0];

        assert_eq!(primitive.indices, vec![0, 1, 2]);
        assert_eq!(primitive.normals, vec![cgmath::Vector3::unit_z(); 3]);
        assert_eq!(primitive.tangents.len(), 3);
        assert!(primitive.uvs.is_empty() && primitive.colors.is_empty());
    }

    #[test]
    fn degenerate_triangle_gets_finite_tangents() {
        let mut builder = DocumentBuilder::new();
        let positions = builder.floats(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 2.0, 0.0, 0.0], "VEC3");
        let primitive = json!({"attributes": {"POSITION": positions}});
        let asset = triangle_asset(primitive, builder, identity_config());

        let mesh = asset.load_mesh_primitives(0, &PrimitiveOptions::default()).unwrap();
        let primitive = &mesh.primitives[0];

        assert_eq!(primitive.normals, vec![cgmath::Vector3::zero(); 3]);
        for tangent in &primitive.tangents {
            assert_eq!(tangent.truncate(), cgmath::Vector3::unit_x());
        }
    }

    #[test]
    fn fallback_tangent_is_perpendicular_unit() {
        let tangent = fallback_tangent(cgmath::Vector3::unit_z());
        assert!((tangent.magnitude() - 1.0).abs() < 1e-6);
        assert!(tangent.dot(cgmath::Vector3::unit_z()).abs() < 1e-6);

        let tangent = fallback_tangent(cgmath::Vector3::unit_y());
        assert!((tangent.magnitude() - 1.0).abs() < 1e-6);
        assert_eq!(fallback_tangent(cgmath::Vector3::zero()), cgmath::Vector3::unit_x());
    }

    #[test]
    fn default_basis_moves_normals_to_host_space() {
        let mut builder = DocumentBuilder::new();
        let positions = builder.floats(&TRIANGLE, "VEC3");
        let primitive = json!({"attributes": {"POSITION": positions}});
        let asset = triangle_asset(primitive, builder, RuntimeConfig::default());

        let mesh = asset.load_mesh_primitives(0, &PrimitiveOptions::default()).unwrap();
        let primitive = &mesh.primitives[0];

        // glTF (x, y, z) becomes (-z, x, y) and is scaled by 100
        assert!((primitive.normals[0] - cgmath::Vector3::new(-1.0, 0.0, 0.0)).magnitude() < 1e-6);
        let expected = cgmath::Vector3::new(0.0, 100.0, 0.0);
        assert!((primitive.positions[1] - expected).magnitude() < 1e-4);
    }

    #[test]
    fn reads_attributes_and_strips() {
        let mut builder = DocumentBuilder::new();
        let positions = builder.floats(
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0],
            "VEC3",
        );
        let uvs = builder.u8s(&[0, 0, 255, 0, 0, 255, 255, 255], "VEC2");
        let colors = builder.floats(&[1.0; 12], "VEC3");
        let joints = builder.u8s(&[0, 1, 0, 0, 0, 1, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0], "VEC4");
        let weights = builder.floats(
            &[
                0.5, 0.5, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0,
            ],
            "VEC4",
        );
        let mut document = builder.build(json!({"meshes": [{"primitives": [{
            "attributes": {
                "POSITION": positions,
                "TEXCOORD_0": uvs,
                "COLOR_0": colors,
                "JOINTS_0": joints,
                "WEIGHTS_0": weights
            },
            "mode": 5
        }]}]}));
        document["accessors"][uvs]["normalized"] = json!(true);
        let asset = GltfAsset::load_from_string(&document.to_string(), identity_config()).unwrap();

        let mesh = asset.load_mesh_primitives(0, &PrimitiveOptions::default()).unwrap();
        let primitive = &mesh.primitives[0];

        assert_eq!(primitive.indices, vec![0, 1, 2, 2, 1, 3]);
        assert_eq!(primitive.uvs[0][3], cgmath::Vector2::new(1.0, 1.0));
        assert_eq!(primitive.colors[0], cgmath::Vector4::new(1.0, 1.0, 1.0, 1.0));
        assert_eq!(primitive.joints[0][0], [0, 1, 0, 0]);
        assert_eq!(primitive.weights[0][0], [0.5, 0.5, 0.0, 0.0]);
        assert!(primitive.tangents.iter().all(|tangent| tangent.w == 1.0));
        assert!((primitive.tangents[0].truncate() - cgmath::Vector3::unit_x()).magnitude() < 1e-5);
    }

    #[test]
    fn rejects_missing_position_and_bad_mode() {
        let mut builder = DocumentBuilder::new();
        let positions = builder.floats(&TRIANGLE, "VEC3");
        let asset = builder.asset(
            json!({"meshes": [
                {"primitives": [{"attributes": {}}]},
                {"primitives": [{"attributes": {"POSITION": positions}, "mode": 1}]}
            ]}),
            identity_config(),
        );

        for mesh in 0..2 {
            let error = asset.load_mesh_primitives(mesh, &PrimitiveOptions::default()).unwrap_err();
            assert_eq!(kind_of(&error), Some(ErrorKind::InvalidPrimitive));
        }
        assert_eq!(asset.get_errors().len(), 2);
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let mut builder = DocumentBuilder::new();
        let positions = builder.floats(&TRIANGLE, "VEC3");
        let indices = builder.u16s(&[0, 1, 3], "SCALAR");
        let asset = triangle_asset(
            json!({"attributes": {"POSITION": positions}, "indices": indices}),
            builder,
            identity_config(),
        );

        let error = asset.load_mesh_primitives(0, &PrimitiveOptions::default()).unwrap_err();
        assert_eq!(kind_of(&error), Some(ErrorKind::InvalidPrimitive));
    }

    #[test]
    fn reverse_winding_and_tangent_sign() {
        let mut builder = DocumentBuilder::new();
        let positions = builder.floats(&TRIANGLE, "VEC3");
        let primitive = json!({"attributes": {"POSITION": positions}});
        let asset = triangle_asset(primitive, builder, identity_config());

        let options = PrimitiveOptions {
            reverse_winding: true,
            tangents_sign: -1.0,
            ..Default::default()
        };
        let mesh = asset.load_mesh_primitives(0, &options).unwrap();

        assert_eq!(mesh.primitives[0].indices, vec![0, 2, 1]);
        assert!(mesh.primitives[0].tangents.iter().all(|tangent| tangent.w == -1.0));
    }

    #[test]
    fn morph_target_names() {
        let mut builder = DocumentBuilder::new();
        let positions = builder.floats(&TRIANGLE, "VEC3");
        let delta = builder.floats(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0], "VEC3");
        let empty = builder.floats(&[0.0; 9], "VEC3");
        let asset = builder.asset(
            json!({"meshes": [{
                "extras": {"targetNames": ["smile", "smile"]},
                "primitives": [{"attributes": {"POSITION": positions}, "targets": [
                    {"POSITION": delta}, {"POSITION": delta}, {"POSITION": empty}
                ]}]
            }]}),
            identity_config(),
        );

        let mesh = asset.load_mesh_primitives(0, &PrimitiveOptions::default()).unwrap();
        assert_eq!(mesh.morph_target_names, vec!["smile", "MorphTarget_2"]);

        let options = PrimitiveOptions {
            morph_targets_duplicate_strategy: MorphTargetsDuplicateStrategy::AppendDuplicateCounter,
            ignore_empty_morph_targets: true,
            ..Default::default()
        };
        let mesh = asset.load_mesh_primitives(0, &options).unwrap();
        assert_eq!(mesh.morph_target_names, vec!["smile", "smile_1"]);
        assert_eq!(mesh.primitives[0].morph_targets.len(), 2);
        assert_eq!(mesh.primitives[0].morph_targets[1].name, "smile_1");

        let options = PrimitiveOptions {
            morph_targets_duplicate_strategy: MorphTargetsDuplicateStrategy::Merge,
            ..Default::default()
        };
        let mesh = asset.load_mesh_primitives(0, &options).unwrap();
        assert_eq!(mesh.morph_target_names, vec!["smile", "MorphTarget_2"]);
        let delta = mesh.primitives[0].morph_targets[0].positions[0];
        assert_eq!(delta, cgmath::Vector3::new(0.0, 0.0, 2.0));

        let options = PrimitiveOptions {
            morph_targets_duplicate_strategy: MorphTargetsDuplicateStrategy::AppendMorphIndex,
            ..Default::default()
        };
        let mesh = asset.load_mesh_primitives(0, &options).unwrap();
        assert_eq!(mesh.morph_target_names, vec!["smile", "smile_1", "MorphTarget_2"]);
    }

    #[test]
    fn always_strategy_covers_every_vertex() {
        let positions = vec![
            cgmath::Vector3::new(0.0, 0.0, 0.0),
            cgmath::Vector3::new(0.0, 0.0, 0.0),
            cgmath::Vector3::new(1.0, 0.0, 0.0),
            cgmath::Vector3::new(0.0, 1.0, 0.0),
        ];
        // first triangle is degenerate, vertex 0 still receives the second face's normal
        let normals = generate_normals(&positions, &[0, 1, 2, 0, 2, 3]);
        assert_eq!(normals[0], cgmath::Vector3::unit_z());
        assert!(normals.iter().all(|normal| !normal.is_zero()));
    }

    #[test]
    fn fan_triangulation() {
        assert_eq!(triangulate(6, vec![0, 1, 2, 3]).unwrap(), vec![1, 2, 0, 2, 3, 0]);
        assert!(triangulate(0, vec![0]).is_err());
    }
}
