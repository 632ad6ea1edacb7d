use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use cgmath::{InnerSpace, Matrix, SquareMatrix, Zero};
use rayon::prelude::*;

use crate::config::mesh::PrimitiveOptions;
use crate::config::{MaterialsConfig, PivotPosition, StaticMeshConfig};
use crate::data::material::Material;
use crate::data::mesh::{BoundingBox, Primitive, StaticMesh, StaticMeshLod};
use crate::data::transform::Transform;
use crate::error::{Error, ErrorKind};
use crate::resource::gltf::asset::GltfAsset;
use crate::resource::json::{root_item, root_len, JsonValueExt};

/// Screen size of LOD `lod`: the asset's coverage hint first, then explicit config, then a
/// harmonic falloff scaled by the configured multiplier.
fn lod_screen_size(config: &StaticMeshConfig, lod: usize, coverage: Option<f32>) -> f32 {
    if let Some(coverage) = coverage {
        return coverage;
    }
    if let Some(screen_size) = config.lod_screen_size.get(&lod) {
        return *screen_size;
    }
    match lod {
        0 => 1.0,
        _ => config.lod_screen_size_multiplier / (lod + 1) as f32,
    }
}

fn bounding_box<'a>(primitives: impl IntoIterator<Item = &'a Primitive>) -> Option<BoundingBox> {
    BoundingBox::from_points(
        primitives
            .into_iter()
            .flat_map(|primitive| primitive.positions.iter()),
    )
}

/// Point the pivot policy moves to the origin. `up` is the host-space up axis.
fn pivot_offset(
    bounds: &BoundingBox,
    pivot_position: PivotPosition,
    up: cgmath::Vector3<f32>,
) -> cgmath::Vector3<f32> {
    let half_extent = (bounds.max - bounds.min) * 0.5;
    let up_extent = cgmath::Vector3::new(up.x.abs(), up.y.abs(), up.z.abs()).dot(half_extent);

    match pivot_position {
        PivotPosition::Asset => cgmath::Vector3::zero(),
        PivotPosition::Center => bounds.center(),
        PivotPosition::Top => bounds.center() + up * up_extent,
        PivotPosition::Bottom => bounds.center() - up * up_extent,
    }
}

/// Concatenates primitives sharing one attribute layout; mixed layouts are left untouched.
pub(crate) fn merge_primitives(primitives: Vec<Primitive>) -> Vec<Primitive> {
    let Some(first) = primitives.first() else {
        return primitives;
    };
    if primitives.len() == 1 {
        return primitives;
    }
    if !primitives.iter().all(|primitive| first.has_same_layout(primitive)) {
        log::warn!("Unable to merge primitives with different attribute layouts");
        return primitives;
    }

    let mut primitives = primitives.into_iter();
    let Some(mut merged) = primitives.next() else {
        return vec![];
    };
    for primitive in primitives {
        merged.append(&primitive);
    }
    vec![merged]
}

/// Bakes a host-space transform into a primitive's geometry.
fn bake_transform(primitive: &mut Primitive, transform: &Transform) {
    let matrix = transform.to_matrix();
    let linear = cgmath::Matrix3::from_cols(
        matrix.x.truncate(),
        matrix.y.truncate(),
        matrix.z.truncate(),
    );
    let normal_matrix = linear
        .invert()
        .map(|inverse| inverse.transpose())
        .unwrap_or(linear);
    let normalize = |vector: cgmath::Vector3<f32>| match vector.magnitude2() > 0.0 {
        true => vector.normalize(),
        false => vector,
    };

    primitive
        .positions
        .par_iter_mut()
        .for_each(|position| *position = transform.transform_point(*position));
    primitive
        .normals
        .par_iter_mut()
        .for_each(|normal| *normal = normalize(normal_matrix * *normal));
    primitive.tangents.par_iter_mut().for_each(|tangent| {
        *tangent = normalize(linear * tangent.truncate()).extend(tangent.w);
    });
    for target in primitive.morph_targets.iter_mut() {
        target.positions.iter_mut().for_each(|delta| *delta = linear * *delta);
        target.normals.iter_mut().for_each(|delta| *delta = normal_matrix * *delta);
        target.tangents.iter_mut().for_each(|delta| *delta = linear * *delta);
    }

    if linear.determinant() < 0.0 && primitive.indices.len() % 3 == 0 {
        primitive
            .indices
            .chunks_exact_mut(3)
            .for_each(|triangle| triangle.swap(1, 2));
    }
}

impl GltfAsset {
    pub(crate) fn mesh_index_by_name(&self, name: &str) -> Result<usize> {
        let found = (0..root_len(self.root(), "meshes")).find(|index| {
            root_item(self.root(), "meshes", *index)
                .map(|mesh| mesh.get_name() == Some(name))
                .unwrap_or(false)
        });

        match found {
            Some(index) => Ok(index),
            None => Err(Error::new(
                ErrorKind::IndexOutOfRange,
                format!("Unable to find mesh named {name}"),
            )
            .into()),
        }
    }

    /// Loads every material referenced by `primitives`. Failures are logged and skipped.
    pub(crate) fn primitive_materials<'a>(
        &self,
        primitives: impl IntoIterator<Item = &'a Primitive>,
        config: &MaterialsConfig,
    ) -> BTreeMap<usize, Arc<Material>> {
        let mut materials = BTreeMap::new();
        for primitive in primitives {
            let indices = primitive
                .material
                .into_iter()
                .chain(primitive.material_variants.iter().map(|mapping| mapping.material));
            for index in indices {
                if materials.contains_key(&index) {
                    continue;
                }
                if let Ok(material) = self.load_material(index, config) {
                    materials.insert(index, material);
                }
            }
        }
        materials
    }

    /// Applies merging, the pivot policy, bounds and materials to already decoded LODs.
    fn finish_static_mesh(
        &self,
        name: String,
        lods: Vec<StaticMeshLod>,
        morph_target_names: Vec<String>,
        config: &StaticMeshConfig,
    ) -> Result<StaticMesh> {
        let mut lods = lods;
        if lods.iter().all(|lod| lod.primitives.is_empty()) {
            return Err(Error::new(
                ErrorKind::InvalidPrimitive,
                format!("Static mesh {name} has no primitives"),
            )
            .into());
        }

        if config.merge_primitives {
            for lod in lods.iter_mut() {
                lod.primitives = merge_primitives(std::mem::take(&mut lod.primitives));
            }
        }

        let mut pivot = cgmath::Vector3::zero();
        if let Some(bounds) = lods.first().and_then(|lod| bounding_box(&lod.primitives)) {
            let up = self.basis().direction(cgmath::Vector3::unit_y());
            pivot = pivot_offset(&bounds, config.pivot_position, up);
        }
        if !pivot.is_zero() {
            for primitive in lods.iter_mut().flat_map(|lod| lod.primitives.iter_mut()) {
                primitive
                    .positions
                    .par_iter_mut()
                    .for_each(|position| *position -= pivot);
            }
        }

        let materials = self.primitive_materials(
            lods.iter().flat_map(|lod| lod.primitives.iter()),
            &config.materials_config,
        );

        Ok(StaticMesh {
            name,
            bounding_box: lods.first().and_then(|lod| bounding_box(&lod.primitives)),
            lods,
            morph_target_names,
            pivot_offset: pivot,
            materials,
        })
    }

    fn build_static_mesh(
        &self,
        mesh_index: usize,
        config: &StaticMeshConfig,
    ) -> Result<StaticMesh> {
        let mesh = self.mesh_primitives(mesh_index, &PrimitiveOptions::from(config))?;
        log::debug!("Loading glTF static mesh: {} - [{mesh_index}]", mesh.name);

        let lod = StaticMeshLod {
            primitives: mesh.primitives,
            screen_size: lod_screen_size(config, 0, None),
        };
        self.finish_static_mesh(mesh.name, vec![lod], mesh.morph_target_names, config)
    }

    pub(crate) fn static_mesh(
        &self,
        mesh_index: usize,
        config: &StaticMeshConfig,
    ) -> Result<Arc<StaticMesh>> {
        if let Some(mesh) = self.cache().static_meshes.get(&mesh_index, config.cache_mode) {
            log::debug!(
                "Skipping duplicate load of glTF static mesh: {} - [{mesh_index}]",
                mesh.name
            );
            return Ok(mesh);
        }

        let mesh = Arc::new(self.build_static_mesh(mesh_index, config)?);
        Ok(self.cache().static_meshes.insert(mesh_index, mesh, config.cache_mode))
    }

    pub fn load_static_mesh(
        &self,
        mesh_index: usize,
        config: &StaticMeshConfig,
    ) -> Result<Arc<StaticMesh>> {
        self.report("LoadStaticMesh()", self.static_mesh(mesh_index, config))
    }

    pub fn load_static_mesh_by_name(
        &self,
        name: &str,
        config: &StaticMeshConfig,
    ) -> Result<Arc<StaticMesh>> {
        let mesh = self
            .mesh_index_by_name(name)
            .and_then(|index| self.static_mesh(index, config));
        self.report("LoadStaticMeshByName()", mesh)
    }

    fn static_mesh_recursive(
        &self,
        node_name: &str,
        exclude_nodes: &[String],
        config: &StaticMeshConfig,
    ) -> Result<StaticMesh> {
        let nodes = self.nodes()?;
        let root = self.node_by_name(node_name)?;
        let root_world = self.node_world_transform(root.index)?;
        let options = PrimitiveOptions::from(config);

        let mut primitives = vec![];
        let mut morph_target_names: Vec<String> = vec![];
        let mut stack = vec![root.index];
        let mut visited = 0;

        while let Some(index) = stack.pop() {
            visited += 1;
            if visited > nodes.len() {
                return Err(Error::new(
                    ErrorKind::MalformedNodeGraph,
                    format!("The subtree of node {node_name} does not terminate"),
                )
                .into());
            }

            let node = &nodes[index];
            if exclude_nodes.iter().any(|excluded| *excluded == node.name) {
                continue;
            }

            if let Some(mesh_index) = node.mesh {
                let relative = self.node_world_transform(index)?.relative_to(&root_world);
                let mut mesh = self.mesh_primitives(mesh_index, &options)?;
                for primitive in mesh.primitives.iter_mut() {
                    bake_transform(primitive, &relative);
                }
                primitives.extend(mesh.primitives);
                if morph_target_names.is_empty() {
                    morph_target_names = mesh.morph_target_names;
                }
            }

            stack.extend(node.children.iter().rev());
        }

        let lod = StaticMeshLod {
            primitives,
            screen_size: lod_screen_size(config, 0, None),
        };
        self.finish_static_mesh(root.name.clone(), vec![lod], morph_target_names, config)
    }

    /// Merges every mesh under the named node, baking node transforms relative to it.
    pub fn load_static_mesh_recursive(
        &self,
        node_name: &str,
        exclude_nodes: &[String],
        config: &StaticMeshConfig,
    ) -> Result<StaticMesh> {
        self.report(
            "LoadStaticMeshRecursive()",
            self.static_mesh_recursive(node_name, exclude_nodes, config),
        )
    }

    fn static_mesh_lods(
        &self,
        mesh_indices: &[usize],
        coverages: &[f32],
        config: &StaticMeshConfig,
    ) -> Result<StaticMesh> {
        let options = PrimitiveOptions::from(config);
        let mut lods = Vec::with_capacity(mesh_indices.len());
        let mut name = None;
        let mut morph_target_names = vec![];

        for (lod, mesh_index) in mesh_indices.iter().enumerate() {
            let mesh = self.mesh_primitives(*mesh_index, &options)?;
            if lod == 0 {
                name = Some(mesh.name.clone());
                morph_target_names = mesh.morph_target_names;
            }
            lods.push(StaticMeshLod {
                primitives: mesh.primitives,
                screen_size: lod_screen_size(config, lod, coverages.get(lod).copied()),
            });
        }

        let Some(name) = name else {
            return Err(Error::new(
                ErrorKind::InvalidPrimitive,
                String::from("No meshes given for the LOD chain"),
            )
            .into());
        };
        self.finish_static_mesh(name, lods, morph_target_names, config)
    }

    /// One static mesh whose LOD `i` is built from `mesh_indices[i]`.
    pub fn load_static_mesh_lods(
        &self,
        mesh_indices: &[usize],
        config: &StaticMeshConfig,
    ) -> Result<StaticMesh> {
        self.report("LoadStaticMeshLODs()", self.static_mesh_lods(mesh_indices, &[], config))
    }

    fn node_static_mesh_lods(
        &self,
        node_index: usize,
        config: &StaticMeshConfig,
    ) -> Result<Arc<StaticMesh>> {
        if let Some(mesh) = self.cache().static_mesh_lods.get(&node_index, config.cache_mode) {
            log::debug!("Skipping duplicate load of glTF LOD chain: [{node_index}]");
            return Ok(mesh);
        }

        let chain = self.lod_chain(node_index)?;
        let coverages = self.get_screen_coverages(node_index);
        let mesh = Arc::new(self.static_mesh_lods(&chain, &coverages, config)?);
        Ok(self.cache().static_mesh_lods.insert(node_index, mesh, config.cache_mode))
    }

    /// LODs from a node's `MSFT_lod` chain, sized by its `MSFT_screencoverage` hints.
    pub fn load_static_mesh_lods_from_node(
        &self,
        node_index: usize,
        config: &StaticMeshConfig,
    ) -> Result<Arc<StaticMesh>> {
        self.report(
            "LoadStaticMeshLODsFromNode()",
            self.node_static_mesh_lods(node_index, config),
        )
    }

    fn static_mesh_from_primitives(
        &self,
        lods: Vec<Vec<Primitive>>,
        config: &StaticMeshConfig,
    ) -> Result<StaticMesh> {
        for primitive in lods.iter().flatten() {
            primitive.validate()?;
        }

        let lods = lods
            .into_iter()
            .enumerate()
            .map(|(lod, primitives)| StaticMeshLod {
                primitives,
                screen_size: lod_screen_size(config, lod, None),
            })
            .collect();
        self.finish_static_mesh(String::from("<PRIMITIVES>"), lods, vec![], config)
    }

    /// Builds a static mesh from host-space primitives, one list per LOD.
    pub fn load_static_mesh_from_primitives(
        &self,
        lods: Vec<Vec<Primitive>>,
        config: &StaticMeshConfig,
    ) -> Result<StaticMesh> {
        self.report(
            "LoadStaticMeshFromPrimitives()",
            self.static_mesh_from_primitives(lods, config),
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::CacheMode;
    use crate::resource::gltf::fixture::{identity_config, DocumentBuilder};

    const TRIANGLE: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

    fn two_mesh_asset() -> GltfAsset {
        let mut builder = DocumentBuilder::new();
        let positions = builder.floats(&TRIANGLE, "VEC3");
        let raised = builder.floats(&[0.0, 0.0, 2.0, 1.0, 0.0, 2.0, 0.0, 1.0, 2.0], "VEC3");
        builder.asset(
            json!({
                "nodes": [
                    {"name": "group", "children": [1, 2], "translation": [5.0, 0.0, 0.0]},
                    {"name": "a", "mesh": 0, "translation": [0.0, 0.0, 1.0]},
                    {"name": "b", "mesh": 1}
                ],
                "meshes": [
                    {"name": "flat", "primitives": [{"attributes": {"POSITION": positions}}]},
                    {"name": "raised", "primitives": [{"attributes": {"POSITION": raised}}]}
                ]
            }),
            identity_config(),
        )
    }

    #[test]
    fn cached_loads_share_the_mesh() {
        let asset = two_mesh_asset();
        let config = StaticMeshConfig::default();

        let first = asset.load_static_mesh(0, &config).unwrap();
        let second = asset.load_static_mesh(0, &config).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let uncached = StaticMeshConfig {
            cache_mode: CacheMode::None,
            ..Default::default()
        };
        let third = asset.load_static_mesh(0, &uncached).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn by_name_and_missing_name() {
        let asset = two_mesh_asset();
        let mesh = asset
            .load_static_mesh_by_name("raised", &StaticMeshConfig::default())
            .unwrap();
        assert_eq!(mesh.name, "raised");

        assert!(asset
            .load_static_mesh_by_name("missing", &StaticMeshConfig::default())
            .is_err());
        assert!(asset.get_errors()[0].starts_with("LoadStaticMeshByName()"));
    }

    #[test]
    fn pivot_policies() {
        let asset = two_mesh_asset();
        let config = StaticMeshConfig {
            pivot_position: PivotPosition::Center,
            cache_mode: CacheMode::None,
            ..Default::default()
        };
        let mesh = asset.load_static_mesh(1, &config).unwrap();
        assert_eq!(mesh.pivot_offset, cgmath::Vector3::new(0.5, 0.5, 2.0));
        let bounds = mesh.bounding_box.unwrap();
        assert_eq!(bounds.center(), cgmath::Vector3::zero());

        // the identity basis keeps glTF's +Y as the up axis
        let config = StaticMeshConfig {
            pivot_position: PivotPosition::Bottom,
            cache_mode: CacheMode::None,
            ..Default::default()
        };
        let mesh = asset.load_static_mesh(1, &config).unwrap();
        assert_eq!(mesh.pivot_offset, cgmath::Vector3::new(0.5, 0.0, 2.0));
    }

    #[test]
    fn recursive_bakes_relative_transforms() {
        let asset = two_mesh_asset();
        let mesh = asset
            .load_static_mesh_recursive("group", &[], &StaticMeshConfig::default())
            .unwrap();

        let primitives = mesh.primitives();
        assert_eq!(primitives.len(), 2);
        // node "a" sits one unit forward of the group; the group's own offset is not baked
        assert_eq!(primitives[0].positions[1], cgmath::Vector3::new(1.0, 0.0, 1.0));
        assert_eq!(primitives[1].positions[0], cgmath::Vector3::new(0.0, 0.0, 2.0));

        let merged = asset
            .load_static_mesh_recursive(
                "group",
                &[String::from("b")],
                &StaticMeshConfig {
                    merge_primitives: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(merged.primitives().len(), 1);
        assert_eq!(merged.primitives()[0].vertex_count(), 3);
    }

    #[test]
    fn merge_concatenates_matching_layouts() {
        let asset = two_mesh_asset();
        let a = asset.load_mesh_primitives(0, &PrimitiveOptions::default()).unwrap();
        let b = asset.load_mesh_primitives(1, &PrimitiveOptions::default()).unwrap();

        let merged = merge_primitives(vec![a.primitives[0].clone(), b.primitives[0].clone()]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].indices, vec![0, 1, 2, 3, 4, 5]);

        let mut different = b.primitives[0].clone();
        different.colors = vec![cgmath::Vector4::new(1.0, 1.0, 1.0, 1.0); 3];
        assert_eq!(merge_primitives(vec![a.primitives[0].clone(), different]).len(), 2);
    }

    #[test]
    fn lods_use_default_screen_sizes() {
        let asset = two_mesh_asset();
        let config = StaticMeshConfig {
            lod_screen_size_multiplier: 0.5,
            ..Default::default()
        };
        let mesh = asset.load_static_mesh_lods(&[0, 1, 0], &config).unwrap();

        let sizes: Vec<f32> = mesh.lods.iter().map(|lod| lod.screen_size).collect();
        assert_eq!(sizes, vec![1.0, 0.25, 0.5 / 3.0]);
        assert_eq!(mesh.name, "flat");
    }

    #[test]
    fn coverage_hint_overrides_configured_screen_size() {
        let config = StaticMeshConfig {
            lod_screen_size: [(1, 0.7)].into_iter().collect(),
            ..Default::default()
        };

        assert_eq!(lod_screen_size(&config, 1, Some(0.3)), 0.3);
        assert_eq!(lod_screen_size(&config, 1, None), 0.7);
        assert_eq!(lod_screen_size(&config, 0, None), 1.0);
    }

    #[test]
    fn from_primitives_validates() {
        let asset = two_mesh_asset();
        let mesh = asset.load_mesh_primitives(0, &PrimitiveOptions::default()).unwrap();
        let mut primitive = mesh.primitives[0].clone();

        let mesh = asset
            .load_static_mesh_from_primitives(
                vec![vec![primitive.clone()]],
                &StaticMeshConfig::default(),
            )
            .unwrap();
        assert_eq!(mesh.lods.len(), 1);

        primitive.indices.push(9);
        assert!(asset
            .load_static_mesh_from_primitives(vec![vec![primitive]], &StaticMeshConfig::default())
            .is_err());
    }

    #[test]
    fn bake_mirrors_flip_winding() {
        let mut primitive = Primitive {
            positions: vec![cgmath::Vector3::zero(); 3],
            indices: vec![0, 1, 2],
            ..Default::default()
        };
        let mirror = Transform {
            scale: cgmath::Vector3::new(-1.0, 1.0, 1.0),
            ..Default::default()
        };
        bake_transform(&mut primitive, &mirror);
        assert_eq!(primitive.indices, vec![0, 2, 1]);
    }
}
