use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use crate::data::node::{Node, Scene};
use crate::data::transform::{matrix_from_column_major, matrix_is_finite, Transform};
use crate::error::{Error, ErrorKind};
use crate::resource::gltf::asset::GltfAsset;
use crate::resource::json::{root_item, root_len, JsonValueExt};

/// Local transform of a node JSON object in glTF space.
pub(crate) fn read_node_transform(node: &Value) -> Transform {
    if let Some(matrix) = node
        .get_f32_vec("matrix")
        .and_then(|values| matrix_from_column_major(&values))
        .filter(matrix_is_finite)
    {
        return Transform::from(matrix);
    }

    let mut transform = Transform::default();
    if let Some([x, y, z]) = node.get_f32_array::<3>("translation") {
        transform.translation = cgmath::Vector3::new(x, y, z);
    }
    if let Some([x, y, z, w]) = node.get_f32_array::<4>("rotation") {
        transform.rotation = cgmath::Quaternion::new(w, x, y, z);
    }
    if let Some([x, y, z]) = node.get_f32_array::<3>("scale") {
        transform.scale = cgmath::Vector3::new(x, y, z);
    }
    transform
}

impl GltfAsset {
    pub(crate) fn nodes(&self) -> Result<Arc<Vec<Node>>> {
        if let Some(nodes) = self.cache().nodes.read().as_ref() {
            return Ok(nodes.clone());
        }

        let nodes = Arc::new(self.build_nodes()?);
        let mut cached = self.cache().nodes.write();
        Ok(cached.get_or_insert(nodes).clone())
    }

    fn build_nodes(&self) -> Result<Vec<Node>> {
        let count = root_len(self.root(), "nodes");
        let mut nodes = Vec::with_capacity(count);

        for index in 0..count {
            let json = root_item(self.root(), "nodes", index)?;
            let name = match json.get_name() {
                Some(name) => String::from(name),
                None => index.to_string(),
            };

            log::debug!("Loading glTF node: {name} - [{index}]");

            let emitters = json
                .get_extension("MSFT_audio_emitter")
                .map_or_else(Vec::new, |emitter| emitter.get_indices("emitters"));

            nodes.push(Node {
                index,
                name,
                transform: self.basis().transform(&read_node_transform(json)),
                mesh: json.get_index("mesh"),
                skin: json.get_index("skin"),
                camera: json.get_index("camera"),
                light: json
                    .get_extension("KHR_lights_punctual")
                    .and_then(|light| light.get_index("light")),
                children: json.get_indices("children"),
                parent: None,
                emitters,
            });
        }

        link_parents(&mut nodes)?;
        Ok(nodes)
    }

    pub fn get_nodes(&self) -> Result<Arc<Vec<Node>>> {
        self.report("GetNodes()", self.nodes())
    }

    pub(crate) fn node(&self, index: usize) -> Result<Node> {
        match self.nodes()?.get(index) {
            Some(node) => Ok(node.clone()),
            None => Err(Error::new(
                ErrorKind::IndexOutOfRange,
                format!("The given node index is invalid: {index}"),
            )
            .into()),
        }
    }

    pub fn get_node(&self, index: usize) -> Result<Node> {
        self.report("GetNode()", self.node(index))
    }

    pub(crate) fn node_by_name(&self, name: &str) -> Result<Node> {
        let nodes = self.nodes()?;

        let mut stack: Vec<usize> = nodes
            .iter()
            .filter(|node| node.parent.is_none())
            .map(|node| node.index)
            .rev()
            .collect();

        while let Some(index) = stack.pop() {
            let node = &nodes[index];
            if node.name == name {
                return Ok(node.clone());
            }
            stack.extend(node.children.iter().rev());
        }

        Err(Error::new(
            ErrorKind::IndexOutOfRange,
            format!("No node exists with the given name: {name}"),
        )
        .into())
    }

    /// First node named `name` in depth-first order from the root nodes.
    pub fn get_node_by_name(&self, name: &str) -> Result<Node> {
        self.report("GetNodeByName()", self.node_by_name(name))
    }

    pub fn get_node_children(&self, index: usize) -> Result<Vec<Node>> {
        let children = self.node(index).and_then(|node| {
            node.children
                .iter()
                .map(|child| self.node(*child))
                .collect::<Result<Vec<_>>>()
        });
        self.report("GetNodeChildren()", children)
    }

    pub fn get_node_parent(&self, index: usize) -> Result<Option<Node>> {
        let parent = self
            .node(index)
            .and_then(|node| node.parent.map(|parent| self.node(parent)).transpose());
        self.report("GetNodeParent()", parent)
    }

    /// Ancestor chain of `index`, nearest parent first.
    pub(crate) fn node_ancestors(&self, index: usize) -> Result<Vec<usize>> {
        let nodes = self.nodes()?;
        let mut ancestors = vec![];
        let mut current = self.node(index)?.parent;

        while let Some(parent) = current {
            if ancestors.len() > nodes.len() {
                return Err(Error::new(
                    ErrorKind::MalformedNodeGraph,
                    format!("The parent chain of node {index} does not terminate"),
                )
                .into());
            }
            ancestors.push(parent);
            current = nodes[parent].parent;
        }

        Ok(ancestors)
    }

    pub(crate) fn node_world_transform(&self, index: usize) -> Result<Transform> {
        let nodes = self.nodes()?;
        let mut world = self.node(index)?.transform;
        for ancestor in self.node_ancestors(index)? {
            world = world.compose(&nodes[ancestor].transform);
        }
        Ok(world)
    }

    pub fn get_node_world_transform(&self, index: usize) -> Result<Transform> {
        self.report("GetNodeWorldTransform()", self.node_world_transform(index))
    }

    /// Lowest node whose subtree contains every node in `indices`.
    pub(crate) fn common_root(&self, indices: &[usize]) -> Result<usize> {
        let first = match indices.first() {
            Some(first) => *first,
            None => {
                return Err(Error::new(
                    ErrorKind::NoCommonRoot,
                    String::from("Unable to find a common root of an empty node list"),
                )
                .into())
            }
        };

        let mut candidates = vec![first];
        candidates.extend(self.node_ancestors(first)?);

        let mut chains = Vec::with_capacity(indices.len());
        for index in indices {
            let mut chain: HashSet<usize> = self.node_ancestors(*index)?.into_iter().collect();
            chain.insert(*index);
            chains.push(chain);
        }

        match candidates
            .into_iter()
            .find(|candidate| chains.iter().all(|chain| chain.contains(candidate)))
        {
            Some(root) => Ok(root),
            None => Err(Error::new(
                ErrorKind::NoCommonRoot,
                format!("The given nodes do not share a common root: {indices:?}"),
            )
            .into()),
        }
    }

    pub fn find_common_root(&self, indices: &[usize]) -> Result<usize> {
        self.report("FindCommonRoot()", self.common_root(indices))
    }

    pub(crate) fn scenes(&self) -> Result<Vec<Scene>> {
        let node_count = root_len(self.root(), "nodes");
        let mut scenes = vec![];

        for index in 0..root_len(self.root(), "scenes") {
            let json = root_item(self.root(), "scenes", index)?;
            let nodes = json.get_indices("nodes");

            if let Some(invalid) = nodes.iter().find(|node| **node >= node_count) {
                return Err(Error::new(
                    ErrorKind::IndexOutOfRange,
                    format!("Scene {index} references an invalid node: {invalid}"),
                )
                .into());
            }

            scenes.push(Scene {
                index,
                name: json
                    .get_name()
                    .map_or_else(|| index.to_string(), String::from),
                nodes,
            });
        }

        Ok(scenes)
    }

    pub fn get_scenes(&self) -> Result<Vec<Scene>> {
        self.report("GetScenes()", self.scenes())
    }

    /// The `scene` the document marks as default, if any.
    pub fn get_default_scene(&self) -> Option<usize> {
        self.root().get_index("scene")
    }
}

/// Fills in `parent` from every `children` list and rejects anything that is not a forest.
fn link_parents(nodes: &mut [Node]) -> Result<()> {
    let count = nodes.len();

    for index in 0..count {
        for child in nodes[index].children.clone() {
            if child >= count {
                return Err(Error::new(
                    ErrorKind::IndexOutOfRange,
                    format!("Node {index} references an invalid child: {child}"),
                )
                .into());
            }
            if child == index {
                return Err(Error::new(
                    ErrorKind::MalformedNodeGraph,
                    format!("Node {index} lists itself as a child"),
                )
                .into());
            }
            if let Some(parent) = nodes[child].parent {
                return Err(Error::new(
                    ErrorKind::MalformedNodeGraph,
                    format!("Node {child} has two parents: {parent} and {index}"),
                )
                .into());
            }
            nodes[child].parent = Some(index);
        }
    }

    for start in 0..count {
        let mut visited = HashSet::new();
        let mut current = Some(start);
        while let Some(index) = current {
            if !visited.insert(index) {
                return Err(Error::new(
                    ErrorKind::MalformedNodeGraph,
                    format!("Node {start} is part of a parent cycle"),
                )
                .into());
            }
            current = nodes[index].parent;
        }
    }

    Ok(())
}
