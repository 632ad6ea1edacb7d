use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::data::transform::Transform;

#[derive(Clone, Debug, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
    pub transform: Transform,
}

/// Ordered bone list where every parent precedes its children.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReferenceSkeleton {
    bones: Vec<Bone>,
}

impl ReferenceSkeleton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|bone| bone.name == name)
    }

    /// Returns `name`, suffixed with `_` until no existing bone uses it.
    pub fn unique_name(&self, name: &str) -> String {
        let mut candidate = name.to_string();
        while self.find_bone(&candidate).is_some() {
            candidate.push('_');
        }
        candidate
    }

    /// Appends a bone and returns its index. The parent must already be present.
    pub fn add_bone(&mut self, name: String, parent: Option<usize>, transform: Transform) -> usize {
        debug_assert!(parent.map_or(true, |parent| parent < self.bones.len()));
        self.bones.push(Bone {
            name,
            parent,
            transform,
        });
        self.bones.len() - 1
    }

    pub fn set_transform(&mut self, index: usize, transform: Transform) {
        if let Some(bone) = self.bones.get_mut(index) {
            bone.transform = transform;
        }
    }

    pub fn children(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(move |(_, bone)| bone.parent == Some(index))
            .map(|(child, _)| child)
    }

    /// Component-space transforms of every bone.
    pub fn world_transforms(&self) -> Vec<Transform> {
        let mut world: Vec<Transform> = Vec::with_capacity(self.bones.len());
        for bone in &self.bones {
            let transform = match bone.parent {
                Some(parent) => bone.transform.compose(&world[parent]),
                None => bone.transform,
            };
            world.push(transform);
        }
        world
    }
}

static NEXT_SKELETON_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Debug)]
pub struct Skeleton {
    id: u64,
    pub reference: ReferenceSkeleton,
    /// Skin joint index to bone name.
    pub bone_map: BTreeMap<usize, String>,
    /// Node index to bone name, used to route animation channels.
    pub node_bone_map: HashMap<usize, String>,
    pub root_node: Option<usize>,
}

impl Skeleton {
    pub fn new(
        reference: ReferenceSkeleton,
        bone_map: BTreeMap<usize, String>,
        node_bone_map: HashMap<usize, String>,
        root_node: Option<usize>,
    ) -> Self {
        Self {
            id: NEXT_SKELETON_ID.fetch_add(1, Ordering::Relaxed),
            reference,
            bone_map,
            node_bone_map,
            root_node,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn bone_index_for_joint(&self, joint: usize) -> Option<usize> {
        self.bone_map
            .get(&joint)
            .and_then(|name| self.reference.find_bone(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_name_appends_underscores() {
        let mut skeleton = ReferenceSkeleton::new();
        skeleton.add_bone(String::from("hip"), None, Transform::default());
        skeleton.add_bone(String::from("hip_"), Some(0), Transform::default());

        assert_eq!(skeleton.unique_name("hip"), "hip__");
        assert_eq!(skeleton.unique_name("knee"), "knee");
    }

    #[test]
    fn world_transforms_follow_parents() {
        let mut skeleton = ReferenceSkeleton::new();
        skeleton.add_bone(
            String::from("a"),
            None,
            Transform::from_translation(cgmath::Vector3::new(1.0, 0.0, 0.0)),
        );
        skeleton.add_bone(
            String::from("b"),
            Some(0),
            Transform::from_translation(cgmath::Vector3::new(0.0, 2.0, 0.0)),
        );

        let world = skeleton.world_transforms();
        assert_eq!(world[1].translation, cgmath::Vector3::new(1.0, 2.0, 0.0));
        assert_eq!(skeleton.children(0).collect::<Vec<_>>(), vec![1]);
    }
}
