use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;

use crate::config::{CacheMode, SkeletalAnimationConfig};
use crate::data::animation::{NodeAnimationCurve, SkeletalAnimation};
use crate::data::material::Material;
use crate::data::mesh::{SkeletalMesh, StaticMesh};
use crate::data::node::Node;
use crate::data::skeleton::{ReferenceSkeleton, Skeleton};
use crate::data::texture::Texture;

/// Shared decoded objects keyed by source index.
///
/// The lock is only held across the map access; decoding happens outside of it and the
/// first insert for a key wins.
pub struct Registry<K, V> {
    entries: RwLock<HashMap<K, Arc<V>>>,
}

impl<K, V> Default for Registry<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V> Registry<K, V> {
    pub fn get(&self, key: &K, cache_mode: CacheMode) -> Option<Arc<V>> {
        if !cache_mode.can_read() {
            return None;
        }
        self.entries.read().get(key).cloned()
    }

    /// Stores `value` unless another writer got there first, returning whichever entry won.
    pub fn insert(&self, key: K, value: Arc<V>, cache_mode: CacheMode) -> Arc<V> {
        if !cache_mode.can_write() {
            return value;
        }
        self.entries.write().entry(key).or_insert(value).clone()
    }

    pub fn get_or_try_insert_with(
        &self,
        key: K,
        cache_mode: CacheMode,
        decode: impl FnOnce() -> Result<V>,
    ) -> Result<Arc<V>> {
        if let Some(value) = self.get(&key, cache_mode) {
            return Ok(value);
        }

        let value = Arc::new(decode()?);
        Ok(self.insert(key, value, cache_mode))
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Identifies a sampled skeletal animation by every input that shapes its tracks.
///
/// The retarget skeleton is compared by identity; the key holds it so its address stays unique.
#[derive(Clone, Debug)]
pub struct AnimationKey {
    skeleton: u64,
    animation: usize,
    frames_per_second: u32,
    root_node_index: Option<usize>,
    flags: [bool; 6],
    retarget_to: Option<Arc<ReferenceSkeleton>>,
}

impl AnimationKey {
    pub fn new(skeleton: u64, animation: usize, config: &SkeletalAnimationConfig) -> Self {
        Self {
            skeleton,
            animation,
            frames_per_second: config.frames_per_second.to_bits(),
            root_node_index: config.root_node_index,
            flags: [
                config.root_motion,
                config.remove_root_motion,
                config.remove_translations,
                config.remove_rotations,
                config.remove_scales,
                config.remove_morph_targets,
            ],
            retarget_to: config.retarget_to.clone(),
        }
    }

    fn retarget_address(&self) -> Option<*const ReferenceSkeleton> {
        self.retarget_to.as_ref().map(Arc::as_ptr)
    }
}

impl PartialEq for AnimationKey {
    fn eq(&self, other: &Self) -> bool {
        self.skeleton == other.skeleton
            && self.animation == other.animation
            && self.frames_per_second == other.frames_per_second
            && self.root_node_index == other.root_node_index
            && self.flags == other.flags
            && self.retarget_address() == other.retarget_address()
    }
}

impl Eq for AnimationKey {}

impl Hash for AnimationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.skeleton.hash(state);
        self.animation.hash(state);
        self.frames_per_second.hash(state);
        self.root_node_index.hash(state);
        self.flags.hash(state);
        self.retarget_address().hash(state);
    }
}

/// Every per-document cache; dropping or clearing it releases all decoded objects.
#[derive(Default)]
pub struct GltfCache {
    pub nodes: RwLock<Option<Arc<Vec<Node>>>>,
    pub static_meshes: Registry<usize, StaticMesh>,
    pub static_mesh_lods: Registry<usize, StaticMesh>,
    pub skeletal_meshes: Registry<(usize, Option<usize>), SkeletalMesh>,
    pub skeletons: Registry<usize, Skeleton>,
    pub materials: Registry<usize, Material>,
    /// Keyed by texture index and sRGB flag, since the same texture may be sampled both ways.
    pub textures: Registry<(usize, bool), Texture>,
    pub images: Registry<usize, image::RgbaImage>,
    pub animations: Registry<AnimationKey, SkeletalAnimation>,
    /// Keyed by animation index, node index and the bits of the frame rate.
    pub node_animations: Registry<(usize, usize, u32), NodeAnimationCurve>,
}

impl GltfCache {
    pub fn clear(&self) {
        *self.nodes.write() = None;
        self.static_meshes.clear();
        self.static_mesh_lods.clear();
        self.skeletal_meshes.clear();
        self.skeletons.clear();
        self.materials.clear();
        self.textures.clear();
        self.images.clear();
        self.animations.clear();
        self.node_animations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_loads_share_the_entry() {
        let registry: Registry<usize, String> = Registry::default();

        let first = registry
            .get_or_try_insert_with(0, CacheMode::ReadWrite, || Ok(String::from("mesh")))
            .unwrap();
        let second = registry
            .get_or_try_insert_with(0, CacheMode::ReadWrite, || Ok(String::from("other")))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second, "mesh");
    }

    #[test]
    fn animation_keys_follow_the_sampling_config() {
        let config = SkeletalAnimationConfig::default();
        let key = AnimationKey::new(7, 0, &config);
        assert_eq!(key, AnimationKey::new(7, 0, &config.clone()));

        let faster = SkeletalAnimationConfig {
            frames_per_second: 60.0,
            ..config.clone()
        };
        assert_ne!(key, AnimationKey::new(7, 0, &faster));

        let target = Arc::new(ReferenceSkeleton::default());
        let retargeted = SkeletalAnimationConfig {
            retarget_to: Some(target.clone()),
            ..config.clone()
        };
        let other_target = SkeletalAnimationConfig {
            retarget_to: Some(Arc::new(ReferenceSkeleton::default())),
            ..config
        };
        let retargeted_key = AnimationKey::new(7, 0, &retargeted);
        assert_ne!(key, retargeted_key);
        assert_eq!(retargeted_key, AnimationKey::new(7, 0, &retargeted.clone()));
        assert_ne!(retargeted_key, AnimationKey::new(7, 0, &other_target));
    }

    #[test]
    fn first_writer_wins() {
        let registry: Registry<usize, u32> = Registry::default();

        let winner = registry.insert(1, Arc::new(1), CacheMode::ReadWrite);
        let loser = registry.insert(1, Arc::new(2), CacheMode::ReadWrite);

        assert!(Arc::ptr_eq(&winner, &loser));
        assert_eq!(*loser, 1);
    }

    #[test]
    fn modes_gate_reads_and_writes() {
        let registry: Registry<usize, u32> = Registry::default();

        registry.insert(0, Arc::new(7), CacheMode::Read);
        assert!(registry.is_empty());

        registry.insert(0, Arc::new(7), CacheMode::Write);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&0, CacheMode::Write).is_none());
        assert!(registry.get(&0, CacheMode::None).is_none());
        assert_eq!(registry.get(&0, CacheMode::Read).as_deref(), Some(&7));
    }

    #[test]
    fn failed_decode_is_not_cached() {
        let registry: Registry<usize, u32> = Registry::default();

        let result = registry.get_or_try_insert_with(0, CacheMode::ReadWrite, || {
            Err(anyhow::anyhow!("decode failed"))
        });

        assert!(result.is_err());
        assert!(!registry.contains(&0));
    }

    #[test]
    fn clear_is_idempotent() {
        let cache = GltfCache::default();
        cache.materials.insert(0, Arc::new(Material::default()), CacheMode::ReadWrite);

        cache.clear();
        cache.clear();

        assert!(cache.materials.is_empty());
        assert!(cache.nodes.read().is_none());
    }
}
