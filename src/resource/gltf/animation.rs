use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use cgmath::{InnerSpace, Rotation, VectorSpace};
use rayon::prelude::*;
use serde_json::Value;

use crate::config::SkeletalAnimationConfig;
use crate::data::animation::{
    AnimationPath, BoneTrack, Interpolation, NodeAnimationCurve, Pose, SkeletalAnimation,
    TransformCurve,
};
use crate::data::mesh::SkeletalMesh;
use crate::data::skeleton::{ReferenceSkeleton, Skeleton};
use crate::data::transform::{normalize_quaternion, slerp_shortest, Transform};
use crate::error::{Error, ErrorKind};
use crate::resource::cache::AnimationKey;
use crate::resource::gltf::asset::GltfAsset;
use crate::resource::gltf::loader::accessor::{
    read_floats, AccessorConstraints, ComponentType, Normalization,
};
use crate::resource::gltf::node::read_node_transform;
use crate::resource::json::{root_item, root_len, JsonValueExt};

/// Keyframes of one glTF sampler, with outputs kept as flat floats.
#[derive(Clone, Debug)]
pub(crate) struct Sampler {
    pub interpolation: Interpolation,
    pub times: Vec<f32>,
    pub values: Vec<f32>,
    /// Floats per key and slot: 3 or 4 for transforms, the morph target count for weights.
    pub width: usize,
}

impl Sampler {
    fn slots(&self) -> usize {
        match self.interpolation {
            Interpolation::CubicSpline => 3,
            _ => 1,
        }
    }

    /// Slot 0 is the in-tangent, 1 the value and 2 the out-tangent for cubic splines.
    fn slot(&self, key: usize, slot: usize) -> &[f32] {
        let slot = match self.interpolation {
            Interpolation::CubicSpline => slot,
            _ => 0,
        };
        let start = (key * self.slots() + slot) * self.width;
        &self.values[start..start + self.width]
    }

    fn value(&self, key: usize) -> Vec<f32> {
        self.slot(key, 1).to_vec()
    }

    pub fn duration(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Evaluates the sampler at `time`, clamping outside of the keyed range.
    pub fn sample(&self, time: f32, is_rotation: bool) -> Vec<f32> {
        let last = self.times.len() - 1;
        if self.times.len() == 1 || time <= self.times[0] {
            return self.value(0);
        }
        if time >= self.times[last] {
            return self.value(last);
        }

        let next = self.times.partition_point(|key| *key <= time);
        let previous = next - 1;
        let (t0, t1) = (self.times[previous], self.times[next]);
        let delta = t1 - t0;
        let alpha = (time - t0) / delta;

        match self.interpolation {
            Interpolation::Step => self.value(previous),
            Interpolation::Linear if is_rotation => {
                let from = quaternion(self.slot(previous, 1));
                let to = quaternion(self.slot(next, 1));
                let rotation = slerp_shortest(from, to, alpha);
                vec![rotation.v.x, rotation.v.y, rotation.v.z, rotation.s]
            }
            Interpolation::Linear => self
                .slot(previous, 1)
                .iter()
                .zip(self.slot(next, 1))
                .map(|(from, to)| from + (to - from) * alpha)
                .collect(),
            Interpolation::CubicSpline => {
                let alpha2 = alpha * alpha;
                let alpha3 = alpha2 * alpha;
                let s2 = -2.0 * alpha3 + 3.0 * alpha2;
                let s3 = alpha3 - alpha2;
                let s0 = 1.0 - s2;
                let s1 = s3 - alpha2 + alpha;

                let v0 = self.slot(previous, 1);
                let out_tangent = self.slot(previous, 2);
                let v1 = self.slot(next, 1);
                let in_tangent = self.slot(next, 0);

                let mixed: Vec<f32> = (0..self.width)
                    .map(|i| {
                        s0 * v0[i]
                            + s1 * out_tangent[i] * delta
                            + s2 * v1[i]
                            + s3 * in_tangent[i] * delta
                    })
                    .collect();

                match is_rotation {
                    true => {
                        let rotation = normalize_quaternion(quaternion(&mixed));
                        vec![rotation.v.x, rotation.v.y, rotation.v.z, rotation.s]
                    }
                    false => mixed,
                }
            }
        }
    }
}

/// glTF stores quaternions as `[x, y, z, w]`.
fn quaternion(values: &[f32]) -> cgmath::Quaternion<f32> {
    cgmath::Quaternion::new(values[3], values[0], values[1], values[2])
}

fn vector(values: &[f32]) -> cgmath::Vector3<f32> {
    cgmath::Vector3::new(values[0], values[1], values[2])
}

#[derive(Clone, Debug)]
pub(crate) struct Channel {
    pub node: usize,
    pub path: AnimationPath,
    pub sampler: Sampler,
}

/// Every usable channel of one animation.
#[derive(Clone, Debug)]
pub(crate) struct AnimationChannels {
    pub name: String,
    pub duration: f32,
    pub channels: Vec<Channel>,
}

impl AnimationChannels {
    fn for_node(&self, node: usize) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(move |channel| channel.node == node)
    }
}

pub(crate) fn frame_count(duration: f32, frames_per_second: f32) -> usize {
    (duration * frames_per_second).round().max(0.0) as usize
}

fn frame_times(frames: usize, frames_per_second: f32) -> Vec<f32> {
    (0..frames).map(|frame| frame as f32 / frames_per_second).collect()
}

fn validate_frames_per_second(config: &SkeletalAnimationConfig) -> Result<()> {
    if config.frames_per_second <= 0.0 || !config.frames_per_second.is_finite() {
        return Err(Error::new(
            ErrorKind::MalformedJson,
            format!("Invalid frames per second: {}", config.frames_per_second),
        )
        .into());
    }
    Ok(())
}

/// Re-expresses `tracks` (animating `source`) on the bones of `target`.
///
/// The per-bone rotation offset between the two rest poses is applied in world space, then
/// brought back into the target's parent space. Target bones unknown to the source keep their
/// rest pose.
pub(crate) fn retarget(
    tracks: &BTreeMap<String, BoneTrack>,
    source: &ReferenceSkeleton,
    target: &ReferenceSkeleton,
    frames: usize,
) -> BTreeMap<String, BoneTrack> {
    let source_rest = source.world_transforms();
    let target_rest = target.world_transforms();

    let mut retargeted: Vec<BoneTrack> = target
        .bones()
        .iter()
        .map(|bone| BoneTrack::constant(&bone.transform, frames))
        .collect();

    for frame in 0..frames {
        // animated source pose in world space
        let mut source_world: Vec<cgmath::Quaternion<f32>> = Vec::with_capacity(source.len());
        for bone in source.bones() {
            let local = tracks
                .get(&bone.name)
                .and_then(|track| track.transform(frame))
                .unwrap_or(bone.transform);
            let world = match bone.parent {
                Some(parent) => source_world[parent] * local.rotation,
                None => local.rotation,
            };
            source_world.push(world);
        }

        let mut target_world: Vec<cgmath::Quaternion<f32>> = Vec::with_capacity(target.len());
        for (index, bone) in target.bones().iter().enumerate() {
            let parent_world = bone.parent.map(|parent| target_world[parent]);
            let world = match source.find_bone(&bone.name) {
                Some(source_index) => {
                    let world_pose = source_world[source_index];
                    let to_retarget =
                        source_rest[source_index].rotation.invert() * target_rest[index].rotation;
                    let mut world = world_pose * to_retarget;
                    if world.dot(world_pose) < 0.0 {
                        world = -world;
                    }
                    let local = match parent_world {
                        Some(parent_world) => parent_world.invert() * world,
                        None => world,
                    };
                    retargeted[index].rotations[frame] = normalize_quaternion(local);

                    if let Some(translation) = tracks
                        .get(&bone.name)
                        .filter(|_| bone.parent.is_none())
                        .and_then(|track| track.positions.get(frame))
                    {
                        retargeted[index].positions[frame] = *translation;
                    }
                    world
                }
                None => match parent_world {
                    Some(parent_world) => parent_world * bone.transform.rotation,
                    None => bone.transform.rotation,
                },
            };
            target_world.push(world);
        }
    }

    target
        .bones()
        .iter()
        .zip(retargeted)
        .filter(|(bone, _)| source.find_bone(&bone.name).is_some())
        .map(|(bone, track)| (bone.name.clone(), track))
        .collect()
}

impl GltfAsset {
    fn load_sampler(
        &self,
        animation: &Value,
        sampler_index: usize,
        path: AnimationPath,
    ) -> Result<Sampler> {
        let samplers = animation.get_array("samplers").map_or(&[][..], Vec::as_slice);
        let json = match samplers.get(sampler_index) {
            Some(json) => json,
            None => {
                return Err(Error::new(
                    ErrorKind::IndexOutOfRange,
                    format!("Unknown animation sampler: {sampler_index}"),
                )
                .into())
            }
        };

        let interpolation = Interpolation::parse(json.get_string("interpolation"))?;
        let (Some(input), Some(output)) = (json.get_index("input"), json.get_index("output")) else {
            return Err(Error::new(
                ErrorKind::MalformedJson,
                format!("Animation sampler {sampler_index} lacks input or output"),
            )
            .into());
        };

        let times = read_floats(
            self.loader(),
            input,
            &AccessorConstraints::new(&[1], &[ComponentType::F32]),
            Normalization::Never,
        )?
        .values;
        if times.is_empty() {
            return Err(Error::new(
                ErrorKind::AnimationSamplerMismatch,
                format!("Animation sampler {sampler_index} has no keys"),
            )
            .into());
        }
        if times.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(Error::new(
                ErrorKind::AnimationSamplerMismatch,
                format!("Animation sampler {sampler_index} input times are not strictly ascending"),
            )
            .into());
        }

        let normalization = match interpolation {
            Interpolation::CubicSpline => Normalization::Never,
            _ => Normalization::Auto,
        };
        let outputs = read_floats(
            self.loader(),
            output,
            &AccessorConstraints::animated(path.elements()),
            normalization,
        )?;

        let slots = match interpolation {
            Interpolation::CubicSpline => 3,
            _ => 1,
        };
        let keys = times.len() * slots;
        let width = match path {
            AnimationPath::Weights if outputs.len() % keys == 0 && outputs.len() >= keys => {
                outputs.len() / keys
            }
            AnimationPath::Weights => 0,
            _ if outputs.len() == keys => path.elements(),
            _ => 0,
        };
        if width == 0 {
            return Err(Error::new(
                ErrorKind::AnimationSamplerMismatch,
                format!(
                    "Animation sampler {sampler_index} has {} outputs for {} keys ({:?})",
                    outputs.len(),
                    times.len(),
                    interpolation
                ),
            )
            .into());
        }

        Ok(Sampler {
            interpolation,
            times,
            values: outputs.values,
            width,
        })
    }

    pub(crate) fn animation_channels(&self, animation_index: usize) -> Result<AnimationChannels> {
        let json = root_item(self.root(), "animations", animation_index)?;
        let name = json
            .get_name()
            .map_or_else(|| animation_index.to_string(), String::from);
        let node_count = root_len(self.root(), "nodes");

        log::debug!("Loading glTF animation: {name} - [{animation_index}]");

        let mut channels = vec![];
        for channel in json.get_array("channels").into_iter().flatten() {
            let Some(target) = channel.get("target") else {
                continue;
            };
            let Some(node) = target.get_index("node") else {
                continue;
            };
            if node >= node_count {
                return Err(Error::new(
                    ErrorKind::IndexOutOfRange,
                    format!("Animation {name} targets missing node {node}"),
                )
                .into());
            }
            let Some(path) = target.get_string("path").and_then(AnimationPath::parse) else {
                log::warn!("Skipping animation channel with unknown path on node {node}");
                continue;
            };
            let Some(sampler_index) = channel.get_index("sampler") else {
                continue;
            };

            let sampler = self.load_sampler(json, sampler_index, path)?;
            channels.push(Channel { node, path, sampler });
        }

        let duration = channels
            .iter()
            .map(|channel| channel.sampler.duration())
            .fold(0.0, f32::max);

        Ok(AnimationChannels {
            name,
            duration,
            channels,
        })
    }

    /// Node-local transforms of `node` at every time in `times`, in host space.
    fn sample_node(
        &self,
        animation: &AnimationChannels,
        node: usize,
        rest: &Transform,
        times: &[f32],
    ) -> Vec<Transform> {
        let basis = *self.basis();
        let channels: Vec<&Channel> = animation.for_node(node).collect();

        times
            .par_iter()
            .map(|time| {
                let mut transform = *rest;
                for channel in &channels {
                    match channel.path {
                        AnimationPath::Translation => {
                            let value = channel.sampler.sample(*time, false);
                            transform.translation = basis.point(vector(&value));
                        }
                        AnimationPath::Rotation => {
                            let value = channel.sampler.sample(*time, true);
                            transform.rotation = basis.rotation(quaternion(&value));
                        }
                        AnimationPath::Scale => {
                            let value = channel.sampler.sample(*time, false);
                            transform.scale = basis.scale_vector(vector(&value));
                        }
                        AnimationPath::Weights => {}
                    }
                }
                transform
            })
            .collect()
    }

    /// World transform of `node` per frame, animating the node itself and every ancestor.
    fn sample_node_world(
        &self,
        animation: &AnimationChannels,
        node: usize,
        times: &[f32],
    ) -> Result<Vec<Transform>> {
        let nodes = self.nodes()?;
        let mut chain = vec![node];
        chain.extend(self.node_ancestors(node)?);

        let mut world: Option<Vec<Transform>> = None;
        for index in chain.into_iter().rev() {
            let local = self.sample_node(animation, index, &nodes[index].transform, times);
            world = Some(match world {
                Some(parents) => local
                    .iter()
                    .zip(&parents)
                    .map(|(local, parent)| local.compose(parent))
                    .collect(),
                None => local,
            });
        }
        Ok(world.unwrap_or_default())
    }

    fn bone_tracks(
        &self,
        animation: &AnimationChannels,
        skeleton: &Skeleton,
        times: &[f32],
        config: &SkeletalAnimationConfig,
    ) -> BTreeMap<String, BoneTrack> {
        let mut tracks = BTreeMap::new();
        let mut animated_nodes: Vec<usize> = animation
            .channels
            .iter()
            .filter(|channel| channel.path != AnimationPath::Weights)
            .map(|channel| channel.node)
            .collect();
        animated_nodes.sort_unstable();
        animated_nodes.dedup();

        for node in animated_nodes {
            let Some(bone_name) = skeleton.node_bone_map.get(&node) else {
                log::warn!(
                    "Dropping animation {} track for node {node}: no such bone in the skeleton",
                    animation.name
                );
                continue;
            };
            let Some(bone) = skeleton
                .reference
                .find_bone(bone_name)
                .and_then(|index| skeleton.reference.bone(index))
            else {
                continue;
            };

            let rest = bone.transform;
            let transforms = self.sample_node(animation, node, &rest, times);
            let mut track = BoneTrack::constant(&rest, times.len());
            for (frame, transform) in transforms.iter().enumerate() {
                track.set_transform(frame, transform);
            }

            if config.remove_translations {
                track.positions = vec![rest.translation; times.len()];
            }
            if config.remove_rotations {
                track.rotations = vec![rest.rotation; times.len()];
            }
            if config.remove_scales {
                track.scales = vec![rest.scale; times.len()];
            }
            tracks.insert(bone_name.clone(), track);
        }

        tracks
    }

    fn morph_target_curves(
        &self,
        animation: &AnimationChannels,
        morph_target_names: &[String],
        times: &[f32],
    ) -> BTreeMap<String, Vec<(f32, f32)>> {
        let mut curves = BTreeMap::new();

        let weights = animation
            .channels
            .iter()
            .filter(|channel| channel.path == AnimationPath::Weights);
        for channel in weights {
            if channel.sampler.width != morph_target_names.len() {
                log::warn!(
                    "Dropping animation {} weights for node {}: {} weights for {} morph targets",
                    animation.name,
                    channel.node,
                    channel.sampler.width,
                    morph_target_names.len()
                );
                continue;
            }

            let samples: Vec<Vec<f32>> = times
                .iter()
                .map(|time| channel.sampler.sample(*time, false))
                .collect();
            for (target, name) in morph_target_names.iter().enumerate() {
                let curve = times
                    .iter()
                    .zip(&samples)
                    .map(|(time, weights)| (*time, weights[target]))
                    .collect();
                curves.insert(name.clone(), curve);
            }
        }

        curves
    }

    fn build_skeletal_animation(
        &self,
        mesh: &SkeletalMesh,
        animation_index: usize,
        config: &SkeletalAnimationConfig,
    ) -> Result<SkeletalAnimation> {
        validate_frames_per_second(config)?;
        let animation = self.animation_channels(animation_index)?;
        let skeleton = &mesh.skeleton;

        let frame_count = frame_count(animation.duration, config.frames_per_second);
        let times = frame_times(frame_count, config.frames_per_second);

        let mut tracks = self.bone_tracks(&animation, skeleton, &times, config);

        if let Some(root_bone) = skeleton.reference.bone(0) {
            let root_name = root_bone.name.clone();
            if config.root_motion {
                let root_node = config.root_node_index.or(skeleton.root_node);
                if let Some(root_node) = root_node {
                    let world = self.sample_node_world(&animation, root_node, &times)?;
                    let mut track = BoneTrack::constant(&root_bone.transform, frame_count);
                    for (frame, transform) in world.iter().enumerate() {
                        track.set_transform(frame, transform);
                    }
                    tracks.insert(root_name.clone(), track);
                }
            }
            if config.remove_root_motion {
                if let Some(track) = tracks.get_mut(&root_name) {
                    if let Some(first) = track.positions.first().copied() {
                        track.positions.iter_mut().for_each(|position| *position = first);
                    }
                }
            }
        }

        if let Some(target) = &config.retarget_to {
            tracks = retarget(&tracks, &skeleton.reference, target, frame_count);
        }

        let morph_target_curves = match config.remove_morph_targets {
            true => BTreeMap::new(),
            false => self.morph_target_curves(&animation, &mesh.morph_target_names, &times),
        };

        Ok(SkeletalAnimation {
            name: animation.name,
            duration: animation.duration,
            frames_per_second: config.frames_per_second,
            frame_count,
            tracks,
            morph_target_curves,
        })
    }

    pub(crate) fn skeletal_animation(
        &self,
        mesh: &SkeletalMesh,
        animation_index: usize,
        config: &SkeletalAnimationConfig,
    ) -> Result<Arc<SkeletalAnimation>> {
        let key = AnimationKey::new(mesh.skeleton.id(), animation_index, config);
        if let Some(animation) = self.cache().animations.get(&key, config.cache_mode) {
            log::debug!(
                "Skipping duplicate load of glTF animation: {} - [{animation_index}]",
                animation.name
            );
            return Ok(animation);
        }

        let animation = Arc::new(self.build_skeletal_animation(mesh, animation_index, config)?);
        Ok(self.cache().animations.insert(key, animation, config.cache_mode))
    }

    /// Samples an animation onto the skeleton of `mesh` at the configured frame rate.
    pub fn load_skeletal_animation(
        &self,
        mesh: &SkeletalMesh,
        animation_index: usize,
        config: &SkeletalAnimationConfig,
    ) -> Result<Arc<SkeletalAnimation>> {
        self.report(
            "LoadSkeletalAnimation()",
            self.skeletal_animation(mesh, animation_index, config),
        )
    }

    fn animation_index_by_name(&self, name: &str) -> Result<usize> {
        let found = (0..root_len(self.root(), "animations")).find(|index| {
            root_item(self.root(), "animations", *index)
                .map(|animation| animation.get_name() == Some(name))
                .unwrap_or(false)
        });
        match found {
            Some(index) => Ok(index),
            None => Err(Error::new(
                ErrorKind::IndexOutOfRange,
                format!("Unable to find animation named {name}"),
            )
            .into()),
        }
    }

    pub fn load_skeletal_animation_by_name(
        &self,
        mesh: &SkeletalMesh,
        name: &str,
        config: &SkeletalAnimationConfig,
    ) -> Result<Arc<SkeletalAnimation>> {
        let animation = self
            .animation_index_by_name(name)
            .and_then(|index| self.skeletal_animation(mesh, index, config));
        self.report("LoadSkeletalAnimationByName()", animation)
    }

    /// Names of every animation, defaulting to the index.
    pub fn get_animation_names(&self) -> Vec<String> {
        (0..root_len(self.root(), "animations"))
            .map(|index| {
                root_item(self.root(), "animations", index)
                    .ok()
                    .and_then(|animation| animation.get_name())
                    .map_or_else(|| index.to_string(), String::from)
            })
            .collect()
    }

    fn pose_from_animation(
        &self,
        mesh: &SkeletalMesh,
        animation_index: usize,
        time: f32,
        config: &SkeletalAnimationConfig,
    ) -> Result<Pose> {
        let animation = self.animation_channels(animation_index)?;
        let times = [time.clamp(0.0, animation.duration)];
        let tracks = self.bone_tracks(&animation, &mesh.skeleton, &times, config);

        Ok(mesh
            .skeleton
            .reference
            .bones()
            .iter()
            .map(|bone| {
                let transform = tracks
                    .get(&bone.name)
                    .and_then(|track| track.transform(0))
                    .unwrap_or(bone.transform);
                (bone.name.clone(), transform)
            })
            .collect())
    }

    /// Local transform of every bone of `mesh` at `time` seconds into the animation.
    pub fn load_pose_from_animation(
        &self,
        mesh: &SkeletalMesh,
        animation_index: usize,
        time: f32,
        config: &SkeletalAnimationConfig,
    ) -> Result<Pose> {
        self.report(
            "LoadPoseFromAnimation()",
            self.pose_from_animation(mesh, animation_index, time, config),
        )
    }

    fn node_animation(
        &self,
        node_index: usize,
        animation_index: usize,
        config: &SkeletalAnimationConfig,
    ) -> Result<Arc<NodeAnimationCurve>> {
        let key = (animation_index, node_index, config.frames_per_second.to_bits());
        if let Some(curve) = self.cache().node_animations.get(&key, config.cache_mode) {
            return Ok(curve);
        }

        validate_frames_per_second(config)?;
        let node = self.node(node_index)?;
        let animation = self.animation_channels(animation_index)?;
        if animation.for_node(node_index).next().is_none() {
            return Err(Error::new(
                ErrorKind::IndexOutOfRange,
                format!("Animation {} does not target node {}", animation.name, node.name),
            )
            .into());
        }

        let frames = frame_count(animation.duration, config.frames_per_second);
        let times = frame_times(frames, config.frames_per_second);
        let curve = NodeAnimationCurve {
            node: node_index,
            duration: animation.duration,
            frames_per_second: config.frames_per_second,
            transforms: self.sample_node(&animation, node_index, &node.transform, &times),
        };

        Ok(self.cache().node_animations.insert(key, Arc::new(curve), config.cache_mode))
    }

    /// One node's local transform sampled at the configured frame rate.
    pub fn load_node_animation(
        &self,
        node_index: usize,
        animation_index: usize,
        config: &SkeletalAnimationConfig,
    ) -> Result<Arc<NodeAnimationCurve>> {
        self.report(
            "LoadNodeAnimation()",
            self.node_animation(node_index, animation_index, config),
        )
    }

    fn transform_curve(
        &self,
        node_index: usize,
        animation_index: usize,
    ) -> Result<Option<TransformCurve>> {
        let animation = self.animation_channels(animation_index)?;
        let channels: Vec<&Channel> = animation.for_node(node_index).collect();
        if channels.is_empty() {
            return Ok(None);
        }

        let json = root_item(self.root(), "nodes", node_index)?;
        let basis = *self.basis();
        let mut curve = TransformCurve {
            animation: animation_index,
            name: animation.name.clone(),
            duration: animation.duration,
            node: node_index,
            rest: basis.transform(&read_node_transform(json)),
            translations: vec![],
            rotations: vec![],
            scales: vec![],
        };

        for channel in channels {
            let sampler = &channel.sampler;
            let keys = sampler
                .times
                .iter()
                .enumerate()
                .map(|(key, time)| (*time, sampler.value(key)));
            match channel.path {
                AnimationPath::Translation => curve
                    .translations
                    .extend(keys.map(|(time, value)| (time, basis.point(vector(&value))))),
                AnimationPath::Rotation => curve
                    .rotations
                    .extend(keys.map(|(time, value)| (time, basis.rotation(quaternion(&value))))),
                AnimationPath::Scale => curve
                    .scales
                    .extend(keys.map(|(time, value)| (time, basis.scale_vector(vector(&value))))),
                AnimationPath::Weights => {}
            }
        }

        Ok(Some(curve))
    }

    /// Raw keys of the first animation that targets `node_index`.
    pub fn load_animation_curve(&self, node_index: usize) -> Result<TransformCurve> {
        let curve = (|| -> Result<TransformCurve> {
            self.node(node_index)?;
            for animation_index in 0..root_len(self.root(), "animations") {
                if let Some(curve) = self.transform_curve(node_index, animation_index)? {
                    return Ok(curve);
                }
            }
            Err(Error::new(
                ErrorKind::IndexOutOfRange,
                format!("No animation targets node {node_index}"),
            )
            .into())
        })();
        self.report("LoadAnimationCurve()", curve)
    }

    /// Raw keys of every animation that targets `node_index`.
    pub fn load_all_animation_curves(&self, node_index: usize) -> Result<Vec<TransformCurve>> {
        let curves = (0..root_len(self.root(), "animations"))
            .map(|animation_index| self.transform_curve(node_index, animation_index))
            .filter_map(Result::transpose)
            .collect();
        self.report("LoadAllAnimationCurves()", curves)
    }
}

/// Shortest-arc interpolation between two poses; bones missing from `to` keep `from`.
pub fn blend_poses(from: &Pose, to: &Pose, alpha: f32) -> Pose {
    from.iter()
        .map(|(name, transform)| {
            let blended = match to.get(name) {
                Some(other) => Transform {
                    translation: transform.translation.lerp(other.translation, alpha),
                    rotation: slerp_shortest(transform.rotation, other.rotation, alpha),
                    scale: transform.scale.lerp(other.scale, alpha),
                },
                None => *transform,
            };
            (name.clone(), blended)
        })
        .collect()
}
