use std::collections::BTreeMap;

use anyhow::Result;

use crate::data::transform::Transform;
use crate::error::{Error, ErrorKind};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Step,
    CubicSpline,
}

impl Interpolation {
    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value {
            None | Some("LINEAR") => Ok(Interpolation::Linear),
            Some("STEP") => Ok(Interpolation::Step),
            Some("CUBICSPLINE") => Ok(Interpolation::CubicSpline),
            Some(other) => Err(Error::new(
                ErrorKind::AnimationSamplerMismatch,
                format!("Unknown interpolation mode: {other}"),
            )
            .into()),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnimationPath {
    Translation,
    Rotation,
    Scale,
    Weights,
}

impl AnimationPath {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "translation" => Some(AnimationPath::Translation),
            "rotation" => Some(AnimationPath::Rotation),
            "scale" => Some(AnimationPath::Scale),
            "weights" => Some(AnimationPath::Weights),
            _ => None,
        }
    }

    pub fn elements(&self) -> usize {
        match self {
            AnimationPath::Translation | AnimationPath::Scale => 3,
            AnimationPath::Rotation => 4,
            AnimationPath::Weights => 1,
        }
    }
}

/// Per-frame local pose of one bone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoneTrack {
    pub positions: Vec<cgmath::Vector3<f32>>,
    pub rotations: Vec<cgmath::Quaternion<f32>>,
    pub scales: Vec<cgmath::Vector3<f32>>,
}

impl BoneTrack {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn transform(&self, frame: usize) -> Option<Transform> {
        Some(Transform {
            translation: *self.positions.get(frame)?,
            rotation: *self.rotations.get(frame)?,
            scale: *self.scales.get(frame)?,
        })
    }

    pub fn set_transform(&mut self, frame: usize, transform: &Transform) {
        if frame < self.len() {
            self.positions[frame] = transform.translation;
            self.rotations[frame] = transform.rotation;
            self.scales[frame] = transform.scale;
        }
    }

    pub fn constant(transform: &Transform, frames: usize) -> Self {
        Self {
            positions: vec![transform.translation; frames],
            rotations: vec![transform.rotation; frames],
            scales: vec![transform.scale; frames],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SkeletalAnimation {
    pub name: String,
    pub duration: f32,
    pub frames_per_second: f32,
    pub frame_count: usize,
    pub tracks: BTreeMap<String, BoneTrack>,
    /// Morph target name to `(time, weight)` keys.
    pub morph_target_curves: BTreeMap<String, Vec<(f32, f32)>>,
}

/// A single node's transform sampled at a fixed rate.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeAnimationCurve {
    pub node: usize,
    pub duration: f32,
    pub frames_per_second: f32,
    pub transforms: Vec<Transform>,
}

/// Local bone transforms at one instant.
pub type Pose = BTreeMap<String, Transform>;

/// Raw host-space keys of one node, taken from the first animation that targets it.
#[derive(Clone, Debug, PartialEq)]
pub struct TransformCurve {
    pub animation: usize,
    pub name: String,
    pub duration: f32,
    pub node: usize,
    /// The node's rest transform, used for components without keys.
    pub rest: Transform,
    pub translations: Vec<(f32, cgmath::Vector3<f32>)>,
    pub rotations: Vec<(f32, cgmath::Quaternion<f32>)>,
    pub scales: Vec<(f32, cgmath::Vector3<f32>)>,
}
