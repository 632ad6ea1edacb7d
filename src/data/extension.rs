use crate::data::transform::Transform;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum LightKind {
    Directional,
    Point,
    Spot {
        inner_cone_angle: f32,
        outer_cone_angle: f32,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct PunctualLight {
    pub index: usize,
    pub name: String,
    pub kind: LightKind,
    pub color: [f32; 3],
    pub intensity: f32,
    /// Attenuation radius in host units; derived from the intensity when the asset omits it.
    pub range: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AudioClip {
    pub index: usize,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AudioEmitter {
    pub index: usize,
    pub name: String,
    pub volume: f32,
    pub looping: bool,
    pub clips: Vec<AudioClip>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeshInstances {
    pub node: usize,
    pub transforms: Vec<Transform>,
}
