use crate::data::transform::Transform;

#[derive(Clone, Debug)]
pub struct Node {
    pub index: usize,
    pub name: String,
    /// Local transform, already rebased into host space.
    pub transform: Transform,
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
    pub camera: Option<usize>,
    pub light: Option<usize>,
    pub children: Vec<usize>,
    pub parent: Option<usize>,
    pub emitters: Vec<usize>,
}

#[derive(Clone, Debug)]
pub struct Scene {
    pub index: usize,
    pub name: String,
    pub nodes: Vec<usize>,
}
