pub mod animation;
pub mod basis;
pub mod extension;
pub mod material;
pub mod mesh;
pub mod node;
pub mod skeleton;
pub mod texture;
pub mod transform;
