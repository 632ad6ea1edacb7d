pub mod animation;
pub mod asset;
pub mod extension;
pub mod loader;
pub mod material;
pub mod mesh;
pub mod node;
pub mod primitive;
pub mod skeletal_mesh;
pub mod skeleton;
pub mod texture;

#[cfg(test)]
pub(crate) mod fixture;
