pub mod blob;
pub mod cache;
pub mod cubemap;
pub mod gltf;
pub mod image;
pub mod json;
pub mod task;
