use anyhow::Result;
use rayon::prelude::*;

use crate::data::texture::{CubeFace, CubeMap, MipMap, PixelFormat};
use crate::error::{Error, ErrorKind};

pub mod equirectangular;
pub mod faces;
pub mod ktx2;

/// A source of cube-map faces, each with the same square size and mip count.
pub trait CubeMapLoader: Sync {
    fn face_dimensions(&self) -> (u32, u32);
    fn mip_level_count(&self) -> u32;
    fn pixel_format(&self) -> PixelFormat;
    fn load_face(&self, face: CubeFace, mip_level: u32) -> Result<&[u8]>;
}

/// Copies every face and mip level out of `loader`.
pub fn load_cube_map(loader: &dyn CubeMapLoader, srgb: bool) -> Result<CubeMap> {
    let (width, height) = loader.face_dimensions();
    if width != height || width == 0 {
        return Err(Error::new(
            ErrorKind::ImageDecodeFailure,
            format!("Cube map faces must be square: {width}x{height}"),
        )
        .into());
    }

    let pixel_format = loader.pixel_format();
    let faces = CubeFace::ALL
        .par_iter()
        .map(|face| {
            (0..loader.mip_level_count().max(1))
                .map(|mip_level| {
                    let size = (width >> mip_level).max(1);
                    Ok(MipMap {
                        width: size,
                        height: size,
                        pixel_format,
                        bytes: loader.load_face(*face, mip_level)?.to_vec(),
                    })
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CubeMap {
        resolution: width,
        srgb,
        faces,
    })
}

pub(crate) fn face_index(face: CubeFace) -> usize {
    CubeFace::ALL
        .iter()
        .position(|candidate| *candidate == face)
        .unwrap_or_default()
}
