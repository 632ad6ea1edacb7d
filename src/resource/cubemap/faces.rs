use anyhow::Result;
use rayon::prelude::*;

use crate::data::texture::{CubeFace, MipMap, PixelFormat};
use crate::error::{Error, ErrorKind};
use crate::resource::cubemap::{face_index, CubeMapLoader};
use crate::resource::image::generate_mips;

/// Six square RGBA8 images of identical size, in `CubeFace::ALL` order.
pub struct FacesCubeMapLoader {
    resolution: u32,
    faces: Vec<Vec<MipMap>>,
}

impl FacesCubeMapLoader {
    pub fn new(
        images: &[image::RgbaImage; 6],
        srgb: bool,
        generate_mip_maps: bool,
    ) -> Result<Self> {
        let resolution = images[0].width();
        if let Some(image) = images
            .iter()
            .find(|image| image.dimensions() != (resolution, resolution))
        {
            return Err(Error::new(
                ErrorKind::ImageDecodeFailure,
                format!(
                    "Cube map faces must be square and of one size: {}x{} against {resolution}",
                    image.width(),
                    image.height()
                ),
            )
            .into());
        }

        let faces = images
            .par_iter()
            .map(|image| generate_mips(image, srgb, generate_mip_maps))
            .collect();

        Ok(Self { resolution, faces })
    }
}

impl CubeMapLoader for FacesCubeMapLoader {
    fn face_dimensions(&self) -> (u32, u32) {
        (self.resolution, self.resolution)
    }

    fn mip_level_count(&self) -> u32 {
        self.faces.first().map_or(1, |mips| mips.len() as u32)
    }

    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Rgba8
    }

    fn load_face(&self, face: CubeFace, mip_level: u32) -> Result<&[u8]> {
        match self.faces[face_index(face)].get(mip_level as usize) {
            Some(mip) => Ok(&mip.bytes),
            None => Err(Error::new(
                ErrorKind::OutOfRange,
                format!("The cube map has no mip level {mip_level}"),
            )
            .into()),
        }
    }
}
