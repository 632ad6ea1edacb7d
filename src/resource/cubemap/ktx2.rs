use anyhow::Result;

use crate::data::texture::{CubeFace, MipMap, PixelFormat};
use crate::error::{Error, ErrorKind};
use crate::resource::cubemap::{face_index, CubeMapLoader};
use crate::resource::image::ktx2_pixel_format;

/// Faces of an uncompressed KTX2 cube map, read in place.
pub struct Ktx2CubeMapLoader<T: AsRef<[u8]>> {
    reader: ktx2::Reader<T>,
    pixel_format: PixelFormat,
}

impl<T: AsRef<[u8]>> Ktx2CubeMapLoader<T> {
    pub fn from_reader(reader: ktx2::Reader<T>) -> Result<Self> {
        let header = reader.header();
        if header.face_count != 6 {
            return Err(Error::new(
                ErrorKind::ImageDecodeFailure,
                format!("The KTX2 image is not a cube map: {} faces", header.face_count),
            )
            .into());
        }
        if header.supercompression_scheme.is_some() {
            return Err(Error::new(
                ErrorKind::ImageDecodeFailure,
                String::from("Supercompressed KTX2 cube maps are not supported"),
            )
            .into());
        }

        let pixel_format = ktx2_pixel_format(header.format)?;
        Ok(Self {
            reader,
            pixel_format,
        })
    }
}

impl Ktx2CubeMapLoader<Vec<u8>> {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let reader = ktx2::Reader::new(bytes).map_err(|error| {
            Error::new(
                ErrorKind::ImageDecodeFailure,
                format!("Invalid KTX2 cube map: {error:?}"),
            )
        })?;
        Self::from_reader(reader)
    }
}

impl<T: AsRef<[u8]> + Sync> CubeMapLoader for Ktx2CubeMapLoader<T> {
    fn face_dimensions(&self) -> (u32, u32) {
        (
            self.reader.header().pixel_width,
            self.reader.header().pixel_height,
        )
    }

    fn mip_level_count(&self) -> u32 {
        self.reader.header().level_count.max(1)
    }

    fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    fn load_face(&self, face: CubeFace, mip_level: u32) -> Result<&[u8]> {
        let level_data = match self.reader.levels().nth(mip_level as usize) {
            Some(level_data) => level_data,
            None => {
                return Err(Error::new(
                    ErrorKind::OutOfRange,
                    format!("The cube map has no mip level {mip_level}"),
                )
                .into())
            }
        };

        let (width, height) = self.face_dimensions();
        let width = (width >> mip_level).max(1);
        let height = (height >> mip_level).max(1);
        let face_size = MipMap::byte_len(width, height, self.pixel_format);

        let range_begin = face_size * face_index(face);
        match level_data.get(range_begin..range_begin + face_size) {
            Some(bytes) => Ok(bytes),
            None => Err(Error::new(
                ErrorKind::ImageDecodeFailure,
                format!("The cube map level {mip_level} is too short for face {face:?}"),
            )
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::cubemap::load_cube_map;

    /// A 1x1, single-level RGBA8 cube map whose faces are filled with their index.
    fn ktx2_cube() -> Vec<u8> {
        let mut bytes = vec![
            0xAB, 0x4B, 0x54, 0x58, 0x20, 0x32, 0x30, 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
        ];
        // format, type size, width, height, depth, layers, faces, levels, supercompression
        for value in [37u32, 1, 1, 1, 0, 0, 6, 1, 0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        // dfd and kvd offsets and lengths, then sgd offset and length
        for value in [0u32; 4] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        for value in [0u64; 2] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }

        let level_offset = bytes.len() as u64 + 24;
        for value in [level_offset, 24, 24] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        for face in 0..6u8 {
            bytes.extend_from_slice(&[face; 4]);
        }
        bytes
    }

    #[test]
    fn reads_faces_in_order() {
        let loader = Ktx2CubeMapLoader::from_bytes(ktx2_cube()).unwrap();
        assert_eq!(loader.pixel_format(), PixelFormat::Rgba8);

        let cube_map = load_cube_map(&loader, false).unwrap();
        assert_eq!(cube_map.resolution, 1);
        assert_eq!(cube_map.faces.len(), 6);
        assert_eq!(cube_map.faces[4][0].bytes, vec![4; 4]);

        assert!(loader.load_face(CubeFace::PositiveX, 1).is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(Ktx2CubeMapLoader::from_bytes(vec![0; 16]).is_err());
    }
}
