use std::f32::consts::PI;

use anyhow::Result;
use cgmath::InnerSpace;
use rayon::prelude::*;

use crate::data::texture::{CubeFace, PixelFormat};
use crate::error::{Error, ErrorKind};
use crate::resource::cubemap::{face_index, CubeMapLoader};
use crate::resource::image::{from_linear, to_linear};

/// Direction through the center of pixel `(x, y)` of `face`, following the GL cube-map layout.
pub fn face_direction(face: CubeFace, x: u32, y: u32, resolution: u32) -> cgmath::Vector3<f32> {
    let u = 2.0 * (x as f32 + 0.5) / resolution as f32 - 1.0;
    let v = 2.0 * (y as f32 + 0.5) / resolution as f32 - 1.0;

    let direction = match face {
        CubeFace::PositiveX => cgmath::Vector3::new(1.0, -v, -u),
        CubeFace::NegativeX => cgmath::Vector3::new(-1.0, -v, u),
        CubeFace::PositiveY => cgmath::Vector3::new(u, 1.0, v),
        CubeFace::NegativeY => cgmath::Vector3::new(u, -1.0, -v),
        CubeFace::PositiveZ => cgmath::Vector3::new(u, -v, 1.0),
        CubeFace::NegativeZ => cgmath::Vector3::new(-u, -v, -1.0),
    };
    direction.normalize()
}

/// Equirectangular texture coordinates of a unit direction.
pub fn direction_to_uv(direction: cgmath::Vector3<f32>) -> (f32, f32) {
    let azimuth = direction.z.atan2(direction.x);
    let elevation = direction.y.clamp(-1.0, 1.0).asin();
    (0.5 + azimuth / (2.0 * PI), 0.5 - elevation / PI)
}

fn sample_bilinear(image: &image::Rgba32FImage, u: f32, v: f32) -> [f32; 4] {
    let (width, height) = image.dimensions();
    let x = u * width as f32 - 0.5;
    let y = (v * height as f32 - 0.5).clamp(0.0, (height - 1) as f32);

    let x0 = x.floor();
    let y0 = y.floor();
    let (fx, fy) = (x - x0, y - y0);

    // wraps horizontally, clamps vertically
    let column = |offset: f32| (x0 + offset).rem_euclid(width as f32) as u32 % width;
    let row = |offset: f32| ((y0 + offset) as u32).min(height - 1);

    let texel = |column: u32, row: u32| image.get_pixel(column, row).0;
    let (c00, c10) = (texel(column(0.0), row(0.0)), texel(column(1.0), row(0.0)));
    let (c01, c11) = (texel(column(0.0), row(1.0)), texel(column(1.0), row(1.0)));

    std::array::from_fn(|channel| {
        let top = c00[channel] + (c10[channel] - c00[channel]) * fx;
        let bottom = c01[channel] + (c11[channel] - c01[channel]) * fx;
        top + (bottom - top) * fy
    })
}

/// Cube faces resampled from a single equirectangular panorama.
pub struct EquirectangularCubeMapLoader {
    resolution: u32,
    faces: Vec<Vec<u8>>,
}

impl EquirectangularCubeMapLoader {
    pub fn new(image: &image::RgbaImage, resolution: u32, srgb: bool) -> Result<Self> {
        if resolution == 0 || image.width() == 0 || image.height() == 0 {
            return Err(Error::new(
                ErrorKind::ImageDecodeFailure,
                format!(
                    "Unable to resample a {}x{} panorama at resolution {resolution}",
                    image.width(),
                    image.height()
                ),
            )
            .into());
        }

        let linear = to_linear(image, srgb);
        let faces = CubeFace::ALL
            .par_iter()
            .map(|face| {
                let pixels: Vec<f32> = (0..resolution * resolution)
                    .flat_map(|pixel| {
                        let (x, y) = (pixel % resolution, pixel / resolution);
                        let direction = face_direction(*face, x, y, resolution);
                        let (u, v) = direction_to_uv(direction);
                        sample_bilinear(&linear, u, v)
                    })
                    .collect();
                let face = image::Rgba32FImage::from_raw(resolution, resolution, pixels)
                    .unwrap_or_default();
                from_linear(&face, srgb).into_raw()
            })
            .collect();

        Ok(Self { resolution, faces })
    }
}

impl CubeMapLoader for EquirectangularCubeMapLoader {
    fn face_dimensions(&self) -> (u32, u32) {
        (self.resolution, self.resolution)
    }

    fn mip_level_count(&self) -> u32 {
        1
    }

    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Rgba8
    }

    fn load_face(&self, face: CubeFace, mip_level: u32) -> Result<&[u8]> {
        if mip_level != 0 {
            return Err(Error::new(
                ErrorKind::OutOfRange,
                format!("The cube map has no mip level {mip_level}"),
            )
            .into());
        }
        Ok(&self.faces[face_index(face)])
    }
}
