use anyhow::Result;
use image::imageops::FilterType;
use rayon::prelude::*;

use crate::config::ImagesConfig;
use crate::data::texture::{MipMap, PixelFormat};
use crate::error::{Error, ErrorKind};

pub const KTX2_MIME_TYPE: &str = "image/ktx2";
const KTX2_IDENTIFIER: [u8; 12] = [
    0xAB, 0x4B, 0x54, 0x58, 0x20, 0x32, 0x30, 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
];

pub fn srgb_to_linear(value: f32) -> f32 {
    if value <= 0.04045 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}

pub fn linear_to_srgb(value: f32) -> f32 {
    if value <= 0.003_130_8 {
        value * 12.92
    } else {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    }
}

fn decode_failure(message: String) -> anyhow::Error {
    Error::new(ErrorKind::ImageDecodeFailure, message).into()
}

/// Decodes PNG, JPEG, HDR or uncompressed KTX2 bytes to 8-bit RGBA.
///
/// `mime_type` picks the codec when present, otherwise the format is sniffed from the bytes.
pub fn decode_image(bytes: &[u8], mime_type: Option<&str>) -> Result<image::RgbaImage> {
    if mime_type == Some(KTX2_MIME_TYPE) || bytes.starts_with(&KTX2_IDENTIFIER) {
        return decode_ktx2(bytes);
    }

    let image_format = match mime_type {
        Some(mime_type) => match image::ImageFormat::from_mime_type(mime_type) {
            Some(image_format) => Some(image_format),
            None => {
                return Err(decode_failure(format!(
                    "The given MIME type is not supported: {mime_type}"
                )))
            }
        },
        None => None,
    };

    let loaded_image = match image_format {
        Some(image_format) => image::load_from_memory_with_format(bytes, image_format),
        None => image::load_from_memory(bytes),
    }
    .map_err(|error| decode_failure(format!("Unable to decode image: {error}")))?;

    Ok(loaded_image.to_rgba8())
}

/// Base level of a single-face KTX2 image with an uncompressed RGBA format.
fn decode_ktx2(bytes: &[u8]) -> Result<image::RgbaImage> {
    let reader = ktx2::Reader::new(bytes)
        .map_err(|error| decode_failure(format!("Invalid KTX2 image: {error:?}")))?;
    let header = reader.header();

    if header.supercompression_scheme.is_some() {
        return Err(decode_failure(String::from(
            "Supercompressed KTX2 images are not supported",
        )));
    }

    let (width, height) = (header.pixel_width, header.pixel_height.max(1));
    let Some(level) = reader.levels().next() else {
        return Err(decode_failure(String::from("The KTX2 image has no levels")));
    };

    let pixel_format = ktx2_pixel_format(header.format)?;
    let length = MipMap::byte_len(width, height, pixel_format);
    let Some(level) = level.get(..length) else {
        return Err(decode_failure(format!(
            "The KTX2 base level is too short: {} < {length}",
            level.len()
        )));
    };

    let image = match pixel_format {
        PixelFormat::Rgba8 => image::RgbaImage::from_raw(width, height, level.to_vec()),
        PixelFormat::Rgba16Float => {
            let values: Vec<f32> = level
                .chunks_exact(2)
                .map(|bytes| half::f16::from_le_bytes([bytes[0], bytes[1]]).to_f32())
                .collect();
            image::Rgba32FImage::from_raw(width, height, values)
                .map(|image| image::DynamicImage::from(image).to_rgba8())
        }
        PixelFormat::Rgba32Float => {
            let values: Vec<f32> = level
                .chunks_exact(4)
                .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
                .collect();
            image::Rgba32FImage::from_raw(width, height, values)
                .map(|image| image::DynamicImage::from(image).to_rgba8())
        }
    };

    image.ok_or_else(|| decode_failure(String::from("Unable to wrap the KTX2 pixels")))
}

pub fn ktx2_pixel_format(format: Option<ktx2::Format>) -> Result<PixelFormat> {
    match format {
        Some(ktx2::Format::R8G8B8A8_UNORM) | Some(ktx2::Format::R8G8B8A8_SRGB) => {
            Ok(PixelFormat::Rgba8)
        }
        Some(ktx2::Format::R16G16B16A16_SFLOAT) => Ok(PixelFormat::Rgba16Float),
        Some(ktx2::Format::R32G32B32A32_SFLOAT) => Ok(PixelFormat::Rgba32Float),
        other => Err(decode_failure(format!(
            "The KTX2 format is not supported: {other:?}"
        ))),
    }
}

/// Shrinks `image` to fit within the configured maximum size, keeping its aspect ratio.
pub fn fit_image(image: image::RgbaImage, config: &ImagesConfig) -> image::RgbaImage {
    let (width, height) = image.dimensions();
    let max_width = if config.max_width > 0 { config.max_width } else { width };
    let max_height = if config.max_height > 0 { config.max_height } else { height };
    if width <= max_width && height <= max_height {
        return image;
    }

    let ratio = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let new_width = ((width as f64 * ratio).round() as u32).max(1);
    let new_height = ((height as f64 * ratio).round() as u32).max(1);

    log::debug!("Resizing image from {width}x{height} to {new_width}x{new_height}");
    image::imageops::resize(&image, new_width, new_height, FilterType::Triangle)
}

/// `ceil(log2(max(width, height))) + 1` for power-of-two sizes, otherwise a single level.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    if width == 0 || height == 0 || !width.is_power_of_two() || !height.is_power_of_two() {
        return 1;
    }
    width.max(height).ilog2() + 1
}

pub fn to_linear(image: &image::RgbaImage, srgb: bool) -> image::Rgba32FImage {
    let (width, height) = image.dimensions();
    let values = image
        .as_raw()
        .par_chunks_exact(4)
        .flat_map_iter(|pixel| {
            let convert = move |channel: usize| {
                let value = pixel[channel] as f32 / 255.0;
                match srgb && channel < 3 {
                    true => srgb_to_linear(value),
                    false => value,
                }
            };
            [convert(0), convert(1), convert(2), convert(3)]
        })
        .collect();

    image::Rgba32FImage::from_raw(width, height, values).unwrap_or_default()
}

pub fn from_linear(image: &image::Rgba32FImage, srgb: bool) -> image::RgbaImage {
    let (width, height) = image.dimensions();
    let values = image
        .as_raw()
        .par_chunks_exact(4)
        .flat_map_iter(|pixel| {
            let convert = move |channel: usize| {
                let value = pixel[channel].clamp(0.0, 1.0);
                let value = match srgb && channel < 3 {
                    true => linear_to_srgb(value),
                    false => value,
                };
                (value * 255.0).round() as u8
            };
            [convert(0), convert(1), convert(2), convert(3)]
        })
        .collect();

    image::RgbaImage::from_raw(width, height, values).unwrap_or_default()
}

fn mip(image: &image::RgbaImage) -> MipMap {
    MipMap {
        width: image.width(),
        height: image.height(),
        pixel_format: PixelFormat::Rgba8,
        bytes: image.as_raw().clone(),
    }
}

/// The base level plus, when requested and possible, a bilinear mip chain built in linear space.
pub fn generate_mips(image: &image::RgbaImage, srgb: bool, generate: bool) -> Vec<MipMap> {
    let (width, height) = image.dimensions();
    let level_count = match generate {
        true => mip_level_count(width, height),
        false => 1,
    };
    if level_count == 1 {
        return vec![mip(image)];
    }

    let linear = to_linear(image, srgb);
    let mut mips = vec![mip(image)];
    mips.par_extend((1..level_count).into_par_iter().map(|level| {
        let level_width = (width >> level).max(1);
        let level_height = (height >> level).max(1);
        let resized =
            image::imageops::resize(&linear, level_width, level_height, FilterType::Triangle);
        mip(&from_linear(&resized, srgb))
    }));
    mips
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::gltf::fixture::png;

    #[test]
    fn decodes_with_and_without_mime_type() {
        let bytes = png(2, 3, [10, 20, 30, 255]);

        let sniffed = decode_image(&bytes, None).unwrap();
        assert_eq!(sniffed.dimensions(), (2, 3));
        assert_eq!(sniffed.get_pixel(1, 2).0, [10, 20, 30, 255]);

        assert!(decode_image(&bytes, Some("image/png")).is_ok());
    }

    #[test]
    fn decode_failures_are_typed() {
        let error = decode_image(&[1, 2, 3], None).unwrap_err();
        assert_eq!(
            crate::error::kind_of(&error),
            Some(ErrorKind::ImageDecodeFailure)
        );

        let error = decode_image(&png(1, 1, [0; 4]), Some("image/x-unknown")).unwrap_err();
        assert_eq!(
            crate::error::kind_of(&error),
            Some(ErrorKind::ImageDecodeFailure)
        );
    }

    #[test]
    fn mip_chain_depth() {
        assert_eq!(mip_level_count(4, 4), 3);
        assert_eq!(mip_level_count(8, 2), 4);
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(3, 4), 1);
    }

    #[test]
    fn mips_keep_flat_colors() {
        let image = image::RgbaImage::from_pixel(4, 2, image::Rgba([200, 100, 50, 255]));
        let mips = generate_mips(&image, true, true);

        let sizes: Vec<(u32, u32)> = mips.iter().map(|mip| (mip.width, mip.height)).collect();
        assert_eq!(sizes, vec![(4, 2), (2, 1), (1, 1)]);
        for mip in &mips {
            for (value, expected) in mip.bytes.iter().zip([200u8, 100, 50, 255]) {
                assert!((*value as i32 - expected as i32).abs() <= 1);
            }
        }

        assert_eq!(generate_mips(&image, true, false).len(), 1);
    }

    #[test]
    fn fit_keeps_aspect_ratio() {
        let image = image::RgbaImage::new(8, 4);
        let config = ImagesConfig {
            max_width: 4,
            ..Default::default()
        };
        assert_eq!(fit_image(image.clone(), &config).dimensions(), (4, 2));
        assert_eq!(
            fit_image(image, &ImagesConfig::default()).dimensions(),
            (8, 4)
        );
    }

    #[test]
    fn srgb_round_trip_is_stable() {
        for value in [0.0, 0.002, 0.2, 0.5, 1.0] {
            assert!((linear_to_srgb(srgb_to_linear(value)) - value).abs() < 1e-4);
        }
    }
}
