use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use crate::config::MaterialsConfig;
use crate::data::texture::{
    CubeMap, MipMap, PixelFormat, Texture, TextureArray, TextureFilter, TextureSampler,
    TextureWrap,
};
use crate::error::{Error, ErrorKind};
use crate::resource::cubemap::equirectangular::EquirectangularCubeMapLoader;
use crate::resource::cubemap::faces::FacesCubeMapLoader;
use crate::resource::cubemap::ktx2::Ktx2CubeMapLoader;
use crate::resource::cubemap::load_cube_map;
use crate::resource::gltf::asset::GltfAsset;
use crate::resource::gltf::extension::KHR_TEXTURE_BASISU;
use crate::resource::image::{decode_image, fit_image, generate_mips};
use crate::resource::json::{root_item, JsonValueExt};

fn texture_from_image(
    index: Option<usize>,
    image: &image::RgbaImage,
    srgb: bool,
    sampler: TextureSampler,
    config: &MaterialsConfig,
) -> Texture {
    let srgb = config.images_config.srgb.unwrap_or(srgb);
    let image = fit_image(image.clone(), &config.images_config);

    Texture {
        index,
        mips: generate_mips(&image, srgb, config.generate_mip_maps),
        srgb,
        sampler,
    }
}

fn texture_sampler(json: &Value) -> TextureSampler {
    TextureSampler {
        min_filter: json
            .get_number("minFilter")
            .map_or_else(TextureFilter::default, |value| {
                TextureFilter::from_gl(value as u64)
            }),
        mag_filter: json
            .get_number("magFilter")
            .map_or_else(TextureFilter::default, |value| {
                TextureFilter::from_gl(value as u64)
            }),
        wrap_s: json
            .get_number("wrapS")
            .map_or_else(TextureWrap::default, |value| TextureWrap::from_gl(value as u64)),
        wrap_t: json
            .get_number("wrapT")
            .map_or_else(TextureWrap::default, |value| TextureWrap::from_gl(value as u64)),
    }
}

impl GltfAsset {
    /// Decoded pixels of `images[image_index]`, before any resize.
    pub(crate) fn image(
        &self,
        image_index: usize,
        config: &MaterialsConfig,
    ) -> Result<Arc<image::RgbaImage>> {
        if let Some(image) = self.cache().images.get(&image_index, config.cache_mode) {
            log::debug!("Skipping duplicate load of glTF image: [{image_index}]");
            return Ok(image);
        }

        let json = root_item(self.root(), "images", image_index)?;
        log::debug!(
            "Loading glTF image: {} - [{image_index}]",
            json.get_name().unwrap_or("<UNNAMED>")
        );

        let bytes = self.load_object_bytes(json)?;
        let image = Arc::new(decode_image(&bytes, json.get_string("mimeType"))?);
        Ok(self
            .cache()
            .images
            .insert(image_index, image, config.cache_mode))
    }

    /// An image as a standalone texture, linear unless the images config forces sRGB.
    pub fn load_image(&self, image_index: usize, config: &MaterialsConfig) -> Result<Texture> {
        let texture = self.image(image_index, config).map(|image| {
            texture_from_image(None, &image, false, TextureSampler::default(), config)
        });
        self.report("LoadImage()", texture)
    }

    /// Decodes an image held outside of the document.
    pub fn load_image_from_blob(&self, bytes: &[u8], config: &MaterialsConfig) -> Result<Texture> {
        let texture = decode_image(bytes, None).map(|image| {
            texture_from_image(None, &image, false, TextureSampler::default(), config)
        });
        self.report("LoadImageFromBlob()", texture)
    }

    fn texture_image_index(&self, texture_index: usize, json: &Value) -> Result<usize> {
        let basisu = json
            .get_extension(KHR_TEXTURE_BASISU)
            .and_then(|extension| extension.get_index("source"));
        match basisu.or_else(|| json.get_index("source")) {
            Some(source) => Ok(source),
            None => Err(Error::new(
                ErrorKind::MissingSource,
                format!("The texture has no image source: {texture_index}"),
            )
            .into()),
        }
    }

    fn sampler(&self, json: &Value) -> TextureSampler {
        let Some(sampler_index) = json.get_index("sampler") else {
            return TextureSampler::default();
        };
        match root_item(self.root(), "samplers", sampler_index) {
            Ok(sampler) => texture_sampler(sampler),
            Err(_) => {
                log::warn!("Unknown texture sampler index {sampler_index}, using defaults");
                TextureSampler::default()
            }
        }
    }

    pub(crate) fn texture(
        &self,
        texture_index: usize,
        srgb: bool,
        config: &MaterialsConfig,
    ) -> Result<Arc<Texture>> {
        let key = (texture_index, srgb);
        if let Some(texture) = self.cache().textures.get(&key, config.cache_mode) {
            log::debug!("Skipping duplicate load of glTF texture: [{texture_index}]");
            return Ok(texture);
        }

        let json = root_item(self.root(), "textures", texture_index)?;
        log::debug!(
            "Loading glTF texture: {} - [{texture_index}]",
            json.get_name().unwrap_or("<UNNAMED>")
        );

        let image = self.image(self.texture_image_index(texture_index, json)?, config)?;
        let texture = Arc::new(texture_from_image(
            Some(texture_index),
            &image,
            srgb,
            self.sampler(json),
            config,
        ));
        Ok(self.cache().textures.insert(key, texture, config.cache_mode))
    }

    pub fn load_texture(
        &self,
        texture_index: usize,
        srgb: bool,
        config: &MaterialsConfig,
    ) -> Result<Arc<Texture>> {
        self.report(
            "LoadTexture()",
            self.texture(texture_index, srgb, config),
        )
    }

    fn image_array(
        &self,
        image_indices: &[usize],
        config: &MaterialsConfig,
    ) -> Result<TextureArray> {
        let srgb = config.images_config.srgb.unwrap_or(false);
        let mut layers = vec![];
        let mut dimensions = None;

        for image_index in image_indices {
            let image = fit_image(
                self.image(*image_index, config)?.as_ref().clone(),
                &config.images_config,
            );
            match dimensions {
                Some(dimensions) if dimensions != image.dimensions() => {
                    return Err(Error::new(
                        ErrorKind::ImageDecodeFailure,
                        format!("Array layer {image_index} does not match the first layer size"),
                    )
                    .into())
                }
                _ => dimensions = Some(image.dimensions()),
            }
            layers.extend(generate_mips(&image, srgb, false));
        }

        Ok(TextureArray { srgb, layers })
    }

    /// One layer per image, all of the same size.
    pub fn load_image_array(
        &self,
        image_indices: &[usize],
        config: &MaterialsConfig,
    ) -> Result<TextureArray> {
        self.report(
            "LoadImageArray()",
            self.image_array(image_indices, config),
        )
    }

    fn atlas_array(&self, image_index: usize, config: &MaterialsConfig) -> Result<TextureArray> {
        let atlas = self.image(image_index, config)?;
        let srgb = config.images_config.srgb.unwrap_or(false);
        let (width, height) = atlas.dimensions();

        if width == 0 || height % width != 0 {
            return Err(Error::new(
                ErrorKind::ImageDecodeFailure,
                format!("The atlas {width}x{height} is not a vertical stack of square slices"),
            )
            .into());
        }

        let slice_bytes = MipMap::byte_len(width, width, PixelFormat::Rgba8);
        let layers = atlas
            .as_raw()
            .chunks_exact(slice_bytes)
            .map(|slice| MipMap {
                width,
                height: width,
                pixel_format: PixelFormat::Rgba8,
                bytes: slice.to_vec(),
            })
            .collect();

        Ok(TextureArray { srgb, layers })
    }

    /// Slices a vertical atlas of square images into array layers.
    pub fn load_texture_array_from_atlas(
        &self,
        image_index: usize,
        config: &MaterialsConfig,
    ) -> Result<TextureArray> {
        self.report(
            "LoadTextureArrayFromAtlas()",
            self.atlas_array(image_index, config),
        )
    }

    fn faces_cube_map(
        &self,
        image_indices: &[usize; 6],
        config: &MaterialsConfig,
    ) -> Result<CubeMap> {
        let srgb = config.images_config.srgb.unwrap_or(false);
        let mut images = Vec::with_capacity(6);
        for image_index in image_indices {
            images.push(fit_image(
                self.image(*image_index, config)?.as_ref().clone(),
                &config.images_config,
            ));
        }

        let images: [image::RgbaImage; 6] = match images.try_into() {
            Ok(images) => images,
            Err(_) => {
                return Err(Error::new(
                    ErrorKind::ImageDecodeFailure,
                    String::from("A cube map needs exactly six faces"),
                )
                .into())
            }
        };
        let loader = FacesCubeMapLoader::new(&images, srgb, config.generate_mip_maps)?;
        load_cube_map(&loader, srgb)
    }

    /// A cube map from six images in `+X, -X, +Y, -Y, +Z, -Z` order.
    pub fn load_cube_map(
        &self,
        image_indices: &[usize; 6],
        config: &MaterialsConfig,
    ) -> Result<CubeMap> {
        self.report(
            "LoadCubeMap()",
            self.faces_cube_map(image_indices, config),
        )
    }

    fn equirectangular_cube_map(
        &self,
        image_index: usize,
        resolution: u32,
        config: &MaterialsConfig,
    ) -> Result<CubeMap> {
        let srgb = config.images_config.srgb.unwrap_or(false);
        let image = self.image(image_index, config)?;
        let loader = EquirectangularCubeMapLoader::new(&image, resolution, srgb)?;
        load_cube_map(&loader, srgb)
    }

    /// A cube map resampled from an equirectangular panorama.
    pub fn load_cube_map_from_equirectangular(
        &self,
        image_index: usize,
        resolution: u32,
        config: &MaterialsConfig,
    ) -> Result<CubeMap> {
        self.report(
            "LoadCubeMapFromEquirectangular()",
            self.equirectangular_cube_map(image_index, resolution, config),
        )
    }

    fn ktx2_cube_map(&self, image_index: usize, config: &MaterialsConfig) -> Result<CubeMap> {
        let json = root_item(self.root(), "images", image_index)?;
        let loader = Ktx2CubeMapLoader::from_bytes(self.load_object_bytes(json)?)?;
        load_cube_map(&loader, config.images_config.srgb.unwrap_or(false))
    }

    /// A cube map stored as an uncompressed KTX2 image.
    pub fn load_cube_map_from_ktx2(
        &self,
        image_index: usize,
        config: &MaterialsConfig,
    ) -> Result<CubeMap> {
        self.report(
            "LoadCubeMapFromKtx2()",
            self.ktx2_cube_map(image_index, config),
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::{CacheMode, ImagesConfig};
    use crate::error::kind_of;
    use crate::resource::gltf::fixture::{identity_config, png, DocumentBuilder};

    fn textured_asset() -> GltfAsset {
        let mut builder = DocumentBuilder::new();
        let red = builder.view(&png(4, 4, [255, 0, 0, 255]));
        let atlas = builder.view(&png(2, 6, [0, 0, 255, 255]));
        let broken = builder.view(&[0, 1, 2, 3]);
        builder.asset(
            json!({
                "images": [
                    {"bufferView": red, "mimeType": "image/png"},
                    {"bufferView": atlas, "mimeType": "image/png"},
                    {"bufferView": broken, "mimeType": "image/png"}
                ],
                "samplers": [{"magFilter": 9728, "wrapS": 33071, "wrapT": 33648}],
                "textures": [
                    {"source": 0, "sampler": 0},
                    {"source": 2},
                    {"sampler": 0},
                    {"source": 0, "sampler": 7}
                ]
            }),
            identity_config(),
        )
    }

    #[test]
    fn textures_are_cached_per_color_space() {
        let asset = textured_asset();
        let config = MaterialsConfig {
            generate_mip_maps: true,
            ..Default::default()
        };

        let texture = asset.load_texture(0, true, &config).unwrap();
        assert_eq!(texture.mips.len(), 3);
        assert!(texture.srgb);
        assert_eq!(texture.sampler.mag_filter, TextureFilter::Nearest);
        assert_eq!(texture.sampler.wrap_s, TextureWrap::Clamp);
        assert_eq!(texture.sampler.wrap_t, TextureWrap::Mirror);

        let again = asset.load_texture(0, true, &config).unwrap();
        assert!(Arc::ptr_eq(&texture, &again));
        let linear = asset.load_texture(0, false, &config).unwrap();
        assert!(!Arc::ptr_eq(&texture, &linear));

        // an unknown sampler falls back to defaults
        let texture = asset.load_texture(3, true, &config).unwrap();
        assert_eq!(texture.sampler, TextureSampler::default());
    }

    #[test]
    fn texture_failures_are_logged() {
        let asset = textured_asset();
        let config = MaterialsConfig::default();

        let error = asset.load_texture(1, true, &config).unwrap_err();
        assert_eq!(kind_of(&error), Some(ErrorKind::ImageDecodeFailure));
        let error = asset.load_texture(2, true, &config).unwrap_err();
        assert_eq!(kind_of(&error), Some(ErrorKind::MissingSource));
        assert!(asset.load_texture(9, true, &config).is_err());

        assert_eq!(asset.get_errors().len(), 3);
        assert!(asset.get_errors()[0].starts_with("LoadTexture(): "));
    }

    #[test]
    fn images_resize_and_force_srgb() {
        let asset = textured_asset();
        let config = MaterialsConfig {
            cache_mode: CacheMode::None,
            images_config: ImagesConfig {
                max_width: 2,
                max_height: 2,
                srgb: Some(true),
            },
            ..Default::default()
        };

        let texture = asset.load_image(0, &config).unwrap();
        assert_eq!((texture.width(), texture.height()), (2, 2));
        assert!(texture.srgb);
        assert_eq!(&texture.mips[0].bytes[..4], &[255, 0, 0, 255]);

        let blob = asset
            .load_image_from_blob(&png(1, 1, [1, 2, 3, 4]), &MaterialsConfig::default())
            .unwrap();
        assert_eq!(blob.mips[0].bytes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn arrays_and_cube_maps() {
        let asset = textured_asset();
        let config = MaterialsConfig::default();

        let atlas = asset.load_texture_array_from_atlas(1, &config).unwrap();
        assert_eq!(atlas.layers.len(), 3);
        assert_eq!(atlas.layers[2].height, 2);
        assert!(asset.load_texture_array_from_atlas(0, &config).is_ok());

        let array = asset.load_image_array(&[0, 0], &config).unwrap();
        assert_eq!(array.layers.len(), 2);
        assert!(asset.load_image_array(&[0, 1], &config).is_err());

        let cube_map = asset.load_cube_map(&[0; 6], &config).unwrap();
        assert_eq!(cube_map.resolution, 4);
        assert!(asset.load_cube_map(&[0, 0, 0, 0, 0, 1], &config).is_err());

        let sky = asset
            .load_cube_map_from_equirectangular(0, 2, &config)
            .unwrap();
        assert_eq!(sky.faces[0][0].bytes.len(), 2 * 2 * 4);
        assert!(asset.load_cube_map_from_ktx2(0, &config).is_err());
    }
}
