#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8,
    Rgba16Float,
    Rgba32Float,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgba16Float => 8,
            PixelFormat::Rgba32Float => 16,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MipMap {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub bytes: Vec<u8>,
}

impl MipMap {
    pub fn byte_len(width: u32, height: u32, pixel_format: PixelFormat) -> usize {
        width as usize * height as usize * pixel_format.bytes_per_pixel()
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    #[default]
    Linear,
}

impl TextureFilter {
    pub fn from_gl(value: u64) -> Self {
        // NEAREST, NEAREST_MIPMAP_NEAREST, NEAREST_MIPMAP_LINEAR
        match value {
            9728 | 9984 | 9986 => TextureFilter::Nearest,
            _ => TextureFilter::Linear,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TextureWrap {
    #[default]
    Repeat,
    Clamp,
    Mirror,
}

impl TextureWrap {
    pub fn from_gl(value: u64) -> Self {
        match value {
            33071 => TextureWrap::Clamp,
            33648 => TextureWrap::Mirror,
            _ => TextureWrap::Repeat,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TextureSampler {
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub wrap_s: TextureWrap,
    pub wrap_t: TextureWrap,
}

/// Ordered mip chain, base level first.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub index: Option<usize>,
    pub mips: Vec<MipMap>,
    pub srgb: bool,
    pub sampler: TextureSampler,
}

impl Texture {
    pub fn width(&self) -> u32 {
        self.mips.first().map_or(0, |mip| mip.width)
    }

    pub fn height(&self) -> u32 {
        self.mips.first().map_or(0, |mip| mip.height)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];
}

/// Six faces, each with its own mip chain, in `CubeFace::ALL` order.
#[derive(Clone, Debug, PartialEq)]
pub struct CubeMap {
    pub resolution: u32,
    pub srgb: bool,
    pub faces: Vec<Vec<MipMap>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextureArray {
    pub srgb: bool,
    pub layers: Vec<MipMap>,
}
