//! Image decoding and metadata

use crate::error::Result;
use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::{AnimationDecoder, ColorType, DynamicImage, ImageFormat, ImageResult};
use std::fmt;
use std::io::Cursor;
use std::path::Path;

/// Pixel layout of a decoded image, named after the usual mode strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Palette indices, one band
    P,
    L,
    La,
    Rgb,
    Rgba,
    L16,
    La16,
    Rgb16,
    Rgba16,
    RgbF,
    RgbaF,
    Unknown,
}

/// Modes the dataset is built around; anything else is flagged
pub const EXPECTED_MODES: [ColorMode; 3] = [ColorMode::Rgb, ColorMode::Rgba, ColorMode::P];

impl ColorMode {
    pub fn from_color_type(color: ColorType) -> Self {
        match color {
            ColorType::L8 => ColorMode::L,
            ColorType::La8 => ColorMode::La,
            ColorType::Rgb8 => ColorMode::Rgb,
            ColorType::Rgba8 => ColorMode::Rgba,
            ColorType::L16 => ColorMode::L16,
            ColorType::La16 => ColorMode::La16,
            ColorType::Rgb16 => ColorMode::Rgb16,
            ColorType::Rgba16 => ColorMode::Rgba16,
            ColorType::Rgb32F => ColorMode::RgbF,
            ColorType::Rgba32F => ColorMode::RgbaF,
            _ => ColorMode::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColorMode::P => "P",
            ColorMode::L => "L",
            ColorMode::La => "LA",
            ColorMode::Rgb => "RGB",
            ColorMode::Rgba => "RGBA",
            ColorMode::L16 => "I;16",
            ColorMode::La16 => "LA;16",
            ColorMode::Rgb16 => "RGB;16",
            ColorMode::Rgba16 => "RGBA;16",
            ColorMode::RgbF => "RGBF",
            ColorMode::RgbaF => "RGBAF",
            ColorMode::Unknown => "UNKNOWN",
        }
    }

    pub fn is_expected(self) -> bool {
        EXPECTED_MODES.contains(&self)
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upper-case format name, e.g. `PNG` or `JPEG`
pub fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Png => "PNG".to_string(),
        ImageFormat::Gif => "GIF".to_string(),
        ImageFormat::Jpeg => "JPEG".to_string(),
        ImageFormat::WebP => "WEBP".to_string(),
        ImageFormat::Bmp => "BMP".to_string(),
        ImageFormat::Tiff => "TIFF".to_string(),
        ImageFormat::Ico => "ICO".to_string(),
        other => other
            .extensions_str()
            .first()
            .map(|ext| ext.to_uppercase())
            .unwrap_or_else(|| format!("{:?}", other).to_uppercase()),
    }
}

/// File extension used in the image store for `format`
pub fn store_extension(format: ImageFormat) -> String {
    format_name(format).to_lowercase()
}

/// Detect the format from the bytes themselves and decode
pub fn decode(bytes: &[u8]) -> ImageResult<(DynamicImage, ImageFormat)> {
    let format = image::guess_format(bytes)?;
    let image = image::load_from_memory_with_format(bytes, format)?;
    Ok((image, format))
}

/// Number of frames; formats without animation count as one
fn count_frames(bytes: &[u8], format: ImageFormat) -> u32 {
    let counted: ImageResult<usize> = match format {
        ImageFormat::Gif => GifDecoder::new(Cursor::new(bytes))
            .map(|decoder| decoder.into_frames().take_while(|f| f.is_ok()).count()),
        ImageFormat::Png => PngDecoder::new(Cursor::new(bytes)).and_then(|decoder| {
            if decoder.is_apng()? {
                Ok(decoder.apng()?.into_frames().take_while(|f| f.is_ok()).count())
            } else {
                Ok(1)
            }
        }),
        _ => Ok(1),
    };

    counted
        .ok()
        .filter(|&n| n > 0)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(1)
}

/// Palette indices of an indexed PNG or GIF, one byte per pixel of the
/// first frame. `None` for every other image.
fn palette_indices(bytes: &[u8], format: ImageFormat) -> Option<Vec<u8>> {
    match format {
        ImageFormat::Png => png_indices(bytes),
        ImageFormat::Gif => gif_indices(bytes),
        _ => None,
    }
}

fn png_indices(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::IDENTITY);
    let mut reader = decoder.read_info().ok()?;
    if reader.info().color_type != png::ColorType::Indexed {
        return None;
    }

    let mut buf = vec![0; reader.output_buffer_size()?];
    let frame = reader.next_frame(&mut buf).ok()?;

    // Indices narrower than a byte are packed high bit first
    let bits = usize::from(frame.bit_depth as u8);
    let per_byte = 8 / bits;
    let mask = ((1u16 << bits) - 1) as u8;
    let width = frame.width as usize;

    let mut indices = Vec::with_capacity(width * frame.height as usize);
    for line in buf[..frame.buffer_size()].chunks_exact(frame.line_size) {
        for x in 0..width {
            let shift = 8 - bits * (x % per_byte + 1);
            indices.push((line[x / per_byte] >> shift) & mask);
        }
    }
    Some(indices)
}

fn gif_indices(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = options.read_info(Cursor::new(bytes)).ok()?;

    let width = usize::from(decoder.width());
    let height = usize::from(decoder.height());
    let background = decoder
        .bg_color()
        .and_then(|i| u8::try_from(i).ok())
        .unwrap_or(0);

    let frame = decoder.read_next_frame().ok()??;
    let (left, top) = (usize::from(frame.left), usize::from(frame.top));

    // The first frame may cover only part of the logical screen
    let mut canvas = vec![background; width * height];
    for (row, line) in frame.buffer.chunks_exact(usize::from(frame.width).max(1)).enumerate() {
        let y = top + row;
        if y >= height {
            break;
        }
        for (col, &index) in line.iter().enumerate() {
            let x = left + col;
            if x < width {
                canvas[y * width + x] = index;
            }
        }
    }
    Some(canvas)
}

/// A decoded image together with what the file said about itself
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    pub format: ImageFormat,
    pub frames: u32,

    /// Palette indices when the file stores indexed color; `image` holds the
    /// expanded colors either way
    pub palette_indices: Option<Vec<u8>>,
}

impl DecodedImage {
    pub fn from_bytes(bytes: &[u8]) -> ImageResult<Self> {
        let (image, format) = decode(bytes)?;
        let frames = count_frames(bytes, format);
        let palette_indices = palette_indices(bytes, format);
        Ok(Self {
            image,
            format,
            frames,
            palette_indices,
        })
    }

    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::from_bytes(&bytes)?)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn mode(&self) -> ColorMode {
        if self.palette_indices.is_some() {
            return ColorMode::P;
        }
        ColorMode::from_color_type(self.image.color())
    }

    pub fn channel_count(&self) -> usize {
        if self.palette_indices.is_some() {
            return 1;
        }
        usize::from(self.image.color().channel_count())
    }

    pub fn is_animated(&self) -> bool {
        self.frames > 1
    }

    /// Interleaved 8-bit samples in the image's own channel layout. Indexed
    /// images yield their palette indices.
    pub fn samples_u8(&self) -> Vec<u8> {
        if let Some(indices) = &self.palette_indices {
            return indices.clone();
        }
        match self.channel_count() {
            1 => self.image.to_luma8().into_raw(),
            2 => self.image.to_luma_alpha8().into_raw(),
            3 => self.image.to_rgb8().into_raw(),
            _ => self.image.to_rgba8().into_raw(),
        }
    }
}
