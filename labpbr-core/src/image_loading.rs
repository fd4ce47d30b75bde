//! Image loading and saving.
//!
//! Decodes PNG, JPG, and TGA files into an interleaved [`PixelBuffer`] and
//! encodes buffers back to PNG or JPG. TGA output is not implemented.

use crate::{Error, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageEncoder, ImageFormat};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Supported image formats for loading
pub const SUPPORTED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Tga,
];

/// Extensions recognised as texture files when scanning folders
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tga"];

/// An interleaved 8-bit pixel buffer.
///
/// Channel `c` of pixel `i` lives at `data[i * channels + c]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Channels per pixel: 1 (grayscale), 3 (RGB) or 4 (RGBA)
    pub channels: u8,
    /// Interleaved pixel data, row-major
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw interleaved bytes, checking the length invariant.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self> {
        let buffer = Self {
            width,
            height,
            channels,
            data,
        };
        buffer.validate()?;
        Ok(buffer)
    }

    /// A buffer where every pixel has the same value. The channel count is
    /// the length of `pixel`.
    pub fn filled(width: u32, height: u32, pixel: &[u8]) -> Result<Self> {
        let channels =
            u8::try_from(pixel.len()).map_err(|_| Error::InvalidChannelCount(pixel.len()))?;
        let count = (width as usize) * (height as usize);
        Self::new(width, height, channels, pixel.repeat(count))
    }

    /// Total number of pixels
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    pub fn has_alpha(&self) -> bool {
        self.channels == 4
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Get pixel at (x, y) as a channel slice
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let stride = self.channels as usize;
        let i = (y as usize * self.width as usize + x as usize) * stride;
        self.data.get(i..i + stride)
    }

    /// Check that `data` holds exactly `width * height * channels` bytes.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.channels, 1 | 3 | 4) {
            return Err(Error::InvalidChannelCount(self.channels as usize));
        }
        let expected = self.pixel_count() * self.channels as usize;
        if self.data.len() != expected {
            return Err(Error::InvalidBuffer {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    fn from_dynamic(image: DynamicImage) -> Self {
        let (width, height) = image.dimensions();
        if image.color().has_alpha() {
            Self {
                width,
                height,
                channels: 4,
                data: image.to_rgba8().into_raw(),
            }
        } else {
            Self {
                width,
                height,
                channels: 3,
                data: image.to_rgb8().into_raw(),
            }
        }
    }

    fn color_type(&self) -> ExtendedColorType {
        match self.channels {
            1 => ExtendedColorType::L8,
            3 => ExtendedColorType::Rgb8,
            _ => ExtendedColorType::Rgba8,
        }
    }

    /// Copy without the alpha channel (RGBA -> RGB); other layouts are cloned.
    fn without_alpha(&self) -> PixelBuffer {
        if !self.has_alpha() {
            return self.clone();
        }
        let data = self
            .data
            .chunks_exact(4)
            .flat_map(|p| [p[0], p[1], p[2]])
            .collect();
        PixelBuffer {
            width: self.width,
            height: self.height,
            channels: 3,
            data,
        }
    }
}

/// Output container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpg,
    Tga,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Tga => "tga",
        }
    }

    /// Whether the container can store an alpha channel
    pub fn supports_alpha(&self) -> bool {
        !matches!(self, OutputFormat::Jpg)
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpg),
            "tga" => Ok(OutputFormat::Tga),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Encoding parameters for [`save_texture`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    pub format: OutputFormat,
    /// 1 (fastest / smallest) to 10 (best)
    pub quality: u8,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            quality: 9,
        }
    }
}

impl SaveOptions {
    fn png_compression(&self) -> CompressionType {
        match self.quality {
            0..=3 => CompressionType::Fast,
            4..=7 => CompressionType::Default,
            _ => CompressionType::Best,
        }
    }

    fn jpeg_quality(&self) -> u8 {
        self.quality.clamp(1, 10) * 10
    }
}

/// Loads texture images (PNG, JPG, TGA)
pub struct ImageLoader;

impl ImageLoader {
    /// Load an image from a file path into an RGB or RGBA buffer.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<PixelBuffer> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::NotFound(path.to_path_buf()));
        }

        let reader = image::ImageReader::open(path)?.with_guessed_format()?;
        let format = reader.format().unwrap_or(ImageFormat::Png);

        if !SUPPORTED_FORMATS.contains(&format) {
            return Err(Error::UnsupportedFormat(format!("{:?}", format)));
        }

        let image = reader.decode()?;
        let buffer = PixelBuffer::from_dynamic(image);
        if buffer.width == 0 || buffer.height == 0 {
            return Err(Error::InvalidDimensions {
                width: buffer.width,
                height: buffer.height,
            });
        }
        Ok(buffer)
    }

    /// Whether the path has a texture extension this loader understands
    pub fn is_image_path<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
    }
}

/// Saves a buffer to `output_path`, creating parent directories as needed.
///
/// JPG output silently drops alpha; callers that care check
/// [`OutputFormat::supports_alpha`] first.
pub fn save_texture<P: AsRef<Path>>(
    buffer: &PixelBuffer,
    output_path: P,
    options: SaveOptions,
) -> Result<PathBuf> {
    let path = output_path.as_ref();
    buffer.validate()?;

    if options.format == OutputFormat::Tga {
        return Err(Error::UnsupportedFormat(
            "TGA output is not implemented. Use png or jpg.".into(),
        ));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let writer = BufWriter::new(File::create(path)?);
    if options.format == OutputFormat::Jpg {
        let rgb = buffer.without_alpha();
        let encoder = JpegEncoder::new_with_quality(writer, options.jpeg_quality());
        encoder.write_image(&rgb.data, rgb.width, rgb.height, rgb.color_type())?;
    } else {
        let encoder =
            PngEncoder::new_with_quality(writer, options.png_compression(), FilterType::Adaptive);
        encoder.write_image(&buffer.data, buffer.width, buffer.height, buffer.color_type())?;
    }

    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_png_returns_width_height_and_data() {
        let img = image::RgbaImage::from_raw(
            3,
            2,
            vec![
                255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255,
                128, 128, 128, 255, 64, 64, 64, 128, 0, 0, 0, 255,
            ],
        )
        .unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("texture.png");
        img.save(&path).unwrap();

        let loaded = ImageLoader::load(&path).unwrap();

        assert_eq!(loaded.width, 3);
        assert_eq!(loaded.height, 2);
        assert_eq!(loaded.channels, 4);
        assert_eq!(loaded.data.len(), 3 * 2 * 4);
        assert_eq!(loaded.pixel(0, 0), Some(&[255, 0, 0, 255][..]));
        assert_eq!(loaded.pixel(1, 1), Some(&[64, 64, 64, 128][..]));
    }

    #[test]
    fn load_rgb_png_keeps_three_channels() {
        let img = image::RgbImage::from_raw(2, 1, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("rgb.png");
        img.save(&path).unwrap();

        let loaded = ImageLoader::load(&path).unwrap();
        assert_eq!(loaded.channels, 3);
        assert_eq!(loaded.data, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ImageLoader::load(tmp.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn new_rejects_wrong_length() {
        let err = PixelBuffer::new(2, 2, 3, vec![0; 11]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidBuffer {
                expected: 12,
                actual: 11
            }
        ));
    }

    #[test]
    fn filled_checks_channel_count() {
        let buffer = PixelBuffer::filled(2, 3, &[1, 2, 3, 4]).unwrap();
        assert_eq!(buffer.data.len(), 24);
        assert_eq!(buffer.pixel(1, 2), Some(&[1, 2, 3, 4][..]));

        let err = PixelBuffer::filled(2, 2, &[1, 2]).unwrap_err();
        assert!(matches!(err, Error::InvalidChannelCount(2)));
        assert!(matches!(
            PixelBuffer::new(1, 1, 5, vec![0; 5]),
            Err(Error::InvalidChannelCount(5))
        ));
    }

    #[test]
    fn save_png_creates_parent_dirs_and_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("out.png");
        let buffer = PixelBuffer::new(2, 1, 4, vec![10, 20, 30, 40, 50, 60, 70, 80]).unwrap();

        let written = save_texture(&buffer, &path, SaveOptions::default()).unwrap();
        assert_eq!(written, path);

        let loaded = ImageLoader::load(&path).unwrap();
        assert_eq!(loaded, buffer);
    }

    #[test]
    fn save_grayscale_png() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("height.png");
        let buffer = PixelBuffer::new(2, 2, 1, vec![0, 64, 128, 255]).unwrap();

        save_texture(&buffer, &path, SaveOptions::default()).unwrap();
        let loaded = ImageLoader::load(&path).unwrap();
        assert_eq!(loaded.channels, 3);
        assert_eq!(loaded.pixel(1, 0), Some(&[64, 64, 64][..]));
    }

    #[test]
    fn save_jpg_drops_alpha() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.jpg");
        let buffer = PixelBuffer::filled(4, 4, &[128, 128, 128, 7]).unwrap();
        let options = SaveOptions {
            format: OutputFormat::Jpg,
            quality: 10,
        };

        save_texture(&buffer, &path, options).unwrap();
        let loaded = ImageLoader::load(&path).unwrap();
        assert_eq!(loaded.channels, 3);
    }

    #[test]
    fn save_tga_is_unsupported() {
        let tmp = tempfile::tempdir().unwrap();
        let buffer = PixelBuffer::filled(1, 1, &[0, 0, 0]).unwrap();
        let options = SaveOptions {
            format: OutputFormat::Tga,
            quality: 5,
        };
        let err = save_texture(&buffer, tmp.path().join("out.tga"), options).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
        assert!(!tmp.path().join("out.tga").exists());
    }

    #[test]
    fn output_format_parses_names() {
        assert_eq!("PNG".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert_eq!("jpeg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpg);
        assert!("bmp".parse::<OutputFormat>().is_err());
    }
}
