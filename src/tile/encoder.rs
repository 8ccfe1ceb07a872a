//! JPEG re-encoding for tiles that cannot be passed through.
//!
//! Interior JPEG tiles are served as stored. Edge tiles carry padding beyond
//! the image extent, so they are decoded, cropped and re-encoded. Raw
//! (uncompressed) tiles always go through the encoder.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, RgbImage, RgbaImage};

use crate::error::EngineError;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

pub const MIN_JPEG_QUALITY: u8 = 1;
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Decodes, crops and re-encodes tiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegTileEncoder;

impl JpegTileEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode a JPEG tile, keep its top-left `width` x `height` pixels and
    /// re-encode at `quality`.
    pub fn crop_jpeg(
        &self,
        source: &[u8],
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<Bytes, EngineError> {
        let img = ImageReader::with_format(Cursor::new(source), ImageFormat::Jpeg)
            .decode()
            .map_err(|e| EngineError::Decode {
                message: e.to_string(),
            })?;
        self.encode(crop(img, width, height), quality)
    }

    /// Encode interleaved 8-bit samples of a `tile_width` x `tile_height`
    /// tile, cropped to `width` x `height`.
    ///
    /// One sample per pixel is gray, three are RGB, four are RGBA (alpha is
    /// dropped).
    #[allow(clippy::too_many_arguments)]
    pub fn encode_samples(
        &self,
        samples: &[u8],
        tile_width: u32,
        tile_height: u32,
        samples_per_pixel: u16,
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<Bytes, EngineError> {
        let pixels = tile_width as usize * tile_height as usize;
        let needed = pixels * samples_per_pixel as usize;
        if samples.len() < needed {
            return Err(EngineError::Decode {
                message: format!(
                    "raw tile holds {} bytes, expected {}",
                    samples.len(),
                    needed
                ),
            });
        }
        let samples = samples[..needed].to_vec();

        let img = match samples_per_pixel {
            1 => GrayImage::from_raw(tile_width, tile_height, samples).map(DynamicImage::ImageLuma8),
            3 => RgbImage::from_raw(tile_width, tile_height, samples).map(DynamicImage::ImageRgb8),
            4 => RgbaImage::from_raw(tile_width, tile_height, samples).map(DynamicImage::ImageRgba8),
            other => {
                return Err(EngineError::Decode {
                    message: format!("unsupported samples per pixel: {}", other),
                })
            }
        }
        .ok_or_else(|| EngineError::Decode {
            message: "raw tile buffer does not match its dimensions".to_string(),
        })?;

        self.encode(crop(img, width, height), quality)
    }

    fn encode(&self, img: DynamicImage, quality: u8) -> Result<Bytes, EngineError> {
        let mut output = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut output, clamp_quality(quality));
            // Gray stays gray; everything else is flattened to RGB.
            let result = match img {
                DynamicImage::ImageLuma8(gray) => encoder.encode_image(&gray),
                other => encoder.encode_image(&other.to_rgb8()),
            };
            result.map_err(|e| EngineError::Encode {
                message: e.to_string(),
            })?;
        }
        Ok(Bytes::from(output))
    }
}

fn crop(img: DynamicImage, width: u32, height: u32) -> DynamicImage {
    let width = width.min(img.width());
    let height = height.min(img.height());
    if (width, height) == (img.width(), img.height()) {
        img
    } else {
        img.crop_imm(0, 0, width, height)
    }
}

#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}
