//! Tile encoder.
//!
//! Serializes processed tiles to JPEG or PNG, embedding the tile's ICC
//! profile when one is attached.
//!
//! # Design Decisions
//!
//! - **Quality applies to JPEG only**: PNG output is lossless and ignores it.
//!
//! - **Profile embedding is best effort**: a profile the encoder rejects is
//!   logged and the tile is served without it.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use clap::ValueEnum;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder};
use tracing::warn;

use crate::error::TileError;

use super::buffer::Tile;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

// =============================================================================
// Tile Format
// =============================================================================

/// Output formats a Deep Zoom viewer can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum TileFormat {
    #[default]
    Jpeg,
    Png,
}

impl TileFormat {
    /// Name used in tile URLs and the DZI descriptor.
    pub fn as_str(&self) -> &'static str {
        match self {
            TileFormat::Jpeg => "jpeg",
            TileFormat::Png => "png",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            TileFormat::Jpeg => "image/jpeg",
            TileFormat::Png => "image/png",
        }
    }
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TileFormat {
    type Err = TileError;

    /// Case-insensitive; only `jpeg` and `png` are served.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" => Ok(TileFormat::Jpeg),
            "png" => Ok(TileFormat::Png),
            _ => Err(TileError::UnsupportedFormat(s.to_string())),
        }
    }
}

// =============================================================================
// Encoder
// =============================================================================

/// Encodes tiles at a fixed JPEG quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileEncoder {
    quality: u8,
}

impl Default for TileEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl TileEncoder {
    /// Create an encoder; `quality` is clamped to 1-100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: clamp_quality(quality),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode `tile` in `format`.
    pub fn encode(&self, tile: &Tile, format: TileFormat) -> Result<Bytes, TileError> {
        let mut output = Vec::new();
        match format {
            TileFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut output, self.quality);
                // JPEG has no alpha and no 16-bit samples
                let image = match &tile.image {
                    DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => {
                        std::borrow::Cow::Borrowed(&tile.image)
                    }
                    other => std::borrow::Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
                };
                write_image(encoder, &image, tile)?;
            }
            TileFormat::Png => {
                let encoder = PngEncoder::new(&mut output);
                let image = match &tile.image {
                    DynamicImage::ImageLuma8(_)
                    | DynamicImage::ImageLumaA8(_)
                    | DynamicImage::ImageRgb8(_)
                    | DynamicImage::ImageRgba8(_)
                    | DynamicImage::ImageLuma16(_)
                    | DynamicImage::ImageLumaA16(_)
                    | DynamicImage::ImageRgb16(_)
                    | DynamicImage::ImageRgba16(_) => std::borrow::Cow::Borrowed(&tile.image),
                    other => std::borrow::Cow::Owned(DynamicImage::ImageRgba8(other.to_rgba8())),
                };
                write_image(encoder, &image, tile)?;
            }
        }
        Ok(Bytes::from(output))
    }
}

fn write_image<E: ImageEncoder>(
    mut encoder: E,
    image: &DynamicImage,
    tile: &Tile,
) -> Result<(), TileError> {
    if let Some(ref profile) = tile.icc_profile {
        if let Err(e) = encoder.set_icc_profile(profile.to_vec()) {
            warn!("Dropping ICC profile from encoded tile: {}", e);
        }
    }

    encoder
        .write_image(
            image.as_bytes(),
            image.width(),
            image.height(),
            image.color().into(),
        )
        .map_err(|e| TileError::Encode {
            message: e.to_string(),
        })
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Whether `quality` is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to 1-100.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
