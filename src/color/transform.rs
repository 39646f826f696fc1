//! Per-slide colour transforms.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use clap::ValueEnum;
use image::DynamicImage;
use lcms2::{DisallowCache, Flags, GlobalContext, Intent, PixelFormat, Profile, Transform};
use tracing::debug;

use crate::error::ColorError;
use crate::tile::Tile;

/// Compact sRGB v2 profile (CC0-1.0), embedded in converted tiles.
///
/// v4 profiles are mishandled by some browsers, and the profile serialized
/// by most CMS libraries is several kilobytes; this one is 456 bytes.
pub static SRGB_PROFILE_BYTES: &[u8] = include_bytes!("srgb-v2-micro.icc");

// =============================================================================
// Color Mode
// =============================================================================

/// How embedded colour profiles are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorMode {
    /// Convert to sRGB using the profile's own rendering intent
    #[default]
    Default,

    /// Convert to sRGB with the absolute colorimetric intent
    AbsoluteColorimetric,

    /// Convert to sRGB with the relative colorimetric intent
    RelativeColorimetric,

    /// Convert to sRGB with the perceptual intent
    Perceptual,

    /// Convert to sRGB with the saturation intent
    Saturation,

    /// Embed the original profile in every tile
    Embed,

    /// Strip the profile from tiles
    Ignore,
}

impl ColorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorMode::Default => "default",
            ColorMode::AbsoluteColorimetric => "absolute-colorimetric",
            ColorMode::RelativeColorimetric => "relative-colorimetric",
            ColorMode::Perceptual => "perceptual",
            ColorMode::Saturation => "saturation",
            ColorMode::Embed => "embed",
            ColorMode::Ignore => "ignore",
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorMode {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(ColorMode::Default),
            "absolute-colorimetric" => Ok(ColorMode::AbsoluteColorimetric),
            "relative-colorimetric" => Ok(ColorMode::RelativeColorimetric),
            "perceptual" => Ok(ColorMode::Perceptual),
            "saturation" => Ok(ColorMode::Saturation),
            "embed" => Ok(ColorMode::Embed),
            "ignore" => Ok(ColorMode::Ignore),
            other => Err(ColorError::InvalidColorMode(other.to_string())),
        }
    }
}

// =============================================================================
// sRGB Conversion
// =============================================================================

type SrgbTransform = Transform<[u8; 3], [u8; 3], GlobalContext, DisallowCache>;

/// Pixels converted per call into Little CMS.
const TRANSFORM_BLOCK_PIXELS: usize = 4096;

/// Precomputed RGB to sRGB mapping for one source profile.
///
/// Built without the single-pixel cache so one instance can be applied from
/// many threads at once.
pub struct SrgbConversion {
    transform: SrgbTransform,
    intent: Intent,
}

impl SrgbConversion {
    /// Build a mapping from `source_icc` to the compact sRGB profile.
    ///
    /// `intent` of `None` uses the rendering intent recorded in the source
    /// profile header.
    pub fn new(source_icc: &[u8], intent: Option<Intent>) -> Result<Self, ColorError> {
        let source =
            Profile::new_icc(source_icc).map_err(|e| ColorError::Profile(e.to_string()))?;
        let target = Profile::new_icc(SRGB_PROFILE_BYTES)
            .map_err(|e| ColorError::Profile(format!("sRGB target: {}", e)))?;

        let intent = intent.unwrap_or_else(|| source.header_rendering_intent());

        let transform: SrgbTransform = Transform::new_flags_context(
            GlobalContext::new(),
            &source,
            PixelFormat::RGB_8,
            &target,
            PixelFormat::RGB_8,
            intent,
            Flags::NO_CACHE,
        )
        .map_err(|e| ColorError::Profile(e.to_string()))?;

        Ok(Self { transform, intent })
    }

    /// The rendering intent the mapping was built with.
    pub fn intent(&self) -> Intent {
        self.intent
    }

    fn apply(&self, tile: &mut Tile) {
        let image = std::mem::replace(&mut tile.image, DynamicImage::new_rgb8(0, 0));
        let mut rgb = match image {
            DynamicImage::ImageRgb8(rgb) => rgb,
            other => other.to_rgb8(),
        };

        // Convert through a fixed scratch block, no per-tile allocation
        let mut scratch = [[0u8; 3]; TRANSFORM_BLOCK_PIXELS];
        for bytes in rgb.chunks_mut(3 * TRANSFORM_BLOCK_PIXELS) {
            let pixels = &mut scratch[..bytes.len() / 3];
            for (pixel, src) in pixels.iter_mut().zip(bytes.chunks_exact(3)) {
                pixel.copy_from_slice(src);
            }
            self.transform.transform_in_place(pixels);
            for (dst, pixel) in bytes.chunks_exact_mut(3).zip(pixels.iter()) {
                dst.copy_from_slice(pixel);
            }
        }

        tile.image = DynamicImage::ImageRgb8(rgb);
        tile.icc_profile = Some(Bytes::from_static(SRGB_PROFILE_BYTES));
    }
}

impl fmt::Debug for SrgbConversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SrgbConversion")
            .field("intent", &self.intent)
            .finish()
    }
}

// =============================================================================
// Color Transform
// =============================================================================

/// What to do to each tile of one slide.
#[derive(Debug, Clone)]
pub enum ColorTransform {
    /// Leave pixels and profile metadata alone (slide has no profile)
    Passthrough,

    /// Remove the profile tag, keep pixel values
    StripProfile,

    /// Keep the original profile the decoder attached
    EmbedOriginal,

    /// Map pixels to sRGB and tag the tile with the compact sRGB profile
    Convert(Arc<SrgbConversion>),
}

impl ColorTransform {
    /// Select the transform for a slide's profile under `mode`.
    pub fn build(profile: Option<&[u8]>, mode: ColorMode) -> Result<Self, ColorError> {
        let Some(profile) = profile else {
            return Ok(ColorTransform::Passthrough);
        };

        let intent = match mode {
            ColorMode::Ignore => return Ok(ColorTransform::StripProfile),
            ColorMode::Embed => return Ok(ColorTransform::EmbedOriginal),
            ColorMode::Default => None,
            ColorMode::AbsoluteColorimetric => Some(Intent::AbsoluteColorimetric),
            ColorMode::RelativeColorimetric => Some(Intent::RelativeColorimetric),
            ColorMode::Perceptual => Some(Intent::Perceptual),
            ColorMode::Saturation => Some(Intent::Saturation),
        };

        let conversion = SrgbConversion::new(profile, intent)?;
        debug!(
            "Built sRGB conversion with intent {:?} for mode {}",
            conversion.intent(),
            mode
        );
        Ok(ColorTransform::Convert(Arc::new(conversion)))
    }

    /// Apply the transform to `tile` in place.
    pub fn apply(&self, tile: &mut Tile) {
        match self {
            ColorTransform::Passthrough | ColorTransform::EmbedOriginal => {}
            ColorTransform::StripProfile => {
                tile.icc_profile = None;
            }
            ColorTransform::Convert(conversion) => conversion.apply(tile),
        }
    }

    /// Whether applying this transform can change pixel values.
    pub fn changes_pixels(&self) -> bool {
        matches!(self, ColorTransform::Convert(_))
    }
}

// =============================================================================
// Tests
// =============================================================================
