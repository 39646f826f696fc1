//! Slide provider traits.
//!
//! The pyramidal-image codec lives behind these traits. A provider knows how
//! to recognise and open slide files; a handle is one opened slide that can
//! produce Deep Zoom tiles and answer metadata queries.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               SlideCache                │
//! │  (LRU of handles, derived metadata)     │
//! └────────────────────┬────────────────────┘
//!                      │ open / close
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │        SlideProvider / SlideHandle      │
//! │  (codec, tile extraction, properties)   │
//! └────────────────────┬────────────────────┘
//!                      │ optional
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           SharedDecodeCache             │
//! └─────────────────────────────────────────┘
//! ```

use std::path::Path;

use bytes::Bytes;
use image::DynamicImage;

use crate::error::SlideError;

use super::decode_cache::SharedDecodeCache;

/// Property holding the physical pixel width in microns.
pub const PROPERTY_NAME_MPP_X: &str = "openslide.mpp-x";

/// Property holding the physical pixel height in microns.
pub const PROPERTY_NAME_MPP_Y: &str = "openslide.mpp-y";

/// Default Deep Zoom tile edge in pixels (excluding overlap).
pub const DEFAULT_TILE_SIZE: u32 = 254;

/// Default overlap between adjacent Deep Zoom tiles.
pub const DEFAULT_OVERLAP: u32 = 1;

// =============================================================================
// Deep Zoom Options
// =============================================================================

/// Tiling options passed through to the provider when a slide is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DzOptions {
    /// Tile edge in pixels, not counting overlap
    pub tile_size: u32,

    /// Pixels of overlap added on each interior tile edge
    pub overlap: u32,

    /// Only tile the non-empty slide region, when the format records one
    pub limit_bounds: bool,
}

impl Default for DzOptions {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            overlap: DEFAULT_OVERLAP,
            limit_bounds: true,
        }
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Opens slides from the filesystem.
///
/// Implementations must be safe to call from many threads at once.
pub trait SlideProvider: Send + Sync + 'static {
    /// The handle type this provider produces.
    type Handle: SlideHandle;

    /// Whether `path` looks like a slide this provider can open.
    fn detect_format(&self, path: &Path) -> bool;

    /// Open the slide at `path`.
    ///
    /// Fails with [`SlideError::Unreadable`] for missing, unsupported or
    /// corrupt files.
    fn open(&self, path: &Path, options: &DzOptions) -> Result<Self::Handle, SlideError>;

    /// Whether handles can draw from a [`SharedDecodeCache`].
    ///
    /// When this returns `false` each handle manages its own decode caching.
    fn supports_shared_decode_cache(&self) -> bool {
        false
    }
}

/// One opened slide.
///
/// Handles are owned by exactly one cache entry and are closed when that
/// entry is evicted. Reads may block the calling thread on disk I/O.
pub trait SlideHandle: Send + Sync + 'static {
    /// Read a stored metadata property.
    fn property(&self, name: &str) -> Option<String>;

    /// Raw bytes of the embedded ICC profile, if any.
    fn color_profile(&self) -> Option<Bytes>;

    /// Full-resolution dimensions of the tiled region.
    fn dimensions(&self) -> (u32, u32);

    /// Number of Deep Zoom levels.
    fn level_count(&self) -> usize;

    /// Decode the Deep Zoom tile at `level`, `col`, `row`.
    ///
    /// Fails with [`SlideError::InvalidCoordinates`] outside the pyramid.
    fn read_tile(&self, level: usize, col: u32, row: u32) -> Result<DynamicImage, SlideError>;

    /// Decode the whole lowest-resolution level stored in the file.
    fn read_lowest_resolution_level(&self) -> Result<DynamicImage, SlideError>;

    /// Attach the process-wide decode cache.
    ///
    /// Only called when the provider reports support.
    fn attach_decode_cache(&mut self, _cache: SharedDecodeCache) {}

    /// Release native resources. Called exactly once, by the owning cache.
    fn close(&self);
}
