//! Configuration for the Deep Zoom tile core.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `DEEPZOOM_` prefix
//! - Defaults matching the multi-slide viewer
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use wsi_deepzoom::config::{init_logging, Config};
//!
//! let config = Config::parse();
//! init_logging(config.verbose);
//! config.validate()?;
//!
//! let cache = SlideCache::new(provider, config.slide_cache_config());
//! ```
//!
//! # Environment Variables
//!
//! - `DEEPZOOM_SLIDE_DIR` - Root directory of slides (default: .)
//! - `DEEPZOOM_CACHE_SLIDES` - Max open slides (default: 10)
//! - `DEEPZOOM_CACHE_TILES_MB` - Shared decode cache budget in MB (default: 128)
//! - `DEEPZOOM_TILE_SIZE` - Tile edge in pixels (default: 254)
//! - `DEEPZOOM_OVERLAP` - Tile overlap in pixels (default: 1)
//! - `DEEPZOOM_IGNORE_BOUNDS` - Tile the whole slide, not just its bounds
//! - `DEEPZOOM_FORMAT` - Advertised tile format, jpeg or png (default: jpeg)
//! - `DEEPZOOM_QUALITY` - JPEG quality (default: 75)
//! - `DEEPZOOM_COLOR_MODE` - Colour handling (default: default)

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::color::ColorMode;
use crate::slide::{
    DzOptions, SlideCacheConfig, DEFAULT_OVERLAP, DEFAULT_SLIDE_CACHE_CAPACITY, DEFAULT_TILE_SIZE,
};
use crate::tile::{TileFormat, DEFAULT_JPEG_QUALITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default shared decode cache budget in megabytes.
pub const DEFAULT_TILE_CACHE_MB: usize = 128;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Deep Zoom tile core for whole-slide images.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "wsi-deepzoom")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Directory containing the slides.
    #[arg(long, default_value = ".", env = "DEEPZOOM_SLIDE_DIR")]
    pub slide_dir: PathBuf,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Maximum number of slides kept open.
    #[arg(long, default_value_t = DEFAULT_SLIDE_CACHE_CAPACITY, env = "DEEPZOOM_CACHE_SLIDES")]
    pub cache_slides: usize,

    /// Decoded tile cache shared by all open slides, in megabytes.
    #[arg(long, default_value_t = DEFAULT_TILE_CACHE_MB, env = "DEEPZOOM_CACHE_TILES_MB")]
    pub cache_tiles_mb: usize,

    // =========================================================================
    // Deep Zoom Configuration
    // =========================================================================
    /// Tile edge in pixels, excluding overlap.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "DEEPZOOM_TILE_SIZE")]
    pub tile_size: u32,

    /// Overlap between adjacent tiles in pixels.
    #[arg(long, default_value_t = DEFAULT_OVERLAP, env = "DEEPZOOM_OVERLAP")]
    pub overlap: u32,

    /// Tile the whole slide instead of only its non-empty bounds.
    #[arg(long, default_value_t = false, env = "DEEPZOOM_IGNORE_BOUNDS")]
    pub ignore_bounds: bool,

    /// Tile format advertised to viewers.
    #[arg(long, value_enum, default_value_t = TileFormat::Jpeg, env = "DEEPZOOM_FORMAT")]
    pub format: TileFormat,

    /// JPEG compression quality (1-100).
    #[arg(short, long, default_value_t = DEFAULT_JPEG_QUALITY, env = "DEEPZOOM_QUALITY")]
    pub quality: u8,

    /// How embedded ICC profiles are handled.
    #[arg(long, value_enum, default_value_t = ColorMode::Default, env = "DEEPZOOM_COLOR_MODE")]
    pub color_mode: ColorMode,

    // =========================================================================
    // Logging
    // =========================================================================
    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration.
    ///
    /// Returns an error message if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_slides == 0 {
            return Err("cache_slides must be greater than 0".to_string());
        }

        if self.quality == 0 || self.quality > 100 {
            return Err("quality must be between 1 and 100".to_string());
        }

        if self.tile_size == 0 {
            return Err("tile_size must be greater than 0".to_string());
        }

        if self.overlap >= self.tile_size {
            return Err("overlap must be smaller than tile_size".to_string());
        }

        Ok(())
    }

    /// Whether only the non-empty slide bounds are tiled.
    pub fn limit_bounds(&self) -> bool {
        !self.ignore_bounds
    }

    /// Shared decode cache budget in bytes.
    pub fn decode_budget_bytes(&self) -> usize {
        self.cache_tiles_mb.saturating_mul(1024 * 1024)
    }

    /// Tiling options passed through to the slide provider.
    pub fn dz_options(&self) -> DzOptions {
        DzOptions {
            tile_size: self.tile_size,
            overlap: self.overlap,
            limit_bounds: self.limit_bounds(),
        }
    }

    /// Settings for the slide cache.
    pub fn slide_cache_config(&self) -> SlideCacheConfig {
        SlideCacheConfig {
            capacity: self.cache_slides,
            shared_decode_budget_bytes: self.decode_budget_bytes(),
            dz_options: self.dz_options(),
            color_mode: self.color_mode,
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the verbosity flag. No-op if a global
/// subscriber is already set.
pub fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "wsi_deepzoom=debug"
    } else {
        "wsi_deepzoom=info"
    };

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
