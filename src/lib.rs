//! # WSI Deep Zoom
//!
//! Tile-serving core for Deep Zoom viewers of whole-slide microscopy images.
//!
//! This library sits between a pyramidal-image codec (behind the
//! [`SlideProvider`] trait) and an HTTP layer. It keeps a bounded set of
//! slides open, converts their embedded colour profiles to sRGB, recolours
//! intensity tiles through colormaps, and flattens annotation polygons for
//! the viewer.
//!
//! ## Features
//!
//! - **Slide cache**: LRU of open slide handles with a shared decoded-tile budget
//! - **Colour management**: per-slide ICC to sRGB transforms built once via Little CMS
//! - **Colormap overlays**: percentile-normalized, piecewise-linear recolouring
//! - **Annotation geometry**: R-tree crop queries and vertex/hole records
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`slide`] - Provider traits, slide cache and shared decode cache
//! - [`color`] - Colour modes and per-slide colour transforms
//! - [`overlay`] - Colormap engine and per-slide colormap registry
//! - [`annotation`] - Annotation geometry model and extraction
//! - [`tile`] - Tile service, encoder and DZI descriptors
//! - [`config`] - CLI/env configuration and logging setup
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use clap::Parser;
//! use wsi_deepzoom::{init_logging, Config, SlideCache, TileRequest, TileService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::parse();
//!     init_logging(config.verbose);
//!
//!     let cache = Arc::new(SlideCache::new(MyProvider::new(), config.slide_cache_config()));
//!     let service = TileService::new(cache, &config.slide_dir)
//!         .unwrap()
//!         .with_quality(config.quality)
//!         .with_format(config.format);
//!
//!     let tile = service.get_tile(TileRequest::new("CMU-1.svs", 12, 0, 0)).await;
//! }
//! ```

pub mod annotation;
pub mod color;
pub mod config;
pub mod error;
pub mod overlay;
pub mod slide;
pub mod tile;

// Re-export commonly used types
pub use annotation::{
    extract, AnnotationResponse, AnnotationRow, AnnotationTable, Coord, CropRegion,
    ExtractOptions, Geometry, GeometryRecord, Polygon,
};
pub use color::{ColorMode, ColorTransform, SrgbConversion, SRGB_PROFILE_BYTES};
pub use config::{init_logging, Config};
pub use error::{ColorError, OverlayError, SlideError, TileError};
pub use overlay::{apply_colormap, ColorRamp, ColormapRegistry};
pub use slide::{
    percentile_nonzero, CacheEntry, DzOptions, SharedDecodeCache, SlideCache, SlideCacheConfig,
    SlideHandle, SlideProvider,
};
pub use tile::{
    generate_dzi_xml, SlideInfo, Tile, TileEncoder, TileFormat, TileRequest, TileResponse,
    TileService,
};
