//! Slide access layer.
//!
//! The pyramidal-image codec is external; this module owns everything
//! between it and the tile service.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! └────────────────────┬────────────────────┘
//!                      │ get(path)
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              SlideCache                 │
//! │  (LRU of open handles, per-slide mpp,   │
//! │   normalization ceiling, colour xform)  │
//! └──────────┬─────────────────────┬────────┘
//!            │ open / close        │ attach
//!            ▼                     ▼
//! ┌─────────────────────┐  ┌────────────────────┐
//! │ SlideProvider /     │  │ SharedDecodeCache  │
//! │ SlideHandle traits  │◄─│ (byte-budget LRU)  │
//! └─────────────────────┘  └────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use wsi_deepzoom::slide::{SlideCache, SlideCacheConfig, SlideProvider};
//!
//! // Implement SlideProvider / SlideHandle over your codec
//! struct MyProvider { /* ... */ }
//!
//! let cache = SlideCache::new(MyProvider::new(), SlideCacheConfig::default());
//!
//! // Opens on first access, promoted on every later one
//! let entry = cache.get(Path::new("/data/slides/CMU-1.svs"))?;
//! println!("{} at {} µm/px", entry.display_name(), entry.microns_per_pixel());
//! ```

mod cache;
mod decode_cache;
mod percentile;
mod provider;

pub use cache::{CacheEntry, SlideCache, SlideCacheConfig, DEFAULT_SLIDE_CACHE_CAPACITY};
pub use decode_cache::{BlockKey, SharedDecodeCache, DEFAULT_DECODE_CACHE_BYTES};
pub use percentile::{percentile_nonzero, CEILING_PERCENTILE};
pub use provider::{
    DzOptions, SlideHandle, SlideProvider, DEFAULT_OVERLAP, DEFAULT_TILE_SIZE,
    PROPERTY_NAME_MPP_X, PROPERTY_NAME_MPP_Y,
};
