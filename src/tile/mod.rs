//! Tile service layer.
//!
//! This module turns cached slides into encoded Deep Zoom tiles and
//! descriptors for the viewer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        HTTP Handlers (external)         │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  Colormap    │  │  TileEncoder    │  │
//! │  │  Registry    │  │  (JPEG / PNG)   │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              SlideCache                 │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileService`]: Main entry point, orchestrates the full pipeline
//! - [`Tile`]: Decoded pixels plus the ICC profile to embed
//! - [`TileEncoder`]: Serializes tiles, embedding their profile
//! - [`generate_dzi_xml`]: Deep Zoom descriptor
//! - [`TileRequest`] / [`TileResponse`]: Request parameters and encoded result

mod buffer;
mod dzi;
mod encoder;
mod service;

pub use buffer::Tile;
pub use dzi::{dzi_level_count, dzi_level_dimensions, generate_dzi_xml, tile_grid};
pub use encoder::{
    clamp_quality, is_valid_quality, TileEncoder, TileFormat, DEFAULT_JPEG_QUALITY,
    MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
pub use service::{SlideInfo, TileRequest, TileResponse, TileService};
