//! Tile Service for orchestrating tile generation.
//!
//! The TileService is the main entry point for viewer requests. It:
//! - Resolves user paths under the slide root
//! - Acquires slides from the cache
//! - Applies the active colormap and the slide's colour transform
//! - Encodes the result
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         TileService                             │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                    get_tile()                           │    │
//! │  │  1. Resolve path      4. Apply colormap (if active)     │    │
//! │  │  2. Get slide         5. Apply colour transform         │    │
//! │  │  3. Read tile         6. Encode                         │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │           │                    │                    │           │
//! │           ▼                    ▼                    ▼           │
//! │    ┌────────────┐    ┌──────────────────┐   ┌─────────────┐     │
//! │    │ SlideCache │    │ ColormapRegistry │   │ TileEncoder │     │
//! │    └────────────┘    └──────────────────┘   └─────────────┘     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Slide access blocks on disk, so every step touching the cache runs on
//! tokio's blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::TileError;
use crate::overlay::{apply_colormap, ColorRamp, ColormapRegistry};
use crate::slide::{CacheEntry, SlideCache, SlideHandle, SlideProvider};

use super::buffer::Tile;
use super::dzi::generate_dzi_xml;
use super::encoder::{TileEncoder, TileFormat, DEFAULT_JPEG_QUALITY};

// =============================================================================
// Tile Request
// =============================================================================

/// A request for a Deep Zoom tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest {
    /// Slide path relative to the slide root
    pub path: String,

    /// Deep Zoom level (0 = 1x1 pixel)
    pub level: usize,

    /// Tile column
    pub col: u32,

    /// Tile row
    pub row: u32,

    /// Output format
    pub format: TileFormat,
}

impl TileRequest {
    /// Create a JPEG tile request.
    pub fn new(path: impl Into<String>, level: usize, col: u32, row: u32) -> Self {
        Self {
            path: path.into(),
            level,
            col,
            row,
            format: TileFormat::Jpeg,
        }
    }

    pub fn with_format(mut self, format: TileFormat) -> Self {
        self.format = format;
        self
    }
}

// =============================================================================
// Responses
// =============================================================================

/// An encoded tile.
#[derive(Debug, Clone)]
pub struct TileResponse {
    pub data: Bytes,

    pub format: TileFormat,

    /// Whether a colormap was applied
    pub colormapped: bool,
}

impl TileResponse {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// What the viewer page shows about a slide.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlideInfo {
    /// File name of the slide
    pub name: String,

    /// URL of the DZI descriptor
    pub dzi_url: String,

    /// Mean microns per pixel, 0 when unknown
    pub mpp: f64,
}

// =============================================================================
// Tile Service
// =============================================================================

/// Serves Deep Zoom descriptors and tiles for slides under one root.
///
/// # Example
///
/// ```ignore
/// use wsi_deepzoom::slide::{SlideCache, SlideCacheConfig};
/// use wsi_deepzoom::tile::{TileRequest, TileService};
///
/// let cache = Arc::new(SlideCache::new(provider, SlideCacheConfig::default()));
/// let service = TileService::new(cache, "/data/slides")?;
///
/// service.load_colormap("CMU-1.svs", Some("[(0,0,0),(255,0,0)]"))?;
/// let tile = service.get_tile(TileRequest::new("CMU-1.svs", 12, 3, 4)).await?;
/// ```
pub struct TileService<P: SlideProvider> {
    cache: Arc<SlideCache<P>>,

    colormaps: ColormapRegistry,

    encoder: TileEncoder,

    /// Format advertised in DZI descriptors
    format: TileFormat,

    /// Canonical slide root
    root: PathBuf,
}

impl<P: SlideProvider> TileService<P> {
    /// Create a service serving slides under `root`.
    ///
    /// Fails with `NotFound` if `root` does not exist.
    pub fn new(cache: Arc<SlideCache<P>>, root: impl AsRef<Path>) -> Result<Self, TileError> {
        let root = root.as_ref();
        let root = root.canonicalize().map_err(|e| {
            warn!("Slide root {} is not accessible: {}", root.display(), e);
            TileError::NotFound {
                path: root.display().to_string(),
            }
        })?;

        Ok(Self {
            cache,
            colormaps: ColormapRegistry::new(),
            encoder: TileEncoder::new(DEFAULT_JPEG_QUALITY),
            format: TileFormat::default(),
            root,
        })
    }

    /// Set the JPEG quality (clamped to 1-100).
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.encoder = TileEncoder::new(quality);
        self
    }

    /// Set the format advertised in DZI descriptors.
    pub fn with_format(mut self, format: TileFormat) -> Self {
        self.format = format;
        self
    }

    pub fn cache(&self) -> &Arc<SlideCache<P>> {
        &self.cache
    }

    pub fn colormaps(&self) -> &ColormapRegistry {
        &self.colormaps
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn quality(&self) -> u8 {
        self.encoder.quality()
    }

    pub fn format(&self) -> TileFormat {
        self.format
    }

    /// Resolve a user path to a canonical path under the root.
    ///
    /// Missing files and paths escaping the root are `NotFound`.
    pub fn resolve(&self, user_path: &str) -> Result<PathBuf, TileError> {
        resolve_path(&self.root, user_path)
    }

    /// Resolve `user_path` and acquire its cache entry.
    pub async fn slide(&self, user_path: &str) -> Result<Arc<CacheEntry<P::Handle>>, TileError> {
        let cache = Arc::clone(&self.cache);
        let root = self.root.clone();
        let user_path = user_path.to_string();

        run_blocking(move || {
            let path = resolve_path(&root, &user_path)?;
            Ok(cache.get(&path)?)
        })
        .await
    }

    /// Name, descriptor URL and resolution of a slide.
    pub async fn slide_info(&self, user_path: &str) -> Result<SlideInfo, TileError> {
        let entry = self.slide(user_path).await?;
        Ok(SlideInfo {
            name: entry.display_name().to_string(),
            dzi_url: format!("/{}.dzi", user_path.trim_start_matches('/')),
            mpp: entry.microns_per_pixel(),
        })
    }

    /// Deep Zoom XML descriptor of a slide.
    pub async fn dzi(&self, user_path: &str) -> Result<String, TileError> {
        let entry = self.slide(user_path).await?;
        let (width, height) = entry.handle().dimensions();
        let options = self.cache.config().dz_options;

        Ok(generate_dzi_xml(
            width,
            height,
            options.tile_size,
            options.overlap,
            self.format,
        ))
    }

    /// Produce an encoded tile.
    ///
    /// The entry is re-acquired from the cache for every tile so a slide
    /// evicted between requests is reopened rather than read after close.
    pub async fn get_tile(&self, request: TileRequest) -> Result<TileResponse, TileError> {
        let cache = Arc::clone(&self.cache);
        let root = self.root.clone();
        let ramp = self.colormaps.get(&request.path);
        let encoder = self.encoder;

        run_blocking(move || {
            let path = resolve_path(&root, &request.path)?;
            let entry = cache.get(&path)?;
            render_tile(&entry, &request, ramp.as_ref(), &encoder)
        })
        .await
    }

    /// Make `ramp` the active colormap for a slide.
    pub fn set_colormap(&self, user_path: &str, ramp: ColorRamp) {
        self.colormaps.set(user_path, ramp);
    }

    /// Remove the active colormap for a slide.
    pub fn clear_colormap(&self, user_path: &str) -> bool {
        self.colormaps.clear(user_path)
    }

    /// Apply a viewer `cmap` parameter: set when present, clear otherwise.
    pub fn load_colormap(&self, user_path: &str, param: Option<&str>) -> Result<(), TileError> {
        Ok(self.colormaps.load(user_path, param)?)
    }
}

fn render_tile<H: SlideHandle>(
    entry: &CacheEntry<H>,
    request: &TileRequest,
    ramp: Option<&ColorRamp>,
    encoder: &TileEncoder,
) -> Result<TileResponse, TileError> {
    let mut tile = entry.read_tile(request.level, request.col, request.row)?;

    if let Some(ramp) = ramp {
        let colored = apply_colormap(&tile.image, ramp, entry.normalization_ceiling())?;
        // The recoloured tile no longer carries the slide's profile
        tile = Tile::new(DynamicImage::ImageRgb8(colored));
    }

    entry.color_transform().apply(&mut tile);

    let data = encoder.encode(&tile, request.format)?;
    debug!(
        "Rendered tile {} {}/{}_{}.{} ({} bytes)",
        request.path,
        request.level,
        request.col,
        request.row,
        request.format,
        data.len()
    );

    Ok(TileResponse {
        data,
        format: request.format,
        colormapped: ramp.is_some(),
    })
}

/// Join `user_path` under `root`, canonicalize, and refuse escapes.
fn resolve_path(root: &Path, user_path: &str) -> Result<PathBuf, TileError> {
    let not_found = || TileError::NotFound {
        path: user_path.to_string(),
    };

    let relative = user_path.trim_start_matches('/');
    if relative.is_empty() {
        return Err(not_found());
    }

    let path = root.join(relative).canonicalize().map_err(|_| not_found())?;
    if !path.starts_with(root) {
        warn!("Rejected path outside slide root: {}", user_path);
        return Err(not_found());
    }
    Ok(path)
}

async fn run_blocking<T, F>(work: F) -> Result<T, TileError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, TileError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| TileError::Task(e.to_string()))?
}

// =============================================================================
// Tests
// =============================================================================
