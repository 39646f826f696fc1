//! Test utilities for integration tests.
//!
//! This module provides a synthetic slide provider and helpers for laying
//! out slide directories on disk.

use bytes::Bytes;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use wsi_deepzoom::error::SlideError;
use wsi_deepzoom::slide::{
    BlockKey, DzOptions, SharedDecodeCache, SlideHandle, SlideProvider, PROPERTY_NAME_MPP_X,
    PROPERTY_NAME_MPP_Y,
};
use wsi_deepzoom::tile::{dzi_level_count, dzi_level_dimensions, tile_grid};

/// Extensions the synthetic provider recognizes.
pub const SLIDE_EXTENSIONS: &[&str] = &["svs", "tif", "tiff", "ndpi"];

// =============================================================================
// Counters
// =============================================================================

/// Shared counters for provider activity.
#[derive(Debug, Default)]
pub struct Counters {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub tile_reads: AtomicUsize,
    pub lowest_level_reads: AtomicUsize,
    pub decoded_blocks: AtomicUsize,
}

impl Counters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn tile_reads(&self) -> usize {
        self.tile_reads.load(Ordering::SeqCst)
    }

    pub fn lowest_level_reads(&self) -> usize {
        self.lowest_level_reads.load(Ordering::SeqCst)
    }

    pub fn decoded_blocks(&self) -> usize {
        self.decoded_blocks.load(Ordering::SeqCst)
    }

    /// Handles opened and not yet closed.
    pub fn live_handles(&self) -> usize {
        self.opens() - self.closes()
    }
}

// =============================================================================
// Synthetic Provider
// =============================================================================

/// Provider reading slide files of the form `"<width>x<height>"`.
///
/// Tiles are grey gradients; anything that does not parse is corrupt.
#[derive(Clone)]
pub struct SyntheticProvider {
    counters: Arc<Counters>,
    profile: Option<Bytes>,
    properties: HashMap<String, String>,
    rgb: bool,
    shared_cache: bool,
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            profile: None,
            properties: HashMap::new(),
            rgb: false,
            shared_cache: false,
        }
    }

    /// Embed `profile` in every slide.
    pub fn with_profile(mut self, profile: impl Into<Bytes>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Report the given microns per pixel on both axes.
    pub fn with_mpp(mut self, mpp_x: f64, mpp_y: f64) -> Self {
        self.properties
            .insert(PROPERTY_NAME_MPP_X.to_string(), mpp_x.to_string());
        self.properties
            .insert(PROPERTY_NAME_MPP_Y.to_string(), mpp_y.to_string());
        self
    }

    /// Decode tiles as RGB instead of greyscale.
    pub fn with_rgb(mut self) -> Self {
        self.rgb = true;
        self
    }

    /// Advertise and use the shared decode cache.
    pub fn with_shared_cache(mut self) -> Self {
        self.shared_cache = true;
        self
    }

    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SlideProvider for SyntheticProvider {
    type Handle = SyntheticHandle;

    fn detect_format(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| SLIDE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    fn open(&self, path: &Path, options: &DzOptions) -> Result<Self::Handle, SlideError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SlideError::unreadable(path, e.to_string()))?;
        let (width, height) = parse_dimensions(&contents)
            .ok_or_else(|| SlideError::unreadable(path, "corrupt slide header"))?;

        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(SyntheticHandle {
            path: path.to_path_buf(),
            width,
            height,
            options: *options,
            profile: self.profile.clone(),
            properties: self.properties.clone(),
            rgb: self.rgb,
            counters: Arc::clone(&self.counters),
            decode_cache: None,
        })
    }

    fn supports_shared_decode_cache(&self) -> bool {
        self.shared_cache
    }
}

fn parse_dimensions(contents: &str) -> Option<(u32, u32)> {
    let (width, height) = contents.trim().split_once('x')?;
    Some((width.parse().ok()?, height.parse().ok()?))
}

/// Handle over one synthetic slide.
pub struct SyntheticHandle {
    path: PathBuf,
    width: u32,
    height: u32,
    options: DzOptions,
    profile: Option<Bytes>,
    properties: HashMap<String, String>,
    rgb: bool,
    counters: Arc<Counters>,
    decode_cache: Option<(SharedDecodeCache, u64)>,
}

impl SyntheticHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_decode_cache(&self) -> bool {
        self.decode_cache.is_some()
    }

    fn render(&self, width: u32, height: u32, offset: u32) -> DynamicImage {
        if self.rgb {
            DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
                let v = ((x + y + offset) % 256) as u8;
                Rgb([v, v / 2, 255 - v])
            }))
        } else {
            DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
                Luma([((x + y + offset) % 256) as u8])
            }))
        }
    }
}

impl SlideHandle for SyntheticHandle {
    fn property(&self, name: &str) -> Option<String> {
        self.properties.get(name).cloned()
    }

    fn color_profile(&self) -> Option<Bytes> {
        self.profile.clone()
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn level_count(&self) -> usize {
        dzi_level_count(self.width, self.height)
    }

    fn read_tile(&self, level: usize, col: u32, row: u32) -> Result<DynamicImage, SlideError> {
        let invalid = SlideError::InvalidCoordinates { level, col, row };
        let (level_width, level_height) =
            dzi_level_dimensions(self.width, self.height, level).ok_or(invalid.clone())?;
        let tile_size = self.options.tile_size;
        let (cols, rows) = tile_grid((level_width, level_height), tile_size);
        if col >= cols || row >= rows {
            return Err(invalid);
        }

        self.counters.tile_reads.fetch_add(1, Ordering::SeqCst);

        let width = (level_width - col * tile_size).min(tile_size);
        let height = (level_height - row * tile_size).min(tile_size);
        let offset = col + row;

        let Some((ref cache, namespace)) = self.decode_cache else {
            return Ok(self.render(width, height, offset));
        };

        let key = BlockKey::new(namespace, level as u32, col, row);
        let block = cache.get_or_decode(key, || {
            self.counters.decoded_blocks.fetch_add(1, Ordering::SeqCst);
            Ok::<_, SlideError>(self.render(width, height, offset))
        })?;
        Ok((*block).clone())
    }

    fn read_lowest_resolution_level(&self) -> Result<DynamicImage, SlideError> {
        self.counters
            .lowest_level_reads
            .fetch_add(1, Ordering::SeqCst);
        Ok(self.render(16, 16, 0))
    }

    fn attach_decode_cache(&mut self, cache: SharedDecodeCache) {
        let namespace = cache.register_namespace();
        self.decode_cache = Some((cache, namespace));
    }

    fn close(&self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Slide Directories
// =============================================================================

/// A temp dir laid out as `root/` with slides plus `outside.svs` beside it.
pub struct SlideDir {
    dir: tempfile::TempDir,
}

impl SlideDir {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("root")).unwrap();
        std::fs::write(dir.path().join("outside.svs"), "1000x800").unwrap();
        Self { dir }
    }

    /// Canonical slide root.
    pub fn root(&self) -> PathBuf {
        self.dir.path().join("root").canonicalize().unwrap()
    }

    /// Write a slide of the given size at `relative` under the root.
    pub fn add_slide(&self, relative: &str, width: u32, height: u32) -> PathBuf {
        self.add_file(relative, &format!("{}x{}", width, height))
    }

    /// Write arbitrary contents at `relative` under the root.
    pub fn add_file(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join("root").join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path.canonicalize().unwrap()
    }
}

impl Default for SlideDir {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Image Helpers
// =============================================================================

pub fn is_jpeg(data: &[u8]) -> bool {
    data.starts_with(&[0xFF, 0xD8])
}

pub fn is_png(data: &[u8]) -> bool {
    data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
}

/// Whether a PNG stream carries an embedded ICC profile chunk.
pub fn png_has_icc_profile(data: &[u8]) -> bool {
    data.windows(4).any(|w| w == b"iCCP")
}

/// Whether a JPEG stream carries an embedded ICC profile segment.
pub fn jpeg_has_icc_profile(data: &[u8]) -> bool {
    data.windows(12).any(|w| w == b"ICC_PROFILE\0")
}

pub fn decode(data: &[u8]) -> DynamicImage {
    image::load_from_memory(data).unwrap()
}
