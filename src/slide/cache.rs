//! Slide cache for managing opened slide handles.
//!
//! The cache provides:
//! - LRU caching of opened handles so metadata is decoded once per slide
//! - A shared decode cache attached to every handle, when supported
//! - Per-slide derived metadata: microns per pixel, normalization ceiling,
//!   and the colour transform
//!
//! # Locking
//!
//! A single mutex guards the recency list. It is held only for lookup,
//! promotion, insertion and eviction, never while a slide is being opened
//! or measured. Two threads missing on the same path may therefore both open
//! it; the later insert finds the earlier one, returns it, and closes its own
//! handle.
//!
//! # Example
//!
//! ```ignore
//! use wsi_deepzoom::slide::{SlideCache, SlideCacheConfig};
//!
//! let cache = SlideCache::new(provider, SlideCacheConfig::default());
//!
//! // Opens on first access, then served from cache
//! let entry = cache.get(Path::new("/slides/CMU-1.svs"))?;
//! let tile = entry.read_tile(12, 3, 4)?;
//! ```

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use bytes::Bytes;
use lru::LruCache;
use tracing::{debug, info};

use crate::color::{ColorMode, ColorTransform};
use crate::error::SlideError;
use crate::tile::Tile;

use super::decode_cache::{SharedDecodeCache, DEFAULT_DECODE_CACHE_BYTES};
use super::percentile::{percentile_nonzero, CEILING_PERCENTILE};
use super::provider::{
    DzOptions, SlideHandle, SlideProvider, PROPERTY_NAME_MPP_X, PROPERTY_NAME_MPP_Y,
};

// =============================================================================
// Configuration
// =============================================================================

/// Default number of open slides.
pub const DEFAULT_SLIDE_CACHE_CAPACITY: usize = 10;

/// Number of remembered normalization ceilings (outlives handle eviction).
const CEILING_MEMO_CAPACITY: usize = 1024;

/// Settings for a [`SlideCache`].
#[derive(Debug, Clone, PartialEq)]
pub struct SlideCacheConfig {
    /// Maximum number of open slides
    pub capacity: usize,

    /// Byte budget of the decode cache shared by all handles
    pub shared_decode_budget_bytes: usize,

    /// Tiling options passed to the provider on open
    pub dz_options: DzOptions,

    /// How embedded colour profiles are handled
    pub color_mode: ColorMode,
}

impl Default for SlideCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_SLIDE_CACHE_CAPACITY,
            shared_decode_budget_bytes: DEFAULT_DECODE_CACHE_BYTES,
            dz_options: DzOptions::default(),
            color_mode: ColorMode::default(),
        }
    }
}

// =============================================================================
// CacheEntry
// =============================================================================

/// An opened slide plus the metadata derived from it at load time.
pub struct CacheEntry<H: SlideHandle> {
    key: PathBuf,
    handle: H,
    display_name: String,
    microns_per_pixel: f64,
    normalization_ceiling: f64,
    icc_profile: Option<Bytes>,
    color_transform: ColorTransform,
    closed: AtomicBool,
}

impl<H: SlideHandle> CacheEntry<H> {
    /// Canonical path this entry is cached under.
    pub fn key(&self) -> &Path {
        &self.key
    }

    /// The opened slide.
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// File name shown to users.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Mean of the X and Y pixel sizes in microns, or 0 when unknown.
    pub fn microns_per_pixel(&self) -> f64 {
        self.microns_per_pixel
    }

    /// 99.9th percentile of non-zero intensities at the lowest resolution.
    pub fn normalization_ceiling(&self) -> f64 {
        self.normalization_ceiling
    }

    /// Transform applied to every tile of this slide.
    pub fn color_transform(&self) -> &ColorTransform {
        &self.color_transform
    }

    /// Whether the handle has been closed by eviction.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Read a tile, tagged with the slide's original profile.
    ///
    /// The colour transform is not applied here; callers apply it last,
    /// after any overlay.
    pub fn read_tile(&self, level: usize, col: u32, row: u32) -> Result<Tile, SlideError> {
        let image = self.handle.read_tile(level, col, row)?;
        let tile = Tile::new(image);
        Ok(match &self.icc_profile {
            Some(profile) => tile.with_icc_profile(profile.clone()),
            None => tile,
        })
    }

    /// Close the handle once; later calls do nothing.
    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.handle.close();
        }
    }
}

impl<H: SlideHandle> std::fmt::Debug for CacheEntry<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("display_name", &self.display_name)
            .field("microns_per_pixel", &self.microns_per_pixel)
            .field("normalization_ceiling", &self.normalization_ceiling)
            .field("color_transform", &self.color_transform)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// =============================================================================
// SlideCache
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CeilingKey {
    path: PathBuf,
    modified: SystemTime,
}

/// Bounded, thread-safe cache of opened slides.
///
/// At most one entry exists per path, and the number of entries never
/// exceeds the configured capacity. Evicted handles are closed before the
/// call that evicted them returns.
pub struct SlideCache<P: SlideProvider> {
    provider: P,

    /// Open slides, most recently used at the tail
    entries: Mutex<LruCache<PathBuf, Arc<CacheEntry<P::Handle>>>>,

    /// Decode cache shared by every handle, when the provider supports it
    decode_cache: Option<SharedDecodeCache>,

    /// Ceilings by (path, mtime), surviving eviction
    ceilings: Mutex<LruCache<CeilingKey, f64>>,

    config: SlideCacheConfig,
}

impl<P: SlideProvider> SlideCache<P> {
    /// Create a cache over `provider`.
    pub fn new(provider: P, config: SlideCacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        let memo_capacity = NonZeroUsize::new(CEILING_MEMO_CAPACITY).unwrap_or(NonZeroUsize::MIN);

        let decode_cache = if provider.supports_shared_decode_cache() {
            Some(SharedDecodeCache::with_capacity(
                config.shared_decode_budget_bytes,
            ))
        } else {
            debug!("Slide provider has no shared decode cache support");
            None
        };

        Self {
            provider,
            entries: Mutex::new(LruCache::new(capacity)),
            decode_cache,
            ceilings: Mutex::new(LruCache::new(memo_capacity)),
            config,
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, LruCache<PathBuf, Arc<CacheEntry<P::Handle>>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_ceilings(&self) -> MutexGuard<'_, LruCache<CeilingKey, f64>> {
        self.ceilings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get the entry for `path`, opening the slide if it is not cached.
    ///
    /// `path` should be canonical; it is used as the cache key verbatim.
    /// On failure no entry is created and no existing entry is touched.
    pub fn get(&self, path: &Path) -> Result<Arc<CacheEntry<P::Handle>>, SlideError> {
        // Fast path: promote and return
        if let Some(entry) = self.lock_entries().get(path) {
            return Ok(Arc::clone(entry));
        }

        // Slow path: open and measure without holding the lock
        let entry = Arc::new(self.open_entry(path)?);

        let mut entries = self.lock_entries();
        if let Some(existing) = entries.get(path) {
            let existing = Arc::clone(existing);
            drop(entries);
            debug!(
                "Slide {} was opened concurrently, discarding duplicate handle",
                path.display()
            );
            entry.close();
            return Ok(existing);
        }

        let evicted = entries.push(path.to_path_buf(), Arc::clone(&entry));
        drop(entries);

        if let Some((evicted_path, evicted_entry)) = evicted {
            debug!("Evicted slide from cache: {}", evicted_path.display());
            evicted_entry.close();
        }

        Ok(entry)
    }

    /// Open `path` and derive its metadata.
    fn open_entry(&self, path: &Path) -> Result<CacheEntry<P::Handle>, SlideError> {
        if !self.provider.detect_format(path) {
            return Err(SlideError::unreadable(path, "unsupported slide format"));
        }

        debug!("Opening slide: {}", path.display());
        let mut handle = self.provider.open(path, &self.config.dz_options)?;

        if let Some(ref cache) = self.decode_cache {
            handle.attach_decode_cache(cache.clone());
        }

        let derived = self.derive_metadata(path, &handle);
        let (microns_per_pixel, normalization_ceiling, icc_profile, color_transform) =
            match derived {
                Ok(derived) => derived,
                Err(e) => {
                    handle.close();
                    return Err(e);
                }
            };

        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        info!(
            "Opened slide {} (mpp={}, ceiling={}, color={:?})",
            path.display(),
            microns_per_pixel,
            normalization_ceiling,
            color_transform
        );

        Ok(CacheEntry {
            key: path.to_path_buf(),
            handle,
            display_name,
            microns_per_pixel,
            normalization_ceiling,
            icc_profile,
            color_transform,
            closed: AtomicBool::new(false),
        })
    }

    #[allow(clippy::type_complexity)]
    fn derive_metadata(
        &self,
        path: &Path,
        handle: &P::Handle,
    ) -> Result<(f64, f64, Option<Bytes>, ColorTransform), SlideError> {
        let microns_per_pixel = microns_per_pixel(handle);
        let normalization_ceiling = self.normalization_ceiling(path, handle)?;
        let icc_profile = handle.color_profile();
        let color_transform = ColorTransform::build(icc_profile.as_deref(), self.config.color_mode)?;
        Ok((
            microns_per_pixel,
            normalization_ceiling,
            icc_profile,
            color_transform,
        ))
    }

    /// Ceiling for `path`, from the memo when the file is unchanged.
    fn normalization_ceiling(&self, path: &Path, handle: &P::Handle) -> Result<f64, SlideError> {
        let memo_key = std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .map(|modified| CeilingKey {
                path: path.to_path_buf(),
                modified,
            });

        if let Some(ref key) = memo_key {
            if let Some(&ceiling) = self.lock_ceilings().get(key) {
                debug!("Reusing normalization ceiling for {}", path.display());
                return Ok(ceiling);
            }
        }

        let lowest = handle.read_lowest_resolution_level()?;
        let ceiling = percentile_nonzero(&lowest, CEILING_PERCENTILE);
        debug!(
            "Computed normalization ceiling {} for {}",
            ceiling,
            path.display()
        );

        if let Some(key) = memo_key {
            self.lock_ceilings().put(key, ceiling);
        }
        Ok(ceiling)
    }

    /// Whether `path` is cached, without touching its recency.
    pub fn contains(&self, path: &Path) -> bool {
        self.lock_entries().contains(path)
    }

    /// Remove `path` from the cache and close its handle.
    ///
    /// Returns `true` if an entry was removed.
    pub fn invalidate(&self, path: &Path) -> bool {
        let removed = self.lock_entries().pop(path);
        match removed {
            Some(entry) => {
                entry.close();
                true
            }
            None => false,
        }
    }

    /// Remove every entry and close their handles.
    pub fn clear(&self) {
        let drained = drain(&mut self.lock_entries());
        for entry in drained {
            entry.close();
        }
    }

    /// Number of open slides.
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    /// Maximum number of open slides.
    pub fn capacity(&self) -> usize {
        self.lock_entries().cap().get()
    }

    /// The decode cache shared by all handles, if the provider supports one.
    pub fn decode_cache(&self) -> Option<&SharedDecodeCache> {
        self.decode_cache.as_ref()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &SlideCacheConfig {
        &self.config
    }
}

impl<P: SlideProvider> Drop for SlideCache<P> {
    fn drop(&mut self) {
        let entries = self
            .entries
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for entry in drain(entries) {
            entry.close();
        }
    }
}

fn drain<H: SlideHandle>(
    entries: &mut LruCache<PathBuf, Arc<CacheEntry<H>>>,
) -> Vec<Arc<CacheEntry<H>>> {
    let mut drained = Vec::with_capacity(entries.len());
    while let Some((_, entry)) = entries.pop_lru() {
        drained.push(entry);
    }
    drained
}

/// Mean of the X and Y pixel sizes, or 0 if either is missing or malformed.
fn microns_per_pixel<H: SlideHandle>(handle: &H) -> f64 {
    let parse = |name: &str| {
        handle
            .property(name)
            .and_then(|value| value.trim().parse::<f64>().ok())
    };

    match (parse(PROPERTY_NAME_MPP_X), parse(PROPERTY_NAME_MPP_Y)) {
        (Some(x), Some(y)) => (x + y) / 2.0,
        _ => 0.0,
    }
}

// =============================================================================
// Tests
// =============================================================================
