//! Slide cache integration tests.
//!
//! These tests drive the slide cache through the synthetic provider and
//! verify handle lifetime, eviction, reopen and the shared decode cache.

use std::sync::Arc;
use std::thread;

use wsi_deepzoom::color::ColorMode;
use wsi_deepzoom::error::SlideError;
use wsi_deepzoom::slide::{SlideCache, SlideCacheConfig, SlideHandle};

use super::test_utils::{SlideDir, SyntheticProvider};

fn config(capacity: usize) -> SlideCacheConfig {
    SlideCacheConfig {
        capacity,
        ..SlideCacheConfig::default()
    }
}

// =============================================================================
// Handle Lifetime
// =============================================================================

#[test]
fn test_repeated_get_opens_once() {
    let dir = SlideDir::new();
    let path = dir.add_slide("a.svs", 1000, 800);

    let provider = SyntheticProvider::new();
    let counters = provider.counters();
    let cache = SlideCache::new(provider, config(4));

    let first = cache.get(&path).unwrap();
    let second = cache.get(&path).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(counters.opens(), 1);
    assert_eq!(counters.closes(), 0);
    assert_eq!(first.display_name(), "a.svs");
    assert_eq!(first.handle().dimensions(), (1000, 800));
}

#[test]
fn test_eviction_closes_least_recently_used() {
    let dir = SlideDir::new();
    let a = dir.add_slide("a.svs", 512, 512);
    let b = dir.add_slide("b.svs", 512, 512);
    let c = dir.add_slide("c.svs", 512, 512);

    let provider = SyntheticProvider::new();
    let counters = provider.counters();
    let cache = SlideCache::new(provider, config(2));

    let entry_a = cache.get(&a).unwrap();
    cache.get(&b).unwrap();
    // Touch a so b becomes least recently used
    cache.get(&a).unwrap();
    cache.get(&c).unwrap();

    assert_eq!(cache.len(), 2);
    assert!(cache.contains(&a));
    assert!(!cache.contains(&b));
    assert!(cache.contains(&c));
    assert_eq!(counters.closes(), 1);
    assert!(!entry_a.is_closed());
}

#[test]
fn test_evicted_slide_reopens_on_next_get() {
    let dir = SlideDir::new();
    let a = dir.add_slide("a.svs", 512, 512);
    let b = dir.add_slide("b.svs", 512, 512);

    let provider = SyntheticProvider::new();
    let counters = provider.counters();
    let cache = SlideCache::new(provider, config(1));

    let old_a = cache.get(&a).unwrap();
    cache.get(&b).unwrap();
    assert!(old_a.is_closed());

    let new_a = cache.get(&a).unwrap();
    assert!(!new_a.is_closed());
    assert!(!Arc::ptr_eq(&old_a, &new_a));
    assert_eq!(counters.opens(), 3);
    assert_eq!(counters.live_handles(), 1);
}

#[test]
fn test_drop_closes_every_handle() {
    let dir = SlideDir::new();
    let a = dir.add_slide("a.svs", 512, 512);
    let b = dir.add_slide("b.svs", 512, 512);

    let provider = SyntheticProvider::new();
    let counters = provider.counters();
    {
        let cache = SlideCache::new(provider, config(4));
        cache.get(&a).unwrap();
        cache.get(&b).unwrap();
        assert_eq!(counters.live_handles(), 2);
    }

    assert_eq!(counters.opens(), 2);
    assert_eq!(counters.closes(), 2);
}

#[test]
fn test_concurrent_first_access_keeps_one_handle() {
    let dir = SlideDir::new();
    let path = dir.add_slide("a.svs", 1024, 1024);

    let provider = SyntheticProvider::new();
    let counters = provider.counters();
    let cache = Arc::new(SlideCache::new(provider, config(4)));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let path = path.clone();
            thread::spawn(move || cache.get(&path).unwrap())
        })
        .collect();

    let entries: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let cached = cache.get(&path).unwrap();
    for entry in &entries {
        assert!(Arc::ptr_eq(entry, &cached));
    }
    assert_eq!(cache.len(), 1);
    // Losing duplicate opens are closed again
    assert_eq!(counters.live_handles(), 1);
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_unsupported_extension_is_unreadable() {
    let dir = SlideDir::new();
    let path = dir.add_file("notes.txt", "1000x800");

    let provider = SyntheticProvider::new();
    let counters = provider.counters();
    let cache = SlideCache::new(provider, config(4));

    let result = cache.get(&path);
    assert!(matches!(result, Err(SlideError::Unreadable { .. })));
    assert_eq!(counters.opens(), 0);
    assert!(cache.is_empty());
}

#[test]
fn test_corrupt_slide_leaves_cache_untouched() {
    let dir = SlideDir::new();
    let good = dir.add_slide("good.svs", 512, 512);
    let bad = dir.add_file("bad.svs", "not a slide");

    let cache = SlideCache::new(SyntheticProvider::new(), config(1));
    cache.get(&good).unwrap();

    let result = cache.get(&bad);
    assert!(matches!(result, Err(SlideError::Unreadable { .. })));
    assert!(cache.contains(&good));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_corrupt_profile_closes_handle() {
    let dir = SlideDir::new();
    let path = dir.add_slide("a.svs", 512, 512);

    let provider = SyntheticProvider::new().with_profile(&b"not an icc profile"[..]);
    let counters = provider.counters();
    let cache = SlideCache::new(provider, config(4));

    let result = cache.get(&path);
    assert!(matches!(result, Err(SlideError::Color(_))));
    assert_eq!(counters.opens(), 1);
    assert_eq!(counters.closes(), 1);
    assert!(cache.is_empty());
}

#[test]
fn test_corrupt_profile_ignored_when_stripping() {
    let dir = SlideDir::new();
    let path = dir.add_slide("a.svs", 512, 512);

    let provider = SyntheticProvider::new().with_profile(&b"not an icc profile"[..]);
    let cache = SlideCache::new(
        provider,
        SlideCacheConfig {
            color_mode: ColorMode::Ignore,
            ..SlideCacheConfig::default()
        },
    );

    let entry = cache.get(&path).unwrap();
    assert!(!entry.color_transform().changes_pixels());
}

// =============================================================================
// Derived Metadata
// =============================================================================

#[test]
fn test_microns_per_pixel_is_axis_mean() {
    let dir = SlideDir::new();
    let path = dir.add_slide("a.svs", 512, 512);

    let cache = SlideCache::new(SyntheticProvider::new().with_mpp(0.25, 0.5), config(4));
    let entry = cache.get(&path).unwrap();

    assert!((entry.microns_per_pixel() - 0.375).abs() < 1e-12);
}

#[test]
fn test_missing_mpp_is_zero() {
    let dir = SlideDir::new();
    let path = dir.add_slide("a.svs", 512, 512);

    let cache = SlideCache::new(SyntheticProvider::new(), config(4));
    assert_eq!(cache.get(&path).unwrap().microns_per_pixel(), 0.0);
}

#[test]
fn test_ceiling_survives_eviction() {
    let dir = SlideDir::new();
    let a = dir.add_slide("a.svs", 512, 512);
    let b = dir.add_slide("b.svs", 512, 512);

    let provider = SyntheticProvider::new();
    let counters = provider.counters();
    let cache = SlideCache::new(provider, config(1));

    let ceiling = cache.get(&a).unwrap().normalization_ceiling();
    cache.get(&b).unwrap();
    let reopened = cache.get(&a).unwrap();

    assert_eq!(counters.opens(), 3);
    // a and b measured once each; the reopen hits the memo
    assert_eq!(counters.lowest_level_reads(), 2);
    assert_eq!(reopened.normalization_ceiling(), ceiling);
    assert!(ceiling > 0.0);
}

// =============================================================================
// Shared Decode Cache
// =============================================================================

#[test]
fn test_shared_decode_cache_attached_when_supported() {
    let dir = SlideDir::new();
    let path = dir.add_slide("a.svs", 1000, 800);

    let cache = SlideCache::new(SyntheticProvider::new().with_shared_cache(), config(4));
    assert!(cache.decode_cache().is_some());

    let entry = cache.get(&path).unwrap();
    assert!(entry.handle().has_decode_cache());
}

#[test]
fn test_no_decode_cache_without_support() {
    let dir = SlideDir::new();
    let path = dir.add_slide("a.svs", 1000, 800);

    let cache = SlideCache::new(SyntheticProvider::new(), config(4));
    assert!(cache.decode_cache().is_none());
    assert!(!cache.get(&path).unwrap().handle().has_decode_cache());
}

#[test]
fn test_decode_cache_shared_across_reopen() {
    let dir = SlideDir::new();
    let a = dir.add_slide("a.svs", 1000, 800);

    let provider = SyntheticProvider::new().with_shared_cache();
    let counters = provider.counters();
    let cache = SlideCache::new(provider, config(4));

    let entry = cache.get(&a).unwrap();
    entry.read_tile(10, 0, 0).unwrap();
    entry.read_tile(10, 0, 0).unwrap();

    assert_eq!(counters.tile_reads(), 2);
    assert_eq!(counters.decoded_blocks(), 1);
    assert_eq!(cache.decode_cache().map(|c| c.len()), Some(1));
}
