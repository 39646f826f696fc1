//! Shared cache for decoded pixel blocks.
//!
//! One instance is owned by the slide cache and attached to every handle the
//! provider opens, so all open slides draw from a single byte budget.
//!
//! # Cache Key
//!
//! Blocks are keyed by:
//! - Handle namespace (unique per opened handle)
//! - Pyramid level
//! - Column
//! - Row
//!
//! # Size-Based Eviction
//!
//! The cache tracks the decoded size of each block and evicts
//! least-recently-used blocks while the total exceeds the budget.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use image::DynamicImage;
use lru::LruCache;

/// Default decode budget: 128MB
pub const DEFAULT_DECODE_CACHE_BYTES: usize = 128 * 1024 * 1024;

/// Upper bound on entry count (bounds LRU bookkeeping overhead)
const MAX_ENTRIES: usize = 65_536;

// =============================================================================
// Block Key
// =============================================================================

/// Identifies one decoded block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockKey {
    /// Namespace handed out by [`SharedDecodeCache::register_namespace`]
    pub namespace: u64,

    pub level: u32,

    pub col: u32,

    pub row: u32,
}

impl BlockKey {
    pub fn new(namespace: u64, level: u32, col: u32, row: u32) -> Self {
        Self {
            namespace,
            level,
            col,
            row,
        }
    }
}

// =============================================================================
// Shared Decode Cache
// =============================================================================

struct Blocks {
    lru: LruCache<BlockKey, Arc<DynamicImage>>,
    current_size: usize,
}

struct Inner {
    blocks: Mutex<Blocks>,
    max_size: usize,
    next_namespace: AtomicU64,
}

/// Byte-budgeted LRU of decoded blocks, shared by all open slide handles.
///
/// Cloning is cheap and yields another handle to the same cache. All
/// operations are safe to call concurrently from any thread.
#[derive(Clone)]
pub struct SharedDecodeCache {
    inner: Arc<Inner>,
}

impl SharedDecodeCache {
    /// Create a cache holding at most `max_size` bytes of decoded pixels.
    pub fn with_capacity(max_size: usize) -> Self {
        let max_entries = NonZeroUsize::new(MAX_ENTRIES).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Inner {
                blocks: Mutex::new(Blocks {
                    lru: LruCache::new(max_entries),
                    current_size: 0,
                }),
                max_size,
                next_namespace: AtomicU64::new(0),
            }),
        }
    }

    /// Reserve a key namespace for a newly opened handle.
    pub fn register_namespace(&self) -> u64 {
        self.inner.next_namespace.fetch_add(1, Ordering::Relaxed)
    }

    fn blocks(&self) -> MutexGuard<'_, Blocks> {
        self.inner
            .blocks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get a block, marking it recently used.
    pub fn get(&self, key: &BlockKey) -> Option<Arc<DynamicImage>> {
        self.blocks().lru.get(key).cloned()
    }

    /// Store a block, evicting least-recently-used blocks to fit the budget.
    ///
    /// A block larger than the whole budget is not stored.
    pub fn insert(&self, key: BlockKey, block: Arc<DynamicImage>) {
        let block_size = block.as_bytes().len();
        if block_size > self.inner.max_size {
            return;
        }

        let mut blocks = self.blocks();

        if let Some(old) = blocks.lru.peek(&key) {
            let old_size = old.as_bytes().len();
            blocks.current_size = blocks.current_size.saturating_sub(old_size);
        }

        if let Some((evicted_key, evicted)) = blocks.lru.push(key, block) {
            // `push` hands back the entry it displaced when at entry capacity
            if evicted_key != key {
                let evicted_size = evicted.as_bytes().len();
                blocks.current_size = blocks.current_size.saturating_sub(evicted_size);
            }
        }
        blocks.current_size += block_size;

        while blocks.current_size > self.inner.max_size {
            match blocks.lru.pop_lru() {
                Some((_, evicted)) => {
                    let evicted_size = evicted.as_bytes().len();
                    blocks.current_size = blocks.current_size.saturating_sub(evicted_size);
                }
                None => break,
            }
        }
    }

    /// Return the cached block or decode, store and return it.
    ///
    /// Decoding runs without holding the cache lock; two threads missing on
    /// the same key may both decode, and the later insert wins.
    pub fn get_or_decode<E, F>(&self, key: BlockKey, decode: F) -> Result<Arc<DynamicImage>, E>
    where
        F: FnOnce() -> Result<DynamicImage, E>,
    {
        if let Some(block) = self.get(&key) {
            return Ok(block);
        }

        let block = Arc::new(decode()?);
        self.insert(key, Arc::clone(&block));
        Ok(block)
    }

    /// Drop every cached block.
    pub fn clear(&self) {
        let mut blocks = self.blocks();
        blocks.lru.clear();
        blocks.current_size = 0;
    }

    /// Number of cached blocks.
    pub fn len(&self) -> usize {
        self.blocks().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks().lru.is_empty()
    }

    /// Total decoded bytes currently cached.
    pub fn size(&self) -> usize {
        self.blocks().current_size
    }

    /// Budget in bytes.
    pub fn capacity(&self) -> usize {
        self.inner.max_size
    }
}

impl Default for SharedDecodeCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_DECODE_CACHE_BYTES)
    }
}

impl std::fmt::Debug for SharedDecodeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedDecodeCache")
            .field("capacity", &self.capacity())
            .field("size", &self.size())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
