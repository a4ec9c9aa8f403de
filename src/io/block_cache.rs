use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use bytes::{Bytes, BytesMut};
use lru::LruCache;
use tracing::trace;

use super::RangeReader;
use crate::error::IoError;

/// Default block size: 64KB
/// Large enough to hold a typical header in one block, small enough that
/// row-by-row region reads do not drag in whole frames.
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Default cache capacity in number of blocks.
/// 64 blocks * 64KB = 4MB default cache size.
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Block-based caching layer that wraps any RangeReader.
///
/// Tag decoding issues many small reads at nearby offsets and region assembly
/// issues one read per row; the cache turns both into a few block-sized reads
/// against the underlying source.
///
/// Features:
/// - Fixed-size block cache
/// - LRU eviction when cache reaches capacity
/// - Handles reads spanning multiple blocks
/// - Reads larger than the whole cache bypass it
pub struct BlockCache<R> {
    /// The underlying reader
    inner: R,
    /// Block size in bytes
    block_size: usize,
    /// Cached blocks indexed by block number
    cache: Mutex<LruCache<u64, Bytes>>,
    /// Maximum number of blocks held
    capacity: usize,
}

impl<R: RangeReader> BlockCache<R> {
    /// Create a new BlockCache wrapping the given reader.
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_CAPACITY)
    }

    /// Create a new BlockCache with custom block size and capacity.
    ///
    /// # Arguments
    /// * `inner` - The underlying reader to wrap
    /// * `block_size` - Size of each cached block in bytes (at least 1)
    /// * `capacity` - Maximum number of blocks to cache (at least 1)
    pub fn with_capacity(inner: R, block_size: usize, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            block_size: block_size.max(1),
            cache: Mutex::new(LruCache::new(capacity)),
            capacity: capacity.get(),
        }
    }

    /// Get a reference to the wrapped reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Unwrap the cache, returning the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Number of blocks currently cached.
    pub fn cached_blocks(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<u64, Bytes>> {
        // A panic while holding the lock leaves the LRU structurally valid.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get a block from cache or fetch it from the underlying reader.
    fn get_block(&self, block_idx: u64) -> Result<Bytes, IoError> {
        if let Some(data) = self.lock().get(&block_idx) {
            return Ok(data.clone());
        }

        let data = self.fetch_block_from_source(block_idx)?;
        self.lock().put(block_idx, data.clone());
        Ok(data)
    }

    /// Fetch a block directly from the underlying reader.
    fn fetch_block_from_source(&self, block_idx: u64) -> Result<Bytes, IoError> {
        let offset = block_idx * self.block_size as u64;
        let size = self.inner.size();

        // Last block may be shorter
        let remaining = size.saturating_sub(offset);
        if remaining == 0 {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: self.block_size as u64,
                size,
            });
        }

        let len = std::cmp::min(self.block_size as u64, remaining) as usize;
        trace!(block = block_idx, offset, len, "block cache miss");
        self.inner.read_exact_at(offset, len)
    }

    #[inline]
    fn block_for_offset(&self, offset: u64) -> u64 {
        offset / self.block_size as u64
    }

    #[inline]
    fn offset_within_block(&self, offset: u64) -> usize {
        (offset % self.block_size as u64) as usize
    }
}

impl<R: RangeReader> RangeReader for BlockCache<R> {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let size = self.inner.size();
        match offset.checked_add(len as u64) {
            Some(end) if end <= size => {}
            _ => {
                return Err(IoError::RangeOutOfBounds {
                    offset,
                    requested: len as u64,
                    size,
                })
            }
        }

        if len == 0 {
            return Ok(Bytes::new());
        }

        // Bulk reads would only churn the cache
        if len >= self.block_size * self.capacity {
            return self.inner.read_exact_at(offset, len);
        }

        let start_block = self.block_for_offset(offset);
        let end_block = self.block_for_offset(offset + len as u64 - 1);

        if start_block == end_block {
            let block = self.get_block(start_block)?;
            let block_offset = self.offset_within_block(offset);
            Ok(block.slice(block_offset..block_offset + len))
        } else {
            let mut result = BytesMut::with_capacity(len);
            let mut remaining = len;
            let mut current_offset = offset;

            for block_idx in start_block..=end_block {
                let block = self.get_block(block_idx)?;
                let block_offset = self.offset_within_block(current_offset);
                let bytes_in_block = std::cmp::min(block.len() - block_offset, remaining);

                result.extend_from_slice(&block[block_offset..block_offset + bytes_in_block]);

                remaining -= bytes_in_block;
                current_offset += bytes_in_block as u64;
            }

            Ok(result.freeze())
        }
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn identifier(&self) -> &str {
        self.inner.identifier()
    }
}
