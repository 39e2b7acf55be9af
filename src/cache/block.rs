//! Block types and byte-range to block-range mapping.
//!
//! A block is the unit of caching: the `index`-th `block_size` bytes of the
//! source. Only the final block of the content may be shorter.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

/// Index of a block within the source (`offset / block_size`).
pub type BlockIndex = u64;

/// Recency stamp value meaning "never touched".
pub const UNTOUCHED: u64 = 0;

/// Monotonic logical clock. Every touch takes a fresh, distinct value.
#[derive(Debug)]
pub struct Clock {
    now: AtomicU64,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            now: AtomicU64::new(UNTOUCHED),
        }
    }

    /// Advance the clock and return the new value.
    pub fn tick(&self) -> u64 {
        self.now.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The most recently issued value.
    pub fn now(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// A cached block.
#[derive(Debug)]
pub struct Block {
    data: Bytes,
    last_touch: AtomicU64,
}

impl Block {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            last_touch: AtomicU64::new(UNTOUCHED),
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Stamp the block with the next clock value.
    ///
    /// Takes `&self` so hits can be recorded under a shared lock.
    pub fn touch(&self, clock: &Clock) -> u64 {
        let stamp = clock.tick();
        self.last_touch.store(stamp, Ordering::Relaxed);
        stamp
    }

    pub fn last_touch(&self) -> u64 {
        self.last_touch.load(Ordering::Relaxed)
    }
}

/// Converts between byte ranges and half-open block ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMapper {
    block_size: u64,
}

impl BlockMapper {
    /// `block_size` must be non-zero; callers validate it first.
    pub fn new(block_size: u64) -> Self {
        debug_assert!(block_size > 0);
        Self { block_size }
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Blocks covering the bytes `[start, end)`.
    ///
    /// An empty byte range maps to the empty block range at `start`'s block.
    pub fn byte_range_to_block_range(&self, start: u64, end: u64) -> Range<BlockIndex> {
        let first = start / self.block_size;
        if start == end {
            return first..first;
        }
        let last = end / self.block_size;
        if end % self.block_size == 0 {
            first..last
        } else {
            first..last + 1
        }
    }

    /// Byte span of the blocks `[first, last)`.
    pub fn block_range_to_byte_range(&self, blocks: Range<BlockIndex>) -> Range<u64> {
        blocks.start * self.block_size..blocks.end * self.block_size
    }

    /// First byte of a block.
    pub fn block_start(&self, index: BlockIndex) -> u64 {
        index * self.block_size
    }
}
