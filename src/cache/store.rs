//! Block store: the bounded block-index to block mapping.
//!
//! The store:
//! - Holds at most `capacity` blocks once a request completes
//! - Finds the missing runs of a block range
//! - Makes room for incoming blocks by evicting the least recently touched
//!
//! Mutation needs `&mut self`, so it only happens under the reader's
//! exclusive lock. Touching takes `&self` and is safe under the shared lock.

use std::collections::HashMap;
use std::ops::Range;

use bytes::Bytes;
use tracing::debug;

use crate::cache::block::{Block, BlockIndex, Clock};
use crate::cache::evictor::Evictor;

/// The bounded block map.
#[derive(Debug)]
pub struct BlockStore {
    /// Cached blocks by index.
    blocks: HashMap<BlockIndex, Block>,

    /// Maximum number of blocks kept after a request completes.
    capacity: usize,

    /// Eviction policy.
    evictor: Evictor,
}

impl BlockStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            blocks: HashMap::with_capacity(capacity),
            capacity,
            evictor: Evictor::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, index: BlockIndex) -> bool {
        self.blocks.contains_key(&index)
    }

    pub fn get(&self, index: BlockIndex) -> Option<&Block> {
        self.blocks.get(&index)
    }

    /// Store a block. Its recency stays unset until the next touch.
    pub fn insert(&mut self, index: BlockIndex, data: Bytes) {
        self.blocks.insert(index, Block::new(data));
    }

    /// Stamp a cached block with the next clock value.
    pub fn touch(&self, index: BlockIndex, clock: &Clock) -> Option<u64> {
        self.blocks.get(&index).map(|block| block.touch(clock))
    }

    /// Whether every block in `range` is cached.
    pub fn contains_range(&self, range: Range<BlockIndex>) -> bool {
        range.into_iter().all(|index| self.blocks.contains_key(&index))
    }

    /// Number of blocks in `range` that are not cached.
    pub fn count_missing(&self, range: Range<BlockIndex>) -> usize {
        range
            .into_iter()
            .filter(|index| !self.blocks.contains_key(index))
            .count()
    }

    /// Maximal contiguous runs of uncached blocks in `range`, in index order.
    pub fn missing_runs(&self, range: Range<BlockIndex>) -> Vec<Range<BlockIndex>> {
        let mut runs: Vec<Range<BlockIndex>> = Vec::new();
        for index in range {
            if self.blocks.contains_key(&index) {
                continue;
            }
            match runs.last_mut() {
                Some(run) if run.end == index => run.end = index + 1,
                _ => runs.push(index..index + 1),
            }
        }
        runs
    }

    /// Evict until `incoming` more blocks fit within capacity.
    ///
    /// Blocks in `protected` are kept even if that leaves too little room;
    /// [`BlockStore::enforce_capacity`] settles the difference afterwards.
    /// Returns the number of blocks evicted.
    pub fn evict(&mut self, incoming: usize, protected: Range<BlockIndex>) -> usize {
        let excess = (self.blocks.len() + incoming).saturating_sub(self.capacity);
        if excess == 0 {
            return 0;
        }

        let victims = self
            .evictor
            .select_victims(self.blocks.iter(), excess, protected);

        let mut evicted = 0;
        for victim in victims {
            if self.blocks.remove(&victim.index).is_some() {
                evicted += 1;
                debug!(
                    index = victim.index,
                    last_touch = victim.last_touch,
                    "Evicted block"
                );
            }
        }
        evicted
    }

    /// Evict least recently touched blocks until the store is within capacity.
    pub fn enforce_capacity(&mut self) -> usize {
        self.evict(0, 0..0)
    }

    /// Cached block indices in ascending order.
    pub fn indices(&self) -> Vec<BlockIndex> {
        let mut indices: Vec<_> = self.blocks.keys().copied().collect();
        indices.sort_unstable();
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Bytes {
        Bytes::from_static(b"abcd")
    }

    #[test]
    fn test_insert_and_touch() {
        let clock = Clock::new();
        let mut store = BlockStore::new(4);
        store.insert(3, data());

        assert!(store.contains(3));
        assert_eq!(store.get(3).unwrap().last_touch(), 0);
        assert_eq!(store.touch(3, &clock), Some(1));
        assert_eq!(store.touch(4, &clock), None);
    }

    #[test]
    fn test_missing_runs() {
        let mut store = BlockStore::new(16);
        for index in [2, 3, 6] {
            store.insert(index, data());
        }

        assert_eq!(store.missing_runs(0..8), vec![0..2, 4..6, 7..8]);
        assert_eq!(store.missing_runs(2..4), Vec::<Range<BlockIndex>>::new());
        assert_eq!(store.count_missing(0..8), 5);
        assert!(store.contains_range(2..4));
        assert!(!store.contains_range(2..5));
        assert!(store.contains_range(9..9));
    }

    #[test]
    fn test_evict_makes_room() {
        let clock = Clock::new();
        let mut store = BlockStore::new(3);
        for index in 0..3 {
            store.insert(index, data());
            store.touch(index, &clock);
        }
        // Refresh block 0 so block 1 becomes the oldest.
        store.touch(0, &clock);

        assert_eq!(store.evict(1, 0..0), 1);
        assert_eq!(store.indices(), vec![0, 2]);
    }

    #[test]
    fn test_evict_respects_protection_then_enforce_trims() {
        let clock = Clock::new();
        let mut store = BlockStore::new(2);
        for index in 0..2 {
            store.insert(index, data());
            store.touch(index, &clock);
        }

        // Everything cached is protected: nothing can go yet.
        assert_eq!(store.evict(2, 0..2), 0);
        store.insert(2, data());
        store.insert(3, data());
        assert_eq!(store.len(), 4);

        // The untouched newcomers are the oldest and go first.
        assert_eq!(store.enforce_capacity(), 2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.indices(), vec![0, 1]);
    }
}
