//! Eviction policy: decides which blocks leave the cache.
//!
//! Least-recently-touched first. Each block carries the clock value of its
//! last touch; the victim is always a block whose stamp is not greater than
//! that of any other evictable block. Blocks that were inserted but never
//! touched carry stamp 0 and go first.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::ops::Range;

use crate::cache::block::{Block, BlockIndex};

/// An eviction candidate with its recency stamp.
#[derive(Debug, Clone, Copy)]
pub struct EvictionCandidate {
    pub index: BlockIndex,
    pub last_touch: u64,
}

// Ordered by stamp; ties broken by block index.
impl PartialEq for EvictionCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EvictionCandidate {}

impl PartialOrd for EvictionCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EvictionCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.last_touch
            .cmp(&other.last_touch)
            .then_with(|| self.index.cmp(&other.index))
    }
}

/// The eviction policy engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct Evictor;

impl Evictor {
    pub fn new() -> Self {
        Self
    }

    /// Select up to `count` victims, least recently touched first.
    ///
    /// Blocks inside `protected` are never selected.
    pub fn select_victims<'a>(
        &self,
        blocks: impl Iterator<Item = (&'a BlockIndex, &'a Block)>,
        count: usize,
        protected: Range<BlockIndex>,
    ) -> Vec<EvictionCandidate> {
        if count == 0 {
            return Vec::new();
        }

        // Max-heap of the `count` oldest seen so far; the root is the newest of them.
        let mut oldest: BinaryHeap<EvictionCandidate> = BinaryHeap::with_capacity(count + 1);
        for (&index, block) in blocks {
            if protected.contains(&index) {
                continue;
            }
            let candidate = EvictionCandidate {
                index,
                last_touch: block.last_touch(),
            };
            if oldest.len() < count {
                oldest.push(candidate);
            } else if oldest.peek().is_some_and(|newest| candidate < *newest) {
                oldest.pop();
                oldest.push(candidate);
            }
        }

        let mut victims = oldest.into_vec();
        victims.sort_unstable();
        victims
    }
}
