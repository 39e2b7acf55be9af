//! Post-request observers.
//!
//! An observer sees the cache's occupancy after every request that took the
//! exclusive lock. It runs while that lock is held, so it must be quick and
//! it must never fail the read: observers swallow their own errors.
//!
//! - [`graph`]: Braille occupancy graph for a terminal

pub mod graph;

use crate::cache::block::BlockIndex;

pub use graph::BrailleGraph;

/// Which blocks are cached right now.
#[derive(Debug, Clone, Copy)]
pub struct Occupancy<'a> {
    /// Bytes per block.
    pub block_size: u64,
    /// Maximum number of cached blocks.
    pub capacity: usize,
    /// Cached block indices, ascending.
    pub cached: &'a [BlockIndex],
}

pub trait CacheObserver: Send + Sync {
    fn on_exclusive_request(&self, occupancy: &Occupancy<'_>);
}
