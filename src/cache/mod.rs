//! Block cache for positioned reads.
//!
//! This module contains the core cache data structures and algorithms:
//! - [`block`]: Block, Clock, and byte-range to block-range mapping
//! - [`store`]: The bounded block map and its miss/run bookkeeping
//! - [`evictor`]: Eviction policy (least recently touched)
//! - [`reader`]: The cached reader and its shared/exclusive read paths
//! - [`stats`]: Served/fetched counters
//! - [`error`]: Error type for the read path

pub mod block;
pub mod error;
pub mod evictor;
pub mod reader;
pub mod stats;
pub mod store;

pub use error::CacheError;
pub use reader::{new_shared_reader, read_owned, CachedReader, ReadOutcome, SharedReader};
pub use stats::StatsSnapshot;
