//! readat-cache: a block cache for positioned readers.
//!
//! Wraps any random-access byte source (a local file, remote object storage,
//! a network-backed file) and serves repeated or overlapping reads from an
//! in-memory cache of fixed-size blocks, so the source sees fewer and larger
//! requests:
//!   caller -> CachedReader (block cache) -> PositionedSource
//!
//! ```
//! use readat_cache::{CachedReader, MemorySource};
//!
//! let source = MemorySource::from_static(b"0123456789abcdef");
//! let reader = CachedReader::new(source, 4, 2).unwrap();
//!
//! let mut buf = [0u8; 3];
//! let outcome = reader.read_at(&mut buf, 1).unwrap();
//! assert_eq!(&buf, b"123");
//! assert!(!outcome.end_of_stream);
//! ```

pub mod cache;
pub mod config;
pub mod observer;
pub mod source;
pub mod workload;

pub use cache::{CacheError, CachedReader, ReadOutcome, SharedReader, StatsSnapshot};
pub use observer::{BrailleGraph, CacheObserver, Occupancy};
pub use source::{MemorySource, PositionedSource};
