//! The cached reader: a block cache in front of a positioned source.
//!
//! Every request is mapped to the half-open range of blocks covering it.
//! When all of those blocks are cached the request is served under a shared
//! lock, so hits run in parallel. Otherwise the reader takes the exclusive
//! lock, re-checks, makes room, fetches each contiguous run of missing blocks
//! with a single source call, and copies the result out of the cache.
//!
//! Source calls only ever happen under the exclusive lock.

use std::io;
use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use prometheus::Registry;
use tracing::{debug, trace};

use crate::cache::block::{BlockIndex, BlockMapper, Clock};
use crate::cache::error::CacheError;
use crate::cache::stats::{Stats, StatsSnapshot};
use crate::cache::store::BlockStore;
use crate::config::CacheConfig;
use crate::observer::{CacheObserver, Occupancy};
use crate::source::PositionedSource;

/// Result of a read.
///
/// `bytes_read < buf.len()` always comes with `end_of_stream` set: the
/// content ended `bytes_read` bytes after the requested offset. Bytes of the
/// buffer past `bytes_read` are left as they were.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    pub bytes_read: usize,
    pub end_of_stream: bool,
}

/// A block cache wrapped around a positioned source.
pub struct CachedReader<S> {
    /// Cached blocks. Written only under the exclusive lock.
    store: RwLock<BlockStore>,

    /// The underlying source. Locked only while `store` is write-locked, so
    /// this mutex is never contended; it lets `S` be `Send` without `Sync`.
    source: Mutex<S>,

    mapper: BlockMapper,

    /// `block_size` as a buffer length.
    block_len: usize,

    clock: Clock,

    stats: Stats,

    observer: Option<Box<dyn CacheObserver>>,
}

impl<S: PositionedSource> CachedReader<S> {
    /// Wrap `source` with a cache of `capacity_blocks` blocks of `block_size` bytes.
    pub fn new(source: S, block_size: u64, capacity_blocks: usize) -> Result<Self, CacheError> {
        if block_size == 0 {
            return Err(CacheError::InvalidConfig(
                "block size must be positive".to_string(),
            ));
        }
        if capacity_blocks == 0 {
            return Err(CacheError::InvalidConfig(
                "capacity must be at least one block".to_string(),
            ));
        }
        let block_len = usize::try_from(block_size).map_err(|_| {
            CacheError::InvalidConfig(format!("block size {block_size} does not fit in memory"))
        })?;

        debug!(block_size, capacity_blocks, "Created cached reader");

        Ok(Self {
            store: RwLock::new(BlockStore::new(capacity_blocks)),
            source: Mutex::new(source),
            mapper: BlockMapper::new(block_size),
            block_len,
            clock: Clock::new(),
            stats: Stats::new()?,
            observer: None,
        })
    }

    pub fn from_config(source: S, config: &CacheConfig) -> Result<Self, CacheError> {
        Self::new(source, config.block_size, config.capacity_blocks)
    }

    /// Attach an observer called after every exclusive-lock request.
    pub fn with_observer(mut self, observer: impl CacheObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Read up to `buf.len()` bytes starting at `offset`.
    ///
    /// On a source failure nothing is copied into `buf`; blocks fetched
    /// before the failure are kept as far as capacity allows.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<ReadOutcome, CacheError> {
        let blocks = self.request_blocks(offset, buf.len())?;

        {
            let store = self.store.read();
            if store.contains_range(blocks.clone()) {
                let outcome = self.copy_out(&store, blocks.clone(), buf, offset);
                drop(store);
                trace!(offset, len = buf.len(), first = blocks.start, "Cache hit");
                self.stats.record_served(outcome.bytes_read);
                return Ok(outcome);
            }
        }

        let mut store = self.store.write();
        let result = self.read_exclusive(&mut store, blocks, buf, offset);
        if let Some(observer) = &self.observer {
            let cached = store.indices();
            observer.on_exclusive_request(&Occupancy {
                block_size: self.mapper.block_size(),
                capacity: store.capacity(),
                cached: &cached,
            });
        }
        drop(store);

        let outcome = result?;
        self.stats.record_served(outcome.bytes_read);
        Ok(outcome)
    }

    /// Map a request to its block range, rejecting ranges that overflow.
    fn request_blocks(&self, offset: u64, len: usize) -> Result<Range<BlockIndex>, CacheError> {
        let invalid = || CacheError::InvalidRequest { offset, len };
        let end = offset.checked_add(len as u64).ok_or_else(invalid)?;
        let blocks = self.mapper.byte_range_to_block_range(offset, end);
        // The block-aligned span fetched for the request must be addressable too.
        blocks
            .end
            .checked_mul(self.mapper.block_size())
            .ok_or_else(invalid)?;
        Ok(blocks)
    }

    fn read_exclusive(
        &self,
        store: &mut BlockStore,
        blocks: Range<BlockIndex>,
        buf: &mut [u8],
        offset: u64,
    ) -> Result<ReadOutcome, CacheError> {
        // Another writer may have filled the range while we waited.
        let fetched = if store.contains_range(blocks.clone()) {
            Ok(())
        } else {
            self.fetch_missing(store, blocks.clone())
        };
        let outcome = fetched.map(|()| self.copy_out(store, blocks, buf, offset));

        // Protected blocks can leave the store over budget, whether or not
        // every run arrived.
        let trimmed = store.enforce_capacity();
        if trimmed > 0 {
            debug!(trimmed, capacity = store.capacity(), "Trimmed cache to capacity");
        }

        outcome
    }

    /// Make room for the missing blocks of `blocks`, then fetch them run by run.
    fn fetch_missing(
        &self,
        store: &mut BlockStore,
        blocks: Range<BlockIndex>,
    ) -> Result<(), CacheError> {
        let missing = store.count_missing(blocks.clone());
        let evicted = store.evict(missing, blocks.clone());
        if evicted > 0 {
            debug!(evicted, missing, cached = store.len(), "Made room for missing blocks");
        }

        let mut source = self.source.lock();
        for run in store.missing_runs(blocks) {
            self.fetch_run(store, &mut *source, run)?;
        }
        Ok(())
    }

    /// Fetch the blocks of `run` with one source call and cache them.
    fn fetch_run(
        &self,
        store: &mut BlockStore,
        source: &mut S,
        run: Range<BlockIndex>,
    ) -> Result<(), CacheError> {
        let span = self.mapper.block_range_to_byte_range(run.clone());
        let mut buf = vec![0u8; (run.end - run.start) as usize * self.block_len];

        let fetched = match source.read_at(&mut buf, span.start) {
            Ok(n) => n.min(buf.len()),
            Err(e) => {
                self.stats.record_fetch(0);
                debug!(offset = span.start, len = buf.len(), error = %e, "Source read failed");
                return Err(CacheError::Source(e));
            }
        };
        self.stats.record_fetch(fetched);
        debug!(
            first = run.start,
            blocks = run.end - run.start,
            offset = span.start,
            requested = buf.len(),
            fetched,
            "Fetched run from source"
        );

        buf.truncate(fetched);
        let mut data = Bytes::from(buf);
        for index in run {
            let len = data.len().min(self.block_len);
            store.insert(index, data.split_to(len));
        }
        Ok(())
    }

    /// Touch every block of the request, then copy its bytes into `buf`.
    ///
    /// Every block in `blocks` must be cached.
    fn copy_out(
        &self,
        store: &BlockStore,
        blocks: Range<BlockIndex>,
        buf: &mut [u8],
        offset: u64,
    ) -> ReadOutcome {
        for index in blocks.clone() {
            store.touch(index, &self.clock);
        }

        let mut skip = (offset - self.mapper.block_start(blocks.start)) as usize;
        let mut copied = 0;
        for index in blocks {
            let Some(block) = store.get(index) else {
                break;
            };
            let data = block.data();
            let start = skip.min(data.len());
            let n = (data.len() - start).min(buf.len() - copied);
            buf[copied..copied + n].copy_from_slice(&data[start..start + n]);
            copied += n;
            skip = 0;

            // Only the last block of the content is short.
            if block.data().len() < self.block_len {
                break;
            }
        }

        ReadOutcome {
            bytes_read: copied,
            end_of_stream: copied < buf.len(),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Expose this reader's counters on a Prometheus registry.
    pub fn register_metrics(&self, registry: &Registry) -> Result<(), CacheError> {
        Ok(self.stats.register(registry)?)
    }

    pub fn block_size(&self) -> u64 {
        self.mapper.block_size()
    }

    pub fn capacity(&self) -> usize {
        self.store.read().capacity()
    }

    /// Indices of the cached blocks, ascending.
    pub fn cached_blocks(&self) -> Vec<BlockIndex> {
        self.store.read().indices()
    }

    pub fn contains_block(&self, index: BlockIndex) -> bool {
        self.store.read().contains(index)
    }

    /// Drop the cache and hand back the source.
    pub fn into_source(self) -> S {
        self.source.into_inner()
    }
}

/// A cached reader is itself a positioned source, so caches can be stacked.
impl<S: PositionedSource> PositionedSource for &CachedReader<S> {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        Ok(CachedReader::read_at(*self, buf, offset)?.bytes_read)
    }
}

/// Thread-safe shared handle to a cached reader.
pub type SharedReader<S> = Arc<CachedReader<S>>;

/// Create a shared cached reader.
pub fn new_shared_reader<S: PositionedSource>(
    source: S,
    config: &CacheConfig,
) -> Result<SharedReader<S>, CacheError> {
    Ok(Arc::new(CachedReader::from_config(source, config)?))
}

/// Read `len` bytes at `offset` from an async context.
///
/// The read runs on tokio's blocking pool, since a miss blocks on the source.
/// The returned bytes are truncated to `bytes_read`.
pub async fn read_owned<S: PositionedSource + 'static>(
    reader: &SharedReader<S>,
    offset: u64,
    len: usize,
) -> Result<(Bytes, ReadOutcome), CacheError> {
    let reader = Arc::clone(reader);
    tokio::task::spawn_blocking(move || {
        let mut buf = vec![0u8; len];
        let outcome = reader.read_at(&mut buf, offset)?;
        buf.truncate(outcome.bytes_read);
        Ok::<_, CacheError>((Bytes::from(buf), outcome))
    })
    .await
    .map_err(|e| CacheError::Task(e.to_string()))?
}
