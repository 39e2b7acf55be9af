//! Read workloads for exercising a cached reader.
//!
//! Workers run on tokio's blocking pool and share one reader, so misses,
//! hits and evictions from different workers interleave the way they would
//! for real concurrent callers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::try_join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{CacheError, CachedReader, ReadOutcome, SharedReader, StatsSnapshot};
use crate::config::{AccessPattern, WorkloadConfig};
use crate::source::PositionedSource;

/// Per-worker tallies.
#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    reads: u64,
    bytes: u64,
    short_reads: u64,
}

impl Tally {
    fn record(&mut self, outcome: ReadOutcome) {
        self.reads += 1;
        self.bytes += outcome.bytes_read as u64;
        if outcome.end_of_stream {
            self.short_reads += 1;
        }
    }

    fn merge(&mut self, other: Tally) {
        self.reads += other.reads;
        self.bytes += other.bytes;
        self.short_reads += other.short_reads;
    }
}

/// Summary of a finished workload.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadReport {
    /// Read requests issued by all workers.
    pub reads: u64,
    /// Bytes returned to the workers.
    pub bytes: u64,
    /// Reads that hit end-of-stream.
    pub short_reads: u64,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// Reader counters at the end of the run.
    pub stats: StatsSnapshot,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

fn run_worker<S: PositionedSource>(
    reader: &CachedReader<S>,
    content_len: u64,
    config: &WorkloadConfig,
    worker: usize,
) -> Result<Tally, CacheError> {
    let mut buf = vec![0u8; config.read_size];
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(worker as u64));
    let mut tally = Tally::default();

    for pass in 0..config.passes {
        match config.pattern {
            AccessPattern::Sequential => {
                let mut offset = 0;
                loop {
                    let outcome = reader.read_at(&mut buf, offset)?;
                    tally.record(outcome);
                    offset += outcome.bytes_read as u64;
                    if outcome.end_of_stream {
                        break;
                    }
                }
            }
            AccessPattern::Random => {
                for _ in 0..config.reads_per_worker {
                    let offset = if content_len == 0 {
                        0
                    } else {
                        rng.gen_range(0..content_len)
                    };
                    tally.record(reader.read_at(&mut buf, offset)?);
                }
            }
        }
        debug!(worker, pass, reads = tally.reads, "Worker finished pass");
    }

    Ok(tally)
}

/// Run `config` against `reader` and wait for every worker.
///
/// The first worker error is returned; other workers still run to completion.
pub async fn run_workload<S: PositionedSource + 'static>(
    reader: SharedReader<S>,
    content_len: u64,
    config: &WorkloadConfig,
) -> Result<WorkloadReport, CacheError> {
    info!(
        pattern = ?config.pattern,
        workers = config.workers,
        read_size = config.read_size,
        passes = config.passes,
        content_len,
        "Starting workload"
    );

    let start = Instant::now();
    let handles = (0..config.workers).map(|worker| {
        let reader = Arc::clone(&reader);
        let config = config.clone();
        tokio::task::spawn_blocking(move || run_worker(&reader, content_len, &config, worker))
    });
    let results = try_join_all(handles)
        .await
        .map_err(|e| CacheError::Task(e.to_string()))?;

    let mut total = Tally::default();
    for tally in results {
        total.merge(tally?);
    }

    let report = WorkloadReport {
        reads: total.reads,
        bytes: total.bytes,
        short_reads: total.short_reads,
        elapsed: start.elapsed(),
        stats: reader.stats(),
    };
    info!(
        reads = report.reads,
        bytes = report.bytes,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Workload complete"
    );
    Ok(report)
}
