//! Read statistics.
//!
//! Four monotonically increasing counters, updated lock-free from both the
//! shared-lock and exclusive-lock paths. They are Prometheus counters so a
//! reader's traffic can be exposed on any [`prometheus::Registry`].

use prometheus::{IntCounter, Registry};
use serde::Serialize;

/// Live counters owned by a reader.
#[derive(Debug, Clone)]
pub struct Stats {
    cache_bytes: IntCounter,
    source_bytes: IntCounter,
    cache_requests: IntCounter,
    source_requests: IntCounter,
}

impl Stats {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            cache_bytes: IntCounter::new(
                "readat_cache_served_bytes_total",
                "Bytes returned to callers of the cache.",
            )?,
            source_bytes: IntCounter::new(
                "readat_cache_source_bytes_total",
                "Bytes fetched from the underlying source.",
            )?,
            cache_requests: IntCounter::new(
                "readat_cache_requests_total",
                "Read requests served by the cache.",
            )?,
            source_requests: IntCounter::new(
                "readat_cache_source_requests_total",
                "Fetch operations issued to the underlying source.",
            )?,
        })
    }

    /// Register all four counters on `registry`.
    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.cache_bytes.clone()))?;
        registry.register(Box::new(self.source_bytes.clone()))?;
        registry.register(Box::new(self.cache_requests.clone()))?;
        registry.register(Box::new(self.source_requests.clone()))?;
        Ok(())
    }

    /// Record a completed request that returned `bytes` to the caller.
    pub fn record_served(&self, bytes: usize) {
        self.cache_bytes.inc_by(bytes as u64);
        self.cache_requests.inc();
    }

    /// Record one fetch from the source that produced `bytes`.
    pub fn record_fetch(&self, bytes: usize) {
        self.source_bytes.inc_by(bytes as u64);
        self.source_requests.inc();
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_bytes: self.cache_bytes.get(),
            source_bytes: self.source_bytes.get(),
            cache_requests: self.cache_requests.get(),
            source_requests: self.source_requests.get(),
        }
    }
}

/// A point-in-time copy of the counters.
///
/// The four values are read independently, so a snapshot taken during
/// concurrent reads may mix counts from either side of a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Bytes returned to callers.
    pub cache_bytes: u64,
    /// Bytes fetched from the source.
    pub source_bytes: u64,
    /// Requests served.
    pub cache_requests: u64,
    /// Fetches issued to the source.
    pub source_requests: u64,
}

impl StatsSnapshot {
    /// Bytes served per byte fetched (0.0 before the first fetch).
    pub fn byte_improvement(&self) -> f64 {
        if self.source_bytes == 0 {
            return 0.0;
        }
        self.cache_bytes as f64 / self.source_bytes as f64
    }

    /// Requests served per source fetch (0.0 before the first fetch).
    pub fn request_improvement(&self) -> f64 {
        if self.source_requests == 0 {
            return 0.0;
        }
        self.cache_requests as f64 / self.source_requests as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = Stats::new().unwrap();
        stats.record_fetch(64);
        stats.record_served(10);
        stats.record_served(6);

        let snap = stats.snapshot();
        assert_eq!(
            snap,
            StatsSnapshot {
                cache_bytes: 16,
                source_bytes: 64,
                cache_requests: 2,
                source_requests: 1,
            }
        );
        assert!((snap.byte_improvement() - 0.25).abs() < 1e-10);
        assert!((snap.request_improvement() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_improvement_without_fetches() {
        let snap = StatsSnapshot::default();
        assert_eq!(snap.byte_improvement(), 0.0);
        assert_eq!(snap.request_improvement(), 0.0);
    }

    #[test]
    fn test_register_exposes_counters() {
        let stats = Stats::new().unwrap();
        let registry = Registry::new();
        stats.register(&registry).unwrap();
        stats.record_fetch(3);

        let families = registry.gather();
        assert_eq!(families.len(), 4);

        let mut text = String::new();
        prometheus::TextEncoder::new()
            .encode_utf8(&families, &mut text)
            .unwrap();
        assert!(text.contains("readat_cache_source_bytes_total 3"));

        // The same counters cannot be registered twice.
        assert!(stats.register(&registry).is_err());
    }
}
