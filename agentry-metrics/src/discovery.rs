//! Capability discovery cache metrics: lookups, hits, misses, and failures
//! (spec §2: "cache hit rate").
//!
//! Grounded on the teacher's `DnsMetrics` module (lookup counters plus a
//! hit/miss split), generalized from MX/A record lookups to `_amtp.<domain>`
//! TXT capability resolution and re-expressed as plain atomics rather than
//! OTLP instruments.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct DiscoveryMetrics {
    lookups: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    failures: AtomicU64,
}

impl DiscoveryMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> DiscoverySnapshot {
        let lookups = self.lookups.load(Ordering::Relaxed);
        let hits = self.cache_hits.load(Ordering::Relaxed);
        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if lookups == 0 { 0.0 } else { hits as f64 / lookups as f64 };

        DiscoverySnapshot {
            lookups,
            cache_hits: hits,
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            cache_hit_rate: hit_rate,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DiscoverySnapshot {
    pub lookups: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub failures: u64,
    pub cache_hit_rate: f64,
}
