//! Delivery counters: attempts, outcomes, and per-domain cardinality-limited
//! breakdowns, with a JSON snapshot for `/metrics` (spec §6).
//!
//! Grounded on the teacher's `DeliveryMetrics` module split and its
//! cardinality-limiting idea (fold long-tail domains into `"other"` once
//! `max_domain_cardinality` distinct domains have been seen, unless the
//! domain is in `high_priority_domains`), adapted from OTLP instruments to
//! plain atomic counters behind a `dashmap`.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

const OTHER_BUCKET: &str = "other";

#[derive(Debug, Default, Serialize)]
pub struct DomainCounts {
    pub attempts: u64,
    pub delivered: u64,
    pub failed: u64,
    pub retries: u64,
}

#[derive(Debug)]
struct DomainCounters {
    attempts: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
}

impl DomainCounters {
    fn new() -> Self {
        Self {
            attempts: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> DomainCounts {
        DomainCounts {
            attempts: self.attempts.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

/// Counts delivery attempts and outcomes, broken down by remote domain up
/// to `max_domain_cardinality` distinct domains.
#[derive(Debug)]
pub struct DeliveryMetrics {
    by_domain: DashMap<String, DomainCounters>,
    max_domain_cardinality: usize,
    high_priority_domains: Vec<String>,
    total_attempts: AtomicU64,
    total_delivered: AtomicU64,
    total_failed: AtomicU64,
    total_retries: AtomicU64,
}

impl DeliveryMetrics {
    #[must_use]
    pub fn new(max_domain_cardinality: usize, high_priority_domains: Vec<String>) -> Self {
        Self {
            by_domain: DashMap::new(),
            max_domain_cardinality,
            high_priority_domains,
            total_attempts: AtomicU64::new(0),
            total_delivered: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
            total_retries: AtomicU64::new(0),
        }
    }

    /// Resolves `domain` to its own bucket, or to `"other"` once the
    /// cardinality limit has been reached and `domain` isn't high-priority.
    fn bucket_for(&self, domain: &str) -> String {
        if self.by_domain.contains_key(domain) || self.high_priority_domains.iter().any(|d| d == domain) {
            return domain.to_string();
        }
        if self.by_domain.len() >= self.max_domain_cardinality {
            return OTHER_BUCKET.to_string();
        }
        domain.to_string()
    }

    pub fn record_attempt(&self, domain: &str) {
        self.total_attempts.fetch_add(1, Ordering::Relaxed);
        let bucket = self.bucket_for(domain);
        self.by_domain
            .entry(bucket)
            .or_insert_with(DomainCounters::new)
            .attempts
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self, domain: &str) {
        self.total_delivered.fetch_add(1, Ordering::Relaxed);
        let bucket = self.bucket_for(domain);
        self.by_domain
            .entry(bucket)
            .or_insert_with(DomainCounters::new)
            .delivered
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self, domain: &str) {
        self.total_failed.fetch_add(1, Ordering::Relaxed);
        let bucket = self.bucket_for(domain);
        self.by_domain
            .entry(bucket)
            .or_insert_with(DomainCounters::new)
            .failed
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self, domain: &str) {
        self.total_retries.fetch_add(1, Ordering::Relaxed);
        let bucket = self.bucket_for(domain);
        self.by_domain
            .entry(bucket)
            .or_insert_with(DomainCounters::new)
            .retries
            .fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> DeliverySnapshot {
        DeliverySnapshot {
            attempts: self.total_attempts.load(Ordering::Relaxed),
            delivered: self.total_delivered.load(Ordering::Relaxed),
            failed: self.total_failed.load(Ordering::Relaxed),
            retries: self.total_retries.load(Ordering::Relaxed),
            by_domain: self
                .by_domain
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().snapshot()))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeliverySnapshot {
    pub attempts: u64,
    pub delivered: u64,
    pub failed: u64,
    pub retries: u64,
    pub by_domain: std::collections::HashMap<String, DomainCounts>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_domains_fold_into_other() {
        let metrics = DeliveryMetrics::new(1, vec!["vip.test".to_string()]);
        metrics.record_attempt("a.test");
        metrics.record_attempt("b.test");
        metrics.record_attempt("vip.test");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.by_domain.get("a.test").unwrap().attempts, 1);
        assert_eq!(snapshot.by_domain.get("other").unwrap().attempts, 1);
        assert_eq!(snapshot.by_domain.get("vip.test").unwrap().attempts, 1);
        assert_eq!(snapshot.attempts, 3);
    }

    #[test]
    fn per_domain_outcomes_accumulate() {
        let metrics = DeliveryMetrics::new(10, Vec::new());
        metrics.record_attempt("peer.test");
        metrics.record_retry("peer.test");
        metrics.record_delivered("peer.test");

        let counts = metrics.snapshot().by_domain.remove("peer.test").unwrap();
        assert_eq!(counts.attempts, 1);
        assert_eq!(counts.retries, 1);
        assert_eq!(counts.delivered, 1);
        assert_eq!(counts.failed, 0);
    }
}
