//! In-process delivery and discovery counters with a JSON snapshot for the
//! optional `GET /metrics` endpoint (spec §6).
//!
//! The teacher instruments everything through OpenTelemetry and pushes to an
//! OTLP collector; spec §6 asks only for a flat JSON snapshot, so that
//! pipeline is dropped in favor of plain atomic counters behind `dashmap`
//! (see `DESIGN.md`). The module split (`delivery`, `discovery`) and the
//! per-domain cardinality-limiting idea are kept from the teacher's
//! `DeliveryMetrics`/`DnsMetrics`.

#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

mod config;
mod delivery;
mod discovery;
mod error;

pub use config::MetricsConfig;
pub use delivery::{DeliveryMetrics, DeliverySnapshot};
pub use discovery::{DiscoveryMetrics, DiscoverySnapshot};
pub use error::MetricsError;
use std::sync::Arc;

use serde::Serialize;

/// Root metrics container mounted once at startup and shared across the
/// delivery engine and discovery cache. `delivery`/`discovery` are each an
/// `Arc` so the same counters handed to `DeliveryEngine::with_metrics`/
/// `Discovery::with_metrics` are the ones this container's own snapshot
/// reads back for `GET /metrics`: one set of atomics, not two.
#[derive(Debug)]
pub struct Metrics {
    enabled: bool,
    pub delivery: Arc<DeliveryMetrics>,
    pub discovery: Arc<DiscoveryMetrics>,
}

impl Metrics {
    #[must_use]
    pub fn new(config: &MetricsConfig) -> Self {
        Self {
            enabled: config.enabled,
            delivery: Arc::new(DeliveryMetrics::new(config.max_domain_cardinality, config.high_priority_domains.clone())),
            discovery: Arc::new(DiscoveryMetrics::new()),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// A point-in-time JSON snapshot of every counter, suitable for
    /// `GET /metrics`.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            delivery: self.delivery.snapshot(),
            discovery: self.discovery.snapshot(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub delivery: DeliverySnapshot,
    pub discovery: DiscoverySnapshot,
}
