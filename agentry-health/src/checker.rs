//! Readiness tracking for the gateway's long-running components.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

/// Thread-safe readiness tracker for the gateway's startup-ordered
/// components (spec §9: discovery cache, schema registry, agent registry,
/// delivery engine).
#[derive(Debug)]
pub struct HealthChecker {
    /// Whether the discovery cache/resolver is operational.
    discovery_ready: Arc<AtomicBool>,

    /// Whether the schema registry has finished loading.
    schema_ready: Arc<AtomicBool>,

    /// Whether the agent registry has finished loading.
    registry_ready: Arc<AtomicBool>,

    /// Whether the delivery engine is accepting work.
    delivery_ready: Arc<AtomicBool>,

    /// Current count of messages awaiting delivery or retry.
    queue_size: Arc<AtomicU64>,

    /// Maximum queue size threshold for readiness.
    max_queue_size: u64,
}

impl HealthChecker {
    #[must_use]
    pub fn new(max_queue_size: u64) -> Self {
        Self {
            discovery_ready: Arc::new(AtomicBool::new(false)),
            schema_ready: Arc::new(AtomicBool::new(false)),
            registry_ready: Arc::new(AtomicBool::new(false)),
            delivery_ready: Arc::new(AtomicBool::new(false)),
            queue_size: Arc::new(AtomicU64::new(0)),
            max_queue_size,
        }
    }

    pub fn set_discovery_ready(&self, ready: bool) {
        self.discovery_ready.store(ready, Ordering::Relaxed);
        tracing::debug!(ready, "discovery readiness updated");
    }

    pub fn set_schema_ready(&self, ready: bool) {
        self.schema_ready.store(ready, Ordering::Relaxed);
        tracing::debug!(ready, "schema registry readiness updated");
    }

    pub fn set_registry_ready(&self, ready: bool) {
        self.registry_ready.store(ready, Ordering::Relaxed);
        tracing::debug!(ready, "agent registry readiness updated");
    }

    pub fn set_delivery_ready(&self, ready: bool) {
        self.delivery_ready.store(ready, Ordering::Relaxed);
        tracing::debug!(ready, "delivery engine readiness updated");
    }

    pub fn set_queue_size(&self, size: u64) {
        self.queue_size.store(size, Ordering::Relaxed);
    }

    /// For liveness, we just need to respond — if the process can't, the
    /// HTTP server itself is dead and the probe will time out.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        true
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        let discovery_ok = self.discovery_ready.load(Ordering::Relaxed);
        let schema_ok = self.schema_ready.load(Ordering::Relaxed);
        let registry_ok = self.registry_ready.load(Ordering::Relaxed);
        let delivery_ok = self.delivery_ready.load(Ordering::Relaxed);
        let current_queue = self.queue_size.load(Ordering::Relaxed);
        let queue_ok = current_queue < self.max_queue_size;

        let ready = discovery_ok && schema_ok && registry_ok && delivery_ok && queue_ok;

        if !ready {
            tracing::debug!(
                discovery_ready = discovery_ok,
                schema_ready = schema_ok,
                registry_ready = registry_ok,
                delivery_ready = delivery_ok,
                queue_size = current_queue,
                max_queue_size = self.max_queue_size,
                "readiness check failed"
            );
        }

        ready
    }

    #[must_use]
    pub fn get_status(&self) -> HealthStatus {
        HealthStatus {
            alive: self.is_alive(),
            ready: self.is_ready(),
            discovery_ready: self.discovery_ready.load(Ordering::Relaxed),
            schema_ready: self.schema_ready.load(Ordering::Relaxed),
            registry_ready: self.registry_ready.load(Ordering::Relaxed),
            delivery_ready: self.delivery_ready.load(Ordering::Relaxed),
            queue_size: self.queue_size.load(Ordering::Relaxed),
            max_queue_size: self.max_queue_size,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
#[allow(
    clippy::struct_excessive_bools,
    reason = "status struct intentionally has multiple boolean fields for clarity"
)]
pub struct HealthStatus {
    pub alive: bool,
    pub ready: bool,
    pub discovery_ready: bool,
    pub schema_ready: bool,
    pub registry_ready: bool,
    pub delivery_ready: bool,
    pub queue_size: u64,
    pub max_queue_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_until_every_component_reports_in() {
        let checker = HealthChecker::new(100);
        assert!(!checker.is_ready());

        checker.set_discovery_ready(true);
        checker.set_schema_ready(true);
        checker.set_registry_ready(true);
        assert!(!checker.is_ready());

        checker.set_delivery_ready(true);
        assert!(checker.is_ready());
    }

    #[test]
    fn queue_above_threshold_fails_readiness() {
        let checker = HealthChecker::new(10);
        checker.set_discovery_ready(true);
        checker.set_schema_ready(true);
        checker.set_registry_ready(true);
        checker.set_delivery_ready(true);
        checker.set_queue_size(20);

        assert!(!checker.is_ready());
    }

    #[test]
    fn liveness_is_always_true() {
        let checker = HealthChecker::new(10);
        assert!(checker.is_alive());
    }
}
