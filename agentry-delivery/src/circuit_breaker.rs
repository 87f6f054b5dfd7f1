//! Per-domain circuit breaker gating remote delivery (spec §4.5 ambient
//! enrichment), grounded on the teacher's breaker in this same file: the
//! `Closed -> Open -> HalfOpen` state machine, sliding failure window, and
//! `DashMap`-per-domain sharding survive unchanged. Per-domain override
//! config and the SMTP-specific doc examples are dropped — AMTP has no
//! equivalent concept of "domain overrides" in the spec, and generic
//! defaults suffice for a federation of peer gateways.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Failures within `failure_window` required to trip the breaker.
    pub failure_threshold: u32,
    pub failure_window: Duration,
    /// How long the breaker stays open before allowing a half-open probe.
    pub open_timeout: Duration,
    /// Consecutive successes in half-open needed to close the breaker.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            open_timeout: Duration::from_secs(300),
            success_threshold: 1,
        }
    }
}

struct DomainBreaker {
    state: State,
    failures: Vec<Instant>,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
}

impl DomainBreaker {
    fn closed() -> Self {
        Self {
            state: State::Closed,
            failures: Vec::new(),
            consecutive_successes: 0,
            opened_at: None,
        }
    }
}

/// Gates remote delivery per-domain. Not consulted for local delivery.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    domains: DashMap<String, DomainBreaker>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            domains: DashMap::new(),
        }
    }

    /// True if a delivery attempt to `domain` is currently allowed. A
    /// half-open probe is granted at most once per cooldown: the caller that
    /// observes `HalfOpen` here is the one probe allowed through; the
    /// breaker flips back to effectively-open bookkeeping until that probe
    /// resolves via [`Self::record_success`] or [`Self::record_failure`].
    #[must_use]
    pub fn allow(&self, domain: &str) -> bool {
        let mut entry = self
            .domains
            .entry(domain.to_string())
            .or_insert_with(DomainBreaker::closed);

        match entry.state {
            State::Closed => true,
            State::HalfOpen => false,
            State::Open => {
                let elapsed = entry.opened_at.map_or(Duration::MAX, |t| t.elapsed());
                if elapsed >= self.config.open_timeout {
                    debug!(domain, "circuit breaker entering half-open probe");
                    entry.state = State::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self, domain: &str) {
        let Some(mut entry) = self.domains.get_mut(domain) else {
            return;
        };
        match entry.state {
            State::Closed => entry.failures.clear(),
            State::HalfOpen => {
                entry.consecutive_successes += 1;
                if entry.consecutive_successes >= self.config.success_threshold {
                    debug!(domain, "circuit breaker closing after successful probe");
                    *entry = DomainBreaker::closed();
                }
            }
            State::Open => {}
        }
    }

    pub fn record_failure(&self, domain: &str) {
        let mut entry = self
            .domains
            .entry(domain.to_string())
            .or_insert_with(DomainBreaker::closed);

        match entry.state {
            State::HalfOpen => {
                warn!(domain, "circuit breaker probe failed, reopening");
                entry.state = State::Open;
                entry.opened_at = Some(Instant::now());
                entry.consecutive_successes = 0;
            }
            State::Closed | State::Open => {
                let now = Instant::now();
                entry.failures.push(now);
                let window = self.config.failure_window;
                entry.failures.retain(|t| now.duration_since(*t) <= window);

                if entry.state == State::Closed
                    && entry.failures.len() as u32 >= self.config.failure_threshold
                {
                    warn!(domain, "circuit breaker tripped open");
                    entry.state = State::Open;
                    entry.opened_at = Some(now);
                }
            }
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

pub type SharedCircuitBreaker = Arc<CircuitBreaker>;

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 3,
            failure_window: Duration::from_secs(60),
            open_timeout: Duration::from_millis(20),
            success_threshold: 1,
        })
    }

    #[test]
    fn closed_by_default() {
        let cb = breaker();
        assert!(cb.allow("peer.test"));
    }

    #[test]
    fn trips_open_after_threshold_failures() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure("peer.test");
        }
        assert!(!cb.allow("peer.test"));
    }

    #[test]
    fn half_open_probe_after_cooldown_closes_on_success() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure("peer.test");
        }
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.allow("peer.test"), "cooldown elapsed, probe allowed");
        cb.record_success("peer.test");
        assert!(cb.allow("peer.test"), "closed after successful probe");
    }

    #[test]
    fn half_open_probe_reopens_on_failure() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure("peer.test");
        }
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.allow("peer.test"));
        cb.record_failure("peer.test");
        assert!(!cb.allow("peer.test"));
    }

    #[test]
    fn failures_outside_window_do_not_accumulate() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 3,
            failure_window: Duration::from_millis(10),
            open_timeout: Duration::from_secs(300),
            success_threshold: 1,
        });
        cb.record_failure("peer.test");
        std::thread::sleep(Duration::from_millis(20));
        cb.record_failure("peer.test");
        cb.record_failure("peer.test");
        assert!(cb.allow("peer.test"), "first failure aged out of window");
    }

    #[test]
    fn domains_are_independent() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure("a.test");
        }
        assert!(!cb.allow("a.test"));
        assert!(cb.allow("b.test"));
    }
}
