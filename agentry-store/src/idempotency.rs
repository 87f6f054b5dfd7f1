//! Idempotency cache: `idempotency_key -> {message_id, first_seen, ttl}`
//! (spec §4.7). Grounded on the same `RwLock<HashMap<..>>` shape as
//! [`crate::store::StatusStore`]; a single background sweeper (driven by
//! the `agentry` binary crate) calls [`IdempotencyCache::sweep_expired`]
//! periodically rather than checking expiry lazily on every lookup path.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Entry {
    message_id: Uuid,
    first_seen: DateTime<Utc>,
    ttl: Duration,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        chrono::Duration::from_std(self.ttl)
            .is_ok_and(|ttl| now.signed_duration_since(self.first_seen) >= ttl)
    }
}

#[derive(Default)]
pub struct IdempotencyCache {
    entries: RwLock<HashMap<Uuid, Entry>>,
}

impl IdempotencyCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Atomically checks `idempotency_key` against the cache: if an
    /// unexpired entry exists, returns its `message_id` without inserting.
    /// Otherwise records a fresh entry for `message_id` and returns `None`.
    ///
    /// This is the single critical section the Processor's concurrent
    /// `Accept` calls serialize on (spec §5).
    #[must_use]
    pub fn check_and_insert(&self, idempotency_key: Uuid, message_id: Uuid, ttl: Duration) -> Option<Uuid> {
        let now = Utc::now();
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(existing) = entries.get(&idempotency_key) {
            if !existing.is_expired(now) {
                debug!(%idempotency_key, existing_message_id = %existing.message_id, "idempotency hit");
                return Some(existing.message_id);
            }
        }

        entries.insert(
            idempotency_key,
            Entry {
                message_id,
                first_seen: now,
                ttl,
            },
        );
        None
    }

    /// Removes every entry whose TTL has elapsed as of `now`. Intended to
    /// run on a single periodic sweeper, not per-request.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type SharedIdempotencyCache = Arc<IdempotencyCache>;

/// Default TTL for idempotency entries (spec §4.7: "default 7 days").
pub const DEFAULT_IDEMPOTENCY_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
