//! Single-flight, TTL-cached `_amtp.<domain>` TXT resolution.
//!
//! Grounded on the teacher's `DnsResolver` (`empath-delivery/src/dns.rs`):
//! same `TokioAsyncResolver` + per-key caching shape, generalized from MX/A
//! lookups with an LRU cache to TXT lookups with a genuine single-flight
//! cache (a per-domain `tokio::sync::Mutex` collapses concurrent misses
//! instead of racing them, per spec §4.1's cache contract).

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use agentry_metrics::DiscoveryMetrics;
use hickory_resolver::{
    TokioAsyncResolver,
    config::{ResolverConfig, ResolverOpts},
};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    capability::{CachedCapability, CapabilityRecord},
    error::DiscoveryError,
};

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// How long a resolved capability record is cached, default 5 minutes.
    pub cache_ttl: Duration,
    /// Bound on a single TXT lookup, default 5 seconds.
    pub lookup_timeout: Duration,
    /// Allow `http://` gateway URLs (development only).
    pub allow_http: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            lookup_timeout: Duration::from_secs(5),
            allow_http: false,
        }
    }
}

type DomainLock = Arc<Mutex<Option<CachedCapability>>>;

/// Resolves and caches AMTP capability records.
pub struct Discovery {
    resolver: TokioAsyncResolver,
    config: DiscoveryConfig,
    locks: std::sync::Mutex<HashMap<String, DomainLock>>,
    /// Optional mock table consulted before any real DNS query, matching
    /// spec §4.1's "a mock table may be consulted first when mock mode is
    /// on" — used by tests and local development.
    mock: std::sync::Mutex<HashMap<String, String>>,
    metrics: Option<Arc<DiscoveryMetrics>>,
}

impl Discovery {
    /// # Errors
    ///
    /// Returns an error if the system resolver configuration cannot be read.
    pub fn new(config: DiscoveryConfig) -> Result<Self, DiscoveryError> {
        let mut opts = ResolverOpts::default();
        opts.timeout = config.lookup_timeout;
        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), opts);

        Ok(Self {
            resolver,
            config,
            locks: std::sync::Mutex::new(HashMap::new()),
            mock: std::sync::Mutex::new(HashMap::new()),
            metrics: None,
        })
    }

    /// Attaches a metrics sink; subsequent lookups record cache hit/miss
    /// and failure counts against it.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<DiscoveryMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Registers a mock TXT body for a domain, bypassing real DNS. Intended
    /// for tests and `S3`-style fixtures.
    pub fn mock_txt_record(&self, domain: &str, body: &str) {
        self.mock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(domain.to_string(), body.to_string());
    }

    fn domain_lock(&self, domain: &str) -> DomainLock {
        self.locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Resolves the capability record for `domain`, consulting the cache
    /// first and collapsing concurrent misses into a single lookup.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] per the failure model in spec §4.1.
    pub async fn discover(&self, domain: &str) -> Result<CapabilityRecord, DiscoveryError> {
        let lock = self.domain_lock(domain);
        let mut guard = lock.lock().await;

        if let Some(cached) = guard.as_ref() {
            if cached.cached_at.elapsed() < self.config.cache_ttl {
                debug!(domain, "capability cache hit");
                if let Some(metrics) = &self.metrics {
                    metrics.record_cache_hit();
                }
                return Ok(cached.record.clone());
            }
            debug!(domain, "capability cache entry expired");
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_cache_miss();
        }

        let record = match self.resolve_uncached(domain).await {
            Ok(record) => record,
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_failure();
                }
                return Err(e);
            }
        };
        *guard = Some(CachedCapability {
            record: record.clone(),
            cached_at: Instant::now(),
        });
        Ok(record)
    }

    async fn resolve_uncached(&self, domain: &str) -> Result<CapabilityRecord, DiscoveryError> {
        let body = if let Some(mocked) = self
            .mock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(domain)
            .cloned()
        {
            mocked
        } else {
            self.lookup_txt(domain).await?
        };

        CapabilityRecord::parse(domain, &body, self.config.allow_http)
    }

    async fn lookup_txt(&self, domain: &str) -> Result<String, DiscoveryError> {
        let query = format!("_amtp.{domain}");
        let lookup = tokio::time::timeout(
            self.config.lookup_timeout,
            self.resolver.txt_lookup(query.clone()),
        )
        .await
        .map_err(|_| DiscoveryError::Timeout(domain.to_string()))?
        .map_err(|source| DiscoveryError::LookupFailed {
            domain: domain.to_string(),
            source,
        })?;

        lookup
            .iter()
            .find_map(|txt| {
                let joined = txt
                    .txt_data()
                    .iter()
                    .flat_map(|chunk| String::from_utf8(chunk.to_vec()))
                    .collect::<String>();
                (!joined.is_empty()).then_some(joined)
            })
            .ok_or_else(|| DiscoveryError::NoRecord(domain.to_string()))
    }

    /// True if the domain's advertised capabilities include `schema_id`,
    /// exactly or via wildcard.
    ///
    /// # Errors
    ///
    /// Propagates [`DiscoveryError`] from [`Self::discover`].
    pub async fn supports_schema(
        &self,
        domain: &str,
        schema_id: &agentry_common::SchemaIdentifier,
    ) -> Result<bool, DiscoveryError> {
        Ok(self.discover(domain).await?.supports_schema(schema_id))
    }
}
