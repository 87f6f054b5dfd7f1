//! Metrics collection configuration.

use serde::Deserialize;

/// Configuration for in-process metrics collection.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// When disabled, `/metrics` is not mounted and recording calls are no-ops.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Maximum number of unique remote domains tracked individually in
    /// delivery counters. Beyond this limit, additional domains are folded
    /// into an `"other"` bucket to bound memory use.
    #[serde(default = "default_max_domain_cardinality")]
    pub max_domain_cardinality: usize,

    /// Domains that bypass the cardinality limit and are always tracked
    /// individually.
    #[serde(default)]
    pub high_priority_domains: Vec<String>,
}

const fn default_enabled() -> bool {
    true
}

const fn default_max_domain_cardinality() -> usize {
    1000
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_domain_cardinality: default_max_domain_cardinality(),
            high_priority_domains: Vec::new(),
        }
    }
}
