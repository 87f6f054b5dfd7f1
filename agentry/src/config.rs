//! Layered gateway configuration: YAML file, overlaid with environment
//! variables, overlaid with CLI flags (spec §9's config surface).
//!
//! Grounded on the intent behind the teacher's `empath-common/src/config/`
//! module (typed, serde-deserializable settings grouped by concern) but
//! flattened into one `GatewayConfig` the binary deserializes directly from
//! YAML, since the gateway's settings are far fewer than the teacher's
//! SMTP/TLS/timeout surface and don't need a second layer of per-concern
//! modules. Durations are plain seconds on the wire, matching
//! `agentry-health`/`agentry-metrics`'s own config structs, and are
//! converted to `std::time::Duration` when building each sub-crate's
//! config.

use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

use agentry_common::{Domain, SchemaIdentifier};
use agentry_control::AdminAuthConfig;
use agentry_core::ProcessorConfig;
use agentry_delivery::{CircuitBreakerConfig, EngineConfig, RetryPolicy};
use agentry_discovery::{CapabilityRecord, DiscoveryConfig};
use agentry_health::HealthConfig;
use agentry_metrics::MetricsConfig;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// The domain this gateway is authoritative for, e.g. `example.com`.
    pub local_domain: String,

    /// Address the main AMTP HTTP surface binds to.
    pub listen_address: String,

    /// This gateway's own advertised capability record (spec §4.1), served
    /// from `GET /v1/capabilities/{local_domain}`.
    pub capability: CapabilityConfig,

    pub admin: AdminConfig,
    pub discovery: DiscoveryConfigToml,
    pub delivery: DeliveryConfigToml,
    pub validator: ValidatorConfigToml,
    pub health: HealthConfig,
    pub metrics: MetricsConfig,

    /// How often the idempotency cache sweeps expired entries.
    pub idempotency_sweep_interval_secs: u64,
    /// How long an idempotency key suppresses a resubmission.
    pub idempotency_ttl_secs: u64,

    /// Bound on graceful shutdown before in-flight deliveries are cancelled.
    pub shutdown_grace_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            local_domain: "localhost".to_string(),
            listen_address: "[::]:8443".to_string(),
            capability: CapabilityConfig::default(),
            admin: AdminConfig::default(),
            discovery: DiscoveryConfigToml::default(),
            delivery: DeliveryConfigToml::default(),
            validator: ValidatorConfigToml::default(),
            health: HealthConfig::default(),
            metrics: MetricsConfig::default(),
            idempotency_sweep_interval_secs: 3600,
            idempotency_ttl_secs: 7 * 24 * 60 * 60,
            shutdown_grace_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CapabilityConfig {
    /// The gateway URL peers should POST `/v1/messages` to, e.g.
    /// `https://amtp.example.com`.
    pub gateway_url: String,
    pub max_size_bytes: u64,
    /// Schema patterns advertised in this gateway's own TXT record.
    pub advertised_schemas: Vec<String>,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            gateway_url: "https://localhost".to_string(),
            max_size_bytes: 10 * 1024 * 1024,
            advertised_schemas: Vec::new(),
        }
    }
}

impl CapabilityConfig {
    /// Builds this gateway's own advertised capability record, parsing
    /// `advertised_schemas` into [`SchemaIdentifier`]s and setting `auth`
    /// to the one scheme this gateway's inbox/status endpoints accept.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSchemaIdentifier`] if a configured
    /// schema pattern fails to parse.
    pub fn into_capability_record(self) -> Result<CapabilityRecord, ConfigError> {
        let schemas = self
            .advertised_schemas
            .iter()
            .map(|raw| {
                SchemaIdentifier::parse(raw)
                    .map_err(|e| ConfigError::InvalidSchemaIdentifier(raw.clone(), e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CapabilityRecord {
            version: "amtp1".to_string(),
            gateway: self.gateway_url,
            max_size: self.max_size_bytes,
            schemas,
            auth: vec!["bearer".to_string()],
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub header_name: String,
    pub key_file: Option<String>,
    pub key_hashes: Vec<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            header_name: "X-Admin-Key".to_string(),
            key_file: None,
            key_hashes: Vec::new(),
        }
    }
}

impl AdminConfig {
    #[must_use]
    pub fn into_auth_config(self) -> AdminAuthConfig {
        AdminAuthConfig {
            header_name: self.header_name,
            key_file: self.key_file,
            key_hashes: self.key_hashes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfigToml {
    pub cache_ttl_secs: u64,
    pub lookup_timeout_secs: u64,
    pub allow_http: bool,
}

impl Default for DiscoveryConfigToml {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            lookup_timeout_secs: 5,
            allow_http: false,
        }
    }
}

impl DiscoveryConfigToml {
    #[must_use]
    pub fn into_discovery_config(self) -> DiscoveryConfig {
        DiscoveryConfig {
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            lookup_timeout: Duration::from_secs(self.lookup_timeout_secs),
            allow_http: self.allow_http,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliveryConfigToml {
    pub delivery_timeout_secs: u64,
    pub pool_max_idle_per_host: usize,
    pub max_concurrency: Option<usize>,
    pub allow_http_gateways: bool,
    pub retry_base_delay_secs: u64,
    pub retry_max_delay_secs: u64,
    pub retry_max_retries: u32,
    pub retry_jitter_factor: f64,
    pub breaker_failure_threshold: u32,
    pub breaker_failure_window_secs: u64,
    pub breaker_open_timeout_secs: u64,
    pub breaker_success_threshold: u32,
}

impl Default for DeliveryConfigToml {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        let breaker = CircuitBreakerConfig::default();
        Self {
            delivery_timeout_secs: 30,
            pool_max_idle_per_host: 8,
            max_concurrency: None,
            allow_http_gateways: false,
            retry_base_delay_secs: retry.base_delay.as_secs(),
            retry_max_delay_secs: retry.max_delay.as_secs(),
            retry_max_retries: retry.max_retries,
            retry_jitter_factor: retry.jitter_factor,
            breaker_failure_threshold: breaker.failure_threshold,
            breaker_failure_window_secs: breaker.failure_window.as_secs(),
            breaker_open_timeout_secs: breaker.open_timeout.as_secs(),
            breaker_success_threshold: breaker.success_threshold,
        }
    }
}

impl DeliveryConfigToml {
    #[must_use]
    pub fn into_engine_config(self, local_domain: Domain) -> EngineConfig {
        EngineConfig {
            local_domain,
            delivery_timeout: Duration::from_secs(self.delivery_timeout_secs),
            pool_max_idle_per_host: self.pool_max_idle_per_host,
            max_concurrency: self.max_concurrency,
            retry: RetryPolicy {
                base_delay: Duration::from_secs(self.retry_base_delay_secs),
                max_delay: Duration::from_secs(self.retry_max_delay_secs),
                max_retries: self.retry_max_retries,
                jitter_factor: self.retry_jitter_factor,
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: self.breaker_failure_threshold,
                failure_window: Duration::from_secs(self.breaker_failure_window_secs),
                open_timeout: Duration::from_secs(self.breaker_open_timeout_secs),
                success_threshold: self.breaker_success_threshold,
            },
            allow_http_gateways: self.allow_http_gateways,
            user_agent: concat!("agentry/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidatorConfigToml {
    pub max_size_bytes: usize,
    pub max_clock_skew_secs: i64,
    pub schema_validation_enabled: bool,
}

impl Default for ValidatorConfigToml {
    fn default() -> Self {
        Self {
            max_size_bytes: 10 * 1024 * 1024,
            max_clock_skew_secs: 24 * 60 * 60,
            schema_validation_enabled: true,
        }
    }
}

impl ValidatorConfigToml {
    #[must_use]
    pub fn into_processor_config(self, idempotency_ttl_secs: u64) -> ProcessorConfig {
        ProcessorConfig {
            validator: agentry_core::ValidatorConfig {
                max_size_bytes: self.max_size_bytes,
                max_clock_skew: chrono::Duration::seconds(self.max_clock_skew_secs),
                schema_validation_enabled: self.schema_validation_enabled,
            },
            idempotency_ttl: Duration::from_secs(idempotency_ttl_secs),
        }
    }
}

impl GatewayConfig {
    /// Loads a YAML config file, overlays `AGENTRY_`-prefixed environment
    /// variable overrides onto the parsed tree, then deserializes the
    /// result. See [`apply_env_overrides`] for the override syntax.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file can't be read, or the file or the
    /// env-overlaid tree don't parse as valid YAML matching this shape.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        let mut value: serde_yaml::Value = serde_yaml::from_str(&contents)?;
        apply_env_overrides(&mut value, std::env::vars());
        Ok(serde_yaml::from_value(value)?)
    }
}

/// Overlays `AGENTRY_`-prefixed environment variables onto the parsed
/// config tree, `__` separating nesting levels, e.g.
/// `AGENTRY_DELIVERY__RETRY_MAX_RETRIES` overrides `delivery.retry_max_retries`
/// and a prefix-only segment like `AGENTRY_LOCAL_DOMAIN` overrides the
/// top-level `local_domain` key. Each value is itself parsed as YAML, so
/// `AGENTRY_DISCOVERY__ALLOW_HTTP=true` and
/// `AGENTRY_DELIVERY__RETRY_MAX_RETRIES=3` land as a bool and an integer
/// respectively; anything that doesn't parse as a YAML scalar falls back to
/// a plain string. Vars with an empty path segment (`AGENTRY_FOO____BAR`)
/// are skipped rather than silently creating a blank-named key.
fn apply_env_overrides(value: &mut serde_yaml::Value, vars: impl Iterator<Item = (String, String)>) {
    const PREFIX: &str = "AGENTRY_";
    for (key, raw) in vars {
        let Some(path) = key.strip_prefix(PREFIX) else {
            continue;
        };
        let segments: Vec<String> = path.split("__").map(str::to_lowercase).collect();
        if segments.iter().any(String::is_empty) {
            continue;
        }
        let scalar = serde_yaml::from_str(&raw).unwrap_or(serde_yaml::Value::String(raw));
        set_path(value, &segments, scalar);
    }
}

/// Sets `segments` as a dotted path into `value`, coercing any
/// non-mapping node it walks through (including `value` itself, starting
/// out as `Value::Null` before the first override) into a mapping.
fn set_path(value: &mut serde_yaml::Value, segments: &[String], scalar: serde_yaml::Value) {
    if !value.is_mapping() {
        *value = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
    }
    let mapping = value.as_mapping_mut().expect("just coerced to a mapping above");
    let key = serde_yaml::Value::String(segments[0].clone());

    if segments.len() == 1 {
        mapping.insert(key, scalar);
        return;
    }

    let mut child = mapping.remove(&key).unwrap_or(serde_yaml::Value::Null);
    set_path(&mut child, &segments[1..], scalar);
    mapping.insert(key, child);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_deserializes_from_empty_yaml() {
        let config: GatewayConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.local_domain, "localhost");
        assert_eq!(config.admin.header_name, "X-Admin-Key");
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let yaml = "local_domain: example.com\nlisten_address: \"0.0.0.0:9000\"\n";
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.local_domain, "example.com");
        assert_eq!(config.listen_address, "0.0.0.0:9000");
        assert_eq!(config.capability.max_size_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn delivery_config_round_trips_retry_defaults() {
        let toml = DeliveryConfigToml::default();
        let engine = toml.into_engine_config(Domain::new("example.com"));
        assert_eq!(engine.retry.max_retries, RetryPolicy::default().max_retries);
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Iterator<Item = (String, String)> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn top_level_env_override_applies_with_no_nesting() {
        let mut value: serde_yaml::Value = serde_yaml::from_str("local_domain: example.com").unwrap();
        apply_env_overrides(&mut value, vars(&[("AGENTRY_LOCAL_DOMAIN", "override.test")]));
        let config: GatewayConfig = serde_yaml::from_value(value).unwrap();
        assert_eq!(config.local_domain, "override.test");
    }

    #[test]
    fn nested_env_override_walks_the_double_underscore_path() {
        let mut value: serde_yaml::Value = serde_yaml::from_str("{}").unwrap();
        apply_env_overrides(&mut value, vars(&[("AGENTRY_DELIVERY__RETRY_MAX_RETRIES", "7")]));
        let config: GatewayConfig = serde_yaml::from_value(value).unwrap();
        assert_eq!(config.delivery.retry_max_retries, 7);
        // sibling fields under the same nested mapping keep their defaults
        assert_eq!(config.delivery.retry_base_delay_secs, DeliveryConfigToml::default().retry_base_delay_secs);
    }

    #[test]
    fn nested_env_override_merges_onto_existing_yaml_rather_than_replacing_the_sibling_keys() {
        let yaml = "delivery:\n  retry_max_retries: 2\n  retry_base_delay_secs: 10\n";
        let mut value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        apply_env_overrides(&mut value, vars(&[("AGENTRY_DELIVERY__RETRY_MAX_RETRIES", "9")]));
        let config: GatewayConfig = serde_yaml::from_value(value).unwrap();
        assert_eq!(config.delivery.retry_max_retries, 9);
        assert_eq!(config.delivery.retry_base_delay_secs, 10);
    }

    #[test]
    fn bool_valued_env_override_parses_as_yaml_not_string() {
        let mut value: serde_yaml::Value = serde_yaml::from_str("{}").unwrap();
        apply_env_overrides(&mut value, vars(&[("AGENTRY_DISCOVERY__ALLOW_HTTP", "true")]));
        let config: GatewayConfig = serde_yaml::from_value(value).unwrap();
        assert!(config.discovery.allow_http);
    }

    #[test]
    fn unprefixed_env_vars_are_ignored() {
        let mut value: serde_yaml::Value = serde_yaml::from_str("{}").unwrap();
        apply_env_overrides(&mut value, vars(&[("PATH", "/usr/bin"), ("HOME", "/root")]));
        let config: GatewayConfig = serde_yaml::from_value(value).unwrap();
        assert_eq!(config.local_domain, GatewayConfig::default().local_domain);
    }

    #[test]
    fn empty_path_segment_is_skipped_rather_than_creating_a_blank_key() {
        let mut value: serde_yaml::Value = serde_yaml::from_str("{}").unwrap();
        apply_env_overrides(&mut value, vars(&[("AGENTRY_DELIVERY____RETRY_MAX_RETRIES", "7")]));
        // should not panic, and should not produce a config with a blank-named nested key
        let config: GatewayConfig = serde_yaml::from_value(value).unwrap();
        assert_eq!(config.delivery.retry_max_retries, DeliveryConfigToml::default().retry_max_retries);
    }
}
