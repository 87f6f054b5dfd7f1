//! Health server configuration.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// If the pending-delivery count exceeds this, readiness fails.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: u64,
}

const fn default_enabled() -> bool {
    true
}

fn default_listen_address() -> String {
    "[::]:8080".to_string()
}

const fn default_max_queue_size() -> u64 {
    10000
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            listen_address: default_listen_address(),
            max_queue_size: default_max_queue_size(),
        }
    }
}
