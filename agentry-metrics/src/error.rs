//! Error types for metrics operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics system already initialized")]
    AlreadyInitialized,

    #[error("metrics system not initialized: call init_metrics() first")]
    NotInitialized,
}
