//! Delivery error taxonomy (spec §7), grounded on the teacher's layered
//! `Permanent`/`Temporary`/`System` split in `empath-delivery/src/error.rs` —
//! renamed onto AMTP's own retryable/non-retryable line rather than SMTP's
//! 4xx/5xx one.

use thiserror::Error;

use agentry_common::ErrorCode;
use agentry_discovery::DiscoveryError;
use agentry_registry::RegistryError;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("capability discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("peer at {0} does not support the requested schema")]
    SchemaNotSupported(String),

    #[error("message exceeds peer's advertised max_size of {0} bytes")]
    MessageTooLarge(u64),

    #[error("peer rejected the message with HTTP {0}")]
    ClientError(u16),

    #[error("peer returned server error HTTP {0}")]
    ServerError(u16),

    #[error("HTTP request to peer failed: {0}")]
    HttpRequestFailed(String),

    #[error("HTTP request to peer timed out")]
    Timeout,

    #[error("circuit breaker open for domain {0}")]
    ServiceUnavailable(String),

    #[error("peer rate-limited the request")]
    RateLimitExceeded,

    #[error("push delivery to {0} failed: {1}")]
    PushDeliveryFailed(String, String),

    #[error("storing message in local inbox failed: {0}")]
    InboxStoreFailed(#[from] RegistryError),

    #[error("delivery cancelled")]
    ContextCancelled,
}

impl DeliveryError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Discovery(e) => e.code(),
            Self::SchemaNotSupported(_) => ErrorCode::SchemaNotSupported,
            Self::MessageTooLarge(_) => ErrorCode::MessageTooLarge,
            Self::ClientError(_) => ErrorCode::ClientError,
            Self::ServerError(_) => ErrorCode::ServerError,
            Self::HttpRequestFailed(_) => ErrorCode::HttpRequestFailed,
            Self::Timeout => ErrorCode::Timeout,
            Self::ServiceUnavailable(_) => ErrorCode::ServiceUnavailable,
            Self::RateLimitExceeded => ErrorCode::RateLimitExceeded,
            Self::PushDeliveryFailed(..) => ErrorCode::PushDeliveryFailed,
            Self::InboxStoreFailed(_) => ErrorCode::InboxStoreFailed,
            Self::ContextCancelled => ErrorCode::ContextCancelled,
        }
    }

    /// Whether the delivery engine's retry loop should attempt this
    /// recipient again, per the classification table in spec §7.
    #[must_use]
    pub const fn retryable(&self) -> bool {
        matches!(
            self,
            Self::HttpRequestFailed(_)
                | Self::Timeout
                | Self::ServiceUnavailable(_)
                | Self::RateLimitExceeded
                | Self::ServerError(_)
        ) || matches!(self, Self::Discovery(e) if e.retryable())
    }
}
