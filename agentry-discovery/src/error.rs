use thiserror::Error;

use agentry_common::ErrorCode;

/// Errors from capability discovery.
///
/// Grounded on `DnsError` from the teacher's mail-server resolver: the same
/// "temporary vs permanent" split survives as `retryable()`.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no _amtp TXT record found for domain: {0}")]
    NoRecord(String),

    #[error("TXT record for {domain} is malformed: {reason}")]
    InvalidRecord { domain: String, reason: String },

    #[error("capability record for {0} declares an unsupported gateway URL")]
    InvalidGateway(String),

    #[error("DNS lookup failed for {domain}: {source}")]
    LookupFailed {
        domain: String,
        #[source]
        source: hickory_resolver::error::ResolveError,
    },

    #[error("DNS query timed out for domain: {0}")]
    Timeout(String),
}

impl DiscoveryError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidRecord { .. } | Self::InvalidGateway(_) => ErrorCode::InvalidGateway,
            Self::NoRecord(_) | Self::LookupFailed { .. } | Self::Timeout(_) => {
                ErrorCode::DiscoveryFailed
            }
        }
    }

    /// Malformed records are permanent failures; resolver/network trouble is
    /// retryable at the caller per spec §4.1's failure model.
    #[must_use]
    pub const fn retryable(&self) -> bool {
        matches!(self, Self::LookupFailed { .. } | Self::Timeout(_))
    }
}
