//! Shared error types for Agentry.
//!
//! Every crate in the workspace defines its own `thiserror` enum for its own
//! failure modes (see `agentry-discovery::DiscoveryError`,
//! `agentry-delivery::DeliveryError`, etc.); this module holds the pieces
//! that are genuinely shared: address/schema-id parsing errors, and the
//! [`ErrorCode`] taxonomy from the wire error body that every crate's error
//! type ultimately maps onto.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Errors parsing an `agent@domain` address.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address {0:?} must contain exactly one '@' with non-empty parts on both sides")]
    MissingAt(String),
}

/// Errors parsing a schema identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaIdError {
    #[error("schema identifier {0:?} is missing the 'agntcy:' prefix")]
    MissingPrefix(String),

    #[error("schema identifier {0:?} does not match <domain>.<entity>.<version> or <domain>.*")]
    BadFormat(String),

    #[error("schema identifier has invalid version segment {0:?}, expected 'v<N>'")]
    BadVersion(String),
}

/// The wire-level error code taxonomy from the AMTP error handling design.
///
/// Every crate-local error type implements `code(&self) -> ErrorCode` and
/// `retryable(&self) -> bool`; this enum is what actually gets serialized
/// into the `{error:{code,...}}` response body and is the single source of
/// truth for the retryable classification and HTTP status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidRequestFormat,
    MessageValidationFailed,
    InvalidMessageId,
    InvalidRecipient,
    MessageTooLarge,
    Unauthorized,
    Forbidden,
    InvalidCredentials,
    MessageNotFound,
    StatusNotFound,
    DiscoveryFailed,
    InvalidGateway,
    SchemaNotSupported,
    SchemaCheckFailed,
    HttpRequestFailed,
    ServerError,
    Timeout,
    ServiceUnavailable,
    RateLimitExceeded,
    ClientError,
    PushDeliveryFailed,
    InboxStoreFailed,
    ContextCancelled,
    ProcessingFailed,
    InternalError,
}

impl ErrorCode {
    /// Whether the issuing caller may retry the operation that produced this
    /// code, per the classification table in the error handling design.
    #[must_use]
    pub const fn retryable(self) -> bool {
        matches!(
            self,
            Self::HttpRequestFailed
                | Self::ServerError
                | Self::Timeout
                | Self::ServiceUnavailable
                | Self::RateLimitExceeded
        )
    }

    /// The HTTP status this code maps to when surfaced synchronously to a
    /// caller (ingress-time validation/auth failures; delivery errors are
    /// recorded in per-recipient status instead, not reflected in the HTTP
    /// response for `/v1/messages`).
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidRequestFormat
            | Self::MessageValidationFailed
            | Self::InvalidMessageId
            | Self::InvalidRecipient => 400,
            Self::Unauthorized | Self::InvalidCredentials => 401,
            Self::Forbidden => 403,
            Self::MessageNotFound | Self::StatusNotFound => 404,
            Self::MessageTooLarge => 413,
            Self::RateLimitExceeded => 429,
            Self::ServiceUnavailable | Self::ContextCancelled => 503,
            Self::Timeout => 504,
            Self::DiscoveryFailed
            | Self::InvalidGateway
            | Self::SchemaNotSupported
            | Self::SchemaCheckFailed
            | Self::HttpRequestFailed
            | Self::ServerError
            | Self::ClientError
            | Self::PushDeliveryFailed
            | Self::InboxStoreFailed
            | Self::ProcessingFailed
            | Self::InternalError => 500,
        }
    }
}

/// Serializes as the same SCREAMING_SNAKE_CASE wire code used by `Display`,
/// so `ErrorCode` can sit directly in a response body or status record
/// without a separate string conversion at the call site.
impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidRequestFormat => "INVALID_REQUEST_FORMAT",
            Self::MessageValidationFailed => "MESSAGE_VALIDATION_FAILED",
            Self::InvalidMessageId => "INVALID_MESSAGE_ID",
            Self::InvalidRecipient => "INVALID_RECIPIENT",
            Self::MessageTooLarge => "MESSAGE_TOO_LARGE",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::MessageNotFound => "MESSAGE_NOT_FOUND",
            Self::StatusNotFound => "STATUS_NOT_FOUND",
            Self::DiscoveryFailed => "DISCOVERY_FAILED",
            Self::InvalidGateway => "INVALID_GATEWAY",
            Self::SchemaNotSupported => "SCHEMA_NOT_SUPPORTED",
            Self::SchemaCheckFailed => "SCHEMA_CHECK_FAILED",
            Self::HttpRequestFailed => "HTTP_REQUEST_FAILED",
            Self::ServerError => "SERVER_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::ClientError => "CLIENT_ERROR",
            Self::PushDeliveryFailed => "PUSH_DELIVERY_FAILED",
            Self::InboxStoreFailed => "INBOX_STORE_FAILED",
            Self::ContextCancelled => "CONTEXT_CANCELLED",
            Self::ProcessingFailed => "PROCESSING_FAILED",
            Self::InternalError => "INTERNAL_ERROR",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_matches_table() {
        assert!(ErrorCode::ServiceUnavailable.retryable());
        assert!(ErrorCode::RateLimitExceeded.retryable());
        assert!(!ErrorCode::ClientError.retryable());
        assert!(!ErrorCode::MessageValidationFailed.retryable());
    }

    #[test]
    fn display_matches_wire_code() {
        assert_eq!(ErrorCode::DiscoveryFailed.to_string(), "DISCOVERY_FAILED");
        assert_eq!(ErrorCode::ClientError.to_string(), "CLIENT_ERROR");
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(ErrorCode::MessageTooLarge.http_status(), 413);
        assert_eq!(ErrorCode::RateLimitExceeded.http_status(), 429);
        assert_eq!(ErrorCode::MessageNotFound.http_status(), 404);
        assert_eq!(ErrorCode::Timeout.http_status(), 504);
    }
}
