use thiserror::Error;

use agentry_common::ErrorCode;

/// Grounded on the teacher's `SpoolError` (`empath-spool/src/error.rs`):
/// a small `thiserror` enum carried by every registry operation, mapped to
/// the wire error taxonomy at the HTTP boundary.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("agent {0} already registered")]
    AlreadyExists(String),

    #[error("agent {0} not found")]
    NotFound(String),

    #[error("invalid agent address: {0}")]
    InvalidAddress(#[from] agentry_common::error::AddressError),

    #[error("push_target is required when delivery_mode is push")]
    MissingPushTarget,

    #[error("push_target must be absent when delivery_mode is pull")]
    UnexpectedPushTarget,

    #[error("invalid or missing API key")]
    Unauthorized,

    #[error("message {0} not found in inbox")]
    MessageNotFound(String),
}

impl RegistryError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyExists(_) | Self::InvalidAddress(_) | Self::MissingPushTarget | Self::UnexpectedPushTarget => {
                ErrorCode::InvalidRequestFormat
            }
            Self::NotFound(_) | Self::MessageNotFound(_) => ErrorCode::MessageNotFound,
            Self::Unauthorized => ErrorCode::Unauthorized,
        }
    }
}
