//! Error types for admin authentication and the admin CRUD surface.
//!
//! Grounded on the teacher's `empath-control` error shape: a flat
//! `thiserror` enum plus a `code()` mapping onto the shared wire taxonomy.

use thiserror::Error;

use agentry_common::ErrorCode;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("failed to read admin key file {path:?}: {source}")]
    KeyFileUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configured admin key hash {0:?} is not valid hex-encoded SHA-256")]
    InvalidKeyHash(String),

    #[error("no admin key source configured: set either a key file or a key hash list")]
    NoKeySource,

    #[error("missing or invalid {0} header")]
    Unauthorized(String),
}

impl ControlError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::KeyFileUnreadable { .. } | Self::InvalidKeyHash(_) | Self::NoKeySource => {
                ErrorCode::InternalError
            }
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
        }
    }
}
