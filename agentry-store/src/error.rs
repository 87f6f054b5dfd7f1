//! Error types for the status store and idempotency cache.
//!
//! Grounded on the teacher's `SpoolError` (`empath-spool/src/error.rs`): a
//! flat `thiserror` enum and a `code()` mapping onto the shared wire
//! taxonomy. Lock poisoning is recovered from rather than propagated, the
//! same way `agentry-registry::AgentRegistry` handles its `RwLock`.

use thiserror::Error;
use uuid::Uuid;

use agentry_common::{AgentAddress, ErrorCode};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no status recorded for message {0}")]
    MessageNotFound(Uuid),

    #[error("message {message_id} has no status row for recipient {recipient}")]
    RecipientNotFound {
        message_id: Uuid,
        recipient: AgentAddress,
    },

    #[error("cannot transition recipient status from {from:?} to {to:?}")]
    InvalidTransition { from: String, to: String },

    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MessageNotFound(_) => ErrorCode::StatusNotFound,
            Self::RecipientNotFound { .. } => ErrorCode::StatusNotFound,
            Self::InvalidTransition { .. } | Self::Internal(_) => ErrorCode::InternalError,
        }
    }
}
