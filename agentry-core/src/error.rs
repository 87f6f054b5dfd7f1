//! Error types for structural/schema validation and message acceptance
//! (spec §4.4, §4.6, §7).

use serde::Serialize;
use thiserror::Error;

use agentry_common::ErrorCode;

/// A single structural or schema validation failure, with the field path it
/// applies to when one is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    pub field: Option<String>,
    pub message: String,
}

impl ValidationFailure {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn on_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("message failed validation: {0:?}")]
    Validation(Vec<ValidationFailure>),

    #[error("status store error: {0}")]
    Store(#[from] agentry_store::StoreError),
}

impl ProcessorError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::MessageValidationFailed,
            Self::Store(_) => ErrorCode::ProcessingFailed,
        }
    }
}
