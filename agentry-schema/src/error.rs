use thiserror::Error;

use agentry_common::ErrorCode;

/// Grounded on the `SchemaAdapterError` shape from the schema-registry
/// adapter in the retrieval pack: a thin `thiserror` enum over
/// registry-level failure modes, distinct from schema *validation* results
/// (those are values, not errors — see [`crate::ValidationResult`]).
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema {0} already registered, pass force=true to overwrite")]
    AlreadyExists(String),

    #[error("schema {0} not found")]
    NotFound(String),

    #[error("invalid schema identifier: {0}")]
    InvalidIdentifier(#[from] agentry_common::error::SchemaIdError),

    #[error("schema definition is not valid JSON-Schema: {0}")]
    InvalidDefinition(String),
}

impl SchemaError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyExists(_) => ErrorCode::InvalidRequestFormat,
            Self::NotFound(_) => ErrorCode::MessageNotFound,
            Self::InvalidIdentifier(_) | Self::InvalidDefinition(_) => {
                ErrorCode::InvalidRequestFormat
            }
        }
    }
}
