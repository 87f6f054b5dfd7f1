//! The structured JSON error body every handler in this crate returns (spec
//! §7): `{error: {code, message, details, timestamp, request_id}}`.
//!
//! Grounded on `agentry-control`'s ad-hoc `{error:{code,message}}` bodies
//! (`handlers.rs`/`middleware.rs`), extended with the `details`/`timestamp`/
//! `request_id` fields spec §7 names but that crate's narrower admin-CRUD
//! surface didn't need. `agentry-control` and `agentry-health` keep their
//! own narrower bodies; this type is used only by the routes this crate
//! owns directly.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use agentry_common::ErrorCode;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub timestamp: chrono::DateTime<Utc>,
    pub request_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ApiErrorBody,
    #[serde(skip)]
    pub status: StatusCode,
}

impl ApiError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::with_status(code, StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), message)
    }

    #[must_use]
    pub fn with_status(code: ErrorCode, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorBody {
                code: code.to_string(),
                message: message.into(),
                details: None,
                timestamp: Utc::now(),
                request_id: Uuid::now_v7(),
            },
            status,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.error.details = Some(details);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<agentry_store::StoreError> for ApiError {
    fn from(err: agentry_store::StoreError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<agentry_registry::RegistryError> for ApiError {
    fn from(err: agentry_registry::RegistryError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<agentry_discovery::DiscoveryError> for ApiError {
    fn from(err: agentry_discovery::DiscoveryError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<agentry_core::ProcessorError> for ApiError {
    fn from(err: agentry_core::ProcessorError) -> Self {
        match &err {
            agentry_core::ProcessorError::Validation(failures) => {
                let details = serde_json::to_value(failures).unwrap_or(Value::Null);
                Self::new(err.code(), err.to_string()).with_details(details)
            }
            agentry_core::ProcessorError::Store(_) => Self::new(err.code(), err.to_string()),
        }
    }
}

/// Configuration loading failures, surfaced before any server starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file as YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid advertised schema identifier {0:?}: {1}")]
    InvalidSchemaIdentifier(String, agentry_common::error::SchemaIdError),
}
