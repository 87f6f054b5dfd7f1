//! The `LocalAgent` record and its delivery-mode invariant (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use agentry_common::{AgentAddress, SchemaIdentifier};

use crate::{api_key::ApiKeyHash, error::RegistryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    Push,
    Pull,
}

/// A locally-registered agent. `api_key_hash` is never serialized; the
/// plaintext key is surfaced exactly once, at registration time, by
/// [`crate::registry::AgentRegistry::register`].
#[derive(Debug, Clone, Serialize)]
pub struct LocalAgent {
    pub address: AgentAddress,
    pub delivery_mode: DeliveryMode,
    pub push_target: Option<String>,
    pub headers: HashMap<String, String>,
    #[serde(skip)]
    pub(crate) api_key_hash: ApiKeyHash,
    pub supported_schemas: Vec<SchemaIdentifier>,
    pub requires_schema: bool,
    pub created_at: DateTime<Utc>,
    pub last_access: Option<DateTime<Utc>>,
}

pub struct NewAgent {
    pub address: AgentAddress,
    pub delivery_mode: DeliveryMode,
    pub push_target: Option<String>,
    pub headers: HashMap<String, String>,
    pub supported_schemas: Vec<SchemaIdentifier>,
    pub requires_schema: bool,
}

impl NewAgent {
    /// # Errors
    ///
    /// Returns [`RegistryError::MissingPushTarget`] or
    /// [`RegistryError::UnexpectedPushTarget`] if `push_target` and
    /// `delivery_mode` disagree.
    pub fn validate(&self) -> Result<(), RegistryError> {
        match (self.delivery_mode, &self.push_target) {
            (DeliveryMode::Push, None) => Err(RegistryError::MissingPushTarget),
            (DeliveryMode::Pull, Some(_)) => Err(RegistryError::UnexpectedPushTarget),
            (DeliveryMode::Push, Some(_)) | (DeliveryMode::Pull, None) => Ok(()),
        }
    }

    #[must_use]
    pub fn supports(&self, schema_id: &SchemaIdentifier) -> bool {
        if self.requires_schema || !self.supported_schemas.is_empty() {
            self.supported_schemas.iter().any(|s| s.matches(schema_id))
        } else {
            true
        }
    }
}

impl LocalAgent {
    /// Spec §4.3: "if `requires_schema` is set or `supported_schemas` is
    /// non-empty, only messages whose `schema` matches... route to the
    /// agent. Empty list = accept any." so an agent registered with no
    /// schema constraints at all matches every schema.
    #[must_use]
    pub fn supports_schema(&self, schema_id: &SchemaIdentifier) -> bool {
        if self.requires_schema || !self.supported_schemas.is_empty() {
            self.supported_schemas.iter().any(|s| s.matches(schema_id))
        } else {
            true
        }
    }
}
