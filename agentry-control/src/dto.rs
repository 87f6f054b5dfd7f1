//! Request/response bodies for the admin agent and schema CRUD surface
//! (spec §6), shared between the handlers below and `agentryctl`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use agentry_common::SchemaIdentifier;
use agentry_registry::{DeliveryMode, LocalAgent};

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterAgentRequest {
    /// Bare local part, or `local@domain` matching the gateway's own domain.
    pub address: String,
    pub delivery_mode: DeliveryMode,
    pub push_target: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub supported_schemas: Vec<SchemaIdentifier>,
    #[serde(default)]
    pub requires_schema: bool,
}

#[derive(Debug, Serialize)]
pub struct RegisterAgentResponse {
    pub agent: LocalAgent,
    /// Surfaced exactly once, at registration time.
    pub api_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterSchemaRequest {
    pub id: SchemaIdentifier,
    pub definition: Value,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidatePayloadRequest {
    pub payload: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateSchemaRequest {
    pub definition: Value,
}
