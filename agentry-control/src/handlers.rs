//! `axum` handlers for the admin agent and schema CRUD surface (spec §6),
//! mounted behind [`crate::middleware::require_admin_key`] by the binary's
//! router.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use agentry_common::{AgentAddress, Domain, SchemaIdentifier};
use agentry_registry::{AgentRegistry, NewAgent, RegistryError};
use agentry_schema::{SchemaError, SchemaRegistry};

use crate::dto::{
    RegisterAgentRequest, RegisterAgentResponse, RegisterSchemaRequest, UpdateSchemaRequest, ValidatePayloadRequest,
};

/// Shared state for every admin handler: the registries they mutate and the
/// gateway's own domain, needed to qualify bare agent addresses.
#[derive(Clone)]
pub struct ControlState {
    pub agents: Arc<AgentRegistry>,
    pub schemas: Arc<SchemaRegistry>,
    pub local_domain: Domain,
}

fn registry_error_response(err: &RegistryError) -> Response {
    let status = match err {
        RegistryError::AlreadyExists(_) => StatusCode::CONFLICT,
        RegistryError::NotFound(_) | RegistryError::MessageNotFound(_) => StatusCode::NOT_FOUND,
        RegistryError::Unauthorized => StatusCode::UNAUTHORIZED,
        RegistryError::InvalidAddress(_)
        | RegistryError::MissingPushTarget
        | RegistryError::UnexpectedPushTarget => StatusCode::BAD_REQUEST,
    };
    let body = json!({"error": {"code": err.code().to_string(), "message": err.to_string()}});
    (status, Json(body)).into_response()
}

fn schema_error_response(err: &SchemaError) -> Response {
    let status = match err {
        SchemaError::NotFound(_) => StatusCode::NOT_FOUND,
        SchemaError::AlreadyExists(_) => StatusCode::CONFLICT,
        SchemaError::InvalidIdentifier(_) | SchemaError::InvalidDefinition(_) => StatusCode::BAD_REQUEST,
    };
    let body = json!({"error": {"code": err.code().to_string(), "message": err.to_string()}});
    (status, Json(body)).into_response()
}

/// Qualifies a bare local part with the gateway's own domain; rejects any
/// address already qualified with a different domain.
fn qualify_local_address(raw: &str, local_domain: &Domain) -> Result<AgentAddress, Response> {
    let candidate = if raw.contains('@') {
        raw.to_string()
    } else {
        format!("{raw}@{local_domain}")
    };

    let address = AgentAddress::parse(&candidate).map_err(|e| {
        let body = json!({"error": {"code": "INVALID_REQUEST_FORMAT", "message": e.to_string()}});
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    })?;

    if address.domain() != local_domain {
        let body = json!({
            "error": {
                "code": "INVALID_REQUEST_FORMAT",
                "message": format!("agent address {address} is not on local domain {local_domain}")
            }
        });
        return Err((StatusCode::BAD_REQUEST, Json(body)).into_response());
    }

    Ok(address)
}

pub async fn register_agent(
    State(state): State<ControlState>,
    Json(request): Json<RegisterAgentRequest>,
) -> Response {
    let address = match qualify_local_address(&request.address, &state.local_domain) {
        Ok(address) => address,
        Err(response) => return response,
    };

    let new_agent = NewAgent {
        address,
        delivery_mode: request.delivery_mode,
        push_target: request.push_target,
        headers: request.headers,
        supported_schemas: request.supported_schemas,
        requires_schema: request.requires_schema,
    };

    match state.agents.register(new_agent) {
        Ok((agent, api_key)) => {
            (StatusCode::CREATED, Json(RegisterAgentResponse { agent, api_key })).into_response()
        }
        Err(e) => registry_error_response(&e),
    }
}

pub async fn list_agents(State(state): State<ControlState>) -> Response {
    Json(state.agents.list()).into_response()
}

pub async fn get_agent(State(state): State<ControlState>, Path(addr): Path<String>) -> Response {
    let Ok(address) = AgentAddress::parse(&addr) else {
        let body = json!({"error": {"code": "INVALID_REQUEST_FORMAT", "message": "malformed agent address"}});
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    };

    match state.agents.get(&address) {
        Some(agent) => Json(agent).into_response(),
        None => registry_error_response(&RegistryError::NotFound(addr)),
    }
}

pub async fn unregister_agent(State(state): State<ControlState>, Path(addr): Path<String>) -> Response {
    let Ok(address) = AgentAddress::parse(&addr) else {
        let body = json!({"error": {"code": "INVALID_REQUEST_FORMAT", "message": "malformed agent address"}});
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    };

    match state.agents.unregister(&address) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => registry_error_response(&e),
    }
}

pub async fn register_schema(
    State(state): State<ControlState>,
    Json(request): Json<RegisterSchemaRequest>,
) -> Response {
    match state.schemas.register(&request.id, request.definition, request.force) {
        Ok(schema) => (StatusCode::CREATED, Json(schema)).into_response(),
        Err(e) => schema_error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListSchemasQuery {
    pattern: Option<String>,
}

pub async fn list_schemas(State(state): State<ControlState>, Query(query): Query<ListSchemasQuery>) -> Response {
    let parsed = match query.pattern.map(|p| SchemaIdentifier::parse(&p)) {
        Some(Ok(id)) => Some(id),
        Some(Err(e)) => {
            let body = json!({"error": {"code": "INVALID_REQUEST_FORMAT", "message": e.to_string()}});
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
        None => None,
    };
    Json(state.schemas.list(parsed.as_ref())).into_response()
}

pub async fn get_schema(State(state): State<ControlState>, Path(id): Path<String>) -> Response {
    let Ok(schema_id) = SchemaIdentifier::parse(&id) else {
        let body = json!({"error": {"code": "INVALID_REQUEST_FORMAT", "message": "malformed schema identifier"}});
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    };

    match state.schemas.get(&schema_id) {
        Some(schema) => Json(schema).into_response(),
        None => schema_error_response(&SchemaError::NotFound(id)),
    }
}

pub async fn delete_schema(State(state): State<ControlState>, Path(id): Path<String>) -> Response {
    let Ok(schema_id) = SchemaIdentifier::parse(&id) else {
        let body = json!({"error": {"code": "INVALID_REQUEST_FORMAT", "message": "malformed schema identifier"}});
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    };

    match state.schemas.delete(&schema_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => schema_error_response(&e),
    }
}

/// Replaces an already-registered schema's definition in place (`PUT
/// /v1/admin/schemas/{id}`). Unlike `register_schema`, this always forces
/// the overwrite but 404s if nothing is registered for `id` yet — updating
/// is not an implicit create.
pub async fn update_schema(
    State(state): State<ControlState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateSchemaRequest>,
) -> Response {
    let Ok(schema_id) = SchemaIdentifier::parse(&id) else {
        let body = json!({"error": {"code": "INVALID_REQUEST_FORMAT", "message": "malformed schema identifier"}});
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    };

    if state.schemas.get(&schema_id).is_none() {
        return schema_error_response(&SchemaError::NotFound(id));
    }

    match state.schemas.register(&schema_id, request.definition, true) {
        Ok(schema) => Json(schema).into_response(),
        Err(e) => schema_error_response(&e),
    }
}

pub async fn validate_schema(
    State(state): State<ControlState>,
    Path(id): Path<String>,
    Json(request): Json<ValidatePayloadRequest>,
) -> Response {
    let Ok(schema_id) = SchemaIdentifier::parse(&id) else {
        let body = json!({"error": {"code": "INVALID_REQUEST_FORMAT", "message": "malformed schema identifier"}});
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    };

    match state.schemas.validate(&schema_id, &request.payload) {
        Ok(result) => Json(result).into_response(),
        Err(e) => schema_error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn state() -> ControlState {
        ControlState {
            agents: Arc::new(AgentRegistry::new()),
            schemas: Arc::new(SchemaRegistry::new()),
            local_domain: Domain::new("localhost"),
        }
    }

    #[tokio::test]
    async fn register_agent_qualifies_bare_address() {
        let state = state();
        let request = RegisterAgentRequest {
            address: "user".to_string(),
            delivery_mode: agentry_registry::DeliveryMode::Pull,
            push_target: None,
            headers: HashMap::new(),
            supported_schemas: Vec::new(),
            requires_schema: false,
        };

        let response = register_agent(State(state.clone()), Json(request)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(state.agents.get(&AgentAddress::parse("user@localhost").unwrap()).is_some());
    }

    #[tokio::test]
    async fn register_agent_rejects_foreign_domain() {
        let state = state();
        let request = RegisterAgentRequest {
            address: "user@elsewhere.test".to_string(),
            delivery_mode: agentry_registry::DeliveryMode::Pull,
            push_target: None,
            headers: HashMap::new(),
            supported_schemas: Vec::new(),
            requires_schema: false,
        };

        let response = register_agent(State(state), Json(request)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unregister_missing_agent_returns_not_found() {
        let state = state();
        let response = unregister_agent(State(state), Path("ghost@localhost".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_schema_requires_prior_registration() {
        let state = state();
        let request = UpdateSchemaRequest {
            definition: serde_json::json!({"type": "object"}),
        };
        let response = update_schema(State(state), Path("agntcy:commerce.order.v1".to_string()), Json(request)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_schema_overwrites_existing_definition() {
        let state = state();
        state
            .schemas
            .register(
                &SchemaIdentifier::parse("agntcy:commerce.order.v1").unwrap(),
                serde_json::json!({"type": "object"}),
                false,
            )
            .unwrap();

        let request = UpdateSchemaRequest {
            definition: serde_json::json!({"type": "object", "required": ["t"]}),
        };
        let response = update_schema(State(state.clone()), Path("agntcy:commerce.order.v1".to_string()), Json(request)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let schema = state
            .schemas
            .get(&SchemaIdentifier::parse("agntcy:commerce.order.v1").unwrap())
            .unwrap();
        assert_eq!(schema.definition["required"][0], "t");
    }
}
