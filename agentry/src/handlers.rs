//! The gateway's own HTTP handlers (spec §6): message ingress, envelope and
//! status lookup, this gateway's own capability record, and the
//! agent-facing pull inbox. Agent/schema CRUD lives in `agentry-control`;
//! liveness/readiness live in `agentry-health` on their own listener.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use agentry_common::{AgentAddress, AggregateStatus, ErrorCode, Message};

use crate::{error::ApiError, state::AppState};

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

#[derive(Debug, Serialize)]
pub struct AcceptResponse {
    pub message_id: Uuid,
    pub status: AggregateStatus,
    pub duplicate: bool,
}

/// `POST /v1/messages`.
pub async fn accept_message(State(state): State<AppState>, Json(message): Json<Message>) -> Result<Response, ApiError> {
    let outcome = state.processor.accept(message).await?;
    let status = if outcome.duplicate { StatusCode::OK } else { StatusCode::ACCEPTED };
    Ok((
        status,
        Json(AcceptResponse {
            message_id: outcome.message_id,
            status: outcome.status,
            duplicate: outcome.duplicate,
        }),
    )
        .into_response())
}

/// `GET /v1/messages/{id}`.
pub async fn get_message(State(state): State<AppState>, Path(message_id): Path<Uuid>) -> Result<Response, ApiError> {
    state.processor.envelope(message_id).map(|message| Json(message).into_response()).ok_or_else(|| {
        ApiError::new(ErrorCode::MessageNotFound, format!("no message with id {message_id}"))
    })
}

/// `GET /v1/messages/{id}/status`.
pub async fn get_message_status(State(state): State<AppState>, Path(message_id): Path<Uuid>) -> Result<Response, ApiError> {
    let status = state.processor.status(message_id)?;
    Ok(Json(status).into_response())
}

/// `GET /v1/capabilities/{domain}`: this gateway only ever answers for its
/// own `local_domain`; a request for any other domain means the caller
/// should have resolved that peer's own `_amtp` TXT record instead.
pub async fn get_capabilities(State(state): State<AppState>, Path(domain): Path<String>) -> Result<Response, ApiError> {
    if domain != state.local_domain.as_str() {
        return Err(ApiError::new(
            ErrorCode::DiscoveryFailed,
            format!("{domain} is not served by this gateway"),
        ));
    }
    Ok(Json(json!({"record": state.capability.to_txt_record()})).into_response())
}

/// `GET /v1/inbox/{recipient}`, authenticated with the agent's own API key
/// as a bearer token.
pub async fn get_inbox(
    State(state): State<AppState>,
    Path(recipient): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let address = AgentAddress::parse(&recipient)
        .map_err(|e| ApiError::new(ErrorCode::InvalidRecipient, e.to_string()))?;
    let Some(presented) = bearer_token(&headers) else {
        return Err(ApiError::new(ErrorCode::Unauthorized, "missing bearer token"));
    };
    let messages = state.agents.get_inbox(&address, presented)?;
    Ok(Json(messages).into_response())
}

/// `DELETE /v1/inbox/{recipient}/{message_id}`: acknowledges and removes one
/// queued message from a pull agent's inbox, also marking the recipient's
/// status row acknowledged.
pub async fn ack_inbox_message(
    State(state): State<AppState>,
    Path((recipient, message_id)): Path<(String, Uuid)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let address = AgentAddress::parse(&recipient)
        .map_err(|e| ApiError::new(ErrorCode::InvalidRecipient, e.to_string()))?;
    let Some(presented) = bearer_token(&headers) else {
        return Err(ApiError::new(ErrorCode::Unauthorized, "missing bearer token"));
    };
    state.agents.ack_message(&address, presented, message_id)?;
    state.status_store.acknowledge(message_id, &address)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// `GET /metrics`: a flat JSON snapshot of in-process delivery/discovery
/// counters (spec §6). Disabled deployments still expose the route; the
/// snapshot's counters simply never increment (`Metrics::is_enabled`).
pub async fn metrics_snapshot(State(state): State<AppState>) -> Response {
    Json(state.metrics.snapshot()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentry_core::{MessageProcessor, ProcessorConfig};
    use agentry_delivery::{DeliveryEngine, EngineConfig};
    use agentry_discovery::{CapabilityRecord, Discovery, DiscoveryConfig};
    use agentry_metrics::MetricsConfig;
    use agentry_registry::AgentRegistry;
    use agentry_schema::SchemaRegistry;
    use agentry_store::{IdempotencyCache, StatusStore};
    use std::{collections::HashMap, sync::Arc};
    use tokio_util::sync::CancellationToken;

    fn state() -> AppState {
        let discovery = Arc::new(Discovery::new(DiscoveryConfig::default()).unwrap());
        let registry = Arc::new(AgentRegistry::new());
        let status_store = Arc::new(StatusStore::new());
        let delivery = Arc::new(
            DeliveryEngine::new(EngineConfig::default(), discovery, Arc::clone(&registry))
                .unwrap()
                .with_status_store(Arc::clone(&status_store)),
        );
        let processor = Arc::new(MessageProcessor::new(
            ProcessorConfig::default(),
            Arc::new(SchemaRegistry::new()),
            Arc::clone(&status_store),
            Arc::new(IdempotencyCache::new()),
            delivery,
            CancellationToken::new(),
        ));

        AppState {
            processor,
            agents: registry,
            status_store,
            local_domain: agentry_common::Domain::new("localhost"),
            capability: Arc::new(CapabilityRecord {
                version: "amtp1".to_string(),
                gateway: "https://localhost".to_string(),
                max_size: 10 * 1024 * 1024,
                schemas: Vec::new(),
                auth: vec!["bearer".to_string()],
            }),
            metrics: Arc::new(agentry_metrics::Metrics::new(&MetricsConfig::default())),
        }
    }

    fn sample_message() -> Message {
        Message {
            version: "1.0".to_string(),
            message_id: None,
            idempotency_key: None,
            timestamp: chrono::Utc::now(),
            sender: AgentAddress::parse("a@localhost").unwrap(),
            recipients: vec![AgentAddress::parse("b@localhost").unwrap()],
            subject: None,
            schema: None,
            payload: serde_json::json!({"t": "hi"}),
            coordination: None,
            headers: HashMap::new(),
            attachments: Vec::new(),
            signature: None,
            in_reply_to: None,
            response_type: None,
        }
    }

    #[tokio::test]
    async fn accept_then_fetch_envelope_and_status() {
        let state = state();
        let response = accept_message(State(state.clone()), Json(sample_message())).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let outcome = state.processor.accept(sample_message()).await.unwrap();

        let envelope_response = get_message(State(state.clone()), Path(outcome.message_id)).await.unwrap();
        assert_eq!(envelope_response.status(), StatusCode::OK);

        let status_response = get_message_status(State(state), Path(outcome.message_id)).await.unwrap();
        assert_eq!(status_response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_message_rejects_unknown_id() {
        let state = state();
        let result = get_message(State(state), Path(Uuid::now_v7())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn get_capabilities_rejects_foreign_domain() {
        let state = state();
        let result = get_capabilities(State(state), Path("elsewhere.test".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn get_capabilities_returns_local_record() {
        let state = state();
        let response = get_capabilities(State(state), Path("localhost".to_string())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_inbox_requires_bearer_token() {
        let state = state();
        let result = get_inbox(State(state), Path("user@localhost".to_string()), HeaderMap::new()).await;
        assert!(result.is_err());
    }
}
