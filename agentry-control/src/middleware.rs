//! Admin-key enforcement as an `axum` middleware layer, replacing the
//! teacher's per-connection socket credential check with a per-request HTTP
//! gate in front of the `/v1/admin/*` routes.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::auth::AdminAuth;

/// Rejects the request with a `401` carrying the same structured error body
/// shape as the rest of the gateway, before any admin handler runs.
pub async fn require_admin_key(
    State(auth): State<Arc<AdminAuth>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(auth.header_name())
        .and_then(|v| v.to_str().ok());

    match presented {
        Some(key) if auth.authenticate(key) => next.run(request).await,
        _ => unauthorized(auth.header_name()),
    }
}

fn unauthorized(header_name: &str) -> Response {
    let body = json!({
        "error": {
            "code": "UNAUTHORIZED",
            "message": format!("missing or invalid {header_name} header"),
        }
    });
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
