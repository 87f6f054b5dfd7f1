//! Assembles the gateway's main `axum::Router`: the gateway's own
//! message/capability/inbox routes on [`AppState`], plus the admin
//! agent/schema CRUD surface from `agentry_control` nested under
//! `/v1/admin` and gated behind [`agentry_control::middleware::require_admin_key`].
//! Liveness/readiness are served separately by `agentry_health::HealthServer`
//! on its own listener, not mounted here.

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use agentry_control::{AdminAuth, ControlState, handlers as admin, middleware::require_admin_key};

use crate::{handlers, state::AppState};

#[must_use]
pub fn build_router(state: AppState, control_state: ControlState, admin_auth: Arc<AdminAuth>, metrics_enabled: bool) -> Router {
    let admin_router = Router::new()
        .route("/agents", post(admin::register_agent).get(admin::list_agents))
        .route("/agents/{address}", get(admin::get_agent).delete(admin::unregister_agent))
        .route("/schemas", post(admin::register_schema).get(admin::list_schemas))
        .route(
            "/schemas/{id}",
            get(admin::get_schema).put(admin::update_schema).delete(admin::delete_schema),
        )
        .route("/schemas/{id}/validate", post(admin::validate_schema))
        .route_layer(from_fn_with_state(admin_auth, require_admin_key))
        .with_state(control_state);

    let mut gateway_router = Router::new()
        .route("/v1/messages", post(handlers::accept_message))
        .route("/v1/messages/{id}", get(handlers::get_message))
        .route("/v1/messages/{id}/status", get(handlers::get_message_status))
        .route("/v1/capabilities/{domain}", get(handlers::get_capabilities))
        .route("/v1/inbox/{recipient}", get(handlers::get_inbox))
        .route("/v1/inbox/{recipient}/{message_id}", delete(handlers::ack_inbox_message));

    // `MetricsConfig::enabled` is this crate's contract for disabling
    // collection entirely (see `agentry-metrics`'s doc comment); the
    // counters themselves don't self-gate, so honoring "disabled" means
    // not mounting the route at all rather than serving an always-zero
    // snapshot.
    if metrics_enabled {
        gateway_router = gateway_router.route("/metrics", get(handlers::metrics_snapshot));
    }

    gateway_router
        .with_state(state)
        .nest("/v1/admin", admin_router)
        .layer(TraceLayer::new_for_http())
}
