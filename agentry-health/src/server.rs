//! Liveness/readiness HTTP server (spec §6: `GET /health`, `GET /ready`).

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

use agentry_common::Signal;

use crate::{HealthChecker, HealthConfig, HealthError};

pub struct HealthServer {
    listener: TcpListener,
    router: Router,
}

impl HealthServer {
    /// # Errors
    ///
    /// Returns [`HealthError::BindError`] if binding to `config.listen_address` fails.
    pub async fn new(config: HealthConfig, health_checker: Arc<HealthChecker>) -> Result<Self, HealthError> {
        let listener = TcpListener::bind(&config.listen_address)
            .await
            .map_err(|e| HealthError::BindError {
                address: config.listen_address.clone(),
                source: e,
            })?;

        tracing::info!(address = %config.listen_address, "health server bound");

        let router = Router::new()
            .route("/health", get(liveness_handler))
            .route("/ready", get(readiness_handler))
            .with_state(health_checker)
            .layer(TimeoutLayer::new(Duration::from_secs(1)));

        Ok(Self { listener, router })
    }

    /// # Errors
    ///
    /// Returns [`HealthError::ServerError`] if the server's runtime loop fails.
    pub async fn serve(self, mut shutdown: tokio::sync::broadcast::Receiver<Signal>) -> Result<(), HealthError> {
        tracing::info!("health server starting");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("health server received shutdown signal");
            })
            .await
            .map_err(|e| HealthError::ServerError(e.to_string()))?;

        tracing::info!("health server stopped");
        Ok(())
    }
}

async fn liveness_handler(State(health_checker): State<Arc<HealthChecker>>) -> Response {
    if health_checker.is_alive() {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response()
    }
}

async fn readiness_handler(State(health_checker): State<Arc<HealthChecker>>) -> Response {
    if health_checker.is_ready() {
        (StatusCode::OK, "OK").into_response()
    } else {
        let status = health_checker.get_status();
        tracing::warn!(
            discovery_ready = status.discovery_ready,
            schema_ready = status.schema_ready,
            registry_ready = status.registry_ready,
            delivery_ready = status.delivery_ready,
            queue_size = status.queue_size,
            max_queue_size = status.max_queue_size,
            "readiness probe failed"
        );
        (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn liveness_probe_always_passes() {
        let checker = Arc::new(HealthChecker::new(10000));
        let response = liveness_handler(State(checker)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_probe_fails_when_not_ready() {
        let checker = Arc::new(HealthChecker::new(10000));
        let response = readiness_handler(State(checker)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn readiness_probe_passes_when_all_ready() {
        let checker = Arc::new(HealthChecker::new(10000));
        checker.set_discovery_ready(true);
        checker.set_schema_ready(true);
        checker.set_registry_ready(true);
        checker.set_delivery_ready(true);
        checker.set_queue_size(100);

        let response = readiness_handler(State(checker)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_probe_fails_when_queue_too_large() {
        let checker = Arc::new(HealthChecker::new(1000));
        checker.set_discovery_ready(true);
        checker.set_schema_ready(true);
        checker.set_registry_ready(true);
        checker.set_delivery_ready(true);
        checker.set_queue_size(2000);

        let response = readiness_handler(State(checker)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
