//! The AMTP v1.0 gateway process: loads configuration, builds the
//! component graph in the startup order spec §9 names (discovery cache,
//! schema registry, agent registry, delivery engine, processor), serves the
//! gateway's own HTTP surface plus a separate health listener, and on
//! shutdown drains in reverse, cancelling in-flight deliveries with a
//! bounded grace period.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use agentry::{config::GatewayConfig, router::build_router, state::AppState};
use agentry_common::{Domain, Signal};
use agentry_control::{AdminAuth, ControlState};
use agentry_core::MessageProcessor;
use agentry_delivery::DeliveryEngine;
use agentry_discovery::Discovery;
use agentry_health::{HealthChecker, HealthServer};
use agentry_metrics::Metrics;
use agentry_registry::AgentRegistry;
use agentry_schema::SchemaRegistry;
use agentry_store::{IdempotencyCache, StatusStore};

#[derive(Debug, Parser)]
#[command(name = "agentry", about = "AMTP v1.0 federated agent-to-agent messaging gateway")]
struct Cli {
    /// Path to the gateway's YAML configuration file.
    #[arg(short, long, default_value = "agentry.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = GatewayConfig::load(&cli.config).context("failed to load gateway configuration")?;
    run(config).await
}

async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let local_domain = Domain::new(&config.local_domain);
    let capability =
        Arc::new(config.capability.clone().into_capability_record().context("invalid capability configuration")?);
    let metrics = Arc::new(Metrics::new(&config.metrics));
    let health = Arc::new(HealthChecker::new(config.health.max_queue_size));

    // Startup order per spec §9: discovery cache, schema registry, agent
    // registry, delivery engine, processor.
    let discovery = Arc::new(
        Discovery::new(config.discovery.clone().into_discovery_config())
            .context("failed to build discovery resolver")?
            .with_metrics(Arc::clone(&metrics.discovery)),
    );
    health.set_discovery_ready(true);

    let schemas = Arc::new(SchemaRegistry::new());
    health.set_schema_ready(true);

    let agents = Arc::new(AgentRegistry::new());
    health.set_registry_ready(true);

    let status_store = Arc::new(StatusStore::new());
    let idempotency = Arc::new(IdempotencyCache::new());

    let engine_config = config.delivery.clone().into_engine_config(local_domain.clone());
    let delivery = Arc::new(
        DeliveryEngine::new(engine_config, Arc::clone(&discovery), Arc::clone(&agents))
            .context("failed to build delivery engine")?
            .with_metrics(Arc::clone(&metrics.delivery))
            .with_status_store(Arc::clone(&status_store)),
    );
    health.set_delivery_ready(true);

    let shutdown = CancellationToken::new();

    let processor_config = config.validator.clone().into_processor_config(config.idempotency_ttl_secs);
    let processor = Arc::new(MessageProcessor::new(
        processor_config,
        Arc::clone(&schemas),
        Arc::clone(&status_store),
        Arc::clone(&idempotency),
        Arc::clone(&delivery),
        shutdown.clone(),
    ));

    let admin_auth = Arc::new(AdminAuth::load(&config.admin.clone().into_auth_config()).context("failed to load admin keys")?);
    let control_state = ControlState {
        agents: Arc::clone(&agents),
        schemas: Arc::clone(&schemas),
        local_domain: local_domain.clone(),
    };

    let app_state = AppState {
        processor: Arc::clone(&processor),
        agents: Arc::clone(&agents),
        status_store: Arc::clone(&status_store),
        local_domain: local_domain.clone(),
        capability,
        metrics: Arc::clone(&metrics),
    };

    let router = build_router(app_state, control_state, admin_auth, metrics.is_enabled());

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<Signal>(1);

    let sweep_interval = Duration::from_secs(config.idempotency_sweep_interval_secs);
    let sweeper = tokio::spawn(MessageProcessor::run_idempotency_sweeper(
        Arc::clone(&idempotency),
        sweep_interval,
        shutdown.clone(),
    ));

    let queue_watcher = {
        let status_store = Arc::clone(&status_store);
        let health = Arc::clone(&health);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(Duration::from_secs(5)) => {
                        let pending = status_store.list_pending_retries(chrono::Utc::now()).len() as u64;
                        health.set_queue_size(pending);
                    }
                }
            }
        })
    };

    let health_server = if config.health.enabled {
        Some(HealthServer::new(config.health.clone(), Arc::clone(&health)).await.context("failed to start health server")?)
    } else {
        None
    };
    let health_shutdown_rx = shutdown_tx.subscribe();
    let health_task = health_server.map(|server| tokio::spawn(server.serve(health_shutdown_rx)));

    let listener = tokio::net::TcpListener::bind(&config.listen_address)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_address))?;
    tracing::info!(address = %config.listen_address, domain = %local_domain, "agentry gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server error")?;

    // Reverse-order drain: stop accepting new work, cancel in-flight
    // deliveries with a bounded grace period, then tear down the
    // background sweepers and health listener.
    tracing::info!("gateway shutting down, draining in-flight deliveries");
    let _ = shutdown_tx.send(Signal::Shutdown);
    shutdown.cancel();

    let grace = Duration::from_secs(config.shutdown_grace_secs);
    if tokio::time::timeout(grace, async {
        let _ = sweeper.await;
        let _ = queue_watcher.await;
    })
    .await
    .is_err()
    {
        tracing::warn!(grace_secs = config.shutdown_grace_secs, "shutdown grace period elapsed before background tasks drained");
    }

    if let Some(task) = health_task {
        let _ = tokio::time::timeout(grace, task).await;
    }

    tracing::info!("agentry gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
