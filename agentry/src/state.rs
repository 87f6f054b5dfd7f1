//! Shared application state threaded through the gateway's own `axum`
//! handlers (spec §6). The admin CRUD surface carries its own
//! `agentry_control::ControlState` instead — it's mounted as a separate
//! sub-router behind `require_admin_key`, not merged into this one.

use std::sync::Arc;

use agentry_common::Domain;
use agentry_core::MessageProcessor;
use agentry_discovery::CapabilityRecord;
use agentry_metrics::Metrics;
use agentry_registry::AgentRegistry;
use agentry_store::SharedStatusStore;

#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<MessageProcessor>,
    pub agents: Arc<AgentRegistry>,
    pub status_store: SharedStatusStore,
    pub local_domain: Domain,
    pub capability: Arc<CapabilityRecord>,
    pub metrics: Arc<Metrics>,
}
