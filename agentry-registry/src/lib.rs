//! Local agent registry: registration, API-key authentication, schema-based
//! routing, and per-agent pull inboxes (spec §4.3).

mod agent;
mod api_key;
mod error;
mod inbox;
mod registry;

pub use agent::{DeliveryMode, LocalAgent, NewAgent};
pub use error::RegistryError;
pub use registry::AgentRegistry;
