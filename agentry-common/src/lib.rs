pub mod agent_address;
pub mod domain;
pub mod error;
pub mod message;
pub mod schema_id;

pub use agent_address::AgentAddress;
pub use domain::Domain;
pub use error::ErrorCode;
pub use message::{AggregateStatus, Message};
pub use schema_id::SchemaIdentifier;

/// Lifecycle signal shared across the binary's long-running tasks (delivery
/// processor, cache sweepers) for coordinated shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}
