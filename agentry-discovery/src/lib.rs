pub mod capability;
pub mod error;
pub mod resolver;

pub use capability::{CapabilityRecord, validate_gateway_url};
pub use error::DiscoveryError;
pub use resolver::{Discovery, DiscoveryConfig};
