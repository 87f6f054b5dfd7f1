//! JSON-Schema registry for AMTP payload validation (spec §4.2).

pub mod error;
pub mod registry;

pub use error::SchemaError;
pub use registry::{RegistryStats, Schema, SchemaRegistry, ValidationResult};
