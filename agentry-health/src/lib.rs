//! Liveness and readiness HTTP endpoints (spec §6: `GET /health`, `GET
//! /ready`), tracking the startup-ordered components from spec §9.
//!
//! ```rust,no_run
//! use agentry_health::{HealthChecker, HealthConfig, HealthServer};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HealthConfig::default();
//! let checker = Arc::new(HealthChecker::new(10000));
//! let server = HealthServer::new(config, checker).await?;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

mod checker;
mod config;
mod error;
mod server;

pub use checker::{HealthChecker, HealthStatus};
pub use config::HealthConfig;
pub use error::HealthError;
pub use server::HealthServer;
