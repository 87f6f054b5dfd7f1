//! Admin authentication and the agent/schema CRUD request surface (spec
//! §6): an `X-Admin-Key`-gated `axum` middleware plus the handlers it
//! protects, mounted by the binary's router under `/v1/admin`.

#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

pub use auth::{AdminAuth, AdminAuthConfig};
pub use error::ControlError;
pub use handlers::ControlState;
