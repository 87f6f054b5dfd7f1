//! The AMTP v1.0 gateway binary's own HTTP surface: configuration loading,
//! the structured error body, gateway-owned handlers, application state,
//! and router assembly. Startup/shutdown orchestration lives in `main.rs`;
//! the admin CLI lives in `bin/agentryctl.rs`.

#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
