//! The Validator (spec §4.4) and Message Processor (spec §4.6): the two
//! components that sit between the HTTP ingress layer and the Delivery
//! Engine, wiring validation, idempotency, and status bookkeeping around
//! each accepted message.

#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

mod error;
mod processor;
mod validator;

pub use error::{ProcessorError, ValidationFailure};
pub use processor::{AcceptOutcome, MessageProcessor, ProcessorConfig};
pub use validator::{Validator, ValidatorConfig};
