//! Message/recipient status store and idempotency cache (spec §4.7): the
//! bookkeeping that lets the Message Processor answer "is this a retry?"
//! and "what's the status of message X?" without re-deriving either from
//! the delivery engine's in-flight state.

#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

mod error;
mod idempotency;
mod store;
mod types;

pub use error::StoreError;
pub use idempotency::{IdempotencyCache, SharedIdempotencyCache, DEFAULT_IDEMPOTENCY_TTL};
pub use store::{RecipientUpdate, SharedStatusStore, StatusStore};
pub use types::{MessageStatus, RecipientState, RecipientStatus};
