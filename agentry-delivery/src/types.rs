//! Shared result types returned from the delivery engine up to the message
//! processor (spec §4.5, §4.6).

use serde::Serialize;

use agentry_common::ErrorCode;
use agentry_registry::DeliveryMode;

/// The outcome of a single recipient's delivery, after retries (if any)
/// have been exhausted or a non-retryable failure was hit.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResult {
    pub outcome: Outcome,
    pub attempts: u32,
    pub delivery_mode: Option<DeliveryMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Delivered,
    Failed,
}

impl DeliveryResult {
    #[must_use]
    pub const fn delivered(attempts: u32, delivery_mode: DeliveryMode) -> Self {
        Self {
            outcome: Outcome::Delivered,
            attempts,
            delivery_mode: Some(delivery_mode),
            error_code: None,
            error_message: None,
        }
    }

    /// A successful remote gateway delivery. Unlike [`Self::delivered`],
    /// there is no local push/pull mode to record — the recipient lives on
    /// another gateway entirely.
    #[must_use]
    pub const fn remote_delivered(attempts: u32) -> Self {
        Self {
            outcome: Outcome::Delivered,
            attempts,
            delivery_mode: None,
            error_code: None,
            error_message: None,
        }
    }

    #[must_use]
    pub fn failed(
        attempts: u32,
        delivery_mode: Option<DeliveryMode>,
        error_code: ErrorCode,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            outcome: Outcome::Failed,
            attempts,
            delivery_mode,
            error_code: Some(error_code),
            error_message: Some(error_message.into()),
        }
    }
}
