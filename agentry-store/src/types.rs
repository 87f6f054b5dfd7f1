//! The per-recipient delivery state machine and the aggregate message status
//! it rolls up into (spec §4.7).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use agentry_common::{AgentAddress, AggregateStatus, ErrorCode};
use agentry_registry::DeliveryMode;

/// `pending -> queued -> delivering -> {delivered | failed | retrying -> delivering}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientState {
    Pending,
    Queued,
    Delivering,
    Delivered,
    Failed,
    Retrying,
}

impl RecipientState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition per the state machine.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Queued)
                | (Self::Queued, Self::Delivering)
                | (Self::Delivering, Self::Delivered | Self::Failed | Self::Retrying)
                | (Self::Retrying, Self::Delivering)
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipientStatus {
    pub recipient: AgentAddress,
    pub state: RecipientState,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_mode: Option<DeliveryMode>,
    pub inbox_delivered: bool,
    pub acknowledged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl RecipientStatus {
    #[must_use]
    pub fn pending(recipient: AgentAddress) -> Self {
        Self {
            recipient,
            state: RecipientState::Pending,
            attempts: 0,
            next_retry: None,
            error_code: None,
            error_message: None,
            delivery_mode: None,
            inbox_delivered: false,
            acknowledged: false,
            acknowledged_at: None,
        }
    }
}

/// A message's envelope metadata plus the per-recipient rows tracking its
/// delivery. The message body itself is not retained here; the status
/// store only tracks what the Processor needs for idempotency and status
/// queries.
#[derive(Debug, Clone, Serialize)]
pub struct MessageStatus {
    pub message_id: Uuid,
    pub sender: AgentAddress,
    pub created_at: DateTime<Utc>,
    pub recipients: HashMap<AgentAddress, RecipientStatus>,
}

impl MessageStatus {
    #[must_use]
    pub fn new(message_id: Uuid, sender: AgentAddress, recipients: &[AgentAddress]) -> Self {
        Self {
            message_id,
            sender,
            created_at: Utc::now(),
            recipients: recipients
                .iter()
                .cloned()
                .map(|r| (r.clone(), RecipientStatus::pending(r)))
                .collect(),
        }
    }

    /// Rolls per-recipient states up into one of the five aggregate states
    /// spec §3 defines for a message as a whole.
    #[must_use]
    pub fn aggregate(&self) -> AggregateStatus {
        if self.recipients.is_empty() {
            return AggregateStatus::Pending;
        }

        let total = self.recipients.len();
        let delivered = self
            .recipients
            .values()
            .filter(|r| r.state == RecipientState::Delivered)
            .count();
        let failed = self
            .recipients
            .values()
            .filter(|r| r.state == RecipientState::Failed)
            .count();

        if delivered == total {
            AggregateStatus::Delivered
        } else if failed == total {
            AggregateStatus::Failed
        } else if delivered + failed == total {
            AggregateStatus::Partial
        } else if delivered > 0 || failed > 0 {
            AggregateStatus::Partial
        } else if self
            .recipients
            .values()
            .any(|r| matches!(r.state, RecipientState::Queued | RecipientState::Delivering | RecipientState::Retrying))
        {
            AggregateStatus::Delivering
        } else {
            AggregateStatus::Pending
        }
    }
}
