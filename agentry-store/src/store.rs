//! In-memory message status store (spec §4.7), grounded on the teacher's
//! `MemoryBackingStore` (`empath-spool/src/backends/memory.rs`): an
//! `Arc<RwLock<HashMap<..>>>` with the same lock-recovery idiom used
//! throughout this workspace rather than propagating `PoisonError`.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use agentry_common::{AgentAddress, ErrorCode};
use agentry_registry::DeliveryMode;

use crate::{
    error::StoreError,
    types::{MessageStatus, RecipientState, RecipientStatus},
};

/// The fields a delivery attempt updates on one recipient's status row.
#[derive(Debug, Clone)]
pub struct RecipientUpdate {
    pub state: RecipientState,
    pub attempts: u32,
    pub next_retry: Option<DateTime<Utc>>,
    pub error_code: Option<ErrorCode>,
    pub error_message: Option<String>,
    pub delivery_mode: Option<DeliveryMode>,
    pub inbox_delivered: bool,
}

#[derive(Default)]
pub struct StatusStore {
    messages: RwLock<HashMap<Uuid, MessageStatus>>,
}

impl StatusStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(HashMap::new()),
        }
    }

    /// Creates the message's status row and one `pending` recipient row per
    /// recipient. Called once per accepted message, before delivery starts.
    pub fn create_message(&self, message_id: Uuid, sender: AgentAddress, recipients: &[AgentAddress]) {
        let status = MessageStatus::new(message_id, sender, recipients);
        self.messages
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(message_id, status);
    }

    /// # Errors
    ///
    /// Returns [`StoreError::MessageNotFound`] if `message_id` has no status
    /// row.
    pub fn get_status(&self, message_id: Uuid) -> Result<MessageStatus, StoreError> {
        self.messages
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&message_id)
            .cloned()
            .ok_or(StoreError::MessageNotFound(message_id))
    }

    /// Recipients currently `retrying` whose `next_retry` has elapsed.
    #[must_use]
    pub fn list_pending_retries(&self, now: DateTime<Utc>) -> Vec<(Uuid, AgentAddress)> {
        self.messages
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .flat_map(|status| {
                status.recipients.values().filter_map(move |r| {
                    (r.state == RecipientState::Retrying && r.next_retry.is_some_and(|t| t <= now))
                        .then(|| (status.message_id, r.recipient.clone()))
                })
            })
            .collect()
    }

    /// Applies `update` to `recipient`'s row under `message_id`, validating
    /// the transition against [`RecipientState::can_transition_to`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MessageNotFound`], [`StoreError::RecipientNotFound`],
    /// or [`StoreError::InvalidTransition`].
    pub fn update_recipient_status(
        &self,
        message_id: Uuid,
        recipient: &AgentAddress,
        update: RecipientUpdate,
    ) -> Result<(), StoreError> {
        let mut messages = self
            .messages
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let status = messages
            .get_mut(&message_id)
            .ok_or(StoreError::MessageNotFound(message_id))?;
        let row = status
            .recipients
            .get_mut(recipient)
            .ok_or_else(|| StoreError::RecipientNotFound {
                message_id,
                recipient: recipient.clone(),
            })?;

        if !row.state.can_transition_to(update.state) {
            return Err(StoreError::InvalidTransition {
                from: format!("{:?}", row.state),
                to: format!("{:?}", update.state),
            });
        }

        debug!(%message_id, %recipient, from = ?row.state, to = ?update.state, "recipient status transition");
        row.state = update.state;
        row.attempts = update.attempts;
        row.next_retry = update.next_retry;
        row.error_code = update.error_code;
        row.error_message = update.error_message;
        if update.delivery_mode.is_some() {
            row.delivery_mode = update.delivery_mode;
        }
        row.inbox_delivered = update.inbox_delivered;

        Ok(())
    }

    /// Marks `recipient`'s row under `message_id` acknowledged, for
    /// `AckMessage`'s effect on pull-delivered inbox entries.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MessageNotFound`] or [`StoreError::RecipientNotFound`].
    pub fn acknowledge(&self, message_id: Uuid, recipient: &AgentAddress) -> Result<(), StoreError> {
        let mut messages = self
            .messages
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let status = messages
            .get_mut(&message_id)
            .ok_or(StoreError::MessageNotFound(message_id))?;
        let row = status
            .recipients
            .get_mut(recipient)
            .ok_or_else(|| StoreError::RecipientNotFound {
                message_id,
                recipient: recipient.clone(),
            })?;
        row.acknowledged = true;
        row.acknowledged_at = Some(Utc::now());
        Ok(())
    }
}

pub type SharedStatusStore = Arc<StatusStore>;

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> AgentAddress {
        AgentAddress::parse(s).unwrap()
    }

    #[test]
    fn create_then_get_status_round_trips() {
        let store = StatusStore::new();
        let id = Uuid::now_v7();
        store.create_message(id, addr("a@localhost"), &[addr("b@localhost")]);

        let status = store.get_status(id).unwrap();
        assert_eq!(status.recipients.len(), 1);
        assert_eq!(
            status.recipients[&addr("b@localhost")].state,
            RecipientState::Pending
        );
    }

    #[test]
    fn missing_message_returns_not_found() {
        let store = StatusStore::new();
        assert!(matches!(
            store.get_status(Uuid::now_v7()),
            Err(StoreError::MessageNotFound(_))
        ));
    }

    #[test]
    fn valid_transition_updates_row() {
        let store = StatusStore::new();
        let id = Uuid::now_v7();
        let recipient = addr("b@localhost");
        store.create_message(id, addr("a@localhost"), &[recipient.clone()]);

        store
            .update_recipient_status(
                id,
                &recipient,
                RecipientUpdate {
                    state: RecipientState::Queued,
                    attempts: 0,
                    next_retry: None,
                    error_code: None,
                    error_message: None,
                    delivery_mode: None,
                    inbox_delivered: false,
                },
            )
            .unwrap();

        assert_eq!(
            store.get_status(id).unwrap().recipients[&recipient].state,
            RecipientState::Queued
        );
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let store = StatusStore::new();
        let id = Uuid::now_v7();
        let recipient = addr("b@localhost");
        store.create_message(id, addr("a@localhost"), &[recipient.clone()]);

        let result = store.update_recipient_status(
            id,
            &recipient,
            RecipientUpdate {
                state: RecipientState::Delivered,
                attempts: 1,
                next_retry: None,
                error_code: None,
                error_message: None,
                delivery_mode: None,
                inbox_delivered: false,
            },
        );
        assert!(matches!(result, Err(StoreError::InvalidTransition { .. })));
    }

    #[test]
    fn list_pending_retries_filters_by_elapsed_next_retry() {
        let store = StatusStore::new();
        let id = Uuid::now_v7();
        let recipient = addr("b@localhost");
        store.create_message(id, addr("a@localhost"), &[recipient.clone()]);
        store
            .update_recipient_status(
                id,
                &recipient,
                RecipientUpdate {
                    state: RecipientState::Queued,
                    attempts: 0,
                    next_retry: None,
                    error_code: None,
                    error_message: None,
                    delivery_mode: None,
                    inbox_delivered: false,
                },
            )
            .unwrap();
        store
            .update_recipient_status(
                id,
                &recipient,
                RecipientUpdate {
                    state: RecipientState::Delivering,
                    attempts: 1,
                    next_retry: None,
                    error_code: None,
                    error_message: None,
                    delivery_mode: None,
                    inbox_delivered: false,
                },
            )
            .unwrap();

        let past = Utc::now() - chrono::Duration::seconds(5);
        store
            .update_recipient_status(
                id,
                &recipient,
                RecipientUpdate {
                    state: RecipientState::Retrying,
                    attempts: 1,
                    next_retry: Some(past),
                    error_code: Some(ErrorCode::Timeout),
                    error_message: Some("timed out".to_string()),
                    delivery_mode: None,
                    inbox_delivered: false,
                },
            )
            .unwrap();

        let due = store.list_pending_retries(Utc::now());
        assert_eq!(due, vec![(id, recipient)]);
    }
}
