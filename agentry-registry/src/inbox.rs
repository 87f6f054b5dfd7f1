//! Per-recipient FIFO inbox for pull delivery (spec §4.3).
//!
//! Grounded on the teacher's `MemoryBackingStore`
//! (`empath-spool/src/backends/memory.rs`): a `HashMap` behind a single
//! `RwLock`, generalized from one flat message store into one FIFO queue per
//! recipient, with `message_id`-based dedup on store and first-match removal
//! on ack.

use std::{
    collections::{HashMap, VecDeque},
    sync::RwLock,
};

use uuid::Uuid;

use agentry_common::Message;

use crate::error::RegistryError;

#[derive(Default)]
pub(crate) struct Inboxes {
    queues: RwLock<HashMap<String, VecDeque<Message>>>,
}

impl Inboxes {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores `message` in `recipient`'s inbox. Returns `false` without
    /// storing if a message with the same `message_id` is already queued.
    pub(crate) fn store(&self, recipient: &str, message: Message) -> bool {
        let mut queues = self
            .queues
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let queue = queues.entry(recipient.to_string()).or_default();

        if message.message_id.is_some()
            && queue.iter().any(|m| m.message_id == message.message_id)
        {
            return false;
        }

        queue.push_back(message);
        true
    }

    pub(crate) fn list(&self, recipient: &str) -> Vec<Message> {
        self.queues
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(recipient)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::MessageNotFound`] if no queued message in
    /// `recipient`'s inbox has `message_id`.
    pub(crate) fn ack(&self, recipient: &str, message_id: Uuid) -> Result<(), RegistryError> {
        let mut queues = self
            .queues
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let queue = queues
            .get_mut(recipient)
            .ok_or_else(|| RegistryError::MessageNotFound(message_id.to_string()))?;

        let position = queue
            .iter()
            .position(|m| m.message_id == Some(message_id))
            .ok_or_else(|| RegistryError::MessageNotFound(message_id.to_string()))?;

        queue.remove(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentry_common::AgentAddress;
    use serde_json::json;

    fn message(id: Uuid) -> Message {
        Message {
            version: "1.0".to_string(),
            message_id: Some(id),
            idempotency_key: None,
            timestamp: chrono::Utc::now(),
            sender: AgentAddress::parse("a@localhost").unwrap(),
            recipients: vec![AgentAddress::parse("b@localhost").unwrap()],
            subject: None,
            schema: None,
            payload: json!({}),
            coordination: None,
            headers: HashMap::new(),
            attachments: Vec::new(),
            signature: None,
            in_reply_to: None,
            response_type: None,
        }
    }

    #[test]
    fn store_then_list_then_ack_drains() {
        let inbox = Inboxes::new();
        let id = Uuid::now_v7();
        assert!(inbox.store("user@localhost", message(id)));

        let listed = inbox.list("user@localhost");
        assert_eq!(listed.len(), 1);

        inbox.ack("user@localhost", id).unwrap();
        assert!(inbox.list("user@localhost").is_empty());
    }

    #[test]
    fn duplicate_message_id_is_dropped() {
        let inbox = Inboxes::new();
        let id = Uuid::now_v7();
        assert!(inbox.store("user@localhost", message(id)));
        assert!(!inbox.store("user@localhost", message(id)));
        assert_eq!(inbox.list("user@localhost").len(), 1);
    }

    #[test]
    fn ack_unknown_message_id_errors() {
        let inbox = Inboxes::new();
        inbox.store("user@localhost", message(Uuid::now_v7()));
        let result = inbox.ack("user@localhost", Uuid::now_v7());
        assert!(matches!(result, Err(RegistryError::MessageNotFound(_))));
    }

    #[test]
    fn fifo_order_is_preserved() {
        let inbox = Inboxes::new();
        let first = Uuid::now_v7();
        let second = Uuid::now_v7();
        inbox.store("user@localhost", message(first));
        inbox.store("user@localhost", message(second));

        let listed = inbox.list("user@localhost");
        assert_eq!(listed[0].message_id, Some(first));
        assert_eq!(listed[1].message_id, Some(second));
    }
}
