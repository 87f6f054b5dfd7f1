//! The AMTP message envelope: the wire format exchanged between gateways and
//! between a gateway and its local agents.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::agent_address::AgentAddress;

/// The AMTP major version this build speaks. Messages declaring any other
/// major are rejected at structural validation (spec §9 open question).
pub const AMTP_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// An inbound or outbound message, immutable once accepted by the Message
/// Processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<Uuid>,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    pub sender: AgentAddress,
    pub recipients: Vec<AgentAddress>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    pub payload: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordination: Option<Value>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,
}

impl Message {
    /// Serialized size in bytes, as compared against `max_size` during
    /// structural validation.
    ///
    /// # Panics
    ///
    /// Never: `Message` always serializes to valid JSON.
    #[must_use]
    pub fn wire_size(&self) -> usize {
        serde_json::to_vec(self)
            .map(|v| v.len())
            .unwrap_or_default()
    }
}

/// The aggregate status of a message across all of its recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateStatus {
    Pending,
    Delivering,
    Delivered,
    Partial,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Message {
        Message {
            version: AMTP_VERSION.to_string(),
            message_id: Some(Uuid::now_v7()),
            idempotency_key: None,
            timestamp: Utc::now(),
            sender: AgentAddress::parse("a@localhost").unwrap(),
            recipients: vec![AgentAddress::parse("user@localhost").unwrap()],
            subject: None,
            schema: None,
            payload: serde_json::json!({"t": "hi"}),
            coordination: None,
            headers: HashMap::new(),
            attachments: Vec::new(),
            signature: None,
            in_reply_to: None,
            response_type: None,
        }
    }

    #[test]
    fn round_trips_through_json() {
        let msg = sample();
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sender, msg.sender);
        assert_eq!(back.recipients, msg.recipients);
        assert_eq!(back.payload, msg.payload);
    }

    #[test]
    fn wire_size_is_nonzero() {
        assert!(sample().wire_size() > 0);
    }

    #[test]
    fn optional_fields_omitted_when_absent() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(!json.contains("\"subject\""));
        assert!(!json.contains("\"coordination\""));
    }
}
