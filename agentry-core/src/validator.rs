//! Structural and schema validation (spec §4.4).
//!
//! `agent@domain` and schema-identifier shape are already enforced when a
//! wire envelope deserializes into [`agentry_common::Message`] (both types
//! parse-on-deserialize and reject malformed strings), so this module
//! covers what deserialization can't: version, non-empty recipients,
//! message size, timestamp skew, and payload-against-schema validation.

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use agentry_common::Message;
use agentry_common::message::AMTP_VERSION;
use agentry_schema::SchemaRegistry;

use crate::error::ValidationFailure;

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Spec §4.4: "total serialized size ≤ `max_size` (default 10 MiB)".
    pub max_size_bytes: usize,
    /// Spec §4.4: "timestamp within ±24 h of now (configurable skew
    /// tolerance)".
    pub max_clock_skew: chrono::Duration,
    /// Whether `schema`-addressed payloads are checked against the schema
    /// registry. Disabling this still enforces every other structural rule.
    pub schema_validation_enabled: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 10 * 1024 * 1024,
            max_clock_skew: ChronoDuration::hours(24),
            schema_validation_enabled: true,
        }
    }
}

pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    #[must_use]
    pub const fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Structural rules that don't require the schema registry: `version`,
    /// non-empty recipients, size, and timestamp skew.
    #[must_use]
    pub fn validate_structure(&self, message: &Message) -> Vec<ValidationFailure> {
        self.validate_structure_at(message, Utc::now())
    }

    /// As [`Self::validate_structure`], but against a caller-supplied `now`
    /// so skew checks are testable without wall-clock sleeps.
    #[must_use]
    pub fn validate_structure_at(&self, message: &Message, now: DateTime<Utc>) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();

        if message.version != AMTP_VERSION {
            failures.push(ValidationFailure::on_field(
                "version",
                format!("unsupported AMTP major version {:?}, expected {AMTP_VERSION:?}", message.version),
            ));
        }

        if message.recipients.is_empty() {
            failures.push(ValidationFailure::on_field("recipients", "at least one recipient is required"));
        }

        let size = message.wire_size();
        if size > self.config.max_size_bytes {
            failures.push(ValidationFailure::on_field(
                "payload",
                format!("message is {size} bytes, exceeding the {} byte limit", self.config.max_size_bytes),
            ));
        }

        let skew = (message.timestamp - now).abs();
        if skew > self.config.max_clock_skew {
            failures.push(ValidationFailure::on_field(
                "timestamp",
                format!("timestamp is {skew} away from now, exceeding the configured skew tolerance"),
            ));
        }

        failures
    }

    /// Validates `message.payload` against its declared `schema`, if any.
    /// A message with no `schema` set, or with schema validation disabled,
    /// produces no failures here.
    #[must_use]
    pub fn validate_schema(&self, message: &Message, registry: &SchemaRegistry) -> Vec<ValidationFailure> {
        if !self.config.schema_validation_enabled {
            return Vec::new();
        }

        let Some(raw_schema) = &message.schema else {
            return Vec::new();
        };

        let schema_id = match agentry_common::SchemaIdentifier::parse(raw_schema) {
            Ok(id) => id,
            Err(e) => return vec![ValidationFailure::on_field("schema", e.to_string())],
        };

        match registry.validate(&schema_id, &message.payload) {
            Ok(result) if result.valid => Vec::new(),
            Ok(result) => result
                .errors
                .into_iter()
                .map(|e| ValidationFailure::on_field("payload", e))
                .collect(),
            Err(e) => vec![ValidationFailure::on_field("schema", e.to_string())],
        }
    }

    /// Runs every structural and (if applicable) schema check and returns
    /// the combined list of failures.
    #[must_use]
    pub fn validate(&self, message: &Message, registry: &SchemaRegistry) -> Vec<ValidationFailure> {
        let mut failures = self.validate_structure(message);
        failures.extend(self.validate_schema(message, registry));
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentry_common::AgentAddress;
    use std::collections::HashMap;

    fn message(recipients: Vec<&str>) -> Message {
        Message {
            version: AMTP_VERSION.to_string(),
            message_id: None,
            idempotency_key: None,
            timestamp: Utc::now(),
            sender: AgentAddress::parse("a@localhost").unwrap(),
            recipients: recipients.into_iter().map(|r| AgentAddress::parse(r).unwrap()).collect(),
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
    fn valid_message_has_no_failures() {
        let validator = Validator::new(ValidatorConfig::default());
        assert!(validator.validate_structure(&message(vec!["b@localhost"])).is_empty());
    }

    #[test]
    fn empty_recipients_is_rejected() {
        let validator = Validator::new(ValidatorConfig::default());
        let failures = validator.validate_structure(&message(vec![]));
        assert!(failures.iter().any(|f| f.field.as_deref() == Some("recipients")));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let validator = Validator::new(ValidatorConfig::default());
        let mut msg = message(vec!["b@localhost"]);
        msg.version = "2.0".to_string();
        let failures = validator.validate_structure(&msg);
        assert!(failures.iter().any(|f| f.field.as_deref() == Some("version")));
    }

    #[test]
    fn oversize_message_is_rejected() {
        let config = ValidatorConfig {
            max_size_bytes: 10,
            ..ValidatorConfig::default()
        };
        let validator = Validator::new(config);
        let failures = validator.validate_structure(&message(vec!["b@localhost"]));
        assert!(failures.iter().any(|f| f.field.as_deref() == Some("payload")));
    }

    #[test]
    fn timestamp_outside_skew_is_rejected() {
        let validator = Validator::new(ValidatorConfig::default());
        let mut msg = message(vec!["b@localhost"]);
        msg.timestamp = Utc::now() - ChronoDuration::hours(48);
        let failures = validator.validate_structure(&msg);
        assert!(failures.iter().any(|f| f.field.as_deref() == Some("timestamp")));
    }

    #[test]
    fn schema_validation_is_skipped_when_no_schema_set() {
        let validator = Validator::new(ValidatorConfig::default());
        let registry = SchemaRegistry::new();
        let msg = message(vec!["b@localhost"]);
        assert!(validator.validate_schema(&msg, &registry).is_empty());
    }

    #[test]
    fn schema_validation_reports_registry_miss() {
        let validator = Validator::new(ValidatorConfig::default());
        let registry = SchemaRegistry::new();
        let mut msg = message(vec!["b@localhost"]);
        msg.schema = Some("agntcy:commerce.order.v1".to_string());
        let failures = validator.validate_schema(&msg, &registry);
        assert!(!failures.is_empty());
    }
}
