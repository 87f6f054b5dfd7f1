//! The Message Processor (spec §4.6): orchestrates
//! validate → persist-status → fan-out → update-status, and is the single
//! point where idempotency is enforced.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use agentry_common::{AggregateStatus, ErrorCode, Message};
use agentry_delivery::DeliveryEngine;
use agentry_schema::SchemaRegistry;
use agentry_store::{RecipientUpdate, SharedIdempotencyCache, SharedStatusStore};

use crate::{
    error::ProcessorError,
    validator::{Validator, ValidatorConfig},
};

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub validator: ValidatorConfig,
    pub idempotency_ttl: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            validator: ValidatorConfig::default(),
            idempotency_ttl: agentry_store::DEFAULT_IDEMPOTENCY_TTL,
        }
    }
}

/// The result of [`MessageProcessor::accept`]: an accepted message's id and
/// its status at acceptance time. A duplicate submission within the
/// idempotency TTL window returns the original message's current
/// (possibly already-terminal) aggregate status instead of re-queuing a
/// fresh delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptOutcome {
    pub message_id: Uuid,
    pub status: AggregateStatus,
    pub duplicate: bool,
}

pub struct MessageProcessor {
    config: ProcessorConfig,
    schema_registry: Arc<SchemaRegistry>,
    store: SharedStatusStore,
    idempotency: SharedIdempotencyCache,
    delivery: Arc<DeliveryEngine>,
    validator: Validator,
    shutdown: CancellationToken,
    /// Envelopes of accepted messages, keyed by `message_id`, so `GET
    /// /v1/messages/{id}` can return the submitted envelope. The status
    /// store only tracks delivery state, not the message body.
    envelopes: RwLock<HashMap<Uuid, Message>>,
}

impl MessageProcessor {
    #[must_use]
    pub fn new(
        config: ProcessorConfig,
        schema_registry: Arc<SchemaRegistry>,
        store: SharedStatusStore,
        idempotency: SharedIdempotencyCache,
        delivery: Arc<DeliveryEngine>,
        shutdown: CancellationToken,
    ) -> Self {
        let validator = Validator::new(config.validator.clone());
        Self {
            config,
            schema_registry,
            store,
            idempotency,
            delivery,
            validator,
            shutdown,
            envelopes: RwLock::new(HashMap::new()),
        }
    }

    /// Accepts `message`, running it through validation and idempotency
    /// before fanning delivery out to every recipient in the background.
    /// Returns as soon as the message is durably queued — per spec §7, the
    /// HTTP response reflects acceptance, not final delivery outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::Validation`] if structural or schema
    /// validation fails; no status row is created and no delivery is
    /// attempted in that case.
    pub async fn accept(&self, mut message: Message) -> Result<AcceptOutcome, ProcessorError> {
        // Step 1: assign identifiers if absent.
        let message_id = message.message_id.unwrap_or_else(Uuid::now_v7);
        message.message_id = Some(message_id);
        let idempotency_key = message.idempotency_key.unwrap_or(message_id);
        message.idempotency_key = Some(idempotency_key);

        // Step 2: idempotency check, ahead of validation — a duplicate of
        // an already-accepted (even if it failed validation) submission is
        // not revalidated.
        if let Some(existing_id) = self
            .idempotency
            .check_and_insert(idempotency_key, message_id, self.config.idempotency_ttl)
        {
            let status = self
                .store
                .get_status(existing_id)
                .map_or(AggregateStatus::Pending, |s| s.aggregate());
            debug!(%idempotency_key, %existing_id, "duplicate submission within idempotency TTL");
            return Ok(AcceptOutcome {
                message_id: existing_id,
                status,
                duplicate: true,
            });
        }

        // Step 3: validate.
        let failures = self.validator.validate(&message, &self.schema_registry);
        if !failures.is_empty() {
            return Err(ProcessorError::Validation(failures));
        }

        // Step 4 + 5: initial per-recipient status rows; the idempotency
        // entry was already recorded by `check_and_insert` above.
        self.store.create_message(message_id, message.sender.clone(), &message.recipients);
        self.envelopes
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(message_id, message.clone());

        // Step 6: fan out to the delivery engine. Each recipient transitions
        // pending -> queued -> delivering before the engine's own
        // retry/backoff loop runs; the engine reports only the terminal
        // outcome, so the Processor maps that straight onto delivered/failed.
        for recipient in &message.recipients {
            self.transition(message_id, recipient, agentry_store::RecipientState::Queued, 0, None);
            self.transition(message_id, recipient, agentry_store::RecipientState::Delivering, 0, None);
        }

        let delivery = Arc::clone(&self.delivery);
        let store = Arc::clone(&self.store);
        let cancel = self.shutdown.child_token();
        let fan_out_message = message.clone();

        tokio::spawn(async move {
            let recipients = fan_out_message.recipients.clone();
            let results = delivery.deliver_batch(&cancel, message_id, &fan_out_message, &recipients).await;

            for (recipient, result) in results {
                let state = match result.outcome {
                    agentry_delivery::Outcome::Delivered => agentry_store::RecipientState::Delivered,
                    agentry_delivery::Outcome::Failed => agentry_store::RecipientState::Failed,
                };
                let inbox_delivered = result.outcome == agentry_delivery::Outcome::Delivered;
                let update = RecipientUpdate {
                    state,
                    attempts: result.attempts,
                    next_retry: None,
                    error_code: result.error_code,
                    error_message: result.error_message,
                    delivery_mode: result.delivery_mode,
                    inbox_delivered,
                };
                if let Err(e) = store.update_recipient_status(message_id, &recipient, update) {
                    warn!(%message_id, %recipient, error = %e, "failed to persist delivery result");
                }
            }
        });

        Ok(AcceptOutcome {
            message_id,
            status: AggregateStatus::Pending,
            duplicate: false,
        })
    }

    fn transition(
        &self,
        message_id: Uuid,
        recipient: &agentry_common::AgentAddress,
        state: agentry_store::RecipientState,
        attempts: u32,
        error_code: Option<ErrorCode>,
    ) {
        let update = RecipientUpdate {
            state,
            attempts,
            next_retry: None,
            error_code,
            error_message: None,
            delivery_mode: None,
            inbox_delivered: false,
        };
        if let Err(e) = self.store.update_recipient_status(message_id, recipient, update) {
            warn!(%message_id, %recipient, error = %e, "status transition rejected");
        }
    }

    /// Looks up a message's current aggregate and per-recipient status.
    ///
    /// # Errors
    ///
    /// Returns a store error if `message_id` is unknown.
    pub fn status(&self, message_id: Uuid) -> Result<agentry_store::MessageStatus, agentry_store::StoreError> {
        self.store.get_status(message_id)
    }

    /// Looks up the envelope of a previously accepted message.
    #[must_use]
    pub fn envelope(&self, message_id: Uuid) -> Option<Message> {
        self.envelopes
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&message_id)
            .cloned()
    }

    /// Runs the idempotency cache's eviction sweep on `interval` until
    /// `shutdown` fires. Intended to be spawned once at startup (spec §5:
    /// "eviction runs on a single background sweeper").
    pub async fn run_idempotency_sweeper(idempotency: SharedIdempotencyCache, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = idempotency.sweep_expired(chrono::Utc::now());
                    if removed > 0 {
                        info!(removed, "swept expired idempotency entries");
                    }
                }
                () = shutdown.cancelled() => {
                    debug!("idempotency sweeper shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentry_delivery::EngineConfig;
    use agentry_discovery::{Discovery, DiscoveryConfig};
    use agentry_registry::AgentRegistry;
    use std::collections::HashMap;

    fn processor() -> MessageProcessor {
        let discovery = Arc::new(Discovery::new(DiscoveryConfig::default()).unwrap());
        let registry = Arc::new(AgentRegistry::new());
        let store = Arc::new(agentry_store::StatusStore::new());
        let delivery = Arc::new(
            DeliveryEngine::new(EngineConfig::default(), discovery, registry)
                .unwrap()
                .with_status_store(Arc::clone(&store)),
        );
        MessageProcessor::new(
            ProcessorConfig::default(),
            Arc::new(SchemaRegistry::new()),
            store,
            Arc::new(agentry_store::IdempotencyCache::new()),
            delivery,
            CancellationToken::new(),
        )
    }

    fn sample_message(recipient: &str) -> Message {
        Message {
            version: "1.0".to_string(),
            message_id: None,
            idempotency_key: None,
            timestamp: chrono::Utc::now(),
            sender: agentry_common::AgentAddress::parse("a@localhost").unwrap(),
            recipients: vec![agentry_common::AgentAddress::parse(recipient).unwrap()],
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

    #[tokio::test]
    async fn accept_assigns_ids_and_queues_delivery() {
        let processor = processor();
        let outcome = processor.accept(sample_message("user@localhost")).await.unwrap();
        assert!(!outcome.duplicate);
        assert_eq!(outcome.status, AggregateStatus::Pending);

        let status = processor.status(outcome.message_id).unwrap();
        assert_eq!(status.recipients.len(), 1);

        let envelope = processor.envelope(outcome.message_id).unwrap();
        assert_eq!(envelope.message_id, Some(outcome.message_id));
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_returns_original_message_id() {
        let processor = processor();
        let mut message = sample_message("user@localhost");
        let shared_key = Uuid::now_v7();
        message.idempotency_key = Some(shared_key);

        let first = processor.accept(message.clone()).await.unwrap();
        assert!(!first.duplicate);

        let mut resubmission = sample_message("user@localhost");
        resubmission.idempotency_key = Some(shared_key);
        let second = processor.accept(resubmission).await.unwrap();

        assert!(second.duplicate);
        assert_eq!(second.message_id, first.message_id);
    }

    #[tokio::test]
    async fn empty_recipients_fails_validation_before_any_status_row_exists() {
        let processor = processor();
        let mut message = sample_message("user@localhost");
        message.recipients.clear();

        let result = processor.accept(message).await;
        assert!(matches!(result, Err(ProcessorError::Validation(_))));
    }

    #[tokio::test]
    async fn unsupported_version_is_rejected() {
        let processor = processor();
        let mut message = sample_message("user@localhost");
        message.version = "2.0".to_string();

        let result = processor.accept(message).await;
        assert!(matches!(result, Err(ProcessorError::Validation(_))));
    }
}
