//! The local agent registry: registration, authentication, routing, and the
//! per-agent inbox, tying together [`crate::agent`], [`crate::api_key`], and
//! [`crate::inbox`] (spec §4.3).

use std::{collections::HashMap, sync::RwLock};

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use agentry_common::{AgentAddress, Message, SchemaIdentifier};

use crate::{
    agent::{LocalAgent, NewAgent},
    api_key,
    error::RegistryError,
    inbox::Inboxes,
};

pub struct AgentRegistry {
    agents: RwLock<HashMap<String, LocalAgent>>,
    inboxes: Inboxes,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            inboxes: Inboxes::new(),
        }
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::MissingPushTarget`] /
    /// [`RegistryError::UnexpectedPushTarget`] on a mode/target mismatch, or
    /// [`RegistryError::AlreadyExists`] if the address is already registered.
    pub fn register(&self, new_agent: NewAgent) -> Result<(LocalAgent, String), RegistryError> {
        new_agent.validate()?;

        let key = new_agent.address.to_string();
        let mut agents = self
            .agents
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if agents.contains_key(&key) {
            return Err(RegistryError::AlreadyExists(key));
        }

        let generated = api_key::generate();
        let agent = LocalAgent {
            address: new_agent.address,
            delivery_mode: new_agent.delivery_mode,
            push_target: new_agent.push_target,
            headers: new_agent.headers,
            api_key_hash: generated.hash,
            supported_schemas: new_agent.supported_schemas,
            requires_schema: new_agent.requires_schema,
            created_at: Utc::now(),
            last_access: None,
        };

        agents.insert(key, agent.clone());
        debug!(agent = %agent.address, "agent registered");
        Ok((agent, generated.plaintext))
    }

    #[must_use]
    pub fn get(&self, address: &AgentAddress) -> Option<LocalAgent> {
        self.agents
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&address.to_string())
            .cloned()
    }

    #[must_use]
    pub fn list(&self) -> Vec<LocalAgent> {
        self.agents
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `address` isn't registered.
    pub fn unregister(&self, address: &AgentAddress) -> Result<(), RegistryError> {
        self.agents
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&address.to_string())
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotFound(address.to_string()))
    }

    /// Verifies `presented` against `address`'s stored key hash and, on
    /// success, stamps `last_access`.
    pub fn authenticate_agent(&self, address: &AgentAddress, presented: &str) -> bool {
        let mut agents = self
            .agents
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(agent) = agents.get_mut(&address.to_string()) else {
            return false;
        };

        let ok = api_key::verify(&agent.api_key_hash, presented);
        if ok {
            agent.last_access = Some(Utc::now());
        } else {
            warn!(agent = %address, "rejected invalid API key");
        }
        ok
    }

    /// Stores `message` in `recipient`'s inbox.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `recipient` isn't registered.
    pub fn store_message(&self, recipient: &AgentAddress, message: Message) -> Result<bool, RegistryError> {
        if self.get(recipient).is_none() {
            return Err(RegistryError::NotFound(recipient.to_string()));
        }
        Ok(self.inboxes.store(&recipient.to_string(), message))
    }

    /// Lists `recipient`'s inbox, authorized by `presented` (the agent's API
    /// key).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unauthorized`] if `presented` doesn't match.
    pub fn get_inbox(&self, recipient: &AgentAddress, presented: &str) -> Result<Vec<Message>, RegistryError> {
        if !self.authenticate_agent(recipient, presented) {
            return Err(RegistryError::Unauthorized);
        }
        Ok(self.inboxes.list(&recipient.to_string()))
    }

    /// Acknowledges (removes) `message_id` from `recipient`'s inbox.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unauthorized`] if `presented` doesn't match,
    /// or [`RegistryError::MessageNotFound`] if no queued entry has
    /// `message_id`.
    pub fn ack_message(
        &self,
        recipient: &AgentAddress,
        presented: &str,
        message_id: Uuid,
    ) -> Result<(), RegistryError> {
        if !self.authenticate_agent(recipient, presented) {
            return Err(RegistryError::Unauthorized);
        }
        self.inboxes.ack(&recipient.to_string(), message_id)
    }

    /// Local agents whose `supported_schemas` match `schema_id`.
    #[must_use]
    pub fn find_agents_for_schema(&self, schema_id: &SchemaIdentifier) -> Vec<AgentAddress> {
        self.agents
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .filter(|a| a.supports_schema(schema_id))
            .map(|a| a.address.clone())
            .collect()
    }
}


#[cfg(test)]
mod tests_support {
    use std::collections::HashMap;

    use agentry_common::{AgentAddress, Message};
    use uuid::Uuid;

    pub(crate) fn sample_message() -> Message {
        Message {
            version: "1.0".to_string(),
            message_id: Some(Uuid::now_v7()),
            idempotency_key: None,
            timestamp: chrono::Utc::now(),
            sender: AgentAddress::parse("a@localhost").unwrap(),
            recipients: vec![AgentAddress::parse("user@localhost").unwrap()],
            subject: None,
            schema: None,
            payload: serde_json::json!({}),
            coordination: None,
            headers: HashMap::new(),
            attachments: Vec::new(),
            signature: None,
            in_reply_to: None,
            response_type: None,
        }
    }
}
