//! In-memory schema registry behind a `parking_lot::RwLock`, matching the
//! read-mostly sharing pattern used throughout the teacher's delivery
//! crate. Validation itself is delegated to the `jsonschema` crate against
//! Draft 2020-12 semantics, per spec §4.2.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use agentry_common::SchemaIdentifier;

use crate::error::SchemaError;

#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    #[serde(skip)]
    pub id: SchemaIdentifier,
    pub definition: Value,
    pub checksum: String,
    pub size: usize,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct RegistryStats {
    pub count: usize,
    pub by_domain: HashMap<String, usize>,
    pub by_entity: HashMap<String, usize>,
}

fn checksum(definition: &Value) -> String {
    let bytes = serde_json::to_vec(definition).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn exact_key(id: &SchemaIdentifier) -> Result<String, SchemaError> {
    match id {
        SchemaIdentifier::Exact { .. } => Ok(id.to_string()),
        SchemaIdentifier::Wildcard { .. } => Err(SchemaError::InvalidDefinition(
            "wildcard identifiers cannot be registered".to_string(),
        )),
    }
}

pub struct SchemaRegistry {
    schemas: RwLock<HashMap<String, Arc<Schema>>>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            schemas: RwLock::new(HashMap::new()),
        }
    }

    /// # Errors
    ///
    /// Returns [`SchemaError::AlreadyExists`] if a definition is already
    /// registered for `id` and `force` is false; returns
    /// [`SchemaError::InvalidDefinition`] for a wildcard `id`.
    pub fn register(
        &self,
        id: &SchemaIdentifier,
        definition: Value,
        force: bool,
    ) -> Result<Arc<Schema>, SchemaError> {
        let key = exact_key(id)?;

        jsonschema::validator_for(&definition)
            .map_err(|e| SchemaError::InvalidDefinition(e.to_string()))?;

        let mut schemas = self.schemas.write();
        if !force && schemas.contains_key(&key) {
            return Err(SchemaError::AlreadyExists(key));
        }

        let size = serde_json::to_vec(&definition).map(|v| v.len()).unwrap_or(0);
        let schema = Arc::new(Schema {
            id: id.clone(),
            checksum: checksum(&definition),
            size,
            published_at: Utc::now(),
            definition,
        });
        schemas.insert(key, schema.clone());
        Ok(schema)
    }

    #[must_use]
    pub fn get(&self, id: &SchemaIdentifier) -> Option<Arc<Schema>> {
        let key = id.to_string();
        self.schemas.read().get(&key).cloned()
    }

    /// Lists registered schemas, optionally filtered by an exact id or a
    /// `agntcy:<domain>.*` wildcard pattern.
    #[must_use]
    pub fn list(&self, pattern: Option<&SchemaIdentifier>) -> Vec<Arc<Schema>> {
        self.schemas
            .read()
            .values()
            .filter(|s| pattern.is_none_or(|p| p.matches(&s.id)))
            .cloned()
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`SchemaError::NotFound`] if no schema is registered for `id`.
    pub fn delete(&self, id: &SchemaIdentifier) -> Result<(), SchemaError> {
        let key = id.to_string();
        self.schemas
            .write()
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| SchemaError::NotFound(key))
    }

    /// Validates `payload` against the registered definition for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::NotFound`] if `id` isn't registered; otherwise
    /// always returns `Ok`, with validation failures reported inside
    /// [`ValidationResult::errors`] rather than as an `Err`.
    pub fn validate(&self, id: &SchemaIdentifier, payload: &Value) -> Result<ValidationResult, SchemaError> {
        let schema = self
            .get(id)
            .ok_or_else(|| SchemaError::NotFound(id.to_string()))?;

        let validator = jsonschema::validator_for(&schema.definition)
            .map_err(|e| SchemaError::InvalidDefinition(e.to_string()))?;

        let errors: Vec<String> = validator
            .iter_errors(payload)
            .map(|e| format!("{}: {e}", e.instance_path))
            .collect();

        Ok(ValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings: Vec::new(),
        })
    }

    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let schemas = self.schemas.read();
        let mut by_domain = HashMap::new();
        let mut by_entity = HashMap::new();

        for schema in schemas.values() {
            if let SchemaIdentifier::Exact { domain, entity, .. } = &schema.id {
                *by_domain.entry(domain.clone()).or_insert(0) += 1;
                *by_entity.entry(entity.clone()).or_insert(0) += 1;
            }
        }

        RegistryStats {
            count: schemas.len(),
            by_domain,
            by_entity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(s: &str) -> SchemaIdentifier {
        SchemaIdentifier::parse(s).unwrap()
    }

    fn bool_schema() -> Value {
        json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "properties": {"t": {"type": "string"}},
            "required": ["t"]
        })
    }

    #[test]
    fn register_then_get() {
        let reg = SchemaRegistry::new();
        let schema_id = id("agntcy:commerce.order.v1");
        reg.register(&schema_id, bool_schema(), false).unwrap();

        let fetched = reg.get(&schema_id).unwrap();
        assert_eq!(fetched.id, schema_id);
    }

    #[test]
    fn register_twice_without_force_fails() {
        let reg = SchemaRegistry::new();
        let schema_id = id("agntcy:commerce.order.v1");
        reg.register(&schema_id, bool_schema(), false).unwrap();

        let err = reg.register(&schema_id, bool_schema(), false);
        assert!(matches!(err, Err(SchemaError::AlreadyExists(_))));
    }

    #[test]
    fn register_twice_with_force_overwrites() {
        let reg = SchemaRegistry::new();
        let schema_id = id("agntcy:commerce.order.v1");
        reg.register(&schema_id, bool_schema(), false).unwrap();
        assert!(reg.register(&schema_id, bool_schema(), true).is_ok());
    }

    #[test]
    fn wildcard_cannot_be_registered() {
        let reg = SchemaRegistry::new();
        let wildcard = id("agntcy:commerce.*");
        assert!(reg.register(&wildcard, bool_schema(), false).is_err());
    }

    #[test]
    fn list_filters_by_wildcard_pattern() {
        let reg = SchemaRegistry::new();
        reg.register(&id("agntcy:commerce.order.v1"), bool_schema(), false)
            .unwrap();
        reg.register(&id("agntcy:shipping.label.v1"), bool_schema(), false)
            .unwrap();

        let filtered = reg.list(Some(&id("agntcy:commerce.*")));
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn validate_reports_errors_for_missing_field() {
        let reg = SchemaRegistry::new();
        let schema_id = id("agntcy:commerce.order.v1");
        reg.register(&schema_id, bool_schema(), false).unwrap();

        let result = reg.validate(&schema_id, &json!({})).unwrap();
        assert!(!result.valid);
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn validate_passes_for_conforming_payload() {
        let reg = SchemaRegistry::new();
        let schema_id = id("agntcy:commerce.order.v1");
        reg.register(&schema_id, bool_schema(), false).unwrap();

        let result = reg.validate(&schema_id, &json!({"t": "hi"})).unwrap();
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn delete_removes_schema() {
        let reg = SchemaRegistry::new();
        let schema_id = id("agntcy:commerce.order.v1");
        reg.register(&schema_id, bool_schema(), false).unwrap();
        reg.delete(&schema_id).unwrap();
        assert!(reg.get(&schema_id).is_none());
    }

    #[test]
    fn stats_counts_by_domain_and_entity() {
        let reg = SchemaRegistry::new();
        reg.register(&id("agntcy:commerce.order.v1"), bool_schema(), false)
            .unwrap();
        reg.register(&id("agntcy:commerce.invoice.v1"), bool_schema(), false)
            .unwrap();

        let stats = reg.stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.by_domain.get("commerce"), Some(&2));
        assert_eq!(stats.by_entity.get("order"), Some(&1));
    }
}
