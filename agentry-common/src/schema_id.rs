//! Schema identifier parsing: `agntcy:<domain>.<entity>.<version>` and the
//! `agntcy:<domain>.*` wildcard form used to advertise capabilities.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::error::SchemaIdError;

const PREFIX: &str = "agntcy:";

/// A parsed `agntcy:<domain>.<entity>.<version>` identifier, or the
/// `agntcy:<domain>.*` wildcard form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaIdentifier {
    Exact {
        domain: String,
        entity: String,
        version: String,
    },
    Wildcard {
        domain: String,
    },
}

impl SchemaIdentifier {
    /// Parse a schema identifier string, accepting either the exact or
    /// wildcard forms.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaIdError`] if the identifier doesn't start with
    /// `agntcy:`, or the remainder doesn't split into the expected
    /// dot-separated segments.
    pub fn parse(raw: &str) -> Result<Self, SchemaIdError> {
        let rest = raw
            .strip_prefix(PREFIX)
            .ok_or_else(|| SchemaIdError::MissingPrefix(raw.to_string()))?;

        if let Some(domain) = rest.strip_suffix(".*") {
            validate_segment(domain, raw)?;
            return Ok(Self::Wildcard {
                domain: domain.to_string(),
            });
        }

        let mut parts = rest.splitn(3, '.');
        let (Some(domain), Some(entity), Some(version)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(SchemaIdError::BadFormat(raw.to_string()));
        };

        validate_segment(domain, raw)?;
        validate_segment(entity, raw)?;
        if !version.starts_with('v') || version.len() < 2 || !version[1..].chars().all(|c| c.is_ascii_digit()) {
            return Err(SchemaIdError::BadVersion(version.to_string()));
        }

        Ok(Self::Exact {
            domain: domain.to_string(),
            entity: entity.to_string(),
            version: version.to_string(),
        })
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        match self {
            Self::Exact { domain, .. } | Self::Wildcard { domain } => domain,
        }
    }

    /// True if `self` (as advertised by a capability record, which may be a
    /// wildcard) matches `other` (the identifier actually used on a message).
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Wildcard { domain }, Self::Exact { domain: od, .. } | Self::Wildcard { domain: od }) => {
                domain == od
            }
            (Self::Exact { .. }, Self::Exact { .. }) => self == other,
            (Self::Exact { .. }, Self::Wildcard { .. }) => false,
        }
    }
}

fn validate_segment(segment: &str, raw: &str) -> Result<(), SchemaIdError> {
    if segment.is_empty()
        || !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(SchemaIdError::BadFormat(raw.to_string()));
    }
    Ok(())
}

impl Display for SchemaIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact {
                domain,
                entity,
                version,
            } => write!(f, "{PREFIX}{domain}.{entity}.{version}"),
            Self::Wildcard { domain } => write!(f, "{PREFIX}{domain}.*"),
        }
    }
}

impl Serialize for SchemaIdentifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SchemaIdentifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
