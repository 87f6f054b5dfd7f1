//! `agent@domain` address parsing, mirroring [`crate::domain::Domain`]'s
//! newtype-over-`Arc<str>` idiom.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::{domain::Domain, error::AddressError};

/// A parsed `agent@domain` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AgentAddress {
    local_part: String,
    domain: Domain,
}

impl AgentAddress {
    /// # Errors
    ///
    /// Returns [`AddressError`] if `raw` doesn't contain exactly one `@`, or
    /// either side of it is empty.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let mut parts = raw.splitn(2, '@');
        let (Some(local_part), Some(domain)) = (parts.next(), parts.next()) else {
            return Err(AddressError::MissingAt(raw.to_string()));
        };
        if local_part.is_empty() || domain.is_empty() || raw.matches('@').count() != 1 {
            return Err(AddressError::MissingAt(raw.to_string()));
        }
        Ok(Self {
            local_part: local_part.to_string(),
            domain: Domain::new(domain),
        })
    }

    #[must_use]
    pub fn local_part(&self) -> &str {
        &self.local_part
    }

    #[must_use]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    #[must_use]
    pub fn is_local(&self, local_domain: &Domain) -> bool {
        &self.domain == local_domain
    }
}

impl Display for AgentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local_part, self.domain)
    }
}

impl Serialize for AgentAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AgentAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
