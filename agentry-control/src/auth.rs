//! Admin authentication: an `X-Admin-Key` header checked against a key file
//! and/or a configured SHA-256 hash list (spec §6.1, key handling model).
//!
//! Grounded on `empath-control/src/auth.rs`'s shape (a config struct plus a
//! `validate_token`-style check), generalized from one fixed control-socket
//! bearer token to a key file with one key per line. The hash comparison
//! itself follows `agentry-registry::api_key::ApiKeyHash`: both key-file
//! lines and pre-hashed config entries are folded into SHA-256 digests at
//! load time, so `authenticate` only ever compares fixed-size hash bytes
//! with a constant-time XOR fold, never `==` on presented plaintext or hash
//! strings.

use std::{fs, path::Path};

use sha2::{Digest, Sha256};

use crate::error::ControlError;

/// Where admin keys come from. Both sources may be configured together; a
/// presented key is accepted if it matches any hash from either.
#[derive(Debug, Clone, Default)]
pub struct AdminAuthConfig {
    /// Name of the header carrying the presented key, e.g. `X-Admin-Key`.
    pub header_name: String,
    /// Path to a file with one admin key per line; blank lines and lines
    /// starting with `#` are ignored.
    pub key_file: Option<String>,
    /// Pre-hashed admin keys, each a 64-character hex-encoded SHA-256 digest.
    pub key_hashes: Vec<String>,
}

impl AdminAuthConfig {
    #[must_use]
    pub fn new(header_name: impl Into<String>) -> Self {
        Self {
            header_name: header_name.into(),
            key_file: None,
            key_hashes: Vec::new(),
        }
    }
}

fn hash_of(plaintext: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hasher.finalize().into()
}

fn parse_hex_digest(hex: &str) -> Result<[u8; 32], ControlError> {
    let bytes =
        hex::decode(hex).map_err(|_| ControlError::InvalidKeyHash(hex.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| ControlError::InvalidKeyHash(hex.to_string()))
}

fn load_key_file(path: &str) -> Result<Vec<[u8; 32]>, ControlError> {
    let contents = fs::read_to_string(Path::new(path)).map_err(|source| ControlError::KeyFileUnreadable {
        path: path.to_string(),
        source,
    })?;

    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(hash_of)
        .collect())
}

/// Loaded admin key hashes, ready for constant-time membership checks.
pub struct AdminAuth {
    header_name: String,
    hashes: Vec<[u8; 32]>,
}

impl AdminAuth {
    /// Loads key-file and/or configured hash-list sources into a single
    /// hash set.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::NoKeySource`] if neither a key file nor a
    /// hash list is configured, [`ControlError::KeyFileUnreadable`] if the
    /// key file can't be read, or [`ControlError::InvalidKeyHash`] if a
    /// configured hash isn't valid hex-encoded SHA-256.
    pub fn load(config: &AdminAuthConfig) -> Result<Self, ControlError> {
        if config.key_file.is_none() && config.key_hashes.is_empty() {
            return Err(ControlError::NoKeySource);
        }

        let mut hashes = Vec::new();
        if let Some(path) = &config.key_file {
            hashes.extend(load_key_file(path)?);
        }
        for configured in &config.key_hashes {
            hashes.push(parse_hex_digest(configured)?);
        }

        Ok(Self {
            header_name: config.header_name.clone(),
            hashes,
        })
    }

    #[must_use]
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// Constant-time membership check: every configured hash is compared in
    /// full regardless of earlier matches, and every byte of each candidate
    /// hash is XOR-folded rather than compared with a short-circuiting `==`.
    #[must_use]
    pub fn authenticate(&self, presented: &str) -> bool {
        let candidate = hash_of(presented);
        let mut matched = 0u8;
        for known in &self.hashes {
            let mut diff = 0u8;
            for (a, b) in known.iter().zip(candidate.iter()) {
                diff |= a ^ b;
            }
            matched |= u8::from(diff == 0);
        }
        matched != 0
    }
}
