//! API-key generation and constant-time verification.
//!
//! Grounded on `empath-control/src/auth.rs`'s SHA-256-hash-then-compare
//! shape, with one change: the teacher compares hash strings with `==`,
//! which short-circuits on the first differing byte. Spec §4.3 requires a
//! constant-time comparison, so the hash bytes are compared with a fixed-cost
//! XOR fold instead of `PartialEq`.

use base64::Engine as _;
use rand::RngCore;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ApiKeyHash([u8; 32]);

impl ApiKeyHash {
    fn of(plaintext: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(plaintext.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Constant-time equality: always walks every byte regardless of where
    /// the first mismatch falls.
    fn matches(&self, plaintext: &str) -> bool {
        let candidate = Self::of(plaintext);
        let mut diff = 0u8;
        for (a, b) in self.0.iter().zip(candidate.0.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

/// A freshly generated API key: the plaintext half, surfaced exactly once,
/// and the hash half, retained for verification.
pub(crate) struct GeneratedKey {
    pub plaintext: String,
    pub hash: ApiKeyHash,
}

/// Generates 256 bits of cryptographic randomness, base64-encoded.
pub(crate) fn generate() -> GeneratedKey {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    let plaintext = base64::engine::general_purpose::STANDARD.encode(bytes);
    let hash = ApiKeyHash::of(&plaintext);
    GeneratedKey { plaintext, hash }
}

pub(crate) fn verify(hash: &ApiKeyHash, presented: &str) -> bool {
    hash.matches(presented)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_verifies_against_its_own_hash() {
        let key = generate();
        assert!(verify(&key.hash, &key.plaintext));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let key = generate();
        assert!(!verify(&key.hash, "not-the-right-key"));
    }

    #[test]
    fn generated_keys_are_unique() {
        let a = generate();
        let b = generate();
        assert_ne!(a.plaintext, b.plaintext);
    }
}
