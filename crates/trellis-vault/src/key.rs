//! Shared symmetric keys for encrypted member state.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::EncryptionKey;

/// Opaque identifier of a shared symmetric key.
///
/// Referenced by encrypted state entries so receivers know which
/// unwrapped key to decrypt with.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyId(pub [u8; 16]);

impl KeyId {
    /// Generate a random key id.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", self.to_hex())
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A shared symmetric key together with its id.
///
/// Distributed to members via lockboxes; used to encrypt and decrypt
/// state updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub key_id: KeyId,
    pub key: EncryptionKey,
}

/// Generate a fresh random key with a random id.
pub fn create_key() -> Key {
    Key {
        key_id: KeyId::generate(),
        key: EncryptionKey::generate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_key_is_random() {
        let a = create_key();
        let b = create_key();
        assert_ne!(a.key_id, b.key_id);
        assert_ne!(a.key.as_bytes(), b.key.as_bytes());
    }

    #[test]
    fn test_key_id_hex() {
        let id = KeyId::from_bytes([0x5a; 16]);
        assert_eq!(id.to_hex(), "5a".repeat(16));
    }
}
