//! Cryptographic utilities for the vault.
//!
//! X25519 key agreement for lockbox sealing and ChaCha20-Poly1305
//! authenticated encryption with associated data for state updates.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};

use trellis_core::LockboxPublicKey;

use crate::error::{Result, VaultError};

/// An X25519 public key (32 bytes) for receiving lockboxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct X25519PublicKey(pub [u8; 32]);

impl X25519PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to x25519-dalek PublicKey.
    pub fn to_dalek(&self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl From<PublicKey> for X25519PublicKey {
    fn from(pk: PublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

impl From<LockboxPublicKey> for X25519PublicKey {
    fn from(pk: LockboxPublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

impl From<X25519PublicKey> for LockboxPublicKey {
    fn from(pk: X25519PublicKey) -> Self {
        LockboxPublicKey::from_bytes(pk.0)
    }
}

/// An X25519 static secret key.
///
/// Lockboxes use static-static key agreement: the sender seals with
/// their long-lived secret, so a lockbox that opens against the stated
/// sender public key also proves who sealed it.
pub struct X25519StaticSecret(StaticSecret);

impl X25519StaticSecret {
    /// Generate a new random secret.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(StaticSecret::from(bytes))
    }

    /// Create from seed bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Derive the public key.
    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey::from(PublicKey::from(&self.0))
    }

    /// Perform key agreement with a peer's public key.
    pub fn diffie_hellman(&self, peer_public: &X25519PublicKey) -> SharedKey {
        let shared = self.0.diffie_hellman(&peer_public.to_dalek());
        SharedKey(*shared.as_bytes())
    }
}

/// A shared secret derived from X25519 key agreement.
#[derive(Clone)]
pub struct SharedKey([u8; 32]);

impl SharedKey {
    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive a wrapping key from this shared secret.
    ///
    /// The context binds both endpoints so a key agreed with one peer
    /// never decrypts material sealed for another.
    pub fn derive_wrapping_key(&self, context: &[u8]) -> EncryptionKey {
        use blake3::Hasher;
        let mut hasher = Hasher::new_derive_key("trellis-lockbox-v1-wrap");
        hasher.update(&self.0);
        hasher.update(context);
        EncryptionKey(*hasher.finalize().as_bytes())
    }
}

/// A 256-bit symmetric key for ChaCha20-Poly1305.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encrypt, binding `associated_data` into the authentication tag.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        associated_data: &[u8],
        nonce: &EncryptionNonce,
    ) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        let nonce = Nonce::from_slice(&nonce.0);
        cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad: associated_data,
                },
            )
            .map_err(|e| VaultError::Encryption(e.to_string()))
    }

    /// Decrypt; fails if the ciphertext, tag, or associated data were
    /// tampered with.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        associated_data: &[u8],
        nonce: &EncryptionNonce,
    ) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| VaultError::Decryption(e.to_string()))?;

        let nonce = Nonce::from_slice(&nonce.0);
        cipher
            .decrypt(
                nonce,
                Payload {
                    msg: ciphertext,
                    aad: associated_data,
                },
            )
            .map_err(|e| VaultError::Decryption(e.to_string()))
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptionKey(..)")
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionNonce(pub [u8; 12]);

impl EncryptionNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 12];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_x25519_key_agreement() {
        let alice_secret = X25519StaticSecret::generate();
        let alice_public = alice_secret.public_key();

        let bob_secret = X25519StaticSecret::generate();
        let bob_public = bob_secret.public_key();

        let alice_shared = alice_secret.diffie_hellman(&bob_public);
        let bob_shared = bob_secret.diffie_hellman(&alice_public);

        assert_eq!(alice_shared.as_bytes(), bob_shared.as_bytes());
    }

    #[test]
    fn test_encrypt_decrypt_with_associated_data() {
        let key = EncryptionKey::generate();
        let nonce = EncryptionNonce::generate();
        let plaintext = b"member profile update";
        let aad = b"clock metadata";

        let ciphertext = key.encrypt(plaintext, aad, &nonce).unwrap();
        assert_ne!(ciphertext.as_slice(), plaintext.as_slice());

        let decrypted = key.decrypt(&ciphertext, aad, &nonce).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_decrypt_rejects_swapped_associated_data() {
        let key = EncryptionKey::generate();
        let nonce = EncryptionNonce::generate();

        let ciphertext = key.encrypt(b"secret", b"clock 1", &nonce).unwrap();
        assert!(key.decrypt(&ciphertext, b"clock 2", &nonce).is_err());
    }

    #[test]
    fn test_decrypt_wrong_key_fails() {
        let key1 = EncryptionKey::generate();
        let key2 = EncryptionKey::generate();
        let nonce = EncryptionNonce::generate();

        let ciphertext = key1.encrypt(b"secret", b"", &nonce).unwrap();
        assert!(key2.decrypt(&ciphertext, b"", &nonce).is_err());
    }

    #[test]
    fn test_wrapping_key_derivation_deterministic() {
        let shared = SharedKey([0x42; 32]);
        let key1 = shared.derive_wrapping_key(b"context");
        let key2 = shared.derive_wrapping_key(b"context");
        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_wrapping_key_derivation_context_separation() {
        let shared = SharedKey([0x42; 32]);
        let key1 = shared.derive_wrapping_key(b"sender-a");
        let key2 = shared.derive_wrapping_key(b"sender-b");
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    proptest::proptest! {
        #[test]
        fn encryption_round_trips_for_any_input(
            key_bytes in proptest::prelude::any::<[u8; 32]>(),
            nonce_bytes in proptest::prelude::any::<[u8; 12]>(),
            plaintext in proptest::prelude::any::<Vec<u8>>(),
            aad in proptest::prelude::any::<Vec<u8>>(),
        ) {
            let key = EncryptionKey::from_bytes(key_bytes);
            let nonce = EncryptionNonce::from_bytes(nonce_bytes);

            let ciphertext = key.encrypt(&plaintext, &aad, &nonce).unwrap();
            let decrypted = key.decrypt(&ciphertext, &aad, &nonce).unwrap();
            proptest::prop_assert_eq!(decrypted, plaintext);
        }
    }
}
