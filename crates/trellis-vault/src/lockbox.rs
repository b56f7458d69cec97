//! Lockboxes: per-member sealed copies of a shared symmetric key.
//!
//! Whoever rotates the key seals one lockbox per member, using
//! static-static X25519 between the sender's lockbox secret and the
//! member's registered lockbox public key. Receivers recompute the same
//! shared secret to unwrap the key, and in doing so verify the sender
//! identity stamped on the lockbox.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use trellis_core::{Ed25519PublicKey, TrustChainState};

use crate::crypto::{EncryptionNonce, X25519PublicKey, X25519StaticSecret};
use crate::error::{Result, VaultError};
use crate::key::{Key, KeyId};

/// A shared key sealed for one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockbox {
    /// Signing key of the member this lockbox is addressed to.
    pub receiver_signing_public_key: Ed25519PublicKey,

    /// Lockbox public key of the sender, needed by the receiver to
    /// recompute the shared wrapping key.
    pub sender_lockbox_public_key: X25519PublicKey,

    /// The CBOR-serialized [`Key`], wrapped.
    pub ciphertext: Vec<u8>,

    pub nonce: EncryptionNonce,
}

/// One rotated key sealed for every current member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyLockboxes {
    pub key_id: KeyId,
    pub lockboxes: BTreeMap<Ed25519PublicKey, Lockbox>,
}

// The wrapping key context binds the sender and receiver lockbox keys
// so a lockbox only opens for the pair it was sealed between.
fn wrapping_context(sender: &X25519PublicKey, receiver: &X25519PublicKey) -> Vec<u8> {
    let mut context = Vec::with_capacity(64);
    context.extend_from_slice(sender.as_bytes());
    context.extend_from_slice(receiver.as_bytes());
    context
}

/// Seal `key` for one receiver.
pub fn create_lockbox(
    key: &Key,
    sender_secret: &X25519StaticSecret,
    receiver_signing_public_key: Ed25519PublicKey,
    receiver_lockbox_public_key: &X25519PublicKey,
) -> Result<Lockbox> {
    let sender_public = sender_secret.public_key();
    let shared = sender_secret.diffie_hellman(receiver_lockbox_public_key);
    let wrapping_key =
        shared.derive_wrapping_key(&wrapping_context(&sender_public, receiver_lockbox_public_key));

    let mut plaintext = Vec::new();
    ciborium::into_writer(key, &mut plaintext)
        .map_err(|e| VaultError::Serialization(e.to_string()))?;

    let nonce = EncryptionNonce::generate();
    let ciphertext = wrapping_key.encrypt(&plaintext, &[], &nonce)?;

    Ok(Lockbox {
        receiver_signing_public_key,
        sender_lockbox_public_key: sender_public,
        ciphertext,
        nonce,
    })
}

/// Seal `key` for every member of `state`.
///
/// Fails if any member has not yet registered a lockbox public key; a
/// rotation must reach the whole member set or nobody.
pub fn create_lockboxes(
    key: &Key,
    sender_secret: &X25519StaticSecret,
    state: &TrustChainState,
) -> Result<KeyLockboxes> {
    let mut lockboxes = BTreeMap::new();
    for (member_key, properties) in &state.members {
        let receiver_lockbox_key = properties
            .lockbox_public_key
            .ok_or_else(|| VaultError::MissingLockboxKey(member_key.to_hex()))?;

        let lockbox = create_lockbox(
            key,
            sender_secret,
            *member_key,
            &X25519PublicKey::from(receiver_lockbox_key),
        )?;
        lockboxes.insert(*member_key, lockbox);
    }

    Ok(KeyLockboxes {
        key_id: key.key_id,
        lockboxes,
    })
}

/// Open a lockbox with the receiver's lockbox secret.
pub fn decrypt_lockbox(receiver_secret: &X25519StaticSecret, lockbox: &Lockbox) -> Result<Key> {
    let receiver_public = receiver_secret.public_key();
    let shared = receiver_secret.diffie_hellman(&lockbox.sender_lockbox_public_key);
    let wrapping_key = shared.derive_wrapping_key(&wrapping_context(
        &lockbox.sender_lockbox_public_key,
        &receiver_public,
    ));

    let plaintext = wrapping_key.decrypt(&lockbox.ciphertext, &[], &lockbox.nonce)?;
    ciborium::from_reader(plaintext.as_slice())
        .map_err(|e| VaultError::Serialization(e.to_string()))
}
