//! Encrypted state updates: authoring side.
//!
//! A state update carries member profile changes (currently names).
//! The plaintext additionally embeds a hash of the state the author
//! expects after applying their own update, which resolution later uses
//! as an end-to-end self-check.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use trellis_core::{
    canonical_clock_bytes, hash_state, Author, Ed25519PublicKey, Keypair, TransactionHash,
    TrustChainState,
};

use crate::crypto::EncryptionNonce;
use crate::error::{Result, VaultError};
use crate::key::{Key, KeyId};
use crate::merge::apply_state_updates;

/// A change to one member's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
}

/// The plaintext a member authors: profile changes keyed by member.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawStateUpdate {
    pub members: BTreeMap<Ed25519PublicKey, ProfileUpdate>,
}

/// What actually goes inside the ciphertext: the update plus the hash
/// of the state the author computed after applying it locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdatePayload {
    pub members: BTreeMap<Ed25519PublicKey, ProfileUpdate>,
    pub state_hash: TransactionHash,
}

/// Unencrypted metadata carried next to the ciphertext.
///
/// The clock is public so entries can be ordered without decrypting,
/// but it is bound into the AEAD tag so it cannot be swapped post hoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicData {
    pub clock: u64,
}

/// One member's encrypted, signed state update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedState {
    pub key_id: KeyId,
    pub ciphertext: Vec<u8>,
    pub nonce: EncryptionNonce,
    pub public_data: PublicData,
    pub author: Author,
}

/// The message an encrypted state author signs, additional to and
/// independent of the AEAD tag.
pub fn state_signing_message(
    nonce: &EncryptionNonce,
    ciphertext: &[u8],
    public_data_bytes: &[u8],
) -> Vec<u8> {
    let mut message = Vec::with_capacity(12 + ciphertext.len() + public_data_bytes.len());
    message.extend_from_slice(nonce.as_bytes());
    message.extend_from_slice(ciphertext);
    message.extend_from_slice(public_data_bytes);
    message
}

/// Encrypt and sign a state update on top of `current_state`.
///
/// The clock is the current state's clock plus one. The update is
/// applied speculatively to compute the embedded state hash.
pub fn encrypt_state(
    current_state: &TrustChainState,
    updates: &RawStateUpdate,
    key: &Key,
    author: &Keypair,
) -> Result<EncryptedState> {
    let clock = current_state.encrypted_state_clock + 1;
    let new_state = apply_state_updates(current_state, updates, &author.public_key(), clock);

    let payload = StateUpdatePayload {
        members: updates.members.clone(),
        state_hash: hash_state(&new_state),
    };
    let mut plaintext = Vec::new();
    ciborium::into_writer(&payload, &mut plaintext)
        .map_err(|e| VaultError::Serialization(e.to_string()))?;

    let public_data_bytes = canonical_clock_bytes(clock);
    let nonce = EncryptionNonce::generate();
    let ciphertext = key.key.encrypt(&plaintext, &public_data_bytes, &nonce)?;

    let message = state_signing_message(&nonce, &ciphertext, &public_data_bytes);
    Ok(EncryptedState {
        key_id: key.key_id,
        ciphertext,
        nonce,
        public_data: PublicData { clock },
        author: Author {
            public_key: author.public_key(),
            signature: author.sign(&message),
        },
    })
}
