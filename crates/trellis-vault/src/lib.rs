//! # Trellis Vault
//!
//! Encrypted member state layered on top of the trust chain.
//!
//! The chain itself is public to its members; what the vault adds is a
//! shared symmetric key distributed via per-member [lockboxes](lockbox),
//! encrypted profile [updates](update) authored under that key, and a
//! deterministic, clock-ordered [resolution](resolve) that merges
//! updates from many authors into one state.
//!
//! Like the core, this crate does no I/O. Callers fetch entries and
//! lockboxes from storage and hand them in as values.

pub mod crypto;
pub mod error;
pub mod key;
pub mod lockbox;
pub mod merge;
pub mod resolve;
pub mod update;

pub use crypto::{EncryptionKey, EncryptionNonce, SharedKey, X25519PublicKey, X25519StaticSecret};
pub use error::{Result, VaultError};
pub use key::{create_key, Key, KeyId};
pub use lockbox::{create_lockbox, create_lockboxes, decrypt_lockbox, KeyLockboxes, Lockbox};
pub use merge::apply_state_updates;
pub use resolve::{resolve_encrypted_state, ResolvedEncryptedState};
pub use update::{
    encrypt_state, state_signing_message, EncryptedState, ProfileUpdate, PublicData,
    RawStateUpdate, StateUpdatePayload,
};
