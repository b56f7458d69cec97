//! # Trellis Core
//!
//! The trust chain: a permissioned, append-only log of membership and
//! authorization changes for an organization.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over cryptographic data structures: callers feed it an
//! ordered event list and get back the folded member set, or the first
//! rule violation.
//!
//! ## Key Types
//!
//! - [`Transaction`] - A membership change (create, add, update, remove)
//! - [`ChainEvent`] - A multi-signed, hash-linked transaction envelope
//! - [`TrustChainState`] - The member set a chain folds into
//!
//! ## Chaining
//!
//! Each event's signatures cover `prev_hash || hash(transaction)`, so an
//! event only verifies in the exact chain position it was authored for.
//! All hash and signature inputs use deterministic CBOR; see [`canonical`].

pub mod canonical;
pub mod chain;
pub mod crypto;
pub mod error;
pub mod event;
pub mod state;

pub use canonical::{
    canonical_clock_bytes, canonical_state_bytes, canonical_transaction_bytes, hash_state,
    hash_transaction,
};
pub use chain::{apply_create_chain_event, apply_event, resolve_state};
pub use crypto::{Ed25519PublicKey, Ed25519Signature, Keypair, TransactionHash};
pub use error::{ChainError, CryptoError};
pub use event::{
    add_author, add_member, create_chain, remove_member, signing_message, update_member, Author,
    ChainEvent, ChainId, MemberAuthorization, Transaction,
};
pub use state::{
    get_admin_count, is_valid_admin_decision, LockboxPublicKey, MemberProperties, Permission,
    TrustChainState, STATE_VERSION,
};
