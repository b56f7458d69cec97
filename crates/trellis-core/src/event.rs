//! Transactions and signed chain events.
//!
//! A transaction describes a single membership change. An event wraps a
//! transaction with one or more author signatures and the hash of the
//! previous transaction, binding it to its position in the chain.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::hash_transaction;
use crate::crypto::{Ed25519PublicKey, Ed25519Signature, Keypair, TransactionHash};

/// Opaque identifier of a chain, chosen at creation time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(pub [u8; 16]);

impl ChainId {
    /// Generate a random chain id.
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

impl fmt::Debug for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainId({})", self.to_hex())
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// The authorization flags carried by add-member and update-member
/// transactions.
///
/// An admin always holds both permissions; the constructors keep that
/// invariant out of reach of callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberAuthorization {
    pub is_admin: bool,
    pub can_add_members: bool,
    pub can_remove_members: bool,
}

impl MemberAuthorization {
    /// Full admin authorization.
    pub const fn admin() -> Self {
        Self {
            is_admin: true,
            can_add_members: true,
            can_remove_members: true,
        }
    }

    /// Non-admin authorization with explicit permission flags.
    pub const fn member(can_add_members: bool, can_remove_members: bool) -> Self {
        Self {
            is_admin: false,
            can_add_members,
            can_remove_members,
        }
    }
}

/// A membership change, the payload of a chain event.
///
/// Closed sum type: unknown transaction kinds cannot exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    /// Genesis transaction establishing the chain and its initial admins.
    Create {
        id: ChainId,
        admins: Vec<Ed25519PublicKey>,
    },

    /// Add a new member with the given authorization.
    AddMember {
        member: Ed25519PublicKey,
        authorization: MemberAuthorization,
    },

    /// Change an existing member's authorization.
    UpdateMember {
        member: Ed25519PublicKey,
        authorization: MemberAuthorization,
    },

    /// Remove an existing member.
    RemoveMember { member: Ed25519PublicKey },
}

impl Transaction {
    /// Whether this is the genesis transaction.
    pub fn is_create(&self) -> bool {
        matches!(self, Transaction::Create { .. })
    }
}

/// A signature over an event by one author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub public_key: Ed25519PublicKey,
    pub signature: Ed25519Signature,
}

/// A signed, hash-linked chain event.
///
/// `prev_hash` is `None` only for the genesis event. Authors may be
/// appended while an event is being circulated for co-signing, but the
/// transaction and the hash being signed never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub authors: Vec<Author>,
    pub transaction: Transaction,
    pub prev_hash: Option<TransactionHash>,
}

/// The message every author of an event signs.
///
/// `prev_hash || hash(transaction)` for chained events, the bare
/// transaction hash for genesis.
pub fn signing_message(
    prev_hash: Option<&TransactionHash>,
    transaction_hash: &TransactionHash,
) -> Vec<u8> {
    match prev_hash {
        Some(prev) => {
            let mut message = Vec::with_capacity(64);
            message.extend_from_slice(prev.as_bytes());
            message.extend_from_slice(transaction_hash.as_bytes());
            message
        }
        None => transaction_hash.as_bytes().to_vec(),
    }
}

/// Create a genesis event for a new chain.
///
/// The caller signs immediately; the remaining declared admins co-sign
/// via [`add_author`] before the event is submitted.
pub fn create_chain(author: &Keypair, admins: Vec<Ed25519PublicKey>) -> ChainEvent {
    let transaction = Transaction::Create {
        id: ChainId::generate(),
        admins,
    };
    let hash = hash_transaction(&transaction);
    let message = signing_message(None, &hash);
    ChainEvent {
        authors: vec![Author {
            public_key: author.public_key(),
            signature: author.sign(&message),
        }],
        transaction,
        prev_hash: None,
    }
}

/// Create an add-member event on top of `prev_hash`.
pub fn add_member(
    prev_hash: TransactionHash,
    author: &Keypair,
    member: Ed25519PublicKey,
    authorization: MemberAuthorization,
) -> ChainEvent {
    signed_event(
        prev_hash,
        author,
        Transaction::AddMember {
            member,
            authorization,
        },
    )
}

/// Create an update-member event on top of `prev_hash`.
pub fn update_member(
    prev_hash: TransactionHash,
    author: &Keypair,
    member: Ed25519PublicKey,
    authorization: MemberAuthorization,
) -> ChainEvent {
    signed_event(
        prev_hash,
        author,
        Transaction::UpdateMember {
            member,
            authorization,
        },
    )
}

/// Create a remove-member event on top of `prev_hash`.
pub fn remove_member(
    prev_hash: TransactionHash,
    author: &Keypair,
    member: Ed25519PublicKey,
) -> ChainEvent {
    signed_event(prev_hash, author, Transaction::RemoveMember { member })
}

/// Append a co-author's signature to an event.
///
/// Used to collect the signatures an admin decision needs before the
/// event is submitted. The signed message is identical for every author.
pub fn add_author(event: &mut ChainEvent, author: &Keypair) {
    let hash = hash_transaction(&event.transaction);
    let message = signing_message(event.prev_hash.as_ref(), &hash);
    event.authors.push(Author {
        public_key: author.public_key(),
        signature: author.sign(&message),
    });
}

fn signed_event(
    prev_hash: TransactionHash,
    author: &Keypair,
    transaction: Transaction,
) -> ChainEvent {
    let hash = hash_transaction(&transaction);
    let message = signing_message(Some(&prev_hash), &hash);
    ChainEvent {
        authors: vec![Author {
            public_key: author.public_key(),
            signature: author.sign(&message),
        }],
        transaction,
        prev_hash: Some(prev_hash),
    }
}
