//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use trellis_core::{
    add_author, add_member, create_chain, hash_transaction, remove_member, resolve_state,
    update_member, ChainError, ChainEvent, Ed25519PublicKey, Keypair, MemberAuthorization,
    TransactionHash, TrustChainState,
};
use trellis_vault::X25519StaticSecret;

/// A deterministic participant: a signing keypair plus a lockbox secret,
/// both derived from one seed byte.
pub struct Participant {
    pub keypair: Keypair,
    pub lockbox_secret: X25519StaticSecret,
}

impl Participant {
    /// Derive a participant from a single seed byte.
    pub fn from_seed_byte(seed: u8) -> Self {
        Self {
            keypair: Keypair::from_seed(&[seed; 32]),
            lockbox_secret: X25519StaticSecret::from_bytes([seed.wrapping_add(0x80); 32]),
        }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }
}

/// The three standard participants used across the test suite.
pub fn alice() -> Participant {
    Participant::from_seed_byte(0x01)
}

pub fn bob() -> Participant {
    Participant::from_seed_byte(0x02)
}

pub fn carol() -> Participant {
    Participant::from_seed_byte(0x03)
}

/// A growing event chain with the previous transaction hash threaded
/// through, so tests can append events without bookkeeping.
pub struct TestChain {
    pub events: Vec<ChainEvent>,
    last_hash: TransactionHash,
}

impl TestChain {
    /// Start a chain whose genesis declares the given admins, signed by
    /// all of them.
    pub fn new(admins: &[&Participant]) -> Self {
        let (first, rest) = admins.split_first().expect("at least one admin");
        let mut genesis = create_chain(
            &first.keypair,
            admins.iter().map(|p| p.public_key()).collect(),
        );
        for admin in rest {
            add_author(&mut genesis, &admin.keypair);
        }
        let last_hash = hash_transaction(&genesis.transaction);
        Self {
            events: vec![genesis],
            last_hash,
        }
    }

    /// Append an add-member event signed by `authors`.
    pub fn add_member(
        &mut self,
        authors: &[&Participant],
        member: Ed25519PublicKey,
        authorization: MemberAuthorization,
    ) {
        let (first, rest) = authors.split_first().expect("at least one author");
        let mut event = add_member(self.last_hash, &first.keypair, member, authorization);
        for author in rest {
            add_author(&mut event, &author.keypair);
        }
        self.push(event);
    }

    /// Append an update-member event signed by `authors`.
    pub fn update_member(
        &mut self,
        authors: &[&Participant],
        member: Ed25519PublicKey,
        authorization: MemberAuthorization,
    ) {
        let (first, rest) = authors.split_first().expect("at least one author");
        let mut event = update_member(self.last_hash, &first.keypair, member, authorization);
        for author in rest {
            add_author(&mut event, &author.keypair);
        }
        self.push(event);
    }

    /// Append a remove-member event signed by `authors`.
    pub fn remove_member(&mut self, authors: &[&Participant], member: Ed25519PublicKey) {
        let (first, rest) = authors.split_first().expect("at least one author");
        let mut event = remove_member(self.last_hash, &first.keypair, member);
        for author in rest {
            add_author(&mut event, &author.keypair);
        }
        self.push(event);
    }

    /// Fold the chain into state.
    pub fn resolve(&self) -> Result<TrustChainState, ChainError> {
        resolve_state(&self.events)
    }

    fn push(&mut self, event: ChainEvent) {
        self.last_hash = hash_transaction(&event.transaction);
        self.events.push(event);
    }
}

/// Resolve the chain and register each participant's lockbox public key
/// on their member entry, as a client would after key setup.
pub fn resolve_with_lockbox_keys(
    chain: &TestChain,
    participants: &[&Participant],
) -> TrustChainState {
    let mut state = chain.resolve().expect("fixture chain must resolve");
    for participant in participants {
        if let Some(member) = state.members.get_mut(&participant.public_key()) {
            member.lockbox_public_key = Some(participant.lockbox_secret.public_key().into());
        }
    }
    state
}
