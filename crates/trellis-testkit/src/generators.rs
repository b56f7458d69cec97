//! Proptest generators for property-based testing.

use proptest::prelude::*;

use trellis_core::{ChainId, Ed25519PublicKey, Keypair, MemberAuthorization, TransactionHash};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random Ed25519PublicKey.
pub fn public_key() -> impl Strategy<Value = Ed25519PublicKey> {
    keypair().prop_map(|kp| kp.public_key())
}

/// Generate a random TransactionHash.
pub fn transaction_hash() -> impl Strategy<Value = TransactionHash> {
    any::<[u8; 32]>().prop_map(TransactionHash::from_bytes)
}

/// Generate a random ChainId.
pub fn chain_id() -> impl Strategy<Value = ChainId> {
    any::<[u8; 16]>().prop_map(ChainId::from_bytes)
}

/// Generate an arbitrary authorization, admin or not.
pub fn member_authorization() -> impl Strategy<Value = MemberAuthorization> {
    prop_oneof![
        Just(MemberAuthorization::admin()),
        (any::<bool>(), any::<bool>())
            .prop_map(|(add, remove)| MemberAuthorization::member(add, remove)),
    ]
}

/// Generate a set of admin keypairs sized for quorum tests.
pub fn admin_set() -> impl Strategy<Value = Vec<Keypair>> {
    prop::collection::vec(any::<[u8; 32]>(), 1..=7).prop_map(|seeds| {
        seeds
            .into_iter()
            .map(|seed| Keypair::from_seed(&seed))
            .collect()
    })
}

/// Generate a member display name.
pub fn member_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 ]{0,23}".prop_map(String::from)
}

/// Generate a strictly increasing clock sequence of the given length.
pub fn clock_sequence(max_len: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::btree_set(1u64..=1_000_000, 0..=max_len)
        .prop_map(|set| set.into_iter().collect())
}
