//! Canonical CBOR encoding for deterministic hashing and signing.
//!
//! RFC 8949 Core Deterministic Encoding: map keys sorted by encoded byte
//! comparison, smallest integer encodings, definite lengths, no floats.
//!
//! Every hash and signature input in the protocol goes through this
//! module, so two participants encoding the same transaction or state
//! always produce identical bytes regardless of in-memory field order.

use ciborium::value::Value;

use crate::crypto::TransactionHash;
use crate::event::Transaction;
use crate::state::{MemberProperties, TrustChainState};

/// Transaction field keys (integer keys encode as single bytes).
mod tx_keys {
    pub const KIND: u64 = 0;
    pub const ID: u64 = 1;
    pub const ADMINS: u64 = 2;
    pub const MEMBER: u64 = 1;
    pub const IS_ADMIN: u64 = 2;
    pub const CAN_ADD_MEMBERS: u64 = 3;
    pub const CAN_REMOVE_MEMBERS: u64 = 4;
}

/// Transaction kind discriminants.
mod tx_kind {
    pub const CREATE: u64 = 0;
    pub const ADD_MEMBER: u64 = 1;
    pub const UPDATE_MEMBER: u64 = 2;
    pub const REMOVE_MEMBER: u64 = 3;
}

/// State field keys.
mod state_keys {
    pub const ID: u64 = 0;
    pub const MEMBERS: u64 = 1;
    pub const LAST_EVENT_HASH: u64 = 2;
    pub const ENCRYPTED_STATE_CLOCK: u64 = 3;
    pub const STATE_VERSION: u64 = 4;
}

/// Member field keys.
mod member_keys {
    pub const IS_ADMIN: u64 = 0;
    pub const CAN_ADD_MEMBERS: u64 = 1;
    pub const CAN_REMOVE_MEMBERS: u64 = 2;
    pub const ADDED_BY: u64 = 3;
    pub const NAME: u64 = 4;
    pub const PROFILE_UPDATED_BY: u64 = 5;
    pub const LOCKBOX_PUBLIC_KEY: u64 = 6;
}

/// Encode a transaction to canonical CBOR bytes.
pub fn canonical_transaction_bytes(transaction: &Transaction) -> Vec<u8> {
    encode_cbor_value_canonical(&transaction_to_cbor_value(transaction))
}

/// Encode a full chain state to canonical CBOR bytes.
pub fn canonical_state_bytes(state: &TrustChainState) -> Vec<u8> {
    encode_cbor_value_canonical(&state_to_cbor_value(state))
}

/// Encode the public metadata of an encrypted state update (its clock).
///
/// Bound into the AEAD tag as associated data and into the author
/// signature, so a clock cannot be swapped after the fact.
pub fn canonical_clock_bytes(clock: u64) -> Vec<u8> {
    let value = Value::Map(vec![(Value::Integer(0.into()), Value::Integer(clock.into()))]);
    encode_cbor_value_canonical(&value)
}

/// Blake3 over the canonical transaction encoding.
pub fn hash_transaction(transaction: &Transaction) -> TransactionHash {
    TransactionHash::hash(&canonical_transaction_bytes(transaction))
}

/// Blake3 over the canonical state encoding.
///
/// Embedded in encrypted state updates as an end-to-end self-check that
/// all participants converged on the same merged state.
pub fn hash_state(state: &TrustChainState) -> TransactionHash {
    TransactionHash::hash(&canonical_state_bytes(state))
}

fn transaction_to_cbor_value(transaction: &Transaction) -> Value {
    let int_key = |k: u64| Value::Integer(k.into());
    match transaction {
        Transaction::Create { id, admins } => Value::Map(vec![
            (int_key(tx_keys::KIND), Value::Integer(tx_kind::CREATE.into())),
            (int_key(tx_keys::ID), Value::Bytes(id.as_bytes().to_vec())),
            (
                int_key(tx_keys::ADMINS),
                Value::Array(
                    admins
                        .iter()
                        .map(|admin| Value::Bytes(admin.0.to_vec()))
                        .collect(),
                ),
            ),
        ]),
        Transaction::AddMember {
            member,
            authorization,
        } => member_transaction_value(tx_kind::ADD_MEMBER, member.0, authorization),
        Transaction::UpdateMember {
            member,
            authorization,
        } => member_transaction_value(tx_kind::UPDATE_MEMBER, member.0, authorization),
        Transaction::RemoveMember { member } => Value::Map(vec![
            (
                int_key(tx_keys::KIND),
                Value::Integer(tx_kind::REMOVE_MEMBER.into()),
            ),
            (int_key(tx_keys::MEMBER), Value::Bytes(member.0.to_vec())),
        ]),
    }
}

fn member_transaction_value(
    kind: u64,
    member: [u8; 32],
    authorization: &crate::event::MemberAuthorization,
) -> Value {
    let int_key = |k: u64| Value::Integer(k.into());
    Value::Map(vec![
        (int_key(tx_keys::KIND), Value::Integer(kind.into())),
        (int_key(tx_keys::MEMBER), Value::Bytes(member.to_vec())),
        (
            int_key(tx_keys::IS_ADMIN),
            Value::Bool(authorization.is_admin),
        ),
        (
            int_key(tx_keys::CAN_ADD_MEMBERS),
            Value::Bool(authorization.can_add_members),
        ),
        (
            int_key(tx_keys::CAN_REMOVE_MEMBERS),
            Value::Bool(authorization.can_remove_members),
        ),
    ])
}

fn state_to_cbor_value(state: &TrustChainState) -> Value {
    let int_key = |k: u64| Value::Integer(k.into());

    let members: Vec<(Value, Value)> = state
        .members
        .iter()
        .map(|(public_key, member)| {
            (
                Value::Bytes(public_key.0.to_vec()),
                member_to_cbor_value(member),
            )
        })
        .collect();

    Value::Map(vec![
        (
            int_key(state_keys::ID),
            Value::Bytes(state.id.as_bytes().to_vec()),
        ),
        (int_key(state_keys::MEMBERS), Value::Map(members)),
        (
            int_key(state_keys::LAST_EVENT_HASH),
            Value::Bytes(state.last_event_hash.as_bytes().to_vec()),
        ),
        (
            int_key(state_keys::ENCRYPTED_STATE_CLOCK),
            Value::Integer(state.encrypted_state_clock.into()),
        ),
        (
            int_key(state_keys::STATE_VERSION),
            Value::Integer(state.state_version.into()),
        ),
    ])
}

fn member_to_cbor_value(member: &MemberProperties) -> Value {
    let int_key = |k: u64| Value::Integer(k.into());

    let added_by: Vec<Value> = member
        .added_by
        .iter()
        .map(|key| Value::Bytes(key.0.to_vec()))
        .collect();

    let name = match &member.name {
        Some(name) => Value::Text(name.clone()),
        None => Value::Null,
    };
    let profile_updated_by = match &member.profile_updated_by {
        Some(key) => Value::Bytes(key.0.to_vec()),
        None => Value::Null,
    };
    let lockbox_public_key = match &member.lockbox_public_key {
        Some(key) => Value::Bytes(key.as_bytes().to_vec()),
        None => Value::Null,
    };

    Value::Map(vec![
        (int_key(member_keys::IS_ADMIN), Value::Bool(member.is_admin)),
        (
            int_key(member_keys::CAN_ADD_MEMBERS),
            Value::Bool(member.can_add_members),
        ),
        (
            int_key(member_keys::CAN_REMOVE_MEMBERS),
            Value::Bool(member.can_remove_members),
        ),
        (int_key(member_keys::ADDED_BY), Value::Array(added_by)),
        (int_key(member_keys::NAME), name),
        (int_key(member_keys::PROFILE_UPDATED_BY), profile_updated_by),
        (int_key(member_keys::LOCKBOX_PUBLIC_KEY), lockbox_public_key),
    ])
}

/// Encode a CBOR Value to canonical bytes.
fn encode_cbor_value_canonical(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value);
    buf
}

fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr),
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        _ => unreachable!("only ints, bytes, text, arrays, maps, bools and null are encoded"),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type, smallest form.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffffffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode an array (major type 4).
fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item);
    }
}

/// Encode a map canonically (major type 5), keys sorted by encoded bytes.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut key_value_pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    key_value_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, key_value_pairs.len() as u64);
    for (key_bytes, value) in key_value_pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}
