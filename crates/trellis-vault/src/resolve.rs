//! Encrypted state resolution: the receiving side.
//!
//! Entries from many authors are re-sorted into clock order and folded
//! one by one. A single bad entry (bad signature, undecryptable, key the
//! reader does not hold) must not block an otherwise healthy merge, so
//! per-entry failures are flagged and skipped rather than raised. Clock
//! violations are structural and abort the whole resolution.

use std::collections::BTreeMap;

use trellis_core::{canonical_clock_bytes, hash_state, Ed25519PublicKey, TransactionHash, TrustChainState};

use crate::crypto::EncryptionKey;
use crate::error::{Result, VaultError};
use crate::key::{Key, KeyId};
use crate::merge::apply_state_updates;
use crate::update::{state_signing_message, EncryptedState, StateUpdatePayload};

/// The outcome of folding all encrypted state entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEncryptedState {
    pub state: TrustChainState,

    /// At least one entry was skipped because it could not be verified
    /// or decrypted. A soft warning, not an error.
    pub failed_to_apply_all_updates: bool,

    /// Whether the final state hash matches the hash embedded in the
    /// last applied entry. A self-check, not a security control.
    pub is_identical_content: bool,

    /// The entry authored by the resolving user, if any. Lets callers
    /// tell whether their own last write is reflected in the result.
    pub current_user_entry: Option<EncryptedState>,

    /// The key that decrypted the last applied entry, for re-encryption.
    pub active_key: Option<Key>,
}

struct AppliedEntry {
    state: TrustChainState,
    embedded_hash: Option<TransactionHash>,
    failed: bool,
}

/// Verify and apply a single entry on top of `state`.
///
/// Any failure leaves `state` untouched and sets the failed flag.
fn verify_and_apply_encrypted_state(
    state: &TrustChainState,
    entry: &EncryptedState,
    key: Option<&EncryptionKey>,
) -> AppliedEntry {
    let skipped = || AppliedEntry {
        state: state.clone(),
        embedded_hash: None,
        failed: true,
    };

    let Some(key) = key else {
        return skipped();
    };

    let public_data_bytes = canonical_clock_bytes(entry.public_data.clock);
    let message = state_signing_message(&entry.nonce, &entry.ciphertext, &public_data_bytes);
    if entry
        .author
        .public_key
        .verify(&message, &entry.author.signature)
        .is_err()
    {
        return skipped();
    }

    let Ok(plaintext) = key.decrypt(&entry.ciphertext, &public_data_bytes, &entry.nonce) else {
        return skipped();
    };
    let Ok(payload) = ciborium::from_reader::<StateUpdatePayload, _>(plaintext.as_slice()) else {
        return skipped();
    };

    let updates = crate::update::RawStateUpdate {
        members: payload.members,
    };
    let new_state = apply_state_updates(
        state,
        &updates,
        &entry.author.public_key,
        entry.public_data.clock,
    );

    AppliedEntry {
        state: new_state,
        embedded_hash: Some(payload.state_hash),
        failed: false,
    }
}

// Clocks must be strictly increasing positive integers once sorted.
fn verify_clocks(sorted: &[EncryptedState]) -> Result<()> {
    let mut current_clock = 0u64;
    for entry in sorted {
        if entry.public_data.clock == 0 {
            return Err(VaultError::MissingClock);
        }
        if entry.public_data.clock == current_clock {
            return Err(VaultError::IdenticalClocks);
        }
        current_clock = entry.public_data.clock;
    }
    Ok(())
}

/// Fold encrypted state entries into `current_state` in clock order.
///
/// Entries may be supplied in any order; they are sorted by clock
/// before folding, so every caller converges on the same result.
pub fn resolve_encrypted_state(
    current_state: &TrustChainState,
    entries: &[EncryptedState],
    keys: &BTreeMap<KeyId, EncryptionKey>,
    current_user: &Ed25519PublicKey,
) -> Result<ResolvedEncryptedState> {
    let mut sorted = entries.to_vec();
    sorted.sort_by_key(|entry| entry.public_data.clock);
    verify_clocks(&sorted)?;

    let mut state = current_state.clone();
    let mut failed_to_apply_all_updates = false;
    let mut last_hash = None;
    let mut current_user_entry = None;
    let mut active_key = None;

    for entry in &sorted {
        let key = keys.get(&entry.key_id);
        let applied = verify_and_apply_encrypted_state(&state, entry, key);

        last_hash = applied.embedded_hash;
        state = applied.state;
        if applied.failed {
            failed_to_apply_all_updates = true;
        } else if let Some(key) = key {
            active_key = Some(Key {
                key_id: entry.key_id,
                key: key.clone(),
            });
        }

        if entry.author.public_key == *current_user {
            current_user_entry = Some(entry.clone());
        }
    }

    let is_identical_content = last_hash == Some(hash_state(&state));
    Ok(ResolvedEncryptedState {
        state,
        failed_to_apply_all_updates,
        is_identical_content,
        current_user_entry,
        active_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::create_key;
    use crate::update::{encrypt_state, ProfileUpdate, RawStateUpdate};
    use std::collections::BTreeMap;
    use trellis_core::{ChainId, Keypair, MemberProperties, STATE_VERSION};

    fn admin_keypair() -> Keypair {
        Keypair::from_seed(&[0x11; 32])
    }

    fn member_keypair() -> Keypair {
        Keypair::from_seed(&[0x22; 32])
    }

    // One admin plus one non-admin member added by the admin.
    fn test_state() -> TrustChainState {
        let admin = admin_keypair();
        let member = member_keypair();
        let mut members = BTreeMap::new();
        members.insert(admin.public_key(), MemberProperties::admin(vec![]));
        members.insert(
            member.public_key(),
            MemberProperties::member(false, false, vec![admin.public_key()]),
        );
        TrustChainState {
            id: ChainId::from_bytes([0; 16]),
            members,
            last_event_hash: TransactionHash::ZERO,
            encrypted_state_clock: 0,
            state_version: STATE_VERSION,
        }
    }

    fn name_update(member: Ed25519PublicKey, name: &str) -> RawStateUpdate {
        let mut members = BTreeMap::new();
        members.insert(
            member,
            ProfileUpdate {
                name: Some(name.to_string()),
            },
        );
        RawStateUpdate { members }
    }

    fn key_map(key: &Key) -> BTreeMap<KeyId, EncryptionKey> {
        let mut keys = BTreeMap::new();
        keys.insert(key.key_id, key.key.clone());
        keys
    }

    #[test]
    fn test_resolve_applies_updates_in_clock_order() {
        let admin = admin_keypair();
        let member_key = member_keypair().public_key();
        let state = test_state();
        let key = create_key();

        let first = encrypt_state(&state, &name_update(member_key, "Nik"), &key, &admin).unwrap();
        let mut after_first = state.clone();
        after_first.encrypted_state_clock = 1;
        let second =
            encrypt_state(&after_first, &name_update(member_key, "Niko"), &key, &admin).unwrap();

        // supplied out of order on purpose
        let resolved = resolve_encrypted_state(
            &state,
            &[second, first],
            &key_map(&key),
            &admin.public_key(),
        )
        .unwrap();

        let member = &resolved.state.members[&member_key];
        assert_eq!(member.name.as_deref(), Some("Niko"));
        assert_eq!(member.profile_updated_by, Some(admin.public_key()));
        assert_eq!(resolved.state.encrypted_state_clock, 2);
        assert!(!resolved.failed_to_apply_all_updates);
        assert!(resolved.is_identical_content);
    }

    #[test]
    fn test_resolve_identical_clocks_fails() {
        let admin = admin_keypair();
        let member_key = member_keypair().public_key();
        let state = test_state();
        let key = create_key();

        let first = encrypt_state(&state, &name_update(member_key, "Nik"), &key, &admin).unwrap();
        let second = encrypt_state(&state, &name_update(member_key, "Niko"), &key, &admin).unwrap();
        assert_eq!(first.public_data.clock, second.public_data.clock);

        for order in [
            [first.clone(), second.clone()],
            [second.clone(), first.clone()],
        ] {
            let err = resolve_encrypted_state(&state, &order, &key_map(&key), &admin.public_key())
                .unwrap_err();
            assert!(matches!(err, VaultError::IdenticalClocks));
        }
    }

    #[test]
    fn test_resolve_zero_clock_fails() {
        let admin = admin_keypair();
        let member_key = member_keypair().public_key();
        let state = test_state();
        let key = create_key();

        let mut entry =
            encrypt_state(&state, &name_update(member_key, "Nik"), &key, &admin).unwrap();
        entry.public_data.clock = 0;

        let err = resolve_encrypted_state(&state, &[entry], &key_map(&key), &admin.public_key())
            .unwrap_err();
        assert!(matches!(err, VaultError::MissingClock));
    }

    #[test]
    fn test_resolve_skips_tampered_entry() {
        let admin = admin_keypair();
        let member_key = member_keypair().public_key();
        let state = test_state();
        let key = create_key();

        let good = encrypt_state(&state, &name_update(member_key, "Nik"), &key, &admin).unwrap();
        let mut after_good = state.clone();
        after_good.encrypted_state_clock = 1;
        let mut bad =
            encrypt_state(&after_good, &name_update(member_key, "Evil"), &key, &admin).unwrap();
        bad.ciphertext[0] ^= 0xff;

        let resolved =
            resolve_encrypted_state(&state, &[good, bad], &key_map(&key), &admin.public_key())
                .unwrap();

        // the good entry still applied, the bad one was skipped
        assert_eq!(
            resolved.state.members[&member_key].name.as_deref(),
            Some("Nik")
        );
        assert!(resolved.failed_to_apply_all_updates);
        assert!(!resolved.is_identical_content);
    }

    #[test]
    fn test_resolve_skips_entry_with_unknown_key() {
        let admin = admin_keypair();
        let member_key = member_keypair().public_key();
        let state = test_state();
        let key = create_key();
        let other_key = create_key();

        let entry = encrypt_state(&state, &name_update(member_key, "Nik"), &key, &admin).unwrap();

        let resolved = resolve_encrypted_state(
            &state,
            &[entry],
            &key_map(&other_key),
            &admin.public_key(),
        )
        .unwrap();

        assert_eq!(resolved.state.members[&member_key].name, None);
        assert!(resolved.failed_to_apply_all_updates);
        assert!(resolved.active_key.is_none());
    }

    #[test]
    fn test_resolve_tracks_current_user_entry_and_active_key() {
        let admin = admin_keypair();
        let member = member_keypair();
        let state = test_state();
        let key = create_key();

        let admin_entry =
            encrypt_state(&state, &name_update(member.public_key(), "Nik"), &key, &admin).unwrap();
        let mut after_admin = state.clone();
        after_admin.encrypted_state_clock = 1;
        let member_entry = encrypt_state(
            &after_admin,
            &name_update(member.public_key(), "Self"),
            &key,
            &member,
        )
        .unwrap();

        let resolved = resolve_encrypted_state(
            &state,
            &[admin_entry, member_entry.clone()],
            &key_map(&key),
            &member.public_key(),
        )
        .unwrap();

        assert_eq!(resolved.current_user_entry, Some(member_entry));
        assert_eq!(
            resolved.active_key.as_ref().map(|k| k.key_id),
            Some(key.key_id)
        );
    }

    #[test]
    fn test_resolve_empty_entries() {
        let admin = admin_keypair();
        let state = test_state();

        let resolved =
            resolve_encrypted_state(&state, &[], &BTreeMap::new(), &admin.public_key()).unwrap();

        assert_eq!(resolved.state, state);
        assert!(!resolved.failed_to_apply_all_updates);
        assert!(!resolved.is_identical_content);
        assert!(resolved.current_user_entry.is_none());
        assert!(resolved.active_key.is_none());
    }

    #[test]
    fn test_resolve_admin_overwrite_locks_out_adder() {
        let admin = admin_keypair();
        let member = member_keypair();
        // the adder is a separate non-admin who added the member
        let adder = Keypair::from_seed(&[0x33; 32]);
        let mut state = test_state();
        state.members.insert(
            adder.public_key(),
            MemberProperties::member(true, false, vec![admin.public_key()]),
        );
        state
            .members
            .get_mut(&member.public_key())
            .unwrap()
            .added_by = vec![adder.public_key()];

        let key = create_key();

        let admin_entry =
            encrypt_state(&state, &name_update(member.public_key(), "Nik"), &key, &admin).unwrap();
        let mut after_admin = state.clone();
        after_admin.encrypted_state_clock = 1;
        let adder_entry = encrypt_state(
            &after_admin,
            &name_update(member.public_key(), "Mallory"),
            &key,
            &adder,
        )
        .unwrap();

        let resolved = resolve_encrypted_state(
            &state,
            &[adder_entry, admin_entry],
            &key_map(&key),
            &admin.public_key(),
        )
        .unwrap();

        // the adder's later write was silently dropped
        assert_eq!(
            resolved.state.members[&member.public_key()].name.as_deref(),
            Some("Nik")
        );
        assert_eq!(
            resolved.state.members[&member.public_key()].profile_updated_by,
            Some(admin.public_key())
        );
        assert!(!resolved.failed_to_apply_all_updates);
    }
}
