//! Merging decrypted profile updates into trust chain state.

use trellis_core::{Ed25519PublicKey, TrustChainState};

use crate::update::RawStateUpdate;

/// Whether `author` may overwrite `member_key`'s profile in `state`.
///
/// Admins always may. A non-admin may if they are one of the member's
/// adders, the member has not become an admin, and no admin has written
/// the profile yet. Once an admin touches a profile it stays admin-only.
fn author_may_update(
    state: &TrustChainState,
    author: &Ed25519PublicKey,
    member_key: &Ed25519PublicKey,
) -> bool {
    if state.is_admin(author) {
        return true;
    }
    let Some(member) = state.member(member_key) else {
        return false;
    };
    member.added_by.contains(author)
        && !member.is_admin
        && !member
            .profile_updated_by
            .as_ref()
            .map_or(false, |writer| state.is_admin(writer))
}

/// Apply a decrypted state update authored by `author` at `clock`.
///
/// Updates the author is not entitled to make are dropped silently, as
/// are updates naming unknown members. The clock is stamped on the
/// result regardless, marking the entry as consumed.
pub fn apply_state_updates(
    state: &TrustChainState,
    updates: &RawStateUpdate,
    author: &Ed25519PublicKey,
    clock: u64,
) -> TrustChainState {
    let mut new_state = state.clone();

    for (member_key, profile) in &updates.members {
        if !author_may_update(state, author, member_key) {
            continue;
        }
        if let Some(member) = new_state.members.get_mut(member_key) {
            member.name = profile.name.clone();
            member.profile_updated_by = Some(*author);
        }
    }

    new_state.encrypted_state_clock = clock;
    new_state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::ProfileUpdate;
    use std::collections::BTreeMap;
    use trellis_core::{ChainId, MemberProperties, TransactionHash, STATE_VERSION};

    fn key(byte: u8) -> Ed25519PublicKey {
        Ed25519PublicKey::from_bytes([byte; 32])
    }

    const ADMIN: u8 = 0xa0;
    const ADDER: u8 = 0xb0;
    const TARGET: u8 = 0xc0;

    fn test_state() -> TrustChainState {
        let mut members = BTreeMap::new();
        members.insert(key(ADMIN), MemberProperties::admin(vec![]));
        members.insert(key(ADDER), MemberProperties::member(true, false, vec![key(ADMIN)]));
        members.insert(key(TARGET), MemberProperties::member(false, false, vec![key(ADDER)]));
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

    #[test]
    fn test_admin_updates_any_profile() {
        let state = test_state();
        let updated = apply_state_updates(&state, &name_update(key(TARGET), "Nik"), &key(ADMIN), 1);

        let target = &updated.members[&key(TARGET)];
        assert_eq!(target.name.as_deref(), Some("Nik"));
        assert_eq!(target.profile_updated_by, Some(key(ADMIN)));
        assert_eq!(updated.encrypted_state_clock, 1);
    }

    #[test]
    fn test_adder_updates_own_addition() {
        let state = test_state();
        let updated = apply_state_updates(&state, &name_update(key(TARGET), "Nik"), &key(ADDER), 1);

        assert_eq!(updated.members[&key(TARGET)].name.as_deref(), Some("Nik"));
    }

    #[test]
    fn test_stranger_update_dropped() {
        let state = test_state();
        let updated = apply_state_updates(&state, &name_update(key(ADDER), "Eve"), &key(TARGET), 1);

        assert_eq!(updated.members[&key(ADDER)].name, None);
        // the clock still advances for the consumed entry
        assert_eq!(updated.encrypted_state_clock, 1);
    }

    #[test]
    fn test_admin_write_locks_out_adder() {
        let state = test_state();
        let after_admin =
            apply_state_updates(&state, &name_update(key(TARGET), "Nik"), &key(ADMIN), 1);
        let after_adder =
            apply_state_updates(&after_admin, &name_update(key(TARGET), "Mallory"), &key(ADDER), 2);

        assert_eq!(after_adder.members[&key(TARGET)].name.as_deref(), Some("Nik"));
        assert_eq!(
            after_adder.members[&key(TARGET)].profile_updated_by,
            Some(key(ADMIN))
        );
    }

    #[test]
    fn test_adder_cannot_update_promoted_member() {
        let mut state = test_state();
        state.members.get_mut(&key(TARGET)).unwrap().is_admin = true;

        let updated = apply_state_updates(&state, &name_update(key(TARGET), "Nik"), &key(ADDER), 1);
        assert_eq!(updated.members[&key(TARGET)].name, None);
    }

    #[test]
    fn test_non_admin_writer_does_not_lock_out_adder() {
        let mut state = test_state();
        // a second non-admin adder wrote the profile earlier
        let co_adder = key(0xd0);
        state.members.insert(
            co_adder,
            MemberProperties::member(false, false, vec![key(ADMIN)]),
        );
        {
            let target = state.members.get_mut(&key(TARGET)).unwrap();
            target.added_by.push(co_adder);
            target.name = Some("Old".to_string());
            target.profile_updated_by = Some(co_adder);
        }

        let updated = apply_state_updates(&state, &name_update(key(TARGET), "New"), &key(ADDER), 1);
        assert_eq!(updated.members[&key(TARGET)].name.as_deref(), Some("New"));
    }

    #[test]
    fn test_unknown_member_skipped() {
        let state = test_state();
        let updated = apply_state_updates(&state, &name_update(key(0xee), "Ghost"), &key(ADMIN), 1);

        assert!(!updated.members.contains_key(&key(0xee)));
        assert_eq!(updated.encrypted_state_clock, 1);
    }
}
