//! The chain state machine: validating and folding event sequences.
//!
//! Folding is all-or-nothing. The first rule violation aborts the whole
//! resolve and no partial state is ever produced. Each transition is a
//! pure function returning a fresh state value.

use std::collections::{BTreeMap, BTreeSet};

use crate::canonical::hash_transaction;
use crate::crypto::TransactionHash;
use crate::error::ChainError;
use crate::event::{signing_message, ChainEvent, Transaction};
use crate::state::{
    all_authors_are_admins, authors_have_permission, get_admin_count, is_valid_admin_decision,
    MemberProperties, Permission, TrustChainState, STATE_VERSION,
};

/// Fold an ordered event list into a state.
///
/// The first event must be a valid genesis event; every later event is
/// validated against the state produced so far.
pub fn resolve_state(events: &[ChainEvent]) -> Result<TrustChainState, ChainError> {
    let (genesis, rest) = events.split_first().ok_or(ChainError::NoEvents)?;
    let mut state = apply_create_chain_event(genesis)?;
    for event in rest {
        state = apply_event(&state, event)?;
    }
    Ok(state)
}

/// Apply the genesis event, producing the initial state.
///
/// The author set must exactly match the declared admin set, and every
/// signature must verify over the bare transaction hash (there is no
/// previous hash to bind to).
pub fn apply_create_chain_event(event: &ChainEvent) -> Result<TrustChainState, ChainError> {
    let Transaction::Create { id, admins } = &event.transaction else {
        return Err(ChainError::InvalidCreateChainEvent);
    };
    if event.prev_hash.is_some() {
        return Err(ChainError::InvalidCreateChainEvent);
    }
    if admins.is_empty() || event.authors.is_empty() {
        return Err(ChainError::InvalidCreateChainEvent);
    }

    let admin_set: BTreeSet<_> = admins.iter().collect();
    let author_set: BTreeSet<_> = event.authors.iter().map(|a| &a.public_key).collect();
    if admins.len() != event.authors.len() || admin_set != author_set {
        return Err(ChainError::InvalidCreateChainEvent);
    }

    let hash = hash_transaction(&event.transaction);
    let message = signing_message(None, &hash);
    for author in &event.authors {
        if author.public_key.verify(&message, &author.signature).is_err() {
            return Err(ChainError::InvalidCreateChainEvent);
        }
    }

    let mut members = BTreeMap::new();
    for admin in admins {
        members.insert(*admin, MemberProperties::admin(admins.clone()));
    }

    Ok(TrustChainState {
        id: *id,
        members,
        last_event_hash: hash,
        encrypted_state_clock: 0,
        state_version: STATE_VERSION,
    })
}

/// Apply one non-genesis event on top of `state`.
pub fn apply_event(
    state: &TrustChainState,
    event: &ChainEvent,
) -> Result<TrustChainState, ChainError> {
    // Every permission predicate below quantifies over the authors, so
    // an empty author list would pass them all vacuously.
    if event.authors.is_empty() {
        return Err(ChainError::MissingAuthors);
    }

    let hash = hash_transaction(&event.transaction);
    let message = signing_message(Some(&state.last_event_hash), &hash);
    for author in &event.authors {
        if author.public_key.verify(&message, &author.signature).is_err() {
            return Err(ChainError::InvalidSignature(author.public_key.to_hex()));
        }
    }

    let mut members = state.members.clone();

    match &event.transaction {
        Transaction::Create { .. } => return Err(ChainError::SecondCreateChainEvent),

        Transaction::AddMember {
            member,
            authorization,
        } => {
            if authorization.is_admin {
                if !is_valid_admin_decision(state, &event.authors) {
                    return Err(ChainError::AddAdminDenied);
                }
                let added_by = event.authors.iter().map(|a| a.public_key).collect();
                members.insert(*member, MemberProperties::admin(added_by));
            } else {
                if event.authors.len() > 1 {
                    return Err(ChainError::MultiAuthorMemberAdd);
                }
                if !authors_have_permission(state, &event.authors, Permission::CanAddMembers) {
                    return Err(ChainError::AddMemberDenied);
                }
                // Non-admins may use canAddMembers but never delegate
                // permissions; only admins propagate them.
                if authorization.can_add_members
                    && !all_authors_are_admins(state, &event.authors)
                {
                    return Err(ChainError::AddMemberWithCanAddMembersDenied);
                }
                if authorization.can_remove_members
                    && !all_authors_are_admins(state, &event.authors)
                {
                    return Err(ChainError::AddMemberWithCanRemoveMembersDenied);
                }
                members.insert(
                    *member,
                    MemberProperties::member(
                        authorization.can_add_members,
                        authorization.can_remove_members,
                        vec![event.authors[0].public_key],
                    ),
                );
            }
        }

        Transaction::UpdateMember {
            member,
            authorization,
        } => {
            let Some(current) = state.members.get(member) else {
                return Err(ChainError::UpdateOfUnknownMember);
            };
            if !all_authors_are_admins(state, &event.authors) {
                return Err(ChainError::UpdateMemberDenied);
            }

            let demote = current.is_admin
                && !authorization.is_admin
                && is_valid_admin_decision(state, &event.authors);
            let promote = !current.is_admin
                && authorization.is_admin
                && is_valid_admin_decision(state, &event.authors);
            let permission_change = !current.is_admin
                && !authorization.is_admin
                && (current.can_add_members != authorization.can_add_members
                    || current.can_remove_members != authorization.can_remove_members);

            let updated = if demote || permission_change {
                MemberProperties {
                    is_admin: false,
                    can_add_members: authorization.can_add_members,
                    can_remove_members: authorization.can_remove_members,
                    ..current.clone()
                }
            } else if promote {
                MemberProperties {
                    is_admin: true,
                    can_add_members: true,
                    can_remove_members: true,
                    ..current.clone()
                }
            } else {
                // Covers no-op updates and quorum failures alike.
                return Err(ChainError::InvalidMemberUpdate);
            };
            members.insert(*member, updated);
        }

        Transaction::RemoveMember { member } => {
            let Some(current) = state.members.get(member) else {
                return Err(ChainError::RemovalOfUnknownMember);
            };
            if current.is_admin {
                if !is_valid_admin_decision(state, &event.authors) {
                    return Err(ChainError::RemoveAdminDenied);
                }
                if get_admin_count(state) <= 1 {
                    return Err(ChainError::RemovalOfLastAdmin);
                }
            } else if !authors_have_permission(state, &event.authors, Permission::CanRemoveMembers)
            {
                return Err(ChainError::RemoveMemberDenied);
            }
            if members.len() <= 1 {
                return Err(ChainError::RemovalOfLastMember);
            }
            members.remove(member);
        }
    }

    Ok(TrustChainState {
        id: state.id,
        members,
        last_event_hash: hash,
        encrypted_state_clock: state.encrypted_state_clock,
        state_version: STATE_VERSION,
    })
}
