//! Trust chain state: the member set a chain folds into.
//!
//! State is an immutable value. Applying an event produces a new state,
//! so replays and snapshots never observe a half-applied transition.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::crypto::{Ed25519PublicKey, TransactionHash};
use crate::event::{Author, ChainId};

/// The state schema version. Bumped when a rule fix requires clients to
/// recompute state from the event log.
pub const STATE_VERSION: u32 = 1;

/// A member's X25519 public key used to seal lockboxes for them.
///
/// Kept as raw bytes here; the vault layer interprets them.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockboxPublicKey(pub [u8; 32]);

impl LockboxPublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for LockboxPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LockboxPub({})", &hex::encode(self.0)[..16])
    }
}

/// A permission a non-admin member may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    CanAddMembers,
    CanRemoveMembers,
}

/// Everything the chain tracks about one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProperties {
    pub is_admin: bool,
    pub can_add_members: bool,
    pub can_remove_members: bool,

    /// Who signed the event that added this member. Immutable provenance;
    /// survives updates and drives the profile-priority policy.
    pub added_by: Vec<Ed25519PublicKey>,

    /// Display name, only ever set through the encrypted state layer.
    pub name: Option<String>,

    /// The author of the last applied profile update.
    pub profile_updated_by: Option<Ed25519PublicKey>,

    /// The member's registered key for receiving lockboxes.
    pub lockbox_public_key: Option<LockboxPublicKey>,
}

impl MemberProperties {
    /// A full admin, as created by genesis or an admin add.
    pub fn admin(added_by: Vec<Ed25519PublicKey>) -> Self {
        Self {
            is_admin: true,
            can_add_members: true,
            can_remove_members: true,
            added_by,
            name: None,
            profile_updated_by: None,
            lockbox_public_key: None,
        }
    }

    /// A non-admin member with explicit permission flags.
    pub fn member(
        can_add_members: bool,
        can_remove_members: bool,
        added_by: Vec<Ed25519PublicKey>,
    ) -> Self {
        Self {
            is_admin: false,
            can_add_members,
            can_remove_members,
            added_by,
            name: None,
            profile_updated_by: None,
            lockbox_public_key: None,
        }
    }

    /// Whether this member holds the given permission.
    pub fn has_permission(&self, permission: Permission) -> bool {
        match permission {
            Permission::CanAddMembers => self.can_add_members,
            Permission::CanRemoveMembers => self.can_remove_members,
        }
    }
}

/// The folded state of a trust chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustChainState {
    /// The chain id declared by the genesis transaction.
    pub id: ChainId,

    /// Current members keyed by signing public key. A BTreeMap so
    /// iteration and canonical hashing are order-stable.
    pub members: BTreeMap<Ed25519PublicKey, MemberProperties>,

    /// Hash of the last applied transaction; the value the next event's
    /// signatures must cover as prefix.
    pub last_event_hash: TransactionHash,

    /// Clock of the last applied encrypted state update.
    pub encrypted_state_clock: u64,

    /// Schema version of this state value.
    pub state_version: u32,
}

impl TrustChainState {
    /// Look up a member.
    pub fn member(&self, public_key: &Ed25519PublicKey) -> Option<&MemberProperties> {
        self.members.get(public_key)
    }

    /// Whether the given key belongs to a current admin.
    pub fn is_admin(&self, public_key: &Ed25519PublicKey) -> bool {
        self.members
            .get(public_key)
            .map_or(false, |member| member.is_admin)
    }
}

/// Count the current admins.
pub fn get_admin_count(state: &TrustChainState) -> usize {
    state
        .members
        .values()
        .filter(|member| member.is_admin)
        .count()
}

/// Whether every author is a current admin.
pub fn all_authors_are_admins(state: &TrustChainState, authors: &[Author]) -> bool {
    authors
        .iter()
        .all(|author| state.is_admin(&author.public_key))
}

/// Whether every author is a current member holding `permission`.
pub fn authors_have_permission(
    state: &TrustChainState,
    authors: &[Author],
    permission: Permission,
) -> bool {
    authors.iter().all(|author| {
        state
            .member(&author.public_key)
            .map_or(false, |member| member.has_permission(permission))
    })
}

/// The quorum rule for admin decisions: every author is a current admin
/// and the authors form a strict majority of all admins.
///
/// One admin decides alone, two admins must both sign, three need two.
pub fn is_valid_admin_decision(state: &TrustChainState, authors: &[Author]) -> bool {
    if !all_authors_are_admins(state, authors) {
        return false;
    }
    authors.len() * 2 > get_admin_count(state)
}
