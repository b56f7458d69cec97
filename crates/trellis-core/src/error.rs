//! Error types for the trust chain core.

use thiserror::Error;

/// Low-level cryptographic failures.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,
}

/// A rule violation while validating or folding a chain.
///
/// Any of these aborts the whole `resolve_state` fold; there are no
/// partially applied chains.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("No events")]
    NoEvents,

    #[error("Invalid chain creation event.")]
    InvalidCreateChainEvent,

    #[error("Only one create event is allowed.")]
    SecondCreateChainEvent,

    #[error("Invalid signature for {0}.")]
    InvalidSignature(String),

    #[error("Missing authors for event.")]
    MissingAuthors,

    #[error("Not allowed to add an admin.")]
    AddAdminDenied,

    #[error("Only one author allowed when adding a non-admin member.")]
    MultiAuthorMemberAdd,

    #[error("Not allowed to add a member.")]
    AddMemberDenied,

    #[error("Not allowed to add a member with canAddMembers.")]
    AddMemberWithCanAddMembersDenied,

    #[error("Not allowed to add a member with canRemoveMembers.")]
    AddMemberWithCanRemoveMembersDenied,

    #[error("Failed to update non-existing member.")]
    UpdateOfUnknownMember,

    #[error("Not allowed to update a member.")]
    UpdateMemberDenied,

    #[error("Not allowed member update.")]
    InvalidMemberUpdate,

    #[error("Failed to remove non-existing member.")]
    RemovalOfUnknownMember,

    #[error("Not allowed to remove an admin.")]
    RemoveAdminDenied,

    #[error("Not allowed to remove a member.")]
    RemoveMemberDenied,

    #[error("Not allowed to remove last member.")]
    RemovalOfLastMember,

    #[error("Not allowed to remove the last admin.")]
    RemovalOfLastAdmin,
}
