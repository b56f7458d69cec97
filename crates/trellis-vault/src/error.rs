//! Error types for the vault.

use thiserror::Error;

/// Errors from lockbox handling and encrypted state resolution.
///
/// The clock errors are structural and abort a whole resolution. Bad
/// signatures and failed decryptions of individual entries never surface
/// here; they are folded into the resolution result as soft failures.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Identical clock values detected for encrypted states.")]
    IdenticalClocks,

    #[error("Missing clock in the public data.")]
    MissingClock,

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("member {0} has no registered lockbox public key")]
    MissingLockboxKey(String),
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
