//! Error types for the Vault.

use medvault_core::{CoreError, DocumentId, PrincipalId, RequestId, RequestStatus};
use medvault_perms::{AccessDecision, PermsError};
use medvault_store::StoreError;
use thiserror::Error;

/// Errors that can occur during Vault operations.
///
/// Ledger failures never appear here for issue, revoke, upload or delete:
/// those complete locally and report the ledger outcome as a warning.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Bad input, rejected before any state change.
    #[error("validation error: {0}")]
    Validation(String),

    /// Content could not be encrypted.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// The stored ciphertext could not be decrypted.
    #[error("document {document_id} is corrupted")]
    CorruptedDocument { document_id: DocumentId },

    /// The consent gate refused a read.
    #[error("{requester} may not read {document_id}: {decision:?}")]
    AccessDenied {
        requester: PrincipalId,
        document_id: DocumentId,
        decision: AccessDecision,
    },

    /// The caller does not own what it tried to act on.
    #[error("{principal} is not the owner")]
    NotOwner { principal: PrincipalId },

    /// Entity not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Request is already resolved.
    #[error("request {id} is {status}, expected pending")]
    InvalidTransition { id: RequestId, status: RequestStatus },

    /// Concurrent writers kept winning.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<CoreError> for VaultError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidTransition { id, status } => {
                VaultError::InvalidTransition { id, status }
            }
            other => VaultError::Validation(other.to_string()),
        }
    }
}

impl From<PermsError> for VaultError {
    fn from(e: PermsError) -> Self {
        match e {
            PermsError::InvalidGrant(_) | PermsError::ForeignDocument { .. } => {
                VaultError::Validation(e.to_string())
            }
            PermsError::GrantNotFound { .. } => VaultError::NotFound(e.to_string()),
            PermsError::Contended { .. } => VaultError::Conflict(e.to_string()),
            PermsError::EncryptionError(msg) => VaultError::Encryption(msg),
            PermsError::Decryption(d) => VaultError::Encryption(d.to_string()),
            PermsError::CoreError(core) => core.into(),
            PermsError::StoreError(store) => VaultError::Store(store),
            PermsError::GrantNotStored { source, .. } => VaultError::Store(source),
            PermsError::CascadeIncomplete { source, .. } => (*source).into(),
        }
    }
}

/// Result type for Vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
