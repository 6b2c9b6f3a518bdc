//! Error types for the consent engine and encryption service.

use medvault_core::{DocumentId, LedgerResult, PrincipalId};
use thiserror::Error;

/// A sealed document could not be opened.
///
/// The message never says which step failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("decryption failed: {0}")]
pub struct DecryptError(pub String);

/// Errors that can occur during consent and encryption operations.
#[derive(Debug, Error)]
pub enum PermsError {
    /// Input rejected before any state change.
    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    /// A requested document is not one of the owner's documents.
    #[error("document {document_id} does not belong to {owner}")]
    ForeignDocument {
        owner: PrincipalId,
        document_id: DocumentId,
    },

    /// No grant exists for the pair.
    #[error("no grant from {owner} to {grantee}")]
    GrantNotFound {
        owner: PrincipalId,
        grantee: PrincipalId,
    },

    /// A compare-and-swap update kept losing to concurrent writers.
    #[error("gave up after {attempts} conflicting updates")]
    Contended { attempts: u32 },

    /// The ledger was asked to approve but the grant could not be stored.
    /// Approvals no stored grant backs have been revoked again.
    #[error("grant was not stored: {source}")]
    GrantNotStored {
        #[source]
        source: medvault_store::StoreError,
        ledger_results: Vec<LedgerResult>,
    },

    /// A document cascade stopped before every grant was updated.
    #[error("cascade for document {document_id} stopped: {source}")]
    CascadeIncomplete {
        document_id: DocumentId,
        ledger_results: Vec<LedgerResult>,
        #[source]
        source: Box<PermsError>,
    },

    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Decryption error.
    #[error(transparent)]
    Decryption(#[from] DecryptError),

    /// Core model invariant violated.
    #[error("core error: {0}")]
    CoreError(#[from] medvault_core::CoreError),

    /// Storage failure.
    #[error("store error: {0}")]
    StoreError(#[from] medvault_store::StoreError),
}

impl PermsError {
    /// Ledger calls that had already been made when the operation failed.
    pub fn ledger_results(&self) -> &[LedgerResult] {
        match self {
            PermsError::GrantNotStored { ledger_results, .. }
            | PermsError::CascadeIncomplete { ledger_results, .. } => ledger_results,
            _ => &[],
        }
    }
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
