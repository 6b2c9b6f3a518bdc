//! Store trait: the abstract interface for MedVault persistence.
//!
//! This trait allows the vault to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use medvault_core::{
    AccessRequest, AuditLogEntry, ConsentGrant, Document, DocumentId, EmergencyCode, PrincipalId,
    RequestId,
};

use crate::error::Result;

/// A stored value together with its record version.
///
/// Versions start at 1 and increase by one on every write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

impl<T> AsRef<T> for Versioned<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Result of a conditional write or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteResult {
    /// The write happened; `version` is the new (or, for a delete, the
    /// removed) version.
    Written { version: u64 },
    /// Someone else wrote first. `current` is the version now stored.
    Conflict { current: u64 },
    /// There was no record to write over.
    Missing,
}

impl WriteResult {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteResult::Written { .. })
    }
}

/// Result of [`Store::put_grant`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantSwap {
    /// Version of the grant just written.
    pub version: u64,
    /// The grant it replaced, read in the same atomic step as the write.
    pub replaced: Option<ConsentGrant>,
}

/// The Store trait: async interface for per-entity persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Keyed writes**: no method rewrites an owner's whole record set.
/// - **Optimistic concurrency**: `update_*` and `delete_grant` take the
///   version the caller read and return `Conflict` instead of clobbering a
///   newer write.
/// - **Last writer wins on issue**: [`Store::put_grant`] replaces the pair's
///   grant unconditionally, which is the defined semantics of re-approval,
///   and hands back exactly the grant it overwrote.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Owner Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Register an owner. Returns `false` if already registered.
    async fn register_owner(&self, owner: &PrincipalId, at: i64) -> Result<bool>;

    /// Check whether an owner is registered.
    async fn owner_exists(&self, owner: &PrincipalId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Document Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace a document (re-upload keeps the id).
    async fn put_document(&self, document: &Document) -> Result<()>;

    /// Get one of an owner's documents.
    async fn get_document(&self, owner: &PrincipalId, id: &DocumentId) -> Result<Option<Document>>;

    /// List an owner's documents, oldest upload first.
    async fn list_documents(&self, owner: &PrincipalId) -> Result<Vec<Document>>;

    /// Hard-delete a document. Returns `false` if it did not exist.
    async fn delete_document(&self, owner: &PrincipalId, id: &DocumentId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Grant Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the grant for a `(owner, grantee)` pair.
    async fn get_grant(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
    ) -> Result<Option<Versioned<ConsentGrant>>>;

    /// List all stored grants for an owner, expired or not.
    async fn list_grants(&self, owner: &PrincipalId) -> Result<Vec<Versioned<ConsentGrant>>>;

    /// Replace the pair's grant unconditionally.
    ///
    /// Returns the new version and the grant that was replaced, so two
    /// concurrent writers each see the other's grant at most once.
    async fn put_grant(&self, grant: &ConsentGrant) -> Result<GrantSwap>;

    /// Replace the pair's grant if it is still at `expected_version`.
    async fn update_grant(&self, grant: &ConsentGrant, expected_version: u64) -> Result<WriteResult>;

    /// Delete the pair's grant, conditionally if `expected_version` is set.
    async fn delete_grant(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
        expected_version: Option<u64>,
    ) -> Result<WriteResult>;

    // ─────────────────────────────────────────────────────────────────────────
    // Request Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new request.
    async fn insert_request(&self, request: &AccessRequest) -> Result<()>;

    /// Get a request by id.
    async fn get_request(&self, id: &RequestId) -> Result<Option<Versioned<AccessRequest>>>;

    /// Replace a request if it is still at `expected_version`.
    async fn update_request(
        &self,
        request: &AccessRequest,
        expected_version: u64,
    ) -> Result<WriteResult>;

    /// Requests addressed to an owner, oldest first.
    async fn list_requests_for_owner(&self, owner: &PrincipalId) -> Result<Vec<AccessRequest>>;

    /// Requests made by a grantee, oldest first.
    async fn list_requests_by_grantee(&self, grantee: &PrincipalId) -> Result<Vec<AccessRequest>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Audit Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append an audit entry. Returns its sequence number (1-based).
    async fn append_audit(&self, entry: &AuditLogEntry) -> Result<u64>;

    /// Entries about a subject, in append order.
    async fn list_audit(&self, subject: &PrincipalId) -> Result<Vec<AuditLogEntry>>;

    /// Total number of entries ever appended.
    async fn audit_len(&self) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Emergency Code Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Atomically revoke every valid code of the owner and store `code`.
    ///
    /// Returns the codes that were revoked.
    async fn rotate_emergency_code(&self, code: &EmergencyCode) -> Result<Vec<EmergencyCode>>;

    /// Look up a code.
    async fn get_emergency_code(&self, code: &str) -> Result<Option<EmergencyCode>>;

    /// Overwrite a code record (used for revocation).
    async fn put_emergency_code(&self, code: &EmergencyCode) -> Result<()>;

    /// All codes an owner ever minted, oldest first.
    async fn list_emergency_codes(&self, owner: &PrincipalId) -> Result<Vec<EmergencyCode>>;
}
