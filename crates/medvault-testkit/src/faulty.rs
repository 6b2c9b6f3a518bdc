//! A store that fails on demand.
//!
//! Wraps any [`Store`] and delegates to it, except for the operations that
//! have been told to fail. Used to check that a failed audit write never
//! rolls back the action it describes, and that a failed grant write leaves
//! nothing half done.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use medvault_core::{
    AccessRequest, AuditLogEntry, ConsentGrant, Document, DocumentId, EmergencyCode, PrincipalId,
    RequestId,
};
use medvault_store::{GrantSwap, Result, Store, StoreError, Versioned, WriteResult};

/// Store wrapper with switchable failures.
#[derive(Debug, Default)]
pub struct FaultyStore<S> {
    inner: S,
    fail_audit: AtomicBool,
    fail_grant_writes: AtomicBool,
}

impl<S: Store> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_audit: AtomicBool::new(false),
            fail_grant_writes: AtomicBool::new(false),
        }
    }

    /// Make every audit append fail until switched back.
    pub fn fail_audit(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    /// Make grant puts, updates and deletes fail until switched back.
    pub fn fail_grant_writes(&self, fail: bool) {
        self.fail_grant_writes.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("injected {} failure", what),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: Store> Store for FaultyStore<S> {
    async fn register_owner(&self, owner: &PrincipalId, at: i64) -> Result<bool> {
        self.inner.register_owner(owner, at).await
    }

    async fn owner_exists(&self, owner: &PrincipalId) -> Result<bool> {
        self.inner.owner_exists(owner).await
    }

    async fn put_document(&self, document: &Document) -> Result<()> {
        self.inner.put_document(document).await
    }

    async fn get_document(&self, owner: &PrincipalId, id: &DocumentId) -> Result<Option<Document>> {
        self.inner.get_document(owner, id).await
    }

    async fn list_documents(&self, owner: &PrincipalId) -> Result<Vec<Document>> {
        self.inner.list_documents(owner).await
    }

    async fn delete_document(&self, owner: &PrincipalId, id: &DocumentId) -> Result<bool> {
        self.inner.delete_document(owner, id).await
    }

    async fn get_grant(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
    ) -> Result<Option<Versioned<ConsentGrant>>> {
        self.inner.get_grant(owner, grantee).await
    }

    async fn list_grants(&self, owner: &PrincipalId) -> Result<Vec<Versioned<ConsentGrant>>> {
        self.inner.list_grants(owner).await
    }

    async fn put_grant(&self, grant: &ConsentGrant) -> Result<GrantSwap> {
        Self::check(&self.fail_grant_writes, "grant write")?;
        self.inner.put_grant(grant).await
    }

    async fn update_grant(&self, grant: &ConsentGrant, expected_version: u64) -> Result<WriteResult> {
        Self::check(&self.fail_grant_writes, "grant write")?;
        self.inner.update_grant(grant, expected_version).await
    }

    async fn delete_grant(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
        expected_version: Option<u64>,
    ) -> Result<WriteResult> {
        Self::check(&self.fail_grant_writes, "grant write")?;
        self.inner.delete_grant(owner, grantee, expected_version).await
    }

    async fn insert_request(&self, request: &AccessRequest) -> Result<()> {
        self.inner.insert_request(request).await
    }

    async fn get_request(&self, id: &RequestId) -> Result<Option<Versioned<AccessRequest>>> {
        self.inner.get_request(id).await
    }

    async fn update_request(
        &self,
        request: &AccessRequest,
        expected_version: u64,
    ) -> Result<WriteResult> {
        self.inner.update_request(request, expected_version).await
    }

    async fn list_requests_for_owner(&self, owner: &PrincipalId) -> Result<Vec<AccessRequest>> {
        self.inner.list_requests_for_owner(owner).await
    }

    async fn list_requests_by_grantee(&self, grantee: &PrincipalId) -> Result<Vec<AccessRequest>> {
        self.inner.list_requests_by_grantee(grantee).await
    }

    async fn append_audit(&self, entry: &AuditLogEntry) -> Result<u64> {
        Self::check(&self.fail_audit, "audit")?;
        self.inner.append_audit(entry).await
    }

    async fn list_audit(&self, subject: &PrincipalId) -> Result<Vec<AuditLogEntry>> {
        self.inner.list_audit(subject).await
    }

    async fn audit_len(&self) -> Result<u64> {
        self.inner.audit_len().await
    }

    async fn rotate_emergency_code(&self, code: &EmergencyCode) -> Result<Vec<EmergencyCode>> {
        self.inner.rotate_emergency_code(code).await
    }

    async fn get_emergency_code(&self, code: &str) -> Result<Option<EmergencyCode>> {
        self.inner.get_emergency_code(code).await
    }

    async fn put_emergency_code(&self, code: &EmergencyCode) -> Result<()> {
        self.inner.put_emergency_code(code).await
    }

    async fn list_emergency_codes(&self, owner: &PrincipalId) -> Result<Vec<EmergencyCode>> {
        self.inner.list_emergency_codes(owner).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medvault_core::AuditAction;
    use medvault_store::MemoryStore;

    fn entry() -> AuditLogEntry {
        AuditLogEntry {
            actor: "patient".into(),
            subject: PrincipalId::new("patient").unwrap(),
            action: AuditAction::RecordUpload,
            details: String::new(),
            ledger: Vec::new(),
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn test_audit_failure_is_switchable() {
        let store = FaultyStore::new(MemoryStore::new());

        store.fail_audit(true);
        assert!(matches!(store.append_audit(&entry()).await, Err(StoreError::Io(_))));
        assert_eq!(store.audit_len().await.unwrap(), 0);

        store.fail_audit(false);
        assert_eq!(store.append_audit(&entry()).await.unwrap(), 1);
    }
}
