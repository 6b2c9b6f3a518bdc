//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use medvault_core::{
    AccessRequest, AuditLogEntry, ConsentGrant, Document, DocumentId, EmergencyCode, PrincipalId,
    RequestId,
};

use crate::error::Result;
use crate::traits::{GrantSwap, Store, Versioned, WriteResult};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Registered owners and when they registered.
    owners: HashMap<PrincipalId, i64>,

    /// Documents per owner.
    documents: HashMap<PrincipalId, BTreeMap<DocumentId, Document>>,

    /// Grants keyed by (owner, grantee).
    grants: HashMap<(PrincipalId, PrincipalId), Versioned<ConsentGrant>>,

    /// Requests by id.
    requests: HashMap<RequestId, Versioned<AccessRequest>>,

    /// Audit entries in append order.
    audit: Vec<AuditLogEntry>,

    /// Emergency codes by code.
    emergency_codes: HashMap<String, EmergencyCode>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn grant_key(owner: &PrincipalId, grantee: &PrincipalId) -> (PrincipalId, PrincipalId) {
    (owner.clone(), grantee.clone())
}

#[async_trait]
impl Store for MemoryStore {
    async fn register_owner(&self, owner: &PrincipalId, at: i64) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        if inner.owners.contains_key(owner) {
            return Ok(false);
        }
        inner.owners.insert(owner.clone(), at);
        Ok(true)
    }

    async fn owner_exists(&self, owner: &PrincipalId) -> Result<bool> {
        let inner = self.inner.read().unwrap();
        Ok(inner.owners.contains_key(owner))
    }

    async fn put_document(&self, document: &Document) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner
            .documents
            .entry(document.owner_id.clone())
            .or_default()
            .insert(document.id, document.clone());
        Ok(())
    }

    async fn get_document(&self, owner: &PrincipalId, id: &DocumentId) -> Result<Option<Document>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .documents
            .get(owner)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn list_documents(&self, owner: &PrincipalId) -> Result<Vec<Document>> {
        let inner = self.inner.read().unwrap();
        let mut docs: Vec<Document> = inner
            .documents
            .get(owner)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        docs.sort_by_key(|d| (d.uploaded_at, d.id));
        Ok(docs)
    }

    async fn delete_document(&self, owner: &PrincipalId, id: &DocumentId) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        Ok(inner
            .documents
            .get_mut(owner)
            .and_then(|docs| docs.remove(id))
            .is_some())
    }

    async fn get_grant(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
    ) -> Result<Option<Versioned<ConsentGrant>>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.grants.get(&grant_key(owner, grantee)).cloned())
    }

    async fn list_grants(&self, owner: &PrincipalId) -> Result<Vec<Versioned<ConsentGrant>>> {
        let inner = self.inner.read().unwrap();
        let mut grants: Vec<Versioned<ConsentGrant>> = inner
            .grants
            .iter()
            .filter(|((o, _), _)| o == owner)
            .map(|(_, g)| g.clone())
            .collect();
        grants.sort_by(|a, b| a.value.grantee_id().cmp(b.value.grantee_id()));
        Ok(grants)
    }

    async fn put_grant(&self, grant: &ConsentGrant) -> Result<GrantSwap> {
        let mut inner = self.inner.write().unwrap();
        let key = grant_key(grant.owner_id(), grant.grantee_id());
        let version = inner.grants.get(&key).map(|g| g.version + 1).unwrap_or(1);
        let replaced = inner.grants.insert(
            key,
            Versioned {
                value: grant.clone(),
                version,
            },
        );
        Ok(GrantSwap {
            version,
            replaced: replaced.map(|g| g.value),
        })
    }

    async fn update_grant(&self, grant: &ConsentGrant, expected_version: u64) -> Result<WriteResult> {
        let mut inner = self.inner.write().unwrap();
        let key = grant_key(grant.owner_id(), grant.grantee_id());
        match inner.grants.get_mut(&key) {
            None => Ok(WriteResult::Missing),
            Some(current) if current.version != expected_version => Ok(WriteResult::Conflict {
                current: current.version,
            }),
            Some(current) => {
                current.value = grant.clone();
                current.version += 1;
                Ok(WriteResult::Written {
                    version: current.version,
                })
            }
        }
    }

    async fn delete_grant(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
        expected_version: Option<u64>,
    ) -> Result<WriteResult> {
        let mut inner = self.inner.write().unwrap();
        let key = grant_key(owner, grantee);
        let current = match inner.grants.get(&key) {
            None => return Ok(WriteResult::Missing),
            Some(g) => g.version,
        };
        if let Some(expected) = expected_version {
            if expected != current {
                return Ok(WriteResult::Conflict { current });
            }
        }
        inner.grants.remove(&key);
        Ok(WriteResult::Written { version: current })
    }

    async fn insert_request(&self, request: &AccessRequest) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.requests.insert(
            request.id,
            Versioned {
                value: request.clone(),
                version: 1,
            },
        );
        Ok(())
    }

    async fn get_request(&self, id: &RequestId) -> Result<Option<Versioned<AccessRequest>>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.requests.get(id).cloned())
    }

    async fn update_request(
        &self,
        request: &AccessRequest,
        expected_version: u64,
    ) -> Result<WriteResult> {
        let mut inner = self.inner.write().unwrap();
        match inner.requests.get_mut(&request.id) {
            None => Ok(WriteResult::Missing),
            Some(current) if current.version != expected_version => Ok(WriteResult::Conflict {
                current: current.version,
            }),
            Some(current) => {
                current.value = request.clone();
                current.version += 1;
                Ok(WriteResult::Written {
                    version: current.version,
                })
            }
        }
    }

    async fn list_requests_for_owner(&self, owner: &PrincipalId) -> Result<Vec<AccessRequest>> {
        let inner = self.inner.read().unwrap();
        let mut requests: Vec<AccessRequest> = inner
            .requests
            .values()
            .filter(|r| &r.value.patient_id == owner)
            .map(|r| r.value.clone())
            .collect();
        requests.sort_by_key(|r| (r.request_date, r.id));
        Ok(requests)
    }

    async fn list_requests_by_grantee(&self, grantee: &PrincipalId) -> Result<Vec<AccessRequest>> {
        let inner = self.inner.read().unwrap();
        let mut requests: Vec<AccessRequest> = inner
            .requests
            .values()
            .filter(|r| &r.value.doctor_id == grantee)
            .map(|r| r.value.clone())
            .collect();
        requests.sort_by_key(|r| (r.request_date, r.id));
        Ok(requests)
    }

    async fn append_audit(&self, entry: &AuditLogEntry) -> Result<u64> {
        let mut inner = self.inner.write().unwrap();
        inner.audit.push(entry.clone());
        Ok(inner.audit.len() as u64)
    }

    async fn list_audit(&self, subject: &PrincipalId) -> Result<Vec<AuditLogEntry>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .audit
            .iter()
            .filter(|e| &e.subject == subject)
            .cloned()
            .collect())
    }

    async fn audit_len(&self) -> Result<u64> {
        let inner = self.inner.read().unwrap();
        Ok(inner.audit.len() as u64)
    }

    async fn rotate_emergency_code(&self, code: &EmergencyCode) -> Result<Vec<EmergencyCode>> {
        let mut inner = self.inner.write().unwrap();
        let mut revoked = Vec::new();
        for existing in inner.emergency_codes.values_mut() {
            if existing.owner_id == code.owner_id && existing.revoke(code.created_at) {
                revoked.push(existing.clone());
            }
        }
        inner
            .emergency_codes
            .insert(code.code.clone(), code.clone());
        Ok(revoked)
    }

    async fn get_emergency_code(&self, code: &str) -> Result<Option<EmergencyCode>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.emergency_codes.get(code).cloned())
    }

    async fn put_emergency_code(&self, code: &EmergencyCode) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner
            .emergency_codes
            .insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn list_emergency_codes(&self, owner: &PrincipalId) -> Result<Vec<EmergencyCode>> {
        let inner = self.inner.read().unwrap();
        let mut codes: Vec<EmergencyCode> = inner
            .emergency_codes
            .values()
            .filter(|c| &c.owner_id == owner)
            .cloned()
            .collect();
        codes.sort_by_key(|c| c.created_at);
        Ok(codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use medvault_core::{ContentHash, HOUR_MS};

    fn principal(s: &str) -> PrincipalId {
        PrincipalId::new(s).unwrap()
    }

    fn make_grant(owner: &str, grantee: &str, doc: u8, now: i64) -> ConsentGrant {
        ConsentGrant::issue(
            principal(owner),
            principal(grantee),
            BTreeSet::from([DocumentId::from_bytes([doc; 16])]),
            now,
            1,
            RequestId::generate(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_put_grant_replaces_pair() {
        let store = MemoryStore::new();

        let first = make_grant("p", "d", 1, 0);
        let s1 = store.put_grant(&first).await.unwrap();
        let s2 = store.put_grant(&make_grant("p", "d", 2, 10)).await.unwrap();
        assert_eq!((s1.version, s2.version), (1, 2));
        assert_eq!(s1.replaced, None);
        assert_eq!(s2.replaced, Some(first));

        let grants = store.list_grants(&principal("p")).await.unwrap();
        assert_eq!(grants.len(), 1);
        assert!(grants[0].value.covers(&DocumentId::from_bytes([2; 16])));
    }

    #[tokio::test]
    async fn test_update_grant_detects_conflict() {
        let store = MemoryStore::new();
        let grant = make_grant("p", "d", 1, 0);
        store.put_grant(&grant).await.unwrap();

        let first = store.update_grant(&grant, 1).await.unwrap();
        assert_eq!(first, WriteResult::Written { version: 2 });

        let stale = store.update_grant(&grant, 1).await.unwrap();
        assert_eq!(stale, WriteResult::Conflict { current: 2 });

        let other = make_grant("p", "other", 1, 0);
        assert_eq!(store.update_grant(&other, 1).await.unwrap(), WriteResult::Missing);
    }

    #[tokio::test]
    async fn test_delete_grant_conditional() {
        let store = MemoryStore::new();
        store.put_grant(&make_grant("p", "d", 1, 0)).await.unwrap();

        let stale = store
            .delete_grant(&principal("p"), &principal("d"), Some(7))
            .await
            .unwrap();
        assert_eq!(stale, WriteResult::Conflict { current: 1 });

        let done = store
            .delete_grant(&principal("p"), &principal("d"), None)
            .await
            .unwrap();
        assert!(done.is_written());
        assert!(store
            .get_grant(&principal("p"), &principal("d"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_documents_are_per_owner() {
        let store = MemoryStore::new();
        let doc = Document {
            id: DocumentId::from_bytes([5; 16]),
            owner_id: principal("alice"),
            name: "scan".into(),
            category: "imaging".into(),
            ciphertext: bytes::Bytes::from_static(b"ct"),
            content_hash: ContentHash::hash(b"pt"),
            ledger_record_id: None,
            uploaded_at: HOUR_MS,
            size_bytes: 2,
        };
        store.put_document(&doc).await.unwrap();

        assert!(store
            .get_document(&principal("bob"), &doc.id)
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete_document(&principal("bob"), &doc.id).await.unwrap());
        assert!(store.delete_document(&principal("alice"), &doc.id).await.unwrap());
        assert!(store.list_documents(&principal("alice")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rotate_emergency_code_revokes_previous() {
        let store = MemoryStore::new();
        let first = EmergencyCode::generate(principal("p"), 8, 1);
        store.rotate_emergency_code(&first).await.unwrap();

        let second = EmergencyCode::generate(principal("p"), 8, 2);
        let revoked = store.rotate_emergency_code(&second).await.unwrap();

        assert_eq!(revoked.len(), 1);
        assert_eq!(revoked[0].code, first.code);
        let stored = store.get_emergency_code(&first.code).await.unwrap().unwrap();
        assert!(stored.revoked);
        let codes = store.list_emergency_codes(&principal("p")).await.unwrap();
        assert_eq!(codes.iter().filter(|c| c.is_valid()).count(), 1);
    }
}
