//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for MedVault. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking. Entity bodies
//! are stored as CBOR next to the key columns used for lookups.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use medvault_core::{
    AccessRequest, AuditLogEntry, ConsentGrant, Document, DocumentId, EmergencyCode, PrincipalId,
    RequestId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{GrantSwap, Store, Versioned, WriteResult};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Task(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_all<T: DeserializeOwned>(bodies: Vec<Vec<u8>>) -> Result<Vec<T>> {
    bodies.iter().map(|b| decode(b)).collect()
}

fn to_version(raw: i64) -> Result<u64> {
    u64::try_from(raw).map_err(|_| StoreError::InvalidData(format!("negative version {}", raw)))
}

fn query_bodies(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Vec<u8>>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| row.get::<_, Vec<u8>>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn current_grant_version(conn: &Connection, owner: &str, grantee: &str) -> Result<Option<u64>> {
    conn.query_row(
        "SELECT version FROM grants WHERE owner_id = ?1 AND grantee_id = ?2",
        params![owner, grantee],
        |row| row.get::<_, i64>(0),
    )
    .optional()?
    .map(to_version)
    .transpose()
}

#[async_trait]
impl Store for SqliteStore {
    async fn register_owner(&self, owner: &PrincipalId, at: i64) -> Result<bool> {
        let owner = owner.clone();
        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO owners (owner_id, registered_at) VALUES (?1, ?2)",
                params![owner.as_str(), at],
            )?;
            Ok(inserted == 1)
        })
        .await
    }

    async fn owner_exists(&self, owner: &PrincipalId) -> Result<bool> {
        let owner = owner.clone();
        self.run(move |conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM owners WHERE owner_id = ?1",
                    params![owner.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn put_document(&self, document: &Document) -> Result<()> {
        let body = encode(document)?;
        let owner = document.owner_id.clone();
        let id = document.id;
        let uploaded_at = document.uploaded_at;
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO documents (owner_id, document_id, uploaded_at, body)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(owner_id, document_id)
                 DO UPDATE SET uploaded_at = excluded.uploaded_at, body = excluded.body",
                params![owner.as_str(), id.as_bytes().as_slice(), uploaded_at, body],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_document(&self, owner: &PrincipalId, id: &DocumentId) -> Result<Option<Document>> {
        let owner = owner.clone();
        let id = *id;
        self.run(move |conn| {
            let body: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT body FROM documents WHERE owner_id = ?1 AND document_id = ?2",
                    params![owner.as_str(), id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            body.map(|b| decode(&b)).transpose()
        })
        .await
    }

    async fn list_documents(&self, owner: &PrincipalId) -> Result<Vec<Document>> {
        let owner = owner.clone();
        self.run(move |conn| {
            let bodies = query_bodies(
                conn,
                "SELECT body FROM documents WHERE owner_id = ?1 ORDER BY uploaded_at, document_id",
                params![owner.as_str()],
            )?;
            decode_all(bodies)
        })
        .await
    }

    async fn delete_document(&self, owner: &PrincipalId, id: &DocumentId) -> Result<bool> {
        let owner = owner.clone();
        let id = *id;
        self.run(move |conn| {
            let removed = conn.execute(
                "DELETE FROM documents WHERE owner_id = ?1 AND document_id = ?2",
                params![owner.as_str(), id.as_bytes().as_slice()],
            )?;
            Ok(removed == 1)
        })
        .await
    }

    async fn get_grant(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
    ) -> Result<Option<Versioned<ConsentGrant>>> {
        let owner = owner.clone();
        let grantee = grantee.clone();
        self.run(move |conn| {
            let row: Option<(i64, Vec<u8>)> = conn
                .query_row(
                    "SELECT version, body FROM grants WHERE owner_id = ?1 AND grantee_id = ?2",
                    params![owner.as_str(), grantee.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            row.map(|(version, body)| {
                Ok(Versioned {
                    value: decode(&body)?,
                    version: to_version(version)?,
                })
            })
            .transpose()
        })
        .await
    }

    async fn list_grants(&self, owner: &PrincipalId) -> Result<Vec<Versioned<ConsentGrant>>> {
        let owner = owner.clone();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT version, body FROM grants WHERE owner_id = ?1 ORDER BY grantee_id",
            )?;
            let rows = stmt
                .query_map(params![owner.as_str()], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(version, body)| {
                    Ok(Versioned {
                        value: decode(&body)?,
                        version: to_version(version)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn put_grant(&self, grant: &ConsentGrant) -> Result<GrantSwap> {
        let body = encode(grant)?;
        let owner = grant.owner_id().clone();
        let grantee = grant.grantee_id().clone();
        let expires_at = grant.expires_at();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let replaced: Option<Vec<u8>> = tx
                .query_row(
                    "SELECT body FROM grants WHERE owner_id = ?1 AND grantee_id = ?2",
                    params![owner.as_str(), grantee.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            let version: i64 = tx.query_row(
                "INSERT INTO grants (owner_id, grantee_id, version, expires_at, body)
                 VALUES (?1, ?2, 1, ?3, ?4)
                 ON CONFLICT(owner_id, grantee_id) DO UPDATE SET
                     version = grants.version + 1,
                     expires_at = excluded.expires_at,
                     body = excluded.body
                 RETURNING version",
                params![owner.as_str(), grantee.as_str(), expires_at, body],
                |row| row.get(0),
            )?;
            tx.commit()?;
            Ok(GrantSwap {
                version: to_version(version)?,
                replaced: replaced.map(|b| decode(&b)).transpose()?,
            })
        })
        .await
    }

    async fn update_grant(&self, grant: &ConsentGrant, expected_version: u64) -> Result<WriteResult> {
        let body = encode(grant)?;
        let owner = grant.owner_id().clone();
        let grantee = grant.grantee_id().clone();
        let expires_at = grant.expires_at();
        self.run(move |conn| {
            let updated = conn.execute(
                "UPDATE grants SET version = version + 1, expires_at = ?1, body = ?2
                 WHERE owner_id = ?3 AND grantee_id = ?4 AND version = ?5",
                params![
                    expires_at,
                    body,
                    owner.as_str(),
                    grantee.as_str(),
                    expected_version as i64
                ],
            )?;
            if updated == 1 {
                return Ok(WriteResult::Written {
                    version: expected_version + 1,
                });
            }
            Ok(
                match current_grant_version(conn, owner.as_str(), grantee.as_str())? {
                    Some(current) => WriteResult::Conflict { current },
                    None => WriteResult::Missing,
                },
            )
        })
        .await
    }

    async fn delete_grant(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
        expected_version: Option<u64>,
    ) -> Result<WriteResult> {
        let owner = owner.clone();
        let grantee = grantee.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let current = match current_grant_version(&tx, owner.as_str(), grantee.as_str())? {
                Some(v) => v,
                None => return Ok(WriteResult::Missing),
            };
            if let Some(expected) = expected_version {
                if expected != current {
                    return Ok(WriteResult::Conflict { current });
                }
            }
            tx.execute(
                "DELETE FROM grants WHERE owner_id = ?1 AND grantee_id = ?2",
                params![owner.as_str(), grantee.as_str()],
            )?;
            tx.commit()?;
            Ok(WriteResult::Written { version: current })
        })
        .await
    }

    async fn insert_request(&self, request: &AccessRequest) -> Result<()> {
        let body = encode(request)?;
        let id = request.id;
        let doctor = request.doctor_id.clone();
        let patient = request.patient_id.clone();
        let status = request.status.as_str();
        let request_date = request.request_date;
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO access_requests
                    (request_id, doctor_id, patient_id, status, request_date, version, body)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
                params![
                    id.as_bytes().as_slice(),
                    doctor.as_str(),
                    patient.as_str(),
                    status,
                    request_date,
                    body
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_request(&self, id: &RequestId) -> Result<Option<Versioned<AccessRequest>>> {
        let id = *id;
        self.run(move |conn| {
            let row: Option<(i64, Vec<u8>)> = conn
                .query_row(
                    "SELECT version, body FROM access_requests WHERE request_id = ?1",
                    params![id.as_bytes().as_slice()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            row.map(|(version, body)| {
                Ok(Versioned {
                    value: decode(&body)?,
                    version: to_version(version)?,
                })
            })
            .transpose()
        })
        .await
    }

    async fn update_request(
        &self,
        request: &AccessRequest,
        expected_version: u64,
    ) -> Result<WriteResult> {
        let body = encode(request)?;
        let id = request.id;
        let status = request.status.as_str();
        self.run(move |conn| {
            let updated = conn.execute(
                "UPDATE access_requests SET version = version + 1, status = ?1, body = ?2
                 WHERE request_id = ?3 AND version = ?4",
                params![status, body, id.as_bytes().as_slice(), expected_version as i64],
            )?;
            if updated == 1 {
                return Ok(WriteResult::Written {
                    version: expected_version + 1,
                });
            }
            let current: Option<i64> = conn
                .query_row(
                    "SELECT version FROM access_requests WHERE request_id = ?1",
                    params![id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(match current {
                Some(v) => WriteResult::Conflict {
                    current: to_version(v)?,
                },
                None => WriteResult::Missing,
            })
        })
        .await
    }

    async fn list_requests_for_owner(&self, owner: &PrincipalId) -> Result<Vec<AccessRequest>> {
        let owner = owner.clone();
        self.run(move |conn| {
            let bodies = query_bodies(
                conn,
                "SELECT body FROM access_requests WHERE patient_id = ?1
                 ORDER BY request_date, request_id",
                params![owner.as_str()],
            )?;
            decode_all(bodies)
        })
        .await
    }

    async fn list_requests_by_grantee(&self, grantee: &PrincipalId) -> Result<Vec<AccessRequest>> {
        let grantee = grantee.clone();
        self.run(move |conn| {
            let bodies = query_bodies(
                conn,
                "SELECT body FROM access_requests WHERE doctor_id = ?1
                 ORDER BY request_date, request_id",
                params![grantee.as_str()],
            )?;
            decode_all(bodies)
        })
        .await
    }

    async fn append_audit(&self, entry: &AuditLogEntry) -> Result<u64> {
        let body = encode(entry)?;
        let subject = entry.subject.clone();
        let action = entry.action.as_str();
        let timestamp = entry.timestamp;
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO audit_log (subject, action, timestamp, body) VALUES (?1, ?2, ?3, ?4)",
                params![subject.as_str(), action, timestamp, body],
            )?;
            to_version(conn.last_insert_rowid())
        })
        .await
    }

    async fn list_audit(&self, subject: &PrincipalId) -> Result<Vec<AuditLogEntry>> {
        let subject = subject.clone();
        self.run(move |conn| {
            let bodies = query_bodies(
                conn,
                "SELECT body FROM audit_log WHERE subject = ?1 ORDER BY seq",
                params![subject.as_str()],
            )?;
            decode_all(bodies)
        })
        .await
    }

    async fn audit_len(&self) -> Result<u64> {
        self.run(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
            to_version(count)
        })
        .await
    }

    async fn rotate_emergency_code(&self, code: &EmergencyCode) -> Result<Vec<EmergencyCode>> {
        let code = code.clone();
        let body = encode(&code)?;
        self.run(move |conn| {
            let tx = conn.transaction()?;

            let bodies = query_bodies(
                &tx,
                "SELECT body FROM emergency_codes WHERE owner_id = ?1 AND revoked = 0",
                params![code.owner_id.as_str()],
            )?;
            let mut revoked = Vec::new();
            for mut existing in decode_all::<EmergencyCode>(bodies)? {
                existing.revoke(code.created_at);
                tx.execute(
                    "UPDATE emergency_codes SET revoked = 1, body = ?1 WHERE code = ?2",
                    params![encode(&existing)?, existing.code.as_str()],
                )?;
                revoked.push(existing);
            }

            tx.execute(
                "INSERT INTO emergency_codes (code, owner_id, revoked, created_at, body)
                 VALUES (?1, ?2, 0, ?3, ?4)",
                params![code.code.as_str(), code.owner_id.as_str(), code.created_at, body],
            )?;
            tx.commit()?;
            Ok(revoked)
        })
        .await
    }

    async fn get_emergency_code(&self, code: &str) -> Result<Option<EmergencyCode>> {
        let code = code.to_string();
        self.run(move |conn| {
            let body: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT body FROM emergency_codes WHERE code = ?1",
                    params![code],
                    |row| row.get(0),
                )
                .optional()?;
            body.map(|b| decode(&b)).transpose()
        })
        .await
    }

    async fn put_emergency_code(&self, code: &EmergencyCode) -> Result<()> {
        let body = encode(code)?;
        let code = code.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO emergency_codes (code, owner_id, revoked, created_at, body)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(code) DO UPDATE SET revoked = excluded.revoked, body = excluded.body",
                params![
                    code.code.as_str(),
                    code.owner_id.as_str(),
                    code.revoked,
                    code.created_at,
                    body
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_emergency_codes(&self, owner: &PrincipalId) -> Result<Vec<EmergencyCode>> {
        let owner = owner.clone();
        self.run(move |conn| {
            let bodies = query_bodies(
                conn,
                "SELECT body FROM emergency_codes WHERE owner_id = ?1 ORDER BY created_at",
                params![owner.as_str()],
            )?;
            decode_all(bodies)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use bytes::Bytes;
    use medvault_core::{
        AuditAction, ContentHash, DocumentSelection, LedgerRecordId, RequestStatus, HOUR_MS,
    };

    fn principal(s: &str) -> PrincipalId {
        PrincipalId::new(s).unwrap()
    }

    fn make_document(owner: &str, byte: u8, uploaded_at: i64) -> Document {
        Document {
            id: DocumentId::from_bytes([byte; 16]),
            owner_id: principal(owner),
            name: format!("doc-{}", byte),
            category: "lab-report".into(),
            ciphertext: Bytes::from(vec![byte; 32]),
            content_hash: ContentHash::hash(&[byte]),
            ledger_record_id: Some(LedgerRecordId(format!("rec-{}", byte))),
            uploaded_at,
            size_bytes: 1,
        }
    }

    #[tokio::test]
    async fn test_document_roundtrip_and_order() {
        let store = SqliteStore::open_memory().unwrap();
        store.put_document(&make_document("p", 2, 20)).await.unwrap();
        store.put_document(&make_document("p", 1, 10)).await.unwrap();
        store.put_document(&make_document("q", 3, 5)).await.unwrap();

        let docs = store.list_documents(&principal("p")).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0], make_document("p", 1, 10));
        assert_eq!(docs[1].uploaded_at, 20);

        // Re-upload keeps the row, replaces the body.
        let mut updated = make_document("p", 1, 30);
        updated.ciphertext = Bytes::from_static(b"new");
        store.put_document(&updated).await.unwrap();
        let fetched = store
            .get_document(&principal("p"), &updated.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.ciphertext, Bytes::from_static(b"new"));
        assert_eq!(store.list_documents(&principal("p")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_grant_versions() {
        let store = SqliteStore::open_memory().unwrap();
        let grant = ConsentGrant::issue(
            principal("p"),
            principal("d"),
            BTreeSet::from([DocumentId::from_bytes([1; 16])]),
            0,
            2,
            RequestId::generate(),
        )
        .unwrap();

        let first = store.put_grant(&grant).await.unwrap();
        assert_eq!((first.version, first.replaced), (1, None));
        let second = store.put_grant(&grant).await.unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(second.replaced.as_ref(), Some(&grant));

        assert_eq!(
            store.update_grant(&grant, 1).await.unwrap(),
            WriteResult::Conflict { current: 2 }
        );
        assert_eq!(
            store.update_grant(&grant, 2).await.unwrap(),
            WriteResult::Written { version: 3 }
        );

        let fetched = store
            .get_grant(&principal("p"), &principal("d"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.version, 3);
        assert_eq!(fetched.value.expires_at(), 2 * HOUR_MS);

        assert_eq!(
            store
                .delete_grant(&principal("p"), &principal("d"), Some(3))
                .await
                .unwrap(),
            WriteResult::Written { version: 3 }
        );
        assert_eq!(
            store
                .delete_grant(&principal("p"), &principal("d"), None)
                .await
                .unwrap(),
            WriteResult::Missing
        );
    }

    #[tokio::test]
    async fn test_request_update_and_listing() {
        let store = SqliteStore::open_memory().unwrap();
        let mut request = AccessRequest::new(
            principal("doc"),
            principal("pat"),
            DocumentSelection::All,
            24,
            1_000,
        )
        .unwrap();
        store.insert_request(&request).await.unwrap();

        request.deny(2_000).unwrap();
        assert!(store.update_request(&request, 1).await.unwrap().is_written());
        assert_eq!(
            store.update_request(&request, 1).await.unwrap(),
            WriteResult::Conflict { current: 2 }
        );

        let for_owner = store.list_requests_for_owner(&principal("pat")).await.unwrap();
        assert_eq!(for_owner.len(), 1);
        assert_eq!(for_owner[0].status, RequestStatus::Denied);
        let by_grantee = store.list_requests_by_grantee(&principal("doc")).await.unwrap();
        assert_eq!(by_grantee, for_owner);
    }

    #[tokio::test]
    async fn test_audit_append_order() {
        let store = SqliteStore::open_memory().unwrap();
        for (i, action) in [AuditAction::RecordUpload, AuditAction::RecordDelete]
            .into_iter()
            .enumerate()
        {
            let seq = store
                .append_audit(&AuditLogEntry {
                    actor: "p".into(),
                    subject: principal("p"),
                    action,
                    details: String::new(),
                    ledger: Vec::new(),
                    timestamp: i as i64,
                })
                .await
                .unwrap();
            assert_eq!(seq, i as u64 + 1);
        }

        let entries = store.list_audit(&principal("p")).await.unwrap();
        assert_eq!(entries[0].action, AuditAction::RecordUpload);
        assert_eq!(entries[1].action, AuditAction::RecordDelete);
        assert_eq!(store.audit_len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_emergency_code_rotation() {
        let store = SqliteStore::open_memory().unwrap();
        let first = EmergencyCode::generate(principal("p"), 10, 1);
        assert!(store.rotate_emergency_code(&first).await.unwrap().is_empty());

        let second = EmergencyCode::generate(principal("p"), 10, 2);
        let revoked = store.rotate_emergency_code(&second).await.unwrap();
        assert_eq!(revoked.len(), 1);
        assert!(!store
            .get_emergency_code(&first.code)
            .await
            .unwrap()
            .unwrap()
            .is_valid());

        let mut second = store.get_emergency_code(&second.code).await.unwrap().unwrap();
        second.revoke(3);
        store.put_emergency_code(&second).await.unwrap();
        let codes = store.list_emergency_codes(&principal("p")).await.unwrap();
        assert!(codes.iter().all(|c| !c.is_valid()));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            assert!(store.register_owner(&principal("p"), 1).await.unwrap());
            store.put_document(&make_document("p", 7, 1)).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert!(store.owner_exists(&principal("p")).await.unwrap());
        assert!(!store.register_owner(&principal("p"), 2).await.unwrap());
        assert_eq!(store.list_documents(&principal("p")).await.unwrap().len(), 1);
    }
}
