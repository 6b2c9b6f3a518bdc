//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "migrated vault schema");
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Owners: the aggregate roots everything else hangs off
        CREATE TABLE owners (
            owner_id TEXT PRIMARY KEY,
            registered_at INTEGER NOT NULL
        );

        -- Encrypted documents, one row per (owner, document)
        CREATE TABLE documents (
            owner_id TEXT NOT NULL,
            document_id BLOB NOT NULL,        -- 16 bytes
            uploaded_at INTEGER NOT NULL,
            body BLOB NOT NULL,               -- CBOR Document (ciphertext inside)
            PRIMARY KEY (owner_id, document_id)
        );

        -- Consent grants: at most one row per (owner, grantee)
        CREATE TABLE grants (
            owner_id TEXT NOT NULL,
            grantee_id TEXT NOT NULL,
            version INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            body BLOB NOT NULL,               -- CBOR ConsentGrant
            PRIMARY KEY (owner_id, grantee_id)
        );

        -- Access requests, never deleted
        CREATE TABLE access_requests (
            request_id BLOB PRIMARY KEY,      -- 16 bytes
            doctor_id TEXT NOT NULL,
            patient_id TEXT NOT NULL,
            status TEXT NOT NULL,
            request_date INTEGER NOT NULL,
            version INTEGER NOT NULL,
            body BLOB NOT NULL                -- CBOR AccessRequest
        );

        -- Audit log, append-only
        CREATE TABLE audit_log (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            subject TEXT NOT NULL,
            action TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            body BLOB NOT NULL                -- CBOR AuditLogEntry
        );

        CREATE TRIGGER audit_log_no_update BEFORE UPDATE ON audit_log
        BEGIN
            SELECT RAISE(ABORT, 'audit log is append-only');
        END;

        CREATE TRIGGER audit_log_no_delete BEFORE DELETE ON audit_log
        BEGIN
            SELECT RAISE(ABORT, 'audit log is append-only');
        END;

        -- Emergency bypass codes
        CREATE TABLE emergency_codes (
            code TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            revoked INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            body BLOB NOT NULL                -- CBOR EmergencyCode
        );

        -- Indexes for common queries
        CREATE INDEX idx_documents_owner ON documents(owner_id, uploaded_at);
        CREATE INDEX idx_requests_patient ON access_requests(patient_id, request_date);
        CREATE INDEX idx_requests_doctor ON access_requests(doctor_id, request_date);
        CREATE INDEX idx_audit_subject ON audit_log(subject, seq);
        CREATE INDEX idx_emergency_owner ON emergency_codes(owner_id, revoked);
        "#,
    )?;

    Ok(())
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "owners",
            "documents",
            "grants",
            "access_requests",
            "audit_log",
            "emergency_codes",
            "schema_migrations",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {}", table);
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_audit_log_rejects_mutation() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        conn.execute(
            "INSERT INTO audit_log (subject, action, timestamp, body) VALUES ('p', 'record.upload', 1, x'00')",
            [],
        )
        .unwrap();

        assert!(conn
            .execute("UPDATE audit_log SET action = 'record.delete'", [])
            .is_err());
        assert!(conn.execute("DELETE FROM audit_log", []).is_err());
    }
}
