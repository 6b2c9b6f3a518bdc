//! # MedVault
//!
//! A patient document vault with consent-gated, ledger-confirmed sharing.
//!
//! ## Overview
//!
//! - **Documents** are encrypted before they are stored and anchored on a
//!   ledger by content hash. Listings never contain ciphertext.
//! - **Access requests** go `pending -> approved | denied`, exactly once.
//!   Approval issues a **consent grant**: a time-bound set of documents for
//!   one grantee.
//! - **Reads** by anyone but the owner need an active grant covering the
//!   document AND ledger confirmation. An unreachable ledger means "no".
//! - **Audit**: every security action is appended to an append-only log,
//!   with the ledger outcome of each document attached.
//! - **Emergency codes** let an owner hand out a one-shot bypass that
//!   unlocks a snapshot of all their documents.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use medvault::{Vault, VaultConfig};
//! use medvault::core::{DocumentSelection, NewDocument, PrincipalId};
//! use medvault::ledger::MemoryLedger;
//! use medvault::perms::SealedCipher;
//! use medvault::store::SqliteStore;
//!
//! async fn example() -> medvault::Result<()> {
//!     let store = SqliteStore::open("vault.db")?;
//!     let vault = Vault::new(store, MemoryLedger::new(), SealedCipher::generate(), VaultConfig::default());
//!
//!     let patient = PrincipalId::new("patient-1").unwrap();
//!     let doctor = PrincipalId::new("doctor-7").unwrap();
//!
//!     let doc = vault
//!         .upload(&patient, NewDocument::new("scan.pdf", "imaging", b"...".to_vec()))
//!         .await?
//!         .into_value();
//!
//!     let request = vault
//!         .submit_request(&doctor, &patient, DocumentSelection::All, 24)
//!         .await?
//!         .into_value();
//!     let selected = [doc.id].into_iter().collect();
//!     let approval = vault.approve_request(&patient, &request.id, &selected, 24).await?;
//!     for warning in &approval.warnings {
//!         eprintln!("escalate: {:?}", warning);
//!     }
//!
//!     let plaintext = vault.read_document(&patient, &doc.id, &doctor).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `medvault::core` - Data model (Document, ConsentGrant, AccessRequest, ...)
//! - `medvault::store` - Storage abstraction and SQLite
//! - `medvault::ledger` - Ledger client abstraction
//! - `medvault::perms` - Consent engine and encryption

pub mod audit;
pub mod config;
pub mod documents;
pub mod emergency;
pub mod error;
pub mod outcome;
pub mod requests;
pub mod vault;

// Re-export component crates
pub use medvault_core as core;
pub use medvault_ledger as ledger;
pub use medvault_perms as perms;
pub use medvault_store as store;

pub use audit::AuditLogger;
pub use config::VaultConfig;
pub use emergency::{EmergencySnapshot, SnapshotContent, SnapshotEntry};
pub use error::{Result, VaultError};
pub use outcome::{OperationWarning, Outcome};
pub use requests::Approval;
pub use vault::Vault;

pub use medvault_core::{
    AccessRequest, AuditAction, AuditLogEntry, ConsentGrant, DocumentId, DocumentMeta,
    DocumentSelection, EmergencyCode, NewDocument, PrincipalId, RequestId, RequestStatus,
};
pub use medvault_perms::AccessDecision;
