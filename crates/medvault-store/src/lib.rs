//! # MedVault Store
//!
//! Storage abstraction for MedVault. Provides a trait-based interface for
//! per-entity persistence with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! Every entity is stored under its own stable key instead of inside one
//! owner-wide blob:
//!
//! | Entity | Key |
//! |---|---|
//! | `Document` | `(owner_id, document_id)` |
//! | `ConsentGrant` | `(owner_id, grantee_id)` |
//! | `AccessRequest` | `request_id` |
//! | `EmergencyCode` | `code` |
//! | `AuditLogEntry` | append sequence |
//!
//! Grants and requests carry a version. Read-modify-write callers use
//! [`Store::update_grant`] / [`Store::update_request`] with the version they
//! read and retry on [`WriteResult::Conflict`], so two concurrent sessions
//! never silently overwrite each other.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use medvault_store::{SqliteStore, MemoryStore, Store};
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("vault.db").unwrap();
//!
//!     // Or keep everything in memory for tests
//!     let store = MemoryStore::new();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **One grant per pair**: the grant table's primary key is
//!   `(owner_id, grantee_id)`, so a second issue replaces the first.
//! - **Append-only audit**: the SQLite schema rejects `UPDATE`/`DELETE` on
//!   the audit table with triggers; the trait has no mutation method.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{GrantSwap, Store, Versioned, WriteResult};
