//! # MedVault Core
//!
//! Pure data model for MedVault: encrypted documents, consent grants,
//! access requests, audit entries and emergency codes.
//!
//! This crate contains no I/O, no storage, no networking. Every type here
//! enforces its own invariants at construction time so that the storage and
//! engine layers never have to re-check them.
//!
//! ## Key Types
//!
//! - [`Document`] - An owner's encrypted document (ciphertext never leaves
//!   the store un-decrypted)
//! - [`ConsentGrant`] - A time-bound, document-scoped authorization
//! - [`AccessRequest`] - A grantee's request, `pending -> approved | denied`
//! - [`AuditLogEntry`] - An append-only record of a security action
//! - [`EmergencyCode`] - An owner-issued bypass code
//!
//! ## Time
//!
//! All timestamps are Unix milliseconds (`i64`). Expiry is computed against
//! an injected [`Clock`], never against the wall clock directly.

pub mod audit;
pub mod crypto;
pub mod document;
pub mod emergency;
pub mod error;
pub mod grant;
pub mod request;
pub mod time;
pub mod types;

pub use audit::{AuditAction, AuditLogEntry};
pub use crypto::ContentHash;
pub use document::{Document, DocumentMeta, NewDocument};
pub use emergency::{EmergencyCode, EMERGENCY_CODE_ALPHABET};
pub use error::{CoreError, Result};
pub use grant::{prune_expired, ConsentGrant, LedgerResult, LedgerStatus, Pruned};
pub use request::{AccessRequest, DocumentSelection, RequestStatus};
pub use time::{Clock, ManualClock, SystemClock, HOUR_MS};
pub use types::{DocumentId, LedgerRecordId, PrincipalId, RequestId, TxRef};
