//! # MedVault Ledger
//!
//! Client interface to the external ledger that anchors documents and
//! records grant approvals and revocations.
//!
//! ## Overview
//!
//! The ledger is the *confirmed* half of authorization. Every upload is
//! anchored by content hash, every approval and revocation is recorded per
//! `(ledger record, grantee)` pair, and [`LedgerClient::can_access`] is the
//! authoritative answer consulted on every read.
//!
//! The wire format belongs to the ledger; this crate only fixes the
//! interface and the way failures map to [`LedgerStatus`] values.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use medvault_core::{ContentHash, PrincipalId};
//! use medvault_ledger::{bounded, LedgerClient, MemoryLedger};
//!
//! async fn example() -> medvault_ledger::Result<()> {
//!     let ledger = MemoryLedger::new();
//!     let anchor = ledger.record_upload(&ContentHash::hash(b"scan")).await?;
//!
//!     let doctor = PrincipalId::new("doctor-1").unwrap();
//!     let outcome = bounded(
//!         Duration::from_secs(5),
//!         ledger.approve(&anchor.ledger_record_id, &doctor),
//!     )
//!     .await?;
//!     assert!(outcome.success);
//!     Ok(())
//! }
//! ```
//!
//! [`LedgerStatus`]: medvault_core::LedgerStatus

pub mod client;
pub mod error;

pub use client::memory::{LedgerCall, MemoryLedger};
pub use client::{bounded, record_outcome, LedgerClient, TxOutcome, UploadAnchor};
pub use error::{LedgerError, Result};
