//! # MedVault Testkit
//!
//! Testing utilities for MedVault.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: A vault wired to an in-memory ledger and a manual clock
//! - **Generators**: Proptest strategies for principals, documents and
//!   approval sequences
//! - **Faults**: A store wrapper that fails chosen operations on demand
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use medvault_testkit::TestVault;
//!
//! async fn example() {
//!     let t = TestVault::new();
//!     let patient = t.principal("patient");
//!     let doctor = t.principal("doctor");
//!     let docs = t.upload_many(&patient, 3).await;
//!
//!     t.grant(&patient, &doctor, &docs[..2], 24).await;
//!     t.clock.advance_hours(25);
//!     assert!(!t.vault.authorize(&patient, &doctor, &docs[0]).await.unwrap());
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use medvault_testkit::generators::approval_rounds;
//!
//! proptest! {
//!     #[test]
//!     fn one_grant_per_pair(rounds in approval_rounds(4, 6)) {
//!         // replay `rounds` against a TestVault
//!     }
//! }
//! ```

pub mod faulty;
pub mod fixtures;
pub mod generators;

pub use faulty::FaultyStore;
pub use fixtures::{init_tracing, TestVault, START};
pub use generators::{approval_rounds, document_content, principal_id, ApprovalRound};
