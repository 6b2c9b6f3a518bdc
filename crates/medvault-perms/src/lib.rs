//! # MedVault Permissions
//!
//! Consent grants and document encryption.
//!
//! ## Overview
//!
//! - [`ConsentEngine`] issues, validates and revokes grants. It is the only
//!   component that decides whether a grantee may read a document, and it
//!   asks both the local grant and the ledger every time.
//! - [`EncryptionService`] seals document content at rest. [`SealedCipher`]
//!   is the default implementation.
//!
//! ## Encryption Model
//!
//! Each document has its own random ChaCha20-Poly1305 content key. The
//! content key is sealed to the vault's long-lived X25519 key through a
//! one-time ephemeral key agreement, so compromising one envelope reveals
//! nothing about the others.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use medvault_core::{PrincipalId, SystemClock};
//! use medvault_ledger::MemoryLedger;
//! use medvault_perms::{ConsentConfig, ConsentEngine};
//! use medvault_store::MemoryStore;
//!
//! async fn example() -> medvault_perms::Result<()> {
//!     let engine = ConsentEngine::new(
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(MemoryLedger::new()),
//!         Arc::new(SystemClock),
//!         ConsentConfig::default(),
//!     );
//!
//!     let owner = PrincipalId::new("patient-1").unwrap();
//!     let grants = engine.list_active_grants(&owner).await?;
//!     println!("{} active grants", grants.len());
//!     Ok(())
//! }
//! ```

pub mod cipher;
pub mod crypto;
pub mod engine;
pub mod error;

pub use cipher::{EncryptionService, SealedCipher};
pub use crypto::{VaultPublicKey, VaultSecretKey};
pub use engine::{
    AccessDecision, CascadedGrant, ConsentConfig, ConsentEngine, IssueReport, RevokeReport,
};
pub use error::{DecryptError, PermsError, Result};
