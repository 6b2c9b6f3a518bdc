//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::collections::BTreeSet;
use std::sync::Arc;

use medvault::{Approval, Vault, VaultConfig};
use medvault_core::{DocumentId, DocumentSelection, ManualClock, NewDocument, PrincipalId};
use medvault_ledger::MemoryLedger;
use medvault_perms::SealedCipher;
use medvault_store::{MemoryStore, Store};

/// Where every fixture clock starts: 2023-11-14T22:13:20Z.
pub const START: i64 = 1_700_000_000_000;

/// A vault with handles on the pieces tests need to poke.
pub struct TestVault<S: Store = MemoryStore> {
    pub vault: Vault<S, MemoryLedger, SealedCipher>,
    pub store: Arc<S>,
    pub ledger: Arc<MemoryLedger>,
    pub clock: Arc<ManualClock>,
}

impl TestVault<MemoryStore> {
    /// A vault over a fresh in-memory store.
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl Default for TestVault<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Store> TestVault<S> {
    /// A vault over `store` with the default configuration.
    pub fn with_store(store: S) -> Self {
        Self::with_config(store, VaultConfig::default())
    }

    pub fn with_config(store: S, config: VaultConfig) -> Self {
        let store = Arc::new(store);
        let ledger = Arc::new(MemoryLedger::new());
        let clock = Arc::new(ManualClock::new(START));
        let vault = Vault::from_parts(
            Arc::clone(&store),
            Arc::clone(&ledger),
            Arc::new(SealedCipher::generate()),
            clock.clone(),
            config,
        );
        Self {
            vault,
            store,
            ledger,
            clock,
        }
    }

    /// Build a principal id, panicking on an invalid literal.
    pub fn principal(&self, id: &str) -> PrincipalId {
        PrincipalId::new(id).expect("valid principal id")
    }

    /// Upload a lab document and return its id.
    pub async fn upload(&self, owner: &PrincipalId, name: &str, content: &[u8]) -> DocumentId {
        self.vault
            .upload(owner, NewDocument::new(name, "lab", content.to_vec()))
            .await
            .expect("upload")
            .into_value()
            .id
    }

    /// Upload `count` documents named `doc-0.pdf`, `doc-1.pdf`, ...
    pub async fn upload_many(&self, owner: &PrincipalId, count: usize) -> Vec<DocumentId> {
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let content = format!("content of document {}", i);
            ids.push(self.upload(owner, &format!("doc-{}.pdf", i), content.as_bytes()).await);
        }
        ids
    }

    /// Request everything, then approve `documents` for `hours`.
    pub async fn grant(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
        documents: &[DocumentId],
        hours: u32,
    ) -> Approval {
        let request = self
            .vault
            .submit_request(grantee, owner, DocumentSelection::All, hours)
            .await
            .expect("submit request")
            .into_value();
        let selected: BTreeSet<DocumentId> = documents.iter().copied().collect();
        self.vault
            .approve_request(owner, &request.id, &selected, hours)
            .await
            .expect("approve request")
            .into_value()
    }
}

/// Route `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
