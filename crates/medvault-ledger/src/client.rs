//! Ledger client abstraction.
//!
//! The ledger client records uploads, approvals and revocations on an
//! external ledger. Implementations may talk to a chain node, an indexer or
//! anything else that can answer `can_access` authoritatively.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use medvault_core::{
    ContentHash, DocumentId, LedgerRecordId, LedgerResult, LedgerStatus, PrincipalId, TxRef,
};

use crate::error::{LedgerError, Result};

/// Anchor returned by [`LedgerClient::record_upload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadAnchor {
    pub ledger_record_id: LedgerRecordId,
    pub tx_ref: TxRef,
}

/// Outcome of an approve or revoke transaction.
///
/// `success == false` means the ledger processed the call and refused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub tx_ref: TxRef,
    pub success: bool,
}

/// Client for the external ledger.
///
/// Implementations must be thread-safe (Send + Sync). Every call may
/// suspend on I/O; callers bound them with [`bounded`].
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Anchor a document's content hash. Returns the new record id.
    async fn record_upload(&self, hash: &ContentHash) -> Result<UploadAnchor>;

    /// Record that `grantee` may access `record`.
    async fn approve(&self, record: &LedgerRecordId, grantee: &PrincipalId) -> Result<TxOutcome>;

    /// Record that `grantee` may no longer access `record`.
    async fn revoke(&self, record: &LedgerRecordId, grantee: &PrincipalId) -> Result<TxOutcome>;

    /// Authoritative access check.
    async fn can_access(&self, record: &LedgerRecordId, grantee: &PrincipalId) -> Result<bool>;
}

/// Run a ledger call with a deadline.
///
/// An elapsed deadline becomes [`LedgerError::Timeout`]; the call's effect
/// on the ledger is then unknown.
pub async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(LedgerError::Timeout(timeout)),
    }
}

/// Convert an approve/revoke result into the per-document record kept in
/// grants and audit entries.
pub fn record_outcome(document_id: DocumentId, result: Result<TxOutcome>) -> LedgerResult {
    match result {
        Ok(TxOutcome {
            tx_ref,
            success: true,
        }) => LedgerResult::confirmed(document_id, tx_ref),
        Ok(TxOutcome {
            tx_ref,
            success: false,
        }) => LedgerResult::failed(document_id, LedgerStatus::Rejected, Some(tx_ref)),
        Err(e) => LedgerResult::failed(document_id, e.status(), None),
    }
}

/// An in-memory ledger for testing.
///
/// Keeps anchors and access pairs in maps and supports fault injection:
/// taking the whole ledger offline, refusing approvals for chosen records,
/// and adding latency to every call.
pub mod memory {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use tokio::sync::RwLock;

    /// A call the ledger received, for test inspection.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum LedgerCall {
        RecordUpload(ContentHash),
        Approve(LedgerRecordId, PrincipalId),
        Revoke(LedgerRecordId, PrincipalId),
        CanAccess(LedgerRecordId, PrincipalId),
    }

    #[derive(Default)]
    struct LedgerState {
        /// Anchored records and the hash each one commits to.
        records: HashMap<LedgerRecordId, ContentHash>,
        /// `(record, grantee)` pairs with access.
        access: HashSet<(LedgerRecordId, PrincipalId)>,
        /// Transactions issued so far.
        tx_count: u64,
        calls: Vec<LedgerCall>,
        offline: bool,
        refuse_approve: HashSet<LedgerRecordId>,
        latency: Option<Duration>,
    }

    impl LedgerState {
        fn next_tx(&mut self, tag: &[u8]) -> TxRef {
            self.tx_count += 1;
            let mut hasher = blake3::Hasher::new();
            hasher.update(&self.tx_count.to_be_bytes());
            hasher.update(tag);
            TxRef(format!("0x{}", hex::encode(&hasher.finalize().as_bytes()[..16])))
        }
    }

    /// In-memory ledger implementation.
    #[derive(Default)]
    pub struct MemoryLedger {
        state: RwLock<LedgerState>,
    }

    impl MemoryLedger {
        /// Create an empty, reachable ledger.
        pub fn new() -> Self {
            Self::default()
        }

        /// Take the ledger offline (every call fails with `Unavailable`)
        /// or bring it back.
        pub async fn set_available(&self, available: bool) {
            self.state.write().await.offline = !available;
        }

        /// Make every approval for `record` come back refused.
        pub async fn refuse_approvals_for(&self, record: &LedgerRecordId) {
            self.state
                .write()
                .await
                .refuse_approve
                .insert(record.clone());
        }

        /// Delay every call by `latency`.
        pub async fn set_latency(&self, latency: Option<Duration>) {
            self.state.write().await.latency = latency;
        }

        /// Whether the pair currently has access, bypassing fault injection.
        pub async fn has_access(&self, record: &LedgerRecordId, grantee: &PrincipalId) -> bool {
            self.state
                .read()
                .await
                .access
                .contains(&(record.clone(), grantee.clone()))
        }

        /// Every call received so far, in order.
        pub async fn calls(&self) -> Vec<LedgerCall> {
            self.state.read().await.calls.clone()
        }

        /// Log the call, apply latency and check reachability.
        async fn enter(&self, call: LedgerCall) -> Result<()> {
            let latency = {
                let mut state = self.state.write().await;
                state.calls.push(call);
                state.latency
            };
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            if self.state.read().await.offline {
                return Err(LedgerError::Unavailable("ledger offline".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl LedgerClient for MemoryLedger {
        async fn record_upload(&self, hash: &ContentHash) -> Result<UploadAnchor> {
            self.enter(LedgerCall::RecordUpload(*hash)).await?;

            let mut state = self.state.write().await;
            let tx_ref = state.next_tx(hash.as_bytes());
            let record = LedgerRecordId(format!("rec-{}", &tx_ref.0[2..18]));
            state.records.insert(record.clone(), *hash);

            tracing::debug!(record = %record, "anchored upload");
            Ok(UploadAnchor {
                ledger_record_id: record,
                tx_ref,
            })
        }

        async fn approve(&self, record: &LedgerRecordId, grantee: &PrincipalId) -> Result<TxOutcome> {
            self.enter(LedgerCall::Approve(record.clone(), grantee.clone()))
                .await?;

            let mut state = self.state.write().await;
            if !state.records.contains_key(record) {
                return Err(LedgerError::Rejected(format!("unknown record {}", record)));
            }
            let tx_ref = state.next_tx(record.0.as_bytes());
            if state.refuse_approve.contains(record) {
                return Ok(TxOutcome {
                    tx_ref,
                    success: false,
                });
            }
            state.access.insert((record.clone(), grantee.clone()));
            Ok(TxOutcome {
                tx_ref,
                success: true,
            })
        }

        async fn revoke(&self, record: &LedgerRecordId, grantee: &PrincipalId) -> Result<TxOutcome> {
            self.enter(LedgerCall::Revoke(record.clone(), grantee.clone()))
                .await?;

            let mut state = self.state.write().await;
            let tx_ref = state.next_tx(record.0.as_bytes());
            state.access.remove(&(record.clone(), grantee.clone()));
            Ok(TxOutcome {
                tx_ref,
                success: true,
            })
        }

        async fn can_access(&self, record: &LedgerRecordId, grantee: &PrincipalId) -> Result<bool> {
            self.enter(LedgerCall::CanAccess(record.clone(), grantee.clone()))
                .await?;

            Ok(self
                .state
                .read()
                .await
                .access
                .contains(&(record.clone(), grantee.clone())))
        }
    }
}
