//! Consent grants.
//!
//! A grant authorizes one grantee to read a fixed set of one owner's
//! documents until it expires. There is at most one grant per
//! `(grantee, owner)` pair; re-approval replaces it wholesale.
//!
//! A grant is the *claimed* half of authorization. The *confirmed* half lives
//! on the ledger; `ledger_results` records what the ledger said when the
//! grant was issued, but readers must re-ask the ledger on every access.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::time::HOUR_MS;
use crate::types::{DocumentId, PrincipalId, RequestId, TxRef};

/// What the ledger said about one document during issue or revoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    /// The ledger accepted the transaction.
    Confirmed,
    /// The ledger answered and refused.
    Rejected,
    /// The ledger could not be reached.
    Unavailable,
    /// The call did not finish in time; its effect on the ledger is unknown.
    TimedOut,
    /// The document has no ledger record, so no call was made.
    NotAnchored,
}

impl LedgerStatus {
    /// Whether the ledger confirmed the action.
    pub fn is_confirmed(self) -> bool {
        matches!(self, LedgerStatus::Confirmed)
    }
}

/// Per-document ledger outcome, kept for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerResult {
    pub document_id: DocumentId,
    /// Transaction reference, when the ledger returned one.
    pub tx_ref: Option<TxRef>,
    pub status: LedgerStatus,
}

impl LedgerResult {
    /// A confirmed ledger transaction.
    pub fn confirmed(document_id: DocumentId, tx_ref: TxRef) -> Self {
        Self {
            document_id,
            tx_ref: Some(tx_ref),
            status: LedgerStatus::Confirmed,
        }
    }

    /// A failed or unknown ledger transaction.
    pub fn failed(document_id: DocumentId, status: LedgerStatus, tx_ref: Option<TxRef>) -> Self {
        Self {
            document_id,
            tx_ref,
            status,
        }
    }

    /// Whether the ledger confirmed this document.
    pub fn success(&self) -> bool {
        self.status.is_confirmed()
    }
}

/// A time-bound, document-scoped authorization.
///
/// Construct with [`ConsentGrant::issue`], which enforces
/// `expires_at > granted_at` and a non-empty document set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentGrant {
    grantee_id: PrincipalId,
    owner_id: PrincipalId,
    document_ids: BTreeSet<DocumentId>,
    granted_at: i64,
    expires_at: i64,
    source_request_id: RequestId,
    ledger_results: Vec<LedgerResult>,
}

impl ConsentGrant {
    /// Issue a grant valid for `duration_hours` from `now`.
    pub fn issue(
        owner_id: PrincipalId,
        grantee_id: PrincipalId,
        document_ids: BTreeSet<DocumentId>,
        now: i64,
        duration_hours: u32,
        source_request_id: RequestId,
    ) -> Result<Self> {
        if owner_id == grantee_id {
            return Err(CoreError::SelfGrant);
        }
        if document_ids.is_empty() {
            return Err(CoreError::EmptyGrant);
        }
        if duration_hours == 0 {
            return Err(CoreError::ZeroDuration);
        }

        let expires_at = i64::from(duration_hours)
            .checked_mul(HOUR_MS)
            .and_then(|d| now.checked_add(d))
            .ok_or(CoreError::InvalidExpiry {
                granted_at: now,
                expires_at: i64::MAX,
            })?;

        Self::from_parts(
            owner_id,
            grantee_id,
            document_ids,
            now,
            expires_at,
            source_request_id,
        )
    }

    /// Build a grant from explicit timestamps.
    pub fn from_parts(
        owner_id: PrincipalId,
        grantee_id: PrincipalId,
        document_ids: BTreeSet<DocumentId>,
        granted_at: i64,
        expires_at: i64,
        source_request_id: RequestId,
    ) -> Result<Self> {
        if expires_at <= granted_at {
            return Err(CoreError::InvalidExpiry {
                granted_at,
                expires_at,
            });
        }
        if document_ids.is_empty() {
            return Err(CoreError::EmptyGrant);
        }

        Ok(Self {
            grantee_id,
            owner_id,
            document_ids,
            granted_at,
            expires_at,
            source_request_id,
            ledger_results: Vec::new(),
        })
    }

    pub fn grantee_id(&self) -> &PrincipalId {
        &self.grantee_id
    }

    pub fn owner_id(&self) -> &PrincipalId {
        &self.owner_id
    }

    pub fn document_ids(&self) -> &BTreeSet<DocumentId> {
        &self.document_ids
    }

    pub fn granted_at(&self) -> i64 {
        self.granted_at
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn source_request_id(&self) -> RequestId {
        self.source_request_id
    }

    pub fn ledger_results(&self) -> &[LedgerResult] {
        &self.ledger_results
    }

    /// Active iff `now < expires_at`.
    pub fn is_active(&self, now: i64) -> bool {
        now < self.expires_at
    }

    /// Whether the grant names this document.
    pub fn covers(&self, document_id: &DocumentId) -> bool {
        self.document_ids.contains(document_id)
    }

    /// Replace the recorded ledger outcomes.
    pub fn set_ledger_results(&mut self, results: Vec<LedgerResult>) {
        self.ledger_results = results;
    }

    /// Ledger outcome recorded for a document at issue time.
    pub fn ledger_result_for(&self, document_id: &DocumentId) -> Option<&LedgerResult> {
        self.ledger_results
            .iter()
            .find(|r| &r.document_id == document_id)
    }

    /// Documents whose ledger approval was confirmed at issue time.
    pub fn confirmed_documents(&self) -> BTreeSet<DocumentId> {
        self.ledger_results
            .iter()
            .filter(|r| r.success())
            .map(|r| r.document_id)
            .collect()
    }

    /// Drop a document from the grant. Returns whether it was present.
    pub fn remove_document(&mut self, document_id: &DocumentId) -> bool {
        let removed = self.document_ids.remove(document_id);
        if removed {
            self.ledger_results.retain(|r| &r.document_id != document_id);
        }
        removed
    }

    /// True once every document has been removed.
    pub fn is_empty(&self) -> bool {
        self.document_ids.is_empty()
    }
}

impl AsRef<ConsentGrant> for ConsentGrant {
    fn as_ref(&self) -> &ConsentGrant {
        self
    }
}

/// Grants split by expiry.
#[derive(Debug)]
pub struct Pruned<T> {
    pub active: Vec<T>,
    pub expired: Vec<T>,
}

/// Split grants into active and expired at `now`.
///
/// Pure: the caller decides what to do with the expired set (the consent
/// engine deletes them from storage).
pub fn prune_expired<T, I>(grants: I, now: i64) -> Pruned<T>
where
    T: AsRef<ConsentGrant>,
    I: IntoIterator<Item = T>,
{
    let (active, expired) = grants
        .into_iter()
        .partition(|g| g.as_ref().is_active(now));
    Pruned { active, expired }
}
