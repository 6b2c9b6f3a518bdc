//! Consent engine: the single authority on "may grantee G read document D
//! of owner O, right now".
//!
//! ## Claimed vs confirmed
//!
//! A stored [`ConsentGrant`] is the owner's *claimed* decision. The ledger
//! holds the *confirmed* state. Issue and revoke always complete locally and
//! record what the ledger said; [`ConsentEngine::authorize`] requires both
//! halves and fails closed when the ledger cannot answer.
//!
//! ## Expiry
//!
//! Expiry is lazy. Every read path filters out grants with
//! `now >= expires_at` and deletes them from storage with a conditional
//! delete, so an expired grant is never returned and a concurrent
//! re-approval is never clobbered.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use medvault_core::{
    prune_expired, Clock, ConsentGrant, DocumentId, LedgerRecordId, LedgerResult, LedgerStatus,
    PrincipalId, RequestId,
};
use medvault_ledger::{bounded, record_outcome, LedgerClient, LedgerError};
use medvault_store::{Store, Versioned, WriteResult};

use crate::error::{PermsError, Result};

/// Configuration for the consent engine.
#[derive(Debug, Clone)]
pub struct ConsentConfig {
    /// Deadline for each individual ledger call.
    pub ledger_timeout: Duration,
    /// Longest grant an owner may issue.
    pub max_duration_hours: u32,
    /// Attempts at a compare-and-swap grant update before giving up.
    pub max_update_retries: u32,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            ledger_timeout: Duration::from_secs(10),
            max_duration_hours: 24 * 365,
            max_update_retries: 8,
        }
    }
}

/// Why access was or was not granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    /// No grant for the pair, or it has expired.
    NoActiveGrant,
    /// The grant exists but does not name this document.
    DocumentNotInGrant,
    /// The grant names the document but the document no longer exists.
    DocumentMissing,
    /// The document was never anchored on the ledger, so access cannot be
    /// confirmed.
    DocumentNotAnchored,
    /// The ledger answered "no".
    LedgerDenied,
    /// The ledger could not answer.
    LedgerUnavailable,
}

impl AccessDecision {
    pub fn is_granted(self) -> bool {
        matches!(self, AccessDecision::Granted)
    }
}

/// Result of [`ConsentEngine::issue_grant`].
#[derive(Debug, Clone)]
pub struct IssueReport {
    /// The stored grant, ledger results included.
    pub grant: ConsentGrant,
    /// Store version of the grant record.
    pub version: u64,
    /// The grant this one replaced, if any.
    pub replaced: Option<ConsentGrant>,
    /// Ledger revocations for documents the replaced grant covered and the
    /// new one does not.
    pub released: Vec<LedgerResult>,
}

impl IssueReport {
    /// Documents the ledger did not confirm.
    pub fn unconfirmed(&self) -> impl Iterator<Item = &LedgerResult> {
        self.grant.ledger_results().iter().filter(|r| !r.success())
    }
}

/// Result of [`ConsentEngine::revoke_grant`].
#[derive(Debug, Clone)]
pub struct RevokeReport {
    /// The grant as it was before deletion.
    pub grant: ConsentGrant,
    pub ledger_results: Vec<LedgerResult>,
}

/// One grant touched by [`ConsentEngine::cascade_revoke_document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadedGrant {
    pub grantee_id: PrincipalId,
    pub ledger: LedgerResult,
    /// The document was the grant's last one, so the grant was deleted.
    pub grant_deleted: bool,
}

/// Issues, validates and revokes consent grants.
pub struct ConsentEngine<S: Store, L: LedgerClient> {
    store: Arc<S>,
    ledger: Arc<L>,
    clock: Arc<dyn Clock>,
    config: ConsentConfig,
}

impl<S: Store, L: LedgerClient> ConsentEngine<S, L> {
    /// Create a new engine.
    pub fn new(store: Arc<S>, ledger: Arc<L>, clock: Arc<dyn Clock>, config: ConsentConfig) -> Self {
        Self {
            store,
            ledger,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &ConsentConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ledger helpers
    // ─────────────────────────────────────────────────────────────────────────

    async fn approve_on_ledger(
        &self,
        document_id: DocumentId,
        record: Option<&LedgerRecordId>,
        grantee: &PrincipalId,
    ) -> LedgerResult {
        let Some(record) = record else {
            return LedgerResult::failed(document_id, LedgerStatus::NotAnchored, None);
        };
        let result = bounded(
            self.config.ledger_timeout,
            self.ledger.approve(record, grantee),
        )
        .await;
        let outcome = record_outcome(document_id, result);
        if !outcome.success() {
            tracing::warn!(
                document = %document_id,
                grantee = %grantee,
                status = ?outcome.status,
                "ledger approval not confirmed"
            );
        }
        outcome
    }

    async fn revoke_on_ledger(
        &self,
        document_id: DocumentId,
        record: Option<&LedgerRecordId>,
        grantee: &PrincipalId,
    ) -> LedgerResult {
        let Some(record) = record else {
            return LedgerResult::failed(document_id, LedgerStatus::NotAnchored, None);
        };
        let result = bounded(
            self.config.ledger_timeout,
            self.ledger.revoke(record, grantee),
        )
        .await;
        let outcome = record_outcome(document_id, result);
        if !outcome.success() {
            tracing::warn!(
                document = %document_id,
                grantee = %grantee,
                status = ?outcome.status,
                "ledger revocation not confirmed"
            );
        }
        outcome
    }

    /// Ledger record ids of the owner's current documents.
    async fn ledger_records(
        &self,
        owner: &PrincipalId,
    ) -> Result<BTreeMap<DocumentId, Option<LedgerRecordId>>> {
        Ok(self
            .store
            .list_documents(owner)
            .await?
            .into_iter()
            .map(|d| (d.id, d.ledger_record_id))
            .collect())
    }

    /// Delete an expired grant unless someone replaced it meanwhile.
    async fn drop_expired(&self, grant: &Versioned<ConsentGrant>) -> Result<()> {
        let result = self
            .store
            .delete_grant(
                grant.value.owner_id(),
                grant.value.grantee_id(),
                Some(grant.version),
            )
            .await?;
        tracing::debug!(
            owner = %grant.value.owner_id(),
            grantee = %grant.value.grantee_id(),
            expired_at = grant.value.expires_at(),
            ?result,
            "pruned expired grant"
        );
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Issue / revoke
    // ─────────────────────────────────────────────────────────────────────────

    /// Issue a grant, replacing any grant the pair already has.
    ///
    /// Every document must currently belong to the owner. The ledger is asked
    /// to approve each document; the local grant is stored whatever the
    /// ledger says, with the per-document outcomes in `ledger_results`.
    ///
    /// If the grant cannot be stored, approvals it would have backed are
    /// revoked again and [`PermsError::GrantNotStored`] carries every ledger
    /// result produced on the way.
    pub async fn issue_grant(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
        document_ids: &BTreeSet<DocumentId>,
        duration_hours: u32,
        source_request_id: RequestId,
    ) -> Result<IssueReport> {
        if duration_hours > self.config.max_duration_hours {
            return Err(PermsError::InvalidGrant(format!(
                "duration {}h exceeds maximum {}h",
                duration_hours, self.config.max_duration_hours
            )));
        }

        let records = self.ledger_records(owner).await?;
        if let Some(foreign) = document_ids.iter().find(|id| !records.contains_key(id)) {
            return Err(PermsError::ForeignDocument {
                owner: owner.clone(),
                document_id: *foreign,
            });
        }

        let mut grant = ConsentGrant::issue(
            owner.clone(),
            grantee.clone(),
            document_ids.clone(),
            self.clock.now(),
            duration_hours,
            source_request_id,
        )?;

        let mut results = Vec::with_capacity(document_ids.len());
        for id in document_ids {
            let record = records.get(id).and_then(Option::as_ref);
            results.push(self.approve_on_ledger(*id, record, grantee).await);
        }
        grant.set_ledger_results(results);

        let swap = match self.store.put_grant(&grant).await {
            Ok(swap) => swap,
            Err(source) => {
                let ledger_results = self.roll_back_approvals(&grant, &records).await;
                tracing::error!(
                    owner = %owner,
                    grantee = %grantee,
                    error = %source,
                    "grant write failed after ledger approval"
                );
                return Err(PermsError::GrantNotStored {
                    source,
                    ledger_results,
                });
            }
        };

        let mut released = Vec::new();
        if let Some(replaced) = &swap.replaced {
            for id in replaced.document_ids().difference(document_ids) {
                let record = records.get(id).and_then(Option::as_ref);
                released.push(self.revoke_on_ledger(*id, record, grantee).await);
            }
        }

        tracing::info!(
            owner = %owner,
            grantee = %grantee,
            documents = document_ids.len(),
            expires_at = grant.expires_at(),
            replaced = swap.replaced.is_some(),
            "issued consent grant"
        );

        Ok(IssueReport {
            grant,
            version: swap.version,
            replaced: swap.replaced,
            released,
        })
    }

    /// Undo the ledger approvals of a grant that never reached the store.
    ///
    /// Documents still covered by whatever grant the pair has stored keep
    /// their approval. Returns the approval results followed by the
    /// rollback revocations.
    async fn roll_back_approvals(
        &self,
        grant: &ConsentGrant,
        records: &BTreeMap<DocumentId, Option<LedgerRecordId>>,
    ) -> Vec<LedgerResult> {
        let owner = grant.owner_id();
        let grantee = grant.grantee_id();
        let still_stored = match self.store.get_grant(owner, grantee).await {
            Ok(stored) => stored
                .map(|s| s.value.document_ids().clone())
                .unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "could not re-read grant, rolling back every approval");
                BTreeSet::new()
            }
        };

        let mut ledger_results = grant.ledger_results().to_vec();
        // A timed-out approval may still have landed.
        let landed = grant
            .ledger_results()
            .iter()
            .filter(|r| matches!(r.status, LedgerStatus::Confirmed | LedgerStatus::TimedOut));
        for approved in landed {
            if still_stored.contains(&approved.document_id) {
                continue;
            }
            let record = records.get(&approved.document_id).and_then(Option::as_ref);
            ledger_results.push(
                self.revoke_on_ledger(approved.document_id, record, grantee)
                    .await,
            );
        }
        ledger_results
    }

    /// Revoke the pair's grant.
    ///
    /// The ledger is asked to revoke every document; the grant is deleted
    /// regardless of what it answers.
    pub async fn revoke_grant(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
    ) -> Result<RevokeReport> {
        let grant = self
            .store
            .get_grant(owner, grantee)
            .await?
            .ok_or_else(|| PermsError::GrantNotFound {
                owner: owner.clone(),
                grantee: grantee.clone(),
            })?
            .value;

        let records = self.ledger_records(owner).await?;
        let mut ledger_results = Vec::with_capacity(grant.document_ids().len());
        for id in grant.document_ids() {
            let record = records.get(id).and_then(Option::as_ref);
            ledger_results.push(self.revoke_on_ledger(*id, record, grantee).await);
        }

        self.store.delete_grant(owner, grantee, None).await?;

        tracing::info!(
            owner = %owner,
            grantee = %grantee,
            confirmed = ledger_results.iter().filter(|r| r.success()).count(),
            total = ledger_results.len(),
            "revoked consent grant"
        );

        Ok(RevokeReport {
            grant,
            ledger_results,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authorization
    // ─────────────────────────────────────────────────────────────────────────

    /// Decide whether `grantee` may read `document_id` now.
    ///
    /// Always re-reads the grant; nothing is cached between calls.
    pub async fn authorize_detailed(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
        document_id: &DocumentId,
    ) -> Result<AccessDecision> {
        let Some(stored) = self.store.get_grant(owner, grantee).await? else {
            return Ok(AccessDecision::NoActiveGrant);
        };
        if !stored.value.is_active(self.clock.now()) {
            self.drop_expired(&stored).await?;
            return Ok(AccessDecision::NoActiveGrant);
        }
        if !stored.value.covers(document_id) {
            return Ok(AccessDecision::DocumentNotInGrant);
        }

        let Some(document) = self.store.get_document(owner, document_id).await? else {
            return Ok(AccessDecision::DocumentMissing);
        };
        let Some(record) = document.ledger_record_id else {
            return Ok(AccessDecision::DocumentNotAnchored);
        };

        let check = bounded(
            self.config.ledger_timeout,
            self.ledger.can_access(&record, grantee),
        )
        .await;
        Ok(match check {
            Ok(true) => AccessDecision::Granted,
            Ok(false) => AccessDecision::LedgerDenied,
            Err(LedgerError::Rejected(reason)) => {
                tracing::warn!(record = %record, %reason, "ledger rejected access check");
                AccessDecision::LedgerDenied
            }
            Err(e) => {
                tracing::warn!(record = %record, error = %e, "ledger access check failed, denying");
                AccessDecision::LedgerUnavailable
            }
        })
    }

    /// `true` iff an active grant covers the document AND the ledger
    /// confirms access.
    pub async fn authorize(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
        document_id: &DocumentId,
    ) -> Result<bool> {
        Ok(self
            .authorize_detailed(owner, grantee, document_id)
            .await?
            .is_granted())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Views
    // ─────────────────────────────────────────────────────────────────────────

    /// The pair's grant, if it is still active.
    pub async fn active_grant(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
    ) -> Result<Option<ConsentGrant>> {
        match self.store.get_grant(owner, grantee).await? {
            Some(stored) if stored.value.is_active(self.clock.now()) => Ok(Some(stored.value)),
            Some(stored) => {
                self.drop_expired(&stored).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// The owner's active grants. Expired ones are deleted on the way.
    pub async fn list_active_grants(&self, owner: &PrincipalId) -> Result<Vec<ConsentGrant>> {
        let stored = self.store.list_grants(owner).await?;
        let pruned = prune_expired(stored, self.clock.now());

        for expired in &pruned.expired {
            self.drop_expired(expired).await?;
        }

        Ok(pruned.active.into_iter().map(|g| g.value).collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cascade
    // ─────────────────────────────────────────────────────────────────────────

    /// Remove a document from every grant of its owner.
    ///
    /// For each grant naming the document: revoke on the ledger, then drop
    /// the id with a compare-and-swap update, deleting the grant if it was
    /// the last document. Grants already updated stay updated when a later
    /// one fails; [`PermsError::CascadeIncomplete`] carries the ledger
    /// results so far, and running the cascade again finishes the job.
    pub async fn cascade_revoke_document(
        &self,
        owner: &PrincipalId,
        document_id: &DocumentId,
        record: Option<&LedgerRecordId>,
    ) -> Result<Vec<CascadedGrant>> {
        let affected: Vec<PrincipalId> = self
            .store
            .list_grants(owner)
            .await?
            .into_iter()
            .filter(|g| g.value.covers(document_id))
            .map(|g| g.value.grantee_id().clone())
            .collect();

        let mut cascaded: Vec<CascadedGrant> = Vec::with_capacity(affected.len());
        for grantee in affected {
            let ledger = self.revoke_on_ledger(*document_id, record, &grantee).await;
            let grant_deleted = match self.remove_from_grant(owner, &grantee, document_id).await {
                Ok(deleted) => deleted,
                Err(e) => {
                    let mut ledger_results: Vec<LedgerResult> =
                        cascaded.into_iter().map(|c| c.ledger).collect();
                    ledger_results.push(ledger);
                    return Err(PermsError::CascadeIncomplete {
                        document_id: *document_id,
                        ledger_results,
                        source: Box::new(e),
                    });
                }
            };

            tracing::info!(
                owner = %owner,
                grantee = %grantee,
                document = %document_id,
                grant_deleted,
                "cascaded document revocation"
            );
            cascaded.push(CascadedGrant {
                grantee_id: grantee,
                ledger,
                grant_deleted,
            });
        }

        Ok(cascaded)
    }

    /// Returns whether the grant ended up deleted.
    async fn remove_from_grant(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
        document_id: &DocumentId,
    ) -> Result<bool> {
        for _ in 0..self.config.max_update_retries {
            let Some(stored) = self.store.get_grant(owner, grantee).await? else {
                return Ok(false);
            };
            let mut grant = stored.value;
            if !grant.remove_document(document_id) {
                return Ok(false);
            }

            let deleted = grant.is_empty();
            let result = if deleted {
                self.store
                    .delete_grant(owner, grantee, Some(stored.version))
                    .await?
            } else {
                self.store.update_grant(&grant, stored.version).await?
            };

            match result {
                WriteResult::Written { .. } => return Ok(deleted),
                WriteResult::Missing => return Ok(false),
                WriteResult::Conflict { current } => {
                    tracing::debug!(
                        owner = %owner,
                        grantee = %grantee,
                        expected = stored.version,
                        current,
                        "grant changed during cascade, retrying"
                    );
                }
            }
        }

        Err(PermsError::Contended {
            attempts: self.config.max_update_retries,
        })
    }
}
