//! The Vault: unified API for MedVault.
//!
//! The Vault brings together storage, the consent engine, the ledger and the
//! encryption service. Document, request and emergency operations live in
//! their own modules as further `impl` blocks on [`Vault`].

use std::sync::Arc;

use medvault_core::{
    AuditAction, AuditLogEntry, Clock, ConsentGrant, DocumentId, PrincipalId, SystemClock,
};
use medvault_ledger::LedgerClient;
use medvault_perms::{AccessDecision, ConsentEngine, EncryptionService};
use medvault_store::Store;

use crate::audit::AuditLogger;
use crate::config::VaultConfig;
use crate::error::Result;
use crate::outcome::Outcome;

/// The main Vault struct.
///
/// Provides a unified API for:
/// - Uploading, listing, reading and deleting documents
/// - Submitting and resolving access requests
/// - Revoking and checking consent grants
/// - Emergency bypass codes
/// - Reading the audit log
pub struct Vault<S: Store, L: LedgerClient, E: EncryptionService> {
    pub(crate) store: Arc<S>,
    pub(crate) ledger: Arc<L>,
    pub(crate) cipher: Arc<E>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) consent: ConsentEngine<S, L>,
    pub(crate) audit: AuditLogger<S>,
    pub(crate) config: VaultConfig,
}

impl<S: Store, L: LedgerClient, E: EncryptionService> Vault<S, L, E> {
    /// Create a vault on the wall clock.
    pub fn new(store: S, ledger: L, cipher: E, config: VaultConfig) -> Self {
        Self::from_parts(
            Arc::new(store),
            Arc::new(ledger),
            Arc::new(cipher),
            Arc::new(SystemClock),
            config,
        )
    }

    /// Create a vault from shared components and an explicit clock.
    pub fn from_parts(
        store: Arc<S>,
        ledger: Arc<L>,
        cipher: Arc<E>,
        clock: Arc<dyn Clock>,
        config: VaultConfig,
    ) -> Self {
        let consent = ConsentEngine::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            Arc::clone(&clock),
            config.consent.clone(),
        );
        let audit = AuditLogger::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            config.audit_ledger_details,
        );

        Self {
            store,
            ledger,
            cipher,
            clock,
            consent,
            audit,
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the consent engine.
    pub fn consent(&self) -> &ConsentEngine<S, L> {
        &self.consent
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.now()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Owner Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Register an owner. Returns `false` if already registered.
    pub async fn register_owner(&self, owner: &PrincipalId) -> Result<bool> {
        let created = self.store.register_owner(owner, self.now()).await?;
        if created {
            tracing::info!(owner = %owner, "registered owner");
        }
        Ok(created)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Consent Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Revoke the grant `owner` gave `grantee`.
    ///
    /// The grant is deleted even if the ledger does not confirm every
    /// revocation; unconfirmed documents come back as warnings.
    pub async fn revoke_grant(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
    ) -> Result<Outcome<ConsentGrant>> {
        let report = self.consent.revoke_grant(owner, grantee).await?;

        let mut outcome = Outcome::new(report.grant);
        outcome.warn_unconfirmed(&report.ledger_results);
        let details = format!(
            "revoked {} from {} documents",
            grantee,
            outcome.value.document_ids().len()
        );
        outcome.warn_if(
            self.audit
                .append(
                    owner.as_str(),
                    owner,
                    AuditAction::ConsentRevoked,
                    details,
                    report.ledger_results,
                )
                .await,
        );
        Ok(outcome)
    }

    /// Whether `grantee` may read the document right now.
    ///
    /// Requires an active grant covering the document AND ledger
    /// confirmation. Fails closed when the ledger is unreachable.
    pub async fn authorize(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
        document_id: &DocumentId,
    ) -> Result<bool> {
        Ok(self.consent.authorize(owner, grantee, document_id).await?)
    }

    /// Like [`Vault::authorize`], with the reason.
    pub async fn authorize_detailed(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
        document_id: &DocumentId,
    ) -> Result<AccessDecision> {
        Ok(self
            .consent
            .authorize_detailed(owner, grantee, document_id)
            .await?)
    }

    /// The owner's active grants. Expired grants are pruned on the way.
    pub async fn list_active_grants(&self, owner: &PrincipalId) -> Result<Vec<ConsentGrant>> {
        Ok(self.consent.list_active_grants(owner).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Audit Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Audit entries about `owner`, oldest first.
    pub async fn audit_log(&self, owner: &PrincipalId) -> Result<Vec<AuditLogEntry>> {
        Ok(self.audit.entries(owner).await?)
    }
}
