//! Emergency access.
//!
//! An owner-issued code that exposes a read-only snapshot of all the owner's
//! documents to whoever holds it. Resolution does not consult the consent
//! engine or the ledger. One bad document never blocks the rest of the
//! snapshot.

use medvault_core::{AuditAction, DocumentMeta, EmergencyCode, PrincipalId};
use medvault_ledger::LedgerClient;
use medvault_perms::EncryptionService;
use medvault_store::Store;

use crate::error::{Result, VaultError};
use crate::outcome::Outcome;
use crate::vault::Vault;

/// Content of one document in a snapshot.
#[derive(Clone, PartialEq, Eq)]
pub enum SnapshotContent {
    Available(Vec<u8>),
    /// The document could not be decrypted.
    Corrupted(String),
}

impl std::fmt::Debug for SnapshotContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotContent::Available(bytes) => write!(f, "Available({} bytes)", bytes.len()),
            SnapshotContent::Corrupted(reason) => write!(f, "Corrupted({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub meta: DocumentMeta,
    pub content: SnapshotContent,
}

/// Everything an emergency code unlocks, as of `taken_at`.
#[derive(Debug, Clone)]
pub struct EmergencySnapshot {
    pub owner_id: PrincipalId,
    pub taken_at: i64,
    pub documents: Vec<SnapshotEntry>,
}

impl EmergencySnapshot {
    pub fn corrupted_count(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| matches!(d.content, SnapshotContent::Corrupted(_)))
            .count()
    }
}

/// A code as it appears in logs: enough to tell codes apart, not enough
/// to use one.
fn masked(code: &str) -> String {
    let visible: String = code.chars().take(4).collect();
    format!("{}****", visible)
}

fn audit_actor(code: &str) -> String {
    format!("emergency:{}", masked(code))
}

impl<S: Store, L: LedgerClient, E: EncryptionService> Vault<S, L, E> {
    /// Mint a new emergency code for `owner`, revoking any valid one.
    pub async fn generate_emergency_code(
        &self,
        owner: &PrincipalId,
    ) -> Result<Outcome<EmergencyCode>> {
        if !self.store.owner_exists(owner).await? {
            return Err(VaultError::NotFound(format!("owner {}", owner)));
        }

        let code = EmergencyCode::generate(
            owner.clone(),
            self.config.emergency_code_len,
            self.now(),
        );
        let revoked = self.store.rotate_emergency_code(&code).await?;

        tracing::info!(owner = %owner, revoked = revoked.len(), "generated emergency code");

        let details = format!(
            "generated code {}; revoked {} previous",
            masked(&code.code),
            revoked.len()
        );
        let mut outcome = Outcome::new(code);
        outcome.warn_if(
            self.audit
                .append(owner.as_str(), owner, AuditAction::EmergencyGenerate, details, Vec::new())
                .await,
        );
        Ok(outcome)
    }

    /// Resolve a code to a snapshot of its owner's documents.
    ///
    /// Returns `None` for unknown or revoked codes. Input is normalized, so
    /// `abcd-efgh-jkmn` matches `ABCDEFGHJKMN`.
    pub async fn resolve_emergency_code(
        &self,
        input: &str,
    ) -> Result<Option<Outcome<EmergencySnapshot>>> {
        let normalized = EmergencyCode::normalize(input);
        if normalized.is_empty() {
            return Ok(None);
        }
        let code = match self.store.get_emergency_code(&normalized).await? {
            Some(code) if code.is_valid() => code,
            Some(_) => {
                tracing::warn!("revoked emergency code presented");
                return Ok(None);
            }
            None => {
                tracing::warn!("unknown emergency code presented");
                return Ok(None);
            }
        };

        let owner = code.owner_id;
        let mut documents = Vec::new();
        for document in self.store.list_documents(&owner).await? {
            let content = match self.decrypt_document(&document).await {
                Ok(bytes) => SnapshotContent::Available(bytes),
                Err(e) => SnapshotContent::Corrupted(e.to_string()),
            };
            documents.push(SnapshotEntry {
                meta: document.meta(),
                content,
            });
        }

        let snapshot = EmergencySnapshot {
            owner_id: owner.clone(),
            taken_at: self.now(),
            documents,
        };

        tracing::warn!(
            owner = %owner,
            documents = snapshot.documents.len(),
            corrupted = snapshot.corrupted_count(),
            "emergency snapshot released"
        );

        let details = format!(
            "released {} documents ({} corrupted)",
            snapshot.documents.len(),
            snapshot.corrupted_count()
        );
        let mut outcome = Outcome::new(snapshot);
        outcome.warn_if(
            self.audit
                .append(
                    audit_actor(&normalized),
                    &owner,
                    AuditAction::EmergencyAccess,
                    details,
                    Vec::new(),
                )
                .await,
        );
        Ok(Some(outcome))
    }

    /// Revoke one of `owner`'s codes.
    ///
    /// Idempotent: revoking an already-revoked code returns `false` and
    /// writes nothing. Another owner's code is refused.
    pub async fn revoke_emergency_code(
        &self,
        owner: &PrincipalId,
        input: &str,
    ) -> Result<Outcome<bool>> {
        let normalized = EmergencyCode::normalize(input);
        let mut code = self
            .store
            .get_emergency_code(&normalized)
            .await?
            .ok_or_else(|| VaultError::NotFound("emergency code".into()))?;
        if &code.owner_id != owner {
            return Err(VaultError::NotOwner {
                principal: owner.clone(),
            });
        }

        if !code.revoke(self.now()) {
            return Ok(Outcome::new(false));
        }
        self.store.put_emergency_code(&code).await?;

        tracing::info!(owner = %owner, "revoked emergency code");

        let mut outcome = Outcome::new(true);
        outcome.warn_if(
            self.audit
                .append(
                    owner.as_str(),
                    owner,
                    AuditAction::EmergencyRevoke,
                    format!("revoked code {}", masked(&code.code)),
                    Vec::new(),
                )
                .await,
        );
        Ok(outcome)
    }

    /// The owner's currently valid code, if any.
    pub async fn active_emergency_code(&self, owner: &PrincipalId) -> Result<Option<EmergencyCode>> {
        Ok(self
            .store
            .list_emergency_codes(owner)
            .await?
            .into_iter()
            .find(EmergencyCode::is_valid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_actor_masks_code() {
        assert_eq!(audit_actor("ABCDEFGHJKMN"), "emergency:ABCD****");
        assert_eq!(audit_actor("AB"), "emergency:AB****");
    }
}
