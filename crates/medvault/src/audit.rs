//! Audit logger.
//!
//! Appends one entry per security-relevant action. Appending never fails
//! the operation that triggered it: the action has already taken effect, so
//! a failed write is logged at `error` and handed back as an
//! [`OperationWarning::AuditWriteFailed`] for the caller to escalate.

use std::sync::Arc;

use medvault_core::{AuditAction, AuditLogEntry, Clock, LedgerResult, PrincipalId};
use medvault_store::Store;

use crate::outcome::OperationWarning;

/// Writes audit entries to the store.
pub struct AuditLogger<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    ledger_summary: bool,
}

impl<S: Store> AuditLogger<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, ledger_summary: bool) -> Self {
        Self {
            store,
            clock,
            ledger_summary,
        }
    }

    /// Append an entry. Returns a warning instead of an error on failure.
    pub async fn append(
        &self,
        actor: impl Into<String>,
        subject: &PrincipalId,
        action: AuditAction,
        details: impl Into<String>,
        ledger: Vec<LedgerResult>,
    ) -> Option<OperationWarning> {
        let mut details = details.into();
        if self.ledger_summary && !ledger.is_empty() {
            let confirmed = ledger.iter().filter(|r| r.success()).count();
            details.push_str(&format!("; ledger {}/{} confirmed", confirmed, ledger.len()));
        }

        let entry = AuditLogEntry {
            actor: actor.into(),
            subject: subject.clone(),
            action,
            details,
            ledger,
            timestamp: self.clock.now(),
        };

        match self.store.append_audit(&entry).await {
            Ok(seq) => {
                tracing::debug!(seq, action = %action, subject = %subject, "audit entry appended");
                None
            }
            Err(e) => {
                tracing::error!(
                    action = %action,
                    subject = %subject,
                    actor = %entry.actor,
                    error = %e,
                    "failed to persist audit entry"
                );
                Some(OperationWarning::AuditWriteFailed {
                    action,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Entries about `subject`, in append order.
    pub async fn entries(&self, subject: &PrincipalId) -> medvault_store::Result<Vec<AuditLogEntry>> {
        self.store.list_audit(subject).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medvault_core::{DocumentId, LedgerStatus, ManualClock, TxRef};
    use medvault_store::MemoryStore;

    #[tokio::test]
    async fn test_append_with_ledger_summary() {
        let store = Arc::new(MemoryStore::new());
        let logger = AuditLogger::new(Arc::clone(&store), Arc::new(ManualClock::new(42)), true);
        let owner = PrincipalId::new("patient").unwrap();
        let doc = DocumentId::from_bytes([3; 16]);

        let warning = logger
            .append(
                "patient",
                &owner,
                AuditAction::ConsentRevoked,
                "revoked doctor",
                vec![
                    LedgerResult::confirmed(doc, TxRef("0xaa".into())),
                    LedgerResult::failed(doc, LedgerStatus::Unavailable, None),
                ],
            )
            .await;
        assert!(warning.is_none());

        let entries = logger.entries(&owner).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].details, "revoked doctor; ledger 1/2 confirmed");
        assert_eq!(entries[0].timestamp, 42);
        assert!(!entries[0].ledger_fully_confirmed());
    }

    #[tokio::test]
    async fn test_no_summary_without_ledger_calls() {
        let store = Arc::new(MemoryStore::new());
        let logger = AuditLogger::new(store, Arc::new(ManualClock::new(0)), true);
        let owner = PrincipalId::new("patient").unwrap();

        logger
            .append("doctor", &owner, AuditAction::AccessRequest, "asked", Vec::new())
            .await;
        assert_eq!(logger.entries(&owner).await.unwrap()[0].details, "asked");
    }
}
