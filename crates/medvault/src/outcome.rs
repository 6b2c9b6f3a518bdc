//! Success values that carry warnings.
//!
//! A mutating operation that took effect locally reports success even when
//! the ledger did not confirm it or the audit entry could not be written.
//! Those conditions travel alongside the value as [`OperationWarning`]s so
//! the caller can escalate them.

use medvault_core::{AuditAction, DocumentId, LedgerResult, LedgerStatus};

/// Something that went wrong after the operation already took effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationWarning {
    /// A grant/revoke ledger transaction was not confirmed for a document.
    LedgerUnconfirmed {
        document_id: DocumentId,
        status: LedgerStatus,
    },
    /// An upload could not be anchored on the ledger.
    LedgerAnchorFailed {
        document_id: DocumentId,
        status: LedgerStatus,
    },
    /// The audit entry for the operation was not persisted.
    AuditWriteFailed { action: AuditAction, reason: String },
}

/// A successful result plus any warnings.
#[derive(Debug, Clone)]
#[must_use]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<OperationWarning>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    /// True if nothing needs escalation.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            warnings: self.warnings,
        }
    }

    pub(crate) fn warn_if(&mut self, warning: Option<OperationWarning>) {
        self.warnings.extend(warning);
    }

    /// Add a `LedgerUnconfirmed` warning for each unconfirmed result.
    pub(crate) fn warn_unconfirmed<'a>(&mut self, results: impl IntoIterator<Item = &'a LedgerResult>) {
        self.warnings.extend(results.into_iter().filter(|r| !r.success()).map(|r| {
            OperationWarning::LedgerUnconfirmed {
                document_id: r.document_id,
                status: r.status,
            }
        }));
    }

    /// Whether the audit write for this operation failed.
    pub fn audit_failed(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, OperationWarning::AuditWriteFailed { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medvault_core::TxRef;

    #[test]
    fn test_only_unconfirmed_results_warn() {
        let a = DocumentId::from_bytes([1; 16]);
        let b = DocumentId::from_bytes([2; 16]);
        let results = vec![
            LedgerResult::confirmed(a, TxRef("0x01".into())),
            LedgerResult::failed(b, LedgerStatus::TimedOut, None),
        ];

        let mut outcome = Outcome::new(());
        outcome.warn_unconfirmed(&results);

        assert_eq!(
            outcome.warnings,
            vec![OperationWarning::LedgerUnconfirmed {
                document_id: b,
                status: LedgerStatus::TimedOut
            }]
        );
        assert!(!outcome.audit_failed());
    }

    #[test]
    fn test_map_keeps_warnings() {
        let mut outcome = Outcome::new(2);
        outcome.warn_if(Some(OperationWarning::AuditWriteFailed {
            action: AuditAction::AccessDeny,
            reason: "disk full".into(),
        }));
        outcome.warn_if(None);

        let mapped = outcome.map(|v| v * 10);
        assert_eq!(mapped.value, 20);
        assert!(mapped.audit_failed());
        assert!(!mapped.is_clean());
    }
}
