//! Audit log entries.
//!
//! Entries are append-only: nothing in the system mutates or deletes one
//! after it is written. Whenever a ledger call was attempted, the entry
//! carries the per-document [`LedgerResult`]s so that local and ledger state
//! can be reconciled later.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::grant::LedgerResult;
use crate::types::PrincipalId;

/// Security-relevant actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "record.upload")]
    RecordUpload,
    #[serde(rename = "record.delete")]
    RecordDelete,
    /// A delete stopped partway; the document still exists.
    #[serde(rename = "record.delete_failed")]
    RecordDeleteFailed,
    #[serde(rename = "access.request")]
    AccessRequest,
    #[serde(rename = "access.approve")]
    AccessApprove,
    /// An approval whose grant could not be stored; the request is pending
    /// again.
    #[serde(rename = "access.approve_failed")]
    AccessApproveFailed,
    #[serde(rename = "access.deny")]
    AccessDeny,
    #[serde(rename = "consent.revoked")]
    ConsentRevoked,
    #[serde(rename = "emergency.generate")]
    EmergencyGenerate,
    #[serde(rename = "emergency.revoke")]
    EmergencyRevoke,
    #[serde(rename = "emergency.access")]
    EmergencyAccess,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::RecordUpload => "record.upload",
            AuditAction::RecordDelete => "record.delete",
            AuditAction::RecordDeleteFailed => "record.delete_failed",
            AuditAction::AccessRequest => "access.request",
            AuditAction::AccessApprove => "access.approve",
            AuditAction::AccessApproveFailed => "access.approve_failed",
            AuditAction::AccessDeny => "access.deny",
            AuditAction::ConsentRevoked => "consent.revoked",
            AuditAction::EmergencyGenerate => "emergency.generate",
            AuditAction::EmergencyRevoke => "emergency.revoke",
            AuditAction::EmergencyAccess => "emergency.access",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Who acted: a principal id, or `emergency:<code>` for bypass reads.
    pub actor: String,
    /// Whose records the action concerns.
    pub subject: PrincipalId,
    pub action: AuditAction,
    /// Human-readable detail (document ids, request id, durations).
    pub details: String,
    /// Ledger outcomes, empty when no ledger call was attempted.
    pub ledger: Vec<LedgerResult>,
    pub timestamp: i64,
}

impl AuditLogEntry {
    /// Whether every attempted ledger call was confirmed.
    pub fn ledger_fully_confirmed(&self) -> bool {
        self.ledger.iter().all(LedgerResult::success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::LedgerStatus;
    use crate::types::{DocumentId, TxRef};

    #[test]
    fn test_action_serializes_dotted() {
        let json = serde_json::to_string(&AuditAction::ConsentRevoked).unwrap();
        assert_eq!(json, "\"consent.revoked\"");

        let back: AuditAction = serde_json::from_str("\"access.approve\"").unwrap();
        assert_eq!(back, AuditAction::AccessApprove);
        assert_eq!(back.to_string(), "access.approve");

        for action in [AuditAction::AccessApproveFailed, AuditAction::RecordDeleteFailed] {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
        }
    }

    #[test]
    fn test_ledger_fully_confirmed() {
        let doc = DocumentId::from_bytes([3; 16]);
        let mut entry = AuditLogEntry {
            actor: "patient".into(),
            subject: PrincipalId::new("patient").unwrap(),
            action: AuditAction::AccessApprove,
            details: String::new(),
            ledger: vec![LedgerResult::confirmed(doc, TxRef("tx".into()))],
            timestamp: 0,
        };
        assert!(entry.ledger_fully_confirmed());

        entry
            .ledger
            .push(LedgerResult::failed(doc, LedgerStatus::TimedOut, None));
        assert!(!entry.ledger_fully_confirmed());
    }
}
