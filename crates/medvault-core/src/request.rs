//! Access requests.
//!
//! A grantee asks an owner for access; the owner resolves the request
//! exactly once. Resolved requests are kept forever as history; asking again
//! after a denial creates a new request with a new id.
//!
//! ```text
//!            approve
//! pending ──────────▶ approved
//!    │
//!    └──────────────▶ denied
//!             deny
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::{DocumentId, PrincipalId, RequestId};

/// Lifecycle state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
}

impl RequestStatus {
    /// Approved and denied are terminal.
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Denied => "denied",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which documents a grantee asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentSelection {
    /// Whatever the owner holds at approval time.
    All,
    /// A specific set.
    Only(BTreeSet<DocumentId>),
}

impl DocumentSelection {
    /// Build from a raw id list; an empty list means "all".
    pub fn from_ids(ids: impl IntoIterator<Item = DocumentId>) -> Self {
        let ids: BTreeSet<DocumentId> = ids.into_iter().collect();
        if ids.is_empty() {
            DocumentSelection::All
        } else {
            DocumentSelection::Only(ids)
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, DocumentSelection::All)
    }
}

/// A grantee's request for access to an owner's documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub id: RequestId,
    pub doctor_id: PrincipalId,
    pub patient_id: PrincipalId,
    pub requested: DocumentSelection,
    pub requested_duration_hours: u32,
    pub status: RequestStatus,
    pub request_date: i64,
    /// Set when the request leaves `pending`.
    pub resolved_at: Option<i64>,
    /// What the owner actually approved (may differ from the request).
    pub approved_document_ids: BTreeSet<DocumentId>,
    pub approved_duration_hours: Option<u32>,
}

impl AccessRequest {
    /// Create a pending request.
    pub fn new(
        doctor_id: PrincipalId,
        patient_id: PrincipalId,
        requested: DocumentSelection,
        requested_duration_hours: u32,
        now: i64,
    ) -> Result<Self> {
        if doctor_id == patient_id {
            return Err(CoreError::SelfGrant);
        }
        if requested_duration_hours == 0 {
            return Err(CoreError::ZeroDuration);
        }

        Ok(Self {
            id: RequestId::generate(),
            doctor_id,
            patient_id,
            requested,
            requested_duration_hours,
            status: RequestStatus::Pending,
            request_date: now,
            resolved_at: None,
            approved_document_ids: BTreeSet::new(),
            approved_duration_hours: None,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                id: self.id,
                status: self.status,
            })
        }
    }

    /// `pending -> approved`.
    ///
    /// Ownership of `document_ids` is checked by the caller, which can see
    /// the owner's documents; this only checks the state machine.
    pub fn approve(
        &mut self,
        document_ids: BTreeSet<DocumentId>,
        duration_hours: u32,
        now: i64,
    ) -> Result<()> {
        self.ensure_pending()?;
        if document_ids.is_empty() {
            return Err(CoreError::EmptyGrant);
        }
        if duration_hours == 0 {
            return Err(CoreError::ZeroDuration);
        }

        self.status = RequestStatus::Approved;
        self.resolved_at = Some(now);
        self.approved_document_ids = document_ids;
        self.approved_duration_hours = Some(duration_hours);
        Ok(())
    }

    /// `pending -> denied`.
    pub fn deny(&mut self, now: i64) -> Result<()> {
        self.ensure_pending()?;
        self.status = RequestStatus::Denied;
        self.resolved_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AccessRequest {
        AccessRequest::new(
            PrincipalId::new("doctor").unwrap(),
            PrincipalId::new("patient").unwrap(),
            DocumentSelection::All,
            24,
            100,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_ids_mean_all() {
        assert!(DocumentSelection::from_ids(Vec::new()).is_all());
        let one = DocumentSelection::from_ids([DocumentId::from_bytes([1; 16])]);
        assert!(!one.is_all());
    }

    #[test]
    fn test_approve_from_pending() {
        let mut req = request();
        let docs = BTreeSet::from([DocumentId::from_bytes([1; 16])]);

        req.approve(docs.clone(), 12, 200).unwrap();

        assert_eq!(req.status, RequestStatus::Approved);
        assert_eq!(req.resolved_at, Some(200));
        assert_eq!(req.approved_document_ids, docs);
        assert_eq!(req.approved_duration_hours, Some(12));
    }

    #[test]
    fn test_resolved_is_terminal() {
        let mut req = request();
        req.deny(150).unwrap();
        assert!(req.status.is_terminal());

        let err = req
            .approve(BTreeSet::from([DocumentId::from_bytes([1; 16])]), 1, 160)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                status: RequestStatus::Denied,
                ..
            }
        ));
        assert!(req.deny(170).is_err());
        assert_eq!(req.resolved_at, Some(150));
    }

    #[test]
    fn test_approve_requires_documents() {
        let mut req = request();
        assert_eq!(req.approve(BTreeSet::new(), 1, 1), Err(CoreError::EmptyGrant));
        assert!(req.is_pending());
    }

    #[test]
    fn test_new_rejects_self_request() {
        let p = PrincipalId::new("same").unwrap();
        assert_eq!(
            AccessRequest::new(p.clone(), p, DocumentSelection::All, 1, 0),
            Err(CoreError::SelfGrant)
        );
    }
}
