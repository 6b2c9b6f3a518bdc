//! Proptest generators for property-based testing.

use std::collections::BTreeSet;

use proptest::prelude::*;

use medvault_core::{DocumentId, PrincipalId};

/// Generate a valid principal id.
pub fn principal_id() -> impl Strategy<Value = PrincipalId> {
    "[a-z][a-z0-9-]{0,23}".prop_map(|s| PrincipalId::new(s).expect("pattern is never blank"))
}

/// Generate a random DocumentId.
pub fn document_id() -> impl Strategy<Value = DocumentId> {
    any::<[u8; 16]>().prop_map(DocumentId::from_bytes)
}

/// Generate non-empty document content of at most `max_len` bytes.
pub fn document_content(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=max_len.max(1))
}

/// Generate a grant duration in hours.
pub fn duration_hours() -> impl Strategy<Value = u32> {
    1u32..=72
}

/// One approval in a generated sequence, by index into fixture tables.
#[derive(Debug, Clone)]
pub struct ApprovalRound {
    /// Hours to advance the clock before this round.
    pub advance_hours: u32,
    /// Index of the grantee.
    pub grantee: usize,
    /// Indices of the documents approved. Never empty.
    pub documents: BTreeSet<usize>,
    pub duration_hours: u32,
}

impl ApprovalRound {
    /// Resolve document indices against the owner's uploaded ids.
    pub fn select(&self, ids: &[DocumentId]) -> Vec<DocumentId> {
        self.documents.iter().map(|&i| ids[i]).collect()
    }
}

/// Generate one round over `grantees` grantees and `documents` documents.
pub fn approval_round(grantees: usize, documents: usize) -> impl Strategy<Value = ApprovalRound> {
    (
        0u32..=48,
        0..grantees.max(1),
        prop::collection::btree_set(0..documents.max(1), 1..=documents.max(1)),
        duration_hours(),
    )
        .prop_map(|(advance_hours, grantee, documents, duration_hours)| ApprovalRound {
            advance_hours,
            grantee,
            documents,
            duration_hours,
        })
}

/// Generate up to a dozen approval rounds.
pub fn approval_rounds(
    grantees: usize,
    documents: usize,
) -> impl Strategy<Value = Vec<ApprovalRound>> {
    prop::collection::vec(approval_round(grantees, documents), 1..=12)
}
