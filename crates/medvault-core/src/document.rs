//! Encrypted documents.
//!
//! A [`Document`] holds ciphertext only. Callers that list documents get
//! [`DocumentMeta`], which has no ciphertext field at all, so a listing can
//! never leak content by accident.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::ContentHash;
use crate::types::{DocumentId, LedgerRecordId, PrincipalId};

/// A file submitted for upload, before encryption.
#[derive(Clone, PartialEq, Eq)]
pub struct NewDocument {
    /// Display name, e.g. `"blood-panel-2024.pdf"`.
    pub name: String,
    /// Free-form category chosen by the owner, e.g. `"lab-report"`.
    pub category: String,
    /// Plaintext content.
    pub content: Vec<u8>,
}

impl NewDocument {
    /// Create a new document submission.
    pub fn new(name: impl Into<String>, category: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            content: content.into(),
        }
    }
}

impl fmt::Debug for NewDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewDocument")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("content_len", &self.content.len())
            .finish()
    }
}

/// A stored, encrypted document.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub owner_id: PrincipalId,
    pub name: String,
    pub category: String,
    /// Opaque output of the encryption service.
    pub ciphertext: Bytes,
    /// Hash of the plaintext that was anchored on the ledger.
    pub content_hash: ContentHash,
    /// Anchor record on the ledger. `None` if anchoring failed at upload.
    pub ledger_record_id: Option<LedgerRecordId>,
    pub uploaded_at: i64,
    /// Plaintext size.
    pub size_bytes: u64,
}

impl Document {
    /// Metadata view without ciphertext.
    pub fn meta(&self) -> DocumentMeta {
        DocumentMeta {
            id: self.id,
            owner_id: self.owner_id.clone(),
            name: self.name.clone(),
            category: self.category.clone(),
            content_hash: self.content_hash,
            ledger_record_id: self.ledger_record_id.clone(),
            uploaded_at: self.uploaded_at,
            size_bytes: self.size_bytes,
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("name", &self.name)
            .field("category", &self.category)
            .field("ciphertext_len", &self.ciphertext.len())
            .field("ledger_record_id", &self.ledger_record_id)
            .field("uploaded_at", &self.uploaded_at)
            .finish()
    }
}

/// Document metadata, safe to hand to any caller that may list the owner's
/// documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: DocumentId,
    pub owner_id: PrincipalId,
    pub name: String,
    pub category: String,
    pub content_hash: ContentHash,
    pub ledger_record_id: Option<LedgerRecordId>,
    pub uploaded_at: i64,
    pub size_bytes: u64,
}
