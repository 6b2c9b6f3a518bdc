//! Document store operations.
//!
//! Upload order is validate, encrypt, anchor, persist. An encryption failure
//! aborts before anything is written; an anchoring failure only downgrades
//! the document to "not anchored" and is reported as a warning.
//!
//! Plaintext leaves the vault only through [`Vault::read_document`], which
//! sends every non-owner through the consent gate first.

use bytes::Bytes;
use medvault_core::{
    AuditAction, ContentHash, Document, DocumentId, DocumentMeta, LedgerRecordId, LedgerResult,
    NewDocument, PrincipalId,
};
use medvault_ledger::{bounded, LedgerClient, UploadAnchor};
use medvault_perms::EncryptionService;
use medvault_store::Store;

use crate::error::{Result, VaultError};
use crate::outcome::{OperationWarning, Outcome};
use crate::vault::Vault;

/// Sealed content ready to persist.
struct Sealed {
    ciphertext: Bytes,
    content_hash: ContentHash,
    size_bytes: u64,
}

impl<S: Store, L: LedgerClient, E: EncryptionService> Vault<S, L, E> {
    fn validate_upload(&self, file: &NewDocument) -> Result<()> {
        if file.name.trim().is_empty() {
            return Err(VaultError::Validation("document name is empty".into()));
        }
        if file.content.is_empty() {
            return Err(VaultError::Validation("document content is empty".into()));
        }
        if file.content.len() > self.config.max_document_bytes {
            return Err(VaultError::Validation(format!(
                "document is {} bytes, limit is {}",
                file.content.len(),
                self.config.max_document_bytes
            )));
        }
        Ok(())
    }

    async fn seal(&self, content: &[u8]) -> Result<Sealed> {
        let ciphertext = self
            .cipher
            .encrypt(content)
            .await
            .map_err(|e| VaultError::Encryption(e.to_string()))?;
        Ok(Sealed {
            ciphertext: Bytes::from(ciphertext),
            content_hash: ContentHash::hash(content),
            size_bytes: content.len() as u64,
        })
    }

    /// Anchor a content hash. Failure yields the ledger result to audit and
    /// a warning, never an error.
    async fn anchor(
        &self,
        document_id: DocumentId,
        hash: &ContentHash,
    ) -> (Option<UploadAnchor>, LedgerResult, Option<OperationWarning>) {
        match bounded(
            self.config.consent.ledger_timeout,
            self.ledger.record_upload(hash),
        )
        .await
        {
            Ok(anchor) => {
                let result = LedgerResult::confirmed(document_id, anchor.tx_ref.clone());
                (Some(anchor), result, None)
            }
            Err(e) => {
                tracing::warn!(document = %document_id, error = %e, "failed to anchor upload");
                let status = e.status();
                (
                    None,
                    LedgerResult::failed(document_id, status, None),
                    Some(OperationWarning::LedgerAnchorFailed {
                        document_id,
                        status,
                    }),
                )
            }
        }
    }

    /// Upload a document for `owner`.
    ///
    /// Registers the owner if needed. Returns metadata only.
    pub async fn upload(
        &self,
        owner: &PrincipalId,
        file: NewDocument,
    ) -> Result<Outcome<DocumentMeta>> {
        self.validate_upload(&file)?;
        let sealed = self.seal(&file.content).await?;

        let document_id = DocumentId::generate();
        let (anchor, ledger, warning) = self.anchor(document_id, &sealed.content_hash).await;

        let now = self.now();
        self.store.register_owner(owner, now).await?;
        let document = Document {
            id: document_id,
            owner_id: owner.clone(),
            name: file.name,
            category: file.category,
            ciphertext: sealed.ciphertext,
            content_hash: sealed.content_hash,
            ledger_record_id: anchor.map(|a| a.ledger_record_id),
            uploaded_at: now,
            size_bytes: sealed.size_bytes,
        };
        self.store.put_document(&document).await?;

        tracing::info!(
            owner = %owner,
            document = %document_id,
            size = document.size_bytes,
            anchored = document.ledger_record_id.is_some(),
            "uploaded document"
        );

        let mut outcome = Outcome::new(document.meta());
        outcome.warn_if(warning);
        let details = format!(
            "uploaded {} '{}' ({}, {} bytes)",
            document_id, document.name, document.category, document.size_bytes
        );
        outcome.warn_if(
            self.audit
                .append(owner.as_str(), owner, AuditAction::RecordUpload, details, vec![ledger])
                .await,
        );
        Ok(outcome)
    }

    /// Replace a document's content, keeping its id.
    ///
    /// The new content is anchored; the existing ledger record id is kept
    /// because ledger approvals are bound to it, and is only replaced when
    /// the document was never anchored.
    pub async fn reupload(
        &self,
        owner: &PrincipalId,
        document_id: &DocumentId,
        file: NewDocument,
    ) -> Result<Outcome<DocumentMeta>> {
        let existing = self.owned_document(owner, document_id).await?;
        self.validate_upload(&file)?;
        let sealed = self.seal(&file.content).await?;

        let (anchor, ledger, warning) = self.anchor(*document_id, &sealed.content_hash).await;
        let ledger_record_id: Option<LedgerRecordId> = existing
            .ledger_record_id
            .or_else(|| anchor.map(|a| a.ledger_record_id));

        let document = Document {
            id: *document_id,
            owner_id: owner.clone(),
            name: file.name,
            category: file.category,
            ciphertext: sealed.ciphertext,
            content_hash: sealed.content_hash,
            ledger_record_id,
            uploaded_at: self.now(),
            size_bytes: sealed.size_bytes,
        };
        self.store.put_document(&document).await?;

        tracing::info!(owner = %owner, document = %document_id, "re-uploaded document");

        let mut outcome = Outcome::new(document.meta());
        outcome.warn_if(warning);
        let details = format!(
            "re-uploaded {} '{}' ({} bytes)",
            document_id, document.name, document.size_bytes
        );
        outcome.warn_if(
            self.audit
                .append(owner.as_str(), owner, AuditAction::RecordUpload, details, vec![ledger])
                .await,
        );
        Ok(outcome)
    }

    /// Delete a document and revoke it from every grant that names it.
    ///
    /// Grants are cleaned up before the document goes. If that stops
    /// partway the document stays, the attempt is audited, and calling
    /// again finishes the job. A second cascade after the delete catches an
    /// approval that raced in between.
    pub async fn delete_document(
        &self,
        owner: &PrincipalId,
        document_id: &DocumentId,
    ) -> Result<Outcome<DocumentMeta>> {
        let document = self.owned_document(owner, document_id).await?;
        let record = document.ledger_record_id.as_ref();

        let mut cascaded = match self
            .consent
            .cascade_revoke_document(owner, document_id, record)
            .await
        {
            Ok(cascaded) => cascaded,
            Err(e) => {
                let ledger = e.ledger_results().to_vec();
                let err = VaultError::from(e);
                self.record_failed_delete(owner, document_id, &err, ledger)
                    .await;
                return Err(err);
            }
        };

        if let Err(e) = self.store.delete_document(owner, document_id).await {
            let ledger = cascaded.iter().map(|c| c.ledger.clone()).collect();
            let err = VaultError::from(e);
            self.record_failed_delete(owner, document_id, &err, ledger)
                .await;
            return Err(err);
        }

        match self
            .consent
            .cascade_revoke_document(owner, document_id, record)
            .await
        {
            Ok(late) => cascaded.extend(late),
            Err(e) => tracing::warn!(
                owner = %owner,
                document = %document_id,
                error = %e,
                "post-delete grant sweep failed"
            ),
        }
        let ledger: Vec<LedgerResult> = cascaded.iter().map(|c| c.ledger.clone()).collect();

        tracing::info!(
            owner = %owner,
            document = %document_id,
            grants = cascaded.len(),
            "deleted document"
        );

        let mut outcome = Outcome::new(document.meta());
        outcome.warn_unconfirmed(&ledger);
        let details = format!(
            "deleted {} '{}'; revoked from {} grants ({} emptied)",
            document_id,
            document.name,
            cascaded.len(),
            cascaded.iter().filter(|c| c.grant_deleted).count()
        );
        outcome.warn_if(
            self.audit
                .append(owner.as_str(), owner, AuditAction::RecordDelete, details, ledger)
                .await,
        );
        Ok(outcome)
    }

    async fn record_failed_delete(
        &self,
        owner: &PrincipalId,
        document_id: &DocumentId,
        error: &VaultError,
        ledger: Vec<LedgerResult>,
    ) {
        tracing::warn!(owner = %owner, document = %document_id, error = %error, "delete failed");
        let details = format!("delete of {} stopped: {}", document_id, error);
        let _ = self
            .audit
            .append(owner.as_str(), owner, AuditAction::RecordDeleteFailed, details, ledger)
            .await;
    }

    /// List an owner's documents, oldest first. Never includes ciphertext.
    pub async fn list_documents(&self, owner: &PrincipalId) -> Result<Vec<DocumentMeta>> {
        Ok(self
            .store
            .list_documents(owner)
            .await?
            .iter()
            .map(Document::meta)
            .collect())
    }

    /// Read a document's plaintext.
    ///
    /// The owner reads directly. Anyone else must pass
    /// [`Vault::authorize`]; a refusal is [`VaultError::AccessDenied`] and a
    /// decryption failure is [`VaultError::CorruptedDocument`].
    pub async fn read_document(
        &self,
        owner: &PrincipalId,
        document_id: &DocumentId,
        requester: &PrincipalId,
    ) -> Result<Vec<u8>> {
        if requester != owner {
            let decision = self
                .consent
                .authorize_detailed(owner, requester, document_id)
                .await?;
            if !decision.is_granted() {
                tracing::info!(
                    owner = %owner,
                    requester = %requester,
                    document = %document_id,
                    ?decision,
                    "read denied"
                );
                return Err(VaultError::AccessDenied {
                    requester: requester.clone(),
                    document_id: *document_id,
                    decision,
                });
            }
        }

        let document = self.owned_document(owner, document_id).await?;
        self.decrypt_document(&document).await
    }

    pub(crate) async fn owned_document(
        &self,
        owner: &PrincipalId,
        document_id: &DocumentId,
    ) -> Result<Document> {
        self.store
            .get_document(owner, document_id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("document {}", document_id)))
    }

    /// The only place ciphertext is opened.
    pub(crate) async fn decrypt_document(&self, document: &Document) -> Result<Vec<u8>> {
        self.cipher.decrypt(&document.ciphertext).await.map_err(|e| {
            tracing::error!(document = %document.id, error = %e, "document failed to decrypt");
            VaultError::CorruptedDocument {
                document_id: document.id,
            }
        })
    }
}
