//! Facade behavior through the public API.
//!
//! Every test runs on a manual clock, the in-memory ledger and a fresh
//! sealed cipher. The document store is in memory unless a test needs to
//! reopen it.

use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use medvault::core::{
    AuditAction, ContentHash, Document, DocumentId, DocumentSelection, ManualClock, NewDocument,
    PrincipalId, RequestStatus,
};
use medvault::ledger::MemoryLedger;
use medvault::perms::SealedCipher;
use medvault::store::{MemoryStore, SqliteStore, Store};
use medvault::{AccessDecision, OperationWarning, SnapshotContent, Vault, VaultConfig, VaultError};

const START: i64 = 1_700_000_000_000;

type TestVault<S = MemoryStore> = Vault<S, MemoryLedger, SealedCipher>;

fn principal(id: &str) -> PrincipalId {
    PrincipalId::new(id).unwrap()
}

fn vault_on<S: Store>(store: S) -> (TestVault<S>, Arc<MemoryLedger>, Arc<ManualClock>) {
    let ledger = Arc::new(MemoryLedger::new());
    let clock = Arc::new(ManualClock::new(START));
    let vault = Vault::from_parts(
        Arc::new(store),
        Arc::clone(&ledger),
        Arc::new(SealedCipher::generate()),
        clock.clone(),
        VaultConfig::default(),
    );
    (vault, ledger, clock)
}

fn vault() -> (TestVault, Arc<MemoryLedger>, Arc<ManualClock>) {
    vault_on(MemoryStore::new())
}

async fn upload(vault: &TestVault, owner: &PrincipalId, name: &str, content: &[u8]) -> DocumentId {
    vault
        .upload(owner, NewDocument::new(name, "lab", content.to_vec()))
        .await
        .unwrap()
        .into_value()
        .id
}

// ─────────────────────────────────────────────────────────────────────────────
// Documents
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_upload_registers_owner_and_anchors() {
    let (vault, ledger, _) = vault();
    let patient = principal("patient");

    let outcome = vault
        .upload(&patient, NewDocument::new("cbc.pdf", "lab", b"hemoglobin 14".to_vec()))
        .await
        .unwrap();
    assert!(outcome.is_clean());

    let meta = outcome.into_value();
    assert_eq!(meta.owner_id, patient);
    assert_eq!(meta.size_bytes, 13);
    assert_eq!(meta.uploaded_at, START);
    assert_eq!(meta.content_hash, ContentHash::hash(b"hemoglobin 14"));
    assert!(meta.ledger_record_id.is_some());
    assert!(vault.store().owner_exists(&patient).await.unwrap());
    assert_eq!(ledger.calls().await.len(), 1);

    // Ciphertext at rest is not the plaintext.
    let stored = vault.store().get_document(&patient, &meta.id).await.unwrap().unwrap();
    assert_ne!(&stored.ciphertext[..], b"hemoglobin 14");

    let log = vault.audit_log(&patient).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].action, AuditAction::RecordUpload);
    assert!(log[0].ledger_fully_confirmed());
}

#[tokio::test]
async fn test_upload_rejects_empty_and_oversized() {
    let (vault, _, _) = vault();
    let patient = principal("patient");

    let empty = vault
        .upload(&patient, NewDocument::new("empty.pdf", "lab", Vec::new()))
        .await;
    assert!(matches!(empty, Err(VaultError::Validation(_))));

    let nameless = vault
        .upload(&patient, NewDocument::new("  ", "lab", b"x".to_vec()))
        .await;
    assert!(matches!(nameless, Err(VaultError::Validation(_))));

    let limit = vault.config().max_document_bytes;
    let oversized = vault
        .upload(&patient, NewDocument::new("big.bin", "imaging", vec![0u8; limit + 1]))
        .await;
    assert!(matches!(oversized, Err(VaultError::Validation(_))));

    // Nothing was written, not even the owner.
    assert!(!vault.store().owner_exists(&patient).await.unwrap());
    assert!(vault.audit_log(&patient).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_with_ledger_down_is_stored_unanchored() {
    let (vault, ledger, _) = vault();
    let patient = principal("patient");
    ledger.set_available(false).await;

    let outcome = vault
        .upload(&patient, NewDocument::new("xray.png", "imaging", b"pixels".to_vec()))
        .await
        .unwrap();
    assert!(matches!(
        outcome.warnings.as_slice(),
        [OperationWarning::LedgerAnchorFailed { .. }]
    ));
    let meta = outcome.into_value();
    assert!(meta.ledger_record_id.is_none());

    // The owner can still read it.
    let plaintext = vault.read_document(&patient, &meta.id, &patient).await.unwrap();
    assert_eq!(plaintext, b"pixels");

    let log = vault.audit_log(&patient).await.unwrap();
    assert!(!log[0].ledger_fully_confirmed());
}

#[tokio::test]
async fn test_list_documents_in_upload_order() {
    let (vault, _, clock) = vault();
    let patient = principal("patient");

    let first = upload(&vault, &patient, "a.pdf", b"a").await;
    clock.advance_hours(1);
    let second = upload(&vault, &patient, "b.pdf", b"b").await;

    let listed: Vec<DocumentId> = vault
        .list_documents(&patient)
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(listed, vec![first, second]);
    assert!(vault.list_documents(&principal("nobody")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reupload_keeps_id_and_ledger_record() {
    let (vault, _, clock) = vault();
    let patient = principal("patient");
    let id = upload(&vault, &patient, "v1.pdf", b"first draft").await;
    let before = vault.store().get_document(&patient, &id).await.unwrap().unwrap();

    clock.advance_hours(2);
    let meta = vault
        .reupload(&patient, &id, NewDocument::new("v2.pdf", "lab", b"final".to_vec()))
        .await
        .unwrap()
        .into_value();

    assert_eq!(meta.id, id);
    assert_eq!(meta.name, "v2.pdf");
    assert_eq!(meta.ledger_record_id, before.ledger_record_id);
    assert_eq!(meta.content_hash, ContentHash::hash(b"final"));
    assert_eq!(meta.uploaded_at, START + 2 * medvault::core::HOUR_MS);
    assert_eq!(vault.list_documents(&patient).await.unwrap().len(), 1);
    assert_eq!(vault.read_document(&patient, &id, &patient).await.unwrap(), b"final");
}

#[tokio::test]
async fn test_reupload_of_someone_elses_document_is_not_found() {
    let (vault, _, _) = vault();
    let alice = principal("alice");
    let id = upload(&vault, &alice, "a.pdf", b"a").await;

    let result = vault
        .reupload(&principal("mallory"), &id, NewDocument::new("a.pdf", "lab", b"x".to_vec()))
        .await;
    assert!(matches!(result, Err(VaultError::NotFound(_))));
}

#[tokio::test]
async fn test_corrupted_ciphertext_is_reported_not_returned() {
    let (vault, _, _) = vault();
    let patient = principal("patient");
    let id = upload(&vault, &patient, "a.pdf", b"real content").await;

    let mut stored = vault.store().get_document(&patient, &id).await.unwrap().unwrap();
    stored.ciphertext = Bytes::from_static(b"not an envelope");
    vault.store().put_document(&stored).await.unwrap();

    let result = vault.read_document(&patient, &id, &patient).await;
    assert!(matches!(
        result,
        Err(VaultError::CorruptedDocument { document_id }) if document_id == id
    ));
}

#[tokio::test]
async fn test_delete_unknown_document_is_not_found() {
    let (vault, _, _) = vault();
    let patient = principal("patient");
    vault.register_owner(&patient).await.unwrap();

    let result = vault.delete_document(&patient, &DocumentId::generate()).await;
    assert!(matches!(result, Err(VaultError::NotFound(_))));
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests and reads
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_grantee_reads_only_what_was_approved() {
    let (vault, _, _) = vault();
    let patient = principal("patient");
    let doctor = principal("doctor");
    let shared = upload(&vault, &patient, "shared.pdf", b"shared").await;
    let private = upload(&vault, &patient, "private.pdf", b"private").await;

    let request = vault
        .submit_request(&doctor, &patient, DocumentSelection::All, 24)
        .await
        .unwrap()
        .into_value();
    let approval = vault
        .approve_request(&patient, &request.id, &BTreeSet::from([shared]), 24)
        .await
        .unwrap();
    assert!(approval.is_clean());
    assert_eq!(approval.value.request.status, RequestStatus::Approved);

    assert_eq!(vault.read_document(&patient, &shared, &doctor).await.unwrap(), b"shared");

    let denied = vault.read_document(&patient, &private, &doctor).await;
    assert!(matches!(
        denied,
        Err(VaultError::AccessDenied {
            decision: AccessDecision::DocumentNotInGrant,
            ..
        })
    ));

    let stranger = vault.read_document(&patient, &shared, &principal("stranger")).await;
    assert!(matches!(
        stranger,
        Err(VaultError::AccessDenied {
            decision: AccessDecision::NoActiveGrant,
            ..
        })
    ));
}

#[tokio::test]
async fn test_read_fails_closed_when_ledger_is_down() {
    let (vault, ledger, _) = vault();
    let patient = principal("patient");
    let doctor = principal("doctor");
    let doc = upload(&vault, &patient, "a.pdf", b"a").await;
    let request = vault
        .submit_request(&doctor, &patient, DocumentSelection::from_ids([doc]), 24)
        .await
        .unwrap()
        .into_value();
    let _ = vault
        .approve_request(&patient, &request.id, &BTreeSet::from([doc]), 24)
        .await
        .unwrap();

    ledger.set_available(false).await;
    assert!(!vault.authorize(&patient, &doctor, &doc).await.unwrap());
    assert_eq!(
        vault.authorize_detailed(&patient, &doctor, &doc).await.unwrap(),
        AccessDecision::LedgerUnavailable
    );
    assert!(matches!(
        vault.read_document(&patient, &doc, &doctor).await,
        Err(VaultError::AccessDenied { .. })
    ));

    // The owner is never gated by the ledger.
    assert_eq!(vault.read_document(&patient, &doc, &patient).await.unwrap(), b"a");
}

#[tokio::test]
async fn test_submit_request_validation() {
    let (vault, _, _) = vault();
    let patient = principal("patient");
    let doctor = principal("doctor");

    let unknown = vault
        .submit_request(&doctor, &patient, DocumentSelection::All, 24)
        .await;
    assert!(matches!(unknown, Err(VaultError::NotFound(_))));

    let _ = upload(&vault, &patient, "a.pdf", b"a").await;
    let zero = vault
        .submit_request(&doctor, &patient, DocumentSelection::All, 0)
        .await;
    assert!(matches!(zero, Err(VaultError::Validation(_))));

    let too_long = vault
        .submit_request(&doctor, &patient, DocumentSelection::All, 24 * 366)
        .await;
    assert!(matches!(too_long, Err(VaultError::Validation(_))));

    let foreign = vault
        .submit_request(
            &doctor,
            &patient,
            DocumentSelection::from_ids([DocumentId::generate()]),
            24,
        )
        .await;
    assert!(matches!(foreign, Err(VaultError::Validation(_))));

    let self_request = vault
        .submit_request(&patient, &patient, DocumentSelection::All, 24)
        .await;
    assert!(matches!(self_request, Err(VaultError::Validation(_))));
}

#[tokio::test]
async fn test_request_resolves_exactly_once() {
    let (vault, _, _) = vault();
    let patient = principal("patient");
    let doctor = principal("doctor");
    let doc = upload(&vault, &patient, "a.pdf", b"a").await;
    let request = vault
        .submit_request(&doctor, &patient, DocumentSelection::All, 24)
        .await
        .unwrap()
        .into_value();

    let denied = vault.deny_request(&patient, &request.id).await.unwrap().into_value();
    assert_eq!(denied.status, RequestStatus::Denied);
    assert!(vault.list_active_grants(&patient).await.unwrap().is_empty());

    let again = vault
        .approve_request(&patient, &request.id, &BTreeSet::from([doc]), 24)
        .await;
    assert!(matches!(
        again,
        Err(VaultError::InvalidTransition {
            status: RequestStatus::Denied,
            ..
        })
    ));
    assert!(matches!(
        vault.deny_request(&patient, &request.id).await,
        Err(VaultError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_only_the_patient_resolves_a_request() {
    let (vault, _, _) = vault();
    let patient = principal("patient");
    let doctor = principal("doctor");
    let doc = upload(&vault, &patient, "a.pdf", b"a").await;
    let request = vault
        .submit_request(&doctor, &patient, DocumentSelection::All, 24)
        .await
        .unwrap()
        .into_value();

    let by_doctor = vault
        .approve_request(&doctor, &request.id, &BTreeSet::from([doc]), 24)
        .await;
    assert!(matches!(by_doctor, Err(VaultError::NotOwner { .. })));

    let listed = vault
        .requests_for_owner(&patient, Some(RequestStatus::Pending))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_approval_must_select_owned_documents() {
    let (vault, _, _) = vault();
    let patient = principal("patient");
    let doctor = principal("doctor");
    let _ = upload(&vault, &patient, "a.pdf", b"a").await;
    let request = vault
        .submit_request(&doctor, &patient, DocumentSelection::All, 24)
        .await
        .unwrap()
        .into_value();

    let empty = vault
        .approve_request(&patient, &request.id, &BTreeSet::new(), 24)
        .await;
    assert!(matches!(empty, Err(VaultError::Validation(_))));

    let foreign = vault
        .approve_request(&patient, &request.id, &BTreeSet::from([DocumentId::generate()]), 24)
        .await;
    assert!(matches!(foreign, Err(VaultError::Validation(_))));

    // Still pending after the refused attempts.
    let pending = vault
        .requests_by_grantee(&doctor, Some(RequestStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn test_documents_for_approval_follows_current_documents() {
    let (vault, _, _) = vault();
    let patient = principal("patient");
    let doctor = principal("doctor");
    let first = upload(&vault, &patient, "a.pdf", b"a").await;

    let all = vault
        .submit_request(&doctor, &patient, DocumentSelection::All, 24)
        .await
        .unwrap()
        .into_value();
    let specific = vault
        .submit_request(&doctor, &patient, DocumentSelection::from_ids([first]), 24)
        .await
        .unwrap()
        .into_value();

    let later = upload(&vault, &patient, "b.pdf", b"b").await;

    let offered: Vec<DocumentId> = vault
        .documents_for_approval(&patient, &all.id)
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(offered, vec![first, later]);

    let _ = vault.delete_document(&patient, &first).await.unwrap();
    assert!(vault
        .documents_for_approval(&patient, &specific.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_revoke_grant_removes_access() {
    let (vault, ledger, _) = vault();
    let patient = principal("patient");
    let doctor = principal("doctor");
    let doc = upload(&vault, &patient, "a.pdf", b"a").await;
    let request = vault
        .submit_request(&doctor, &patient, DocumentSelection::All, 24)
        .await
        .unwrap()
        .into_value();
    let grant = vault
        .approve_request(&patient, &request.id, &BTreeSet::from([doc]), 24)
        .await
        .unwrap()
        .into_value()
        .grant;
    assert!(vault.authorize(&patient, &doctor, &doc).await.unwrap());

    let revoked = vault.revoke_grant(&patient, &doctor).await.unwrap();
    assert!(revoked.is_clean());
    assert_eq!(revoked.value.source_request_id(), grant.source_request_id());
    assert!(!vault.authorize(&patient, &doctor, &doc).await.unwrap());

    let record = vault.store().get_document(&patient, &doc).await.unwrap().unwrap();
    assert!(!ledger.has_access(&record.ledger_record_id.unwrap(), &doctor).await);

    let log = vault.audit_log(&patient).await.unwrap();
    assert_eq!(log.last().unwrap().action, AuditAction::ConsentRevoked);

    assert!(matches!(
        vault.revoke_grant(&patient, &doctor).await,
        Err(VaultError::NotFound(_))
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Emergency
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_emergency_snapshot_isolates_corrupted_documents() {
    let (vault, _, _) = vault();
    let patient = principal("patient");
    let good = upload(&vault, &patient, "good.pdf", b"allergies: none").await;

    let bad = Document {
        id: DocumentId::generate(),
        owner_id: patient.clone(),
        name: "bad.pdf".into(),
        category: "lab".into(),
        ciphertext: Bytes::from_static(b"garbage"),
        content_hash: ContentHash::hash(b"lost"),
        ledger_record_id: None,
        uploaded_at: START,
        size_bytes: 4,
    };
    vault.store().put_document(&bad).await.unwrap();

    let code = vault.generate_emergency_code(&patient).await.unwrap().into_value();
    let snapshot = vault
        .resolve_emergency_code(&code.display())
        .await
        .unwrap()
        .expect("valid code")
        .into_value();

    assert_eq!(snapshot.documents.len(), 2);
    assert_eq!(snapshot.corrupted_count(), 1);
    let readable = snapshot.documents.iter().find(|d| d.meta.id == good).unwrap();
    assert_eq!(readable.content, SnapshotContent::Available(b"allergies: none".to_vec()));

    let log = vault.audit_log(&patient).await.unwrap();
    let access = log.last().unwrap();
    assert_eq!(access.action, AuditAction::EmergencyAccess);
    assert!(access.actor.starts_with("emergency:"));
    assert!(!access.actor.contains(&code.code));
}

#[tokio::test]
async fn test_generating_a_code_revokes_the_previous_one() {
    let (vault, _, _) = vault();
    let patient = principal("patient");
    vault.register_owner(&patient).await.unwrap();

    let first = vault.generate_emergency_code(&patient).await.unwrap().into_value();
    let second = vault.generate_emergency_code(&patient).await.unwrap().into_value();

    assert!(vault.resolve_emergency_code(&first.code).await.unwrap().is_none());
    assert!(vault.resolve_emergency_code(&second.code).await.unwrap().is_some());
    assert_eq!(
        vault.active_emergency_code(&patient).await.unwrap().map(|c| c.code),
        Some(second.code.clone())
    );

    // Revoking twice is fine.
    assert!(vault.revoke_emergency_code(&patient, &second.code).await.unwrap().into_value());
    assert!(!vault.revoke_emergency_code(&patient, &second.code).await.unwrap().into_value());
    assert!(vault.active_emergency_code(&patient).await.unwrap().is_none());
}

#[tokio::test]
async fn test_emergency_code_edge_cases() {
    let (vault, _, _) = vault();
    let patient = principal("patient");

    assert!(matches!(
        vault.generate_emergency_code(&patient).await,
        Err(VaultError::NotFound(_))
    ));
    assert!(vault.resolve_emergency_code("").await.unwrap().is_none());
    assert!(vault.resolve_emergency_code("NOPE-NOPE").await.unwrap().is_none());

    vault.register_owner(&patient).await.unwrap();
    let code = vault.generate_emergency_code(&patient).await.unwrap().into_value();
    assert!(matches!(
        vault.revoke_emergency_code(&principal("other"), &code.code).await,
        Err(VaultError::NotOwner { .. })
    ));

    // Owner with no documents gets an empty snapshot.
    let snapshot = vault
        .resolve_emergency_code(&code.code.to_lowercase())
        .await
        .unwrap()
        .unwrap()
        .into_value();
    assert!(snapshot.documents.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_state_survives_reopening_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.db");
    let patient = principal("patient");
    let doctor = principal("doctor");
    let cipher = Arc::new(SealedCipher::generate());
    let ledger = Arc::new(MemoryLedger::new());
    let clock = Arc::new(ManualClock::new(START));

    let doc = {
        let vault = Vault::from_parts(
            Arc::new(SqliteStore::open(&path).unwrap()),
            Arc::clone(&ledger),
            Arc::clone(&cipher),
            clock.clone(),
            VaultConfig::default(),
        );
        let doc = vault
            .upload(&patient, NewDocument::new("a.pdf", "lab", b"kept".to_vec()))
            .await
            .unwrap()
            .into_value()
            .id;
        let request = vault
            .submit_request(&doctor, &patient, DocumentSelection::All, 24)
            .await
            .unwrap()
            .into_value();
        let _ = vault
            .approve_request(&patient, &request.id, &BTreeSet::from([doc]), 24)
            .await
            .unwrap();
        doc
    };

    let reopened = Vault::from_parts(
        Arc::new(SqliteStore::open(&path).unwrap()),
        ledger,
        cipher,
        clock,
        VaultConfig::default(),
    );
    assert_eq!(reopened.read_document(&patient, &doc, &doctor).await.unwrap(), b"kept");
    assert_eq!(reopened.audit_log(&patient).await.unwrap().len(), 3);
}
