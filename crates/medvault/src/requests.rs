//! Access request state machine.
//!
//! A grantee submits a request; the owner approves or denies it exactly
//! once. Approval moves the request to `approved` first and then issues the
//! grant, so a request can never be approved twice into two grants. If the
//! grant cannot be issued the request goes back to `pending`.

use std::collections::BTreeSet;

use medvault_core::{
    AccessRequest, AuditAction, ConsentGrant, DocumentId, DocumentMeta, DocumentSelection,
    PrincipalId, RequestId, RequestStatus,
};
use medvault_ledger::LedgerClient;
use medvault_perms::{EncryptionService, PermsError};
use medvault_store::{Store, Versioned, WriteResult};

use crate::error::{Result, VaultError};
use crate::outcome::Outcome;
use crate::vault::Vault;

/// Result of approving a request.
#[derive(Debug, Clone)]
pub struct Approval {
    pub request: AccessRequest,
    pub grant: ConsentGrant,
}

impl<S: Store, L: LedgerClient, E: EncryptionService> Vault<S, L, E> {
    fn check_duration(&self, hours: u32) -> Result<()> {
        if hours == 0 || hours > self.config.max_duration_hours() {
            return Err(VaultError::Validation(format!(
                "duration must be between 1 and {} hours, got {}",
                self.config.max_duration_hours(),
                hours
            )));
        }
        Ok(())
    }

    /// Fail unless every id is one of the owner's current documents.
    async fn check_owned(&self, owner: &PrincipalId, ids: &BTreeSet<DocumentId>) -> Result<()> {
        let owned: BTreeSet<DocumentId> = self
            .store
            .list_documents(owner)
            .await?
            .into_iter()
            .map(|d| d.id)
            .collect();
        match ids.iter().find(|id| !owned.contains(id)) {
            Some(foreign) => Err(VaultError::Validation(format!(
                "document {} does not belong to {}",
                foreign, owner
            ))),
            None => Ok(()),
        }
    }

    /// Load a request the acting owner is allowed to resolve.
    async fn owned_request(
        &self,
        owner: &PrincipalId,
        request_id: &RequestId,
    ) -> Result<Versioned<AccessRequest>> {
        let stored = self
            .store
            .get_request(request_id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("request {}", request_id)))?;
        if &stored.value.patient_id != owner {
            return Err(VaultError::NotOwner {
                principal: owner.clone(),
            });
        }
        if !stored.value.is_pending() {
            return Err(VaultError::InvalidTransition {
                id: stored.value.id,
                status: stored.value.status,
            });
        }
        Ok(stored)
    }

    /// Persist a resolved request, refusing if someone else resolved it first.
    /// Returns the version written.
    async fn commit_resolution(&self, request: &AccessRequest, read_version: u64) -> Result<u64> {
        match self.store.update_request(request, read_version).await? {
            WriteResult::Written { version } => Ok(version),
            WriteResult::Missing => Err(VaultError::NotFound(format!("request {}", request.id))),
            WriteResult::Conflict { .. } => {
                let current = self.store.get_request(&request.id).await?;
                match current {
                    Some(c) if !c.value.is_pending() => Err(VaultError::InvalidTransition {
                        id: request.id,
                        status: c.value.status,
                    }),
                    _ => Err(VaultError::Conflict(format!(
                        "request {} changed concurrently",
                        request.id
                    ))),
                }
            }
        }
    }

    /// Submit a request from `doctor` for `patient`'s documents.
    ///
    /// `requested` of [`DocumentSelection::All`] asks for whatever the patient
    /// holds at approval time.
    pub async fn submit_request(
        &self,
        doctor: &PrincipalId,
        patient: &PrincipalId,
        requested: DocumentSelection,
        duration_hours: u32,
    ) -> Result<Outcome<AccessRequest>> {
        if !self.store.owner_exists(patient).await? {
            return Err(VaultError::NotFound(format!("owner {}", patient)));
        }
        self.check_duration(duration_hours)?;
        if let DocumentSelection::Only(ids) = &requested {
            self.check_owned(patient, ids).await?;
        }

        let request = AccessRequest::new(
            doctor.clone(),
            patient.clone(),
            requested,
            duration_hours,
            self.now(),
        )?;
        self.store.insert_request(&request).await?;

        tracing::info!(
            request = %request.id,
            doctor = %doctor,
            patient = %patient,
            hours = duration_hours,
            "access request submitted"
        );

        let scope = match &request.requested {
            DocumentSelection::All => "all documents".to_string(),
            DocumentSelection::Only(ids) => format!("{} documents", ids.len()),
        };
        let details = format!(
            "request {} for {} over {}h",
            request.id, scope, duration_hours
        );
        let mut outcome = Outcome::new(request);
        outcome.warn_if(
            self.audit
                .append(doctor.as_str(), patient, AuditAction::AccessRequest, details, Vec::new())
                .await,
        );
        Ok(outcome)
    }

    /// Approve a pending request with the documents and duration the owner
    /// chose, and issue the grant.
    ///
    /// The selection must be a non-empty subset of the owner's current
    /// documents. Any existing grant for the pair is replaced.
    pub async fn approve_request(
        &self,
        owner: &PrincipalId,
        request_id: &RequestId,
        selected: &BTreeSet<DocumentId>,
        duration_hours: u32,
    ) -> Result<Outcome<Approval>> {
        let stored = self.owned_request(owner, request_id).await?;
        self.check_duration(duration_hours)?;
        if selected.is_empty() {
            return Err(VaultError::Validation("no documents selected".into()));
        }
        self.check_owned(owner, selected).await?;

        let pending = stored.value;
        let mut request = pending.clone();
        request.approve(selected.clone(), duration_hours, self.now())?;
        let approved_version = self.commit_resolution(&request, stored.version).await?;

        let report = match self
            .consent
            .issue_grant(owner, &request.doctor_id, selected, duration_hours, request.id)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                self.abandon_approval(owner, &pending, approved_version, &e)
                    .await;
                return Err(e.into());
            }
        };

        tracing::info!(
            request = %request.id,
            owner = %owner,
            grantee = %request.doctor_id,
            documents = selected.len(),
            hours = duration_hours,
            "access request approved"
        );

        let mut ledger = report.grant.ledger_results().to_vec();
        ledger.extend(report.released.iter().cloned());
        let details = format!(
            "approved request {} for {}: {} documents for {}h{}",
            request.id,
            request.doctor_id,
            selected.len(),
            duration_hours,
            if report.replaced.is_some() {
                ", replacing previous grant"
            } else {
                ""
            }
        );
        let mut outcome = Outcome::new(Approval {
            request,
            grant: report.grant,
        });
        outcome.warn_unconfirmed(&ledger);
        outcome.warn_if(
            self.audit
                .append(owner.as_str(), owner, AuditAction::AccessApprove, details, ledger)
                .await,
        );
        Ok(outcome)
    }

    /// Put a request whose grant could not be issued back to pending and
    /// record the attempt.
    async fn abandon_approval(
        &self,
        owner: &PrincipalId,
        pending: &AccessRequest,
        approved_version: u64,
        error: &PermsError,
    ) {
        match self.store.update_request(pending, approved_version).await {
            Ok(WriteResult::Written { .. }) => {}
            Ok(other) => tracing::error!(
                request = %pending.id,
                result = ?other,
                "approved request changed before it could be reverted"
            ),
            Err(e) => tracing::error!(
                request = %pending.id,
                error = %e,
                "could not revert request to pending"
            ),
        }

        tracing::warn!(request = %pending.id, owner = %owner, error = %error, "approval failed");

        let details = format!(
            "approval of request {} for {} failed: {}",
            pending.id, pending.doctor_id, error
        );
        // append logs its own failure; the caller already has the error.
        let _ = self
            .audit
            .append(
                owner.as_str(),
                owner,
                AuditAction::AccessApproveFailed,
                details,
                error.ledger_results().to_vec(),
            )
            .await;
    }

    /// Deny a pending request. No grant is created.
    pub async fn deny_request(
        &self,
        owner: &PrincipalId,
        request_id: &RequestId,
    ) -> Result<Outcome<AccessRequest>> {
        let stored = self.owned_request(owner, request_id).await?;

        let mut request = stored.value;
        request.deny(self.now())?;
        self.commit_resolution(&request, stored.version).await?;

        tracing::info!(request = %request.id, owner = %owner, "access request denied");

        let details = format!("denied request {} from {}", request.id, request.doctor_id);
        let mut outcome = Outcome::new(request);
        outcome.warn_if(
            self.audit
                .append(owner.as_str(), owner, AuditAction::AccessDeny, details, Vec::new())
                .await,
        );
        Ok(outcome)
    }

    /// The documents an approval screen should offer for a request.
    ///
    /// For an "all documents" request this is the owner's current set, not
    /// the set at submission time. For a specific request it is the requested
    /// documents that still exist.
    pub async fn documents_for_approval(
        &self,
        owner: &PrincipalId,
        request_id: &RequestId,
    ) -> Result<Vec<DocumentMeta>> {
        let request = self
            .store
            .get_request(request_id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("request {}", request_id)))?
            .value;
        if &request.patient_id != owner {
            return Err(VaultError::NotOwner {
                principal: owner.clone(),
            });
        }

        let current = self.list_documents(owner).await?;
        Ok(match &request.requested {
            DocumentSelection::All => current,
            DocumentSelection::Only(ids) => {
                current.into_iter().filter(|d| ids.contains(&d.id)).collect()
            }
        })
    }

    /// Requests addressed to `owner`, oldest first, optionally by status.
    pub async fn requests_for_owner(
        &self,
        owner: &PrincipalId,
        status: Option<RequestStatus>,
    ) -> Result<Vec<AccessRequest>> {
        let requests = self.store.list_requests_for_owner(owner).await?;
        Ok(filter_status(requests, status))
    }

    /// Requests made by `doctor`, oldest first, optionally by status.
    pub async fn requests_by_grantee(
        &self,
        doctor: &PrincipalId,
        status: Option<RequestStatus>,
    ) -> Result<Vec<AccessRequest>> {
        let requests = self.store.list_requests_by_grantee(doctor).await?;
        Ok(filter_status(requests, status))
    }
}

fn filter_status(requests: Vec<AccessRequest>, status: Option<RequestStatus>) -> Vec<AccessRequest> {
    match status {
        Some(status) => requests.into_iter().filter(|r| r.status == status).collect(),
        None => requests,
    }
}
