//! Error types for the MedVault core model.

use thiserror::Error;

use crate::request::RequestStatus;
use crate::types::RequestId;

/// Errors raised when a model invariant would be violated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("grant must expire after it is granted (granted_at={granted_at}, expires_at={expires_at})")]
    InvalidExpiry { granted_at: i64, expires_at: i64 },

    #[error("duration must be at least one hour")]
    ZeroDuration,

    #[error("grant must cover at least one document")]
    EmptyGrant,

    #[error("grantee and owner must be different principals")]
    SelfGrant,

    #[error("request {id} is {status}, expected pending")]
    InvalidTransition { id: RequestId, status: RequestStatus },

    #[error("principal id must not be empty")]
    EmptyPrincipal,

    #[error("malformed identifier: {0}")]
    MalformedId(String),
}

/// Result type for core model operations.
pub type Result<T> = std::result::Result<T, CoreError>;
