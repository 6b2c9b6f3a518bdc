//! Error types for ledger calls.

use std::time::Duration;

use medvault_core::LedgerStatus;
use thiserror::Error;

/// Errors a ledger call can end in.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The ledger could not be reached.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger answered and refused the call.
    #[error("ledger rejected call: {0}")]
    Rejected(String),

    /// The call did not complete within the allowed time.
    #[error("ledger call timed out after {0:?}")]
    Timeout(Duration),

    /// The ledger answered with something we could not interpret.
    #[error("invalid ledger response: {0}")]
    InvalidResponse(String),
}

impl LedgerError {
    /// How this failure is recorded against a document.
    pub fn status(&self) -> LedgerStatus {
        match self {
            LedgerError::Unavailable(_) | LedgerError::InvalidResponse(_) => {
                LedgerStatus::Unavailable
            }
            LedgerError::Rejected(_) => LedgerStatus::Rejected,
            LedgerError::Timeout(_) => LedgerStatus::TimedOut,
        }
    }
}

/// Result type for ledger calls.
pub type Result<T> = std::result::Result<T, LedgerError>;
