//! Error taxonomy for Custodia
//!
//! Every error aborts its operation with zero side effects. There is no
//! local recovery or retry inside the engine; the caller decides what to
//! do with the reported kind.

use crate::{AgreementStatus, PartyId};
use thiserror::Error;

/// Result type for Custodia operations
pub type Result<T> = std::result::Result<T, EscrowError>;

/// Custodia error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscrowError {
    /// Referenced agreement ID has no stored record
    #[error("Agreement {agreement_id} not found")]
    NotFound { agreement_id: u64 },

    /// Caller does not hold the role required for the attempted transition
    #[error("Party {caller} is not authorized to act on agreement {agreement_id}")]
    NotAuthorized { agreement_id: u64, caller: PartyId },

    /// Attempted creation collides with an occupied ID (counter guard)
    #[error("Agreement {agreement_id} already exists")]
    AlreadyExists { agreement_id: u64 },

    /// Agreement exists but is not in the precondition status
    #[error(
        "Agreement {agreement_id} is {actual}, expected {expected}"
    )]
    InvalidStatus {
        agreement_id: u64,
        expected: AgreementStatus,
        actual: AgreementStatus,
    },

    /// Ledger transfer could not be completed
    #[error("Insufficient funds: have {available}, need {required}")]
    InsufficientFunds { available: u64, required: u64 },

    /// Description exceeds the 256-scalar bound
    #[error("Description is {length} characters, maximum is 256")]
    DescriptionTooLong { length: usize },
}

impl EscrowError {
    /// Get an error code for surface layers
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::NotAuthorized { .. } => "NOT_AUTHORIZED",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::InvalidStatus { .. } => "INVALID_STATUS",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::DescriptionTooLong { .. } => "DESCRIPTION_TOO_LONG",
        }
    }
}
