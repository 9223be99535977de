//! Agreement record and status state machine
//!
//! One `Agreement` is a single escrow transaction between a vendor and a
//! buyer. Only `status` ever changes after creation, and only through the
//! engine's transition operations; records are never deleted, so a terminal
//! status is a permanent record of the outcome.

use crate::{Amount, AgreementId, PartyId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on the agreement description, in UTF-8 scalar values
pub const MAX_DESCRIPTION_CHARS: usize = 256;

/// Lifecycle status of an agreement
///
/// ```text
/// Pending -> Funded -> Accepted -> Completed
///                           \
///                            -> Disputed -> Refunded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgreementStatus {
    /// Created, awaiting the buyer's deposit
    Pending,
    /// Buyer's deposit is held in custody
    Funded,
    /// Buyer acknowledged the funded agreement
    Accepted,
    /// Funds released to the vendor
    Completed,
    /// Buyer diverted the agreement, awaiting arbitration
    Disputed,
    /// Arbiter returned the funds to the buyer
    Refunded,
}

impl AgreementStatus {
    /// Check if this is a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Refunded)
    }

    /// Check if an agreement in this status has funds in custody
    pub fn holds_funds(&self) -> bool {
        matches!(self, Self::Funded | Self::Accepted | Self::Disputed)
    }
}

impl fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Funded => "funded",
            Self::Accepted => "accepted",
            Self::Completed => "completed",
            Self::Disputed => "disputed",
            Self::Refunded => "refunded",
        };
        write!(f, "{s}")
    }
}

/// A two-party escrow agreement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    /// Sequential identifier assigned at creation
    pub id: AgreementId,
    /// Party that created the agreement and receives funds on completion
    pub vendor: PartyId,
    /// Counterparty designated at creation; the only party that may fund,
    /// accept, complete, or dispute
    pub buyer: PartyId,
    /// Quantity the buyer must deposit; fixed at creation
    pub amount: Amount,
    /// Free-form description, opaque to the state machine
    pub description: String,
    /// Current lifecycle status
    pub status: AgreementStatus,
    /// When the agreement was created
    pub created_at: DateTime<Utc>,
}

/// Funds held in custody for one agreement
///
/// Present only while the agreement's status is `Funded`, `Accepted`, or
/// `Disputed`. Created on funding, removed on completion or refund, never
/// otherwise mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowBalance {
    /// The agreement this balance belongs to
    pub agreement_id: AgreementId,
    /// Amount in custody, equal to the agreement's `amount`
    pub balance: Amount,
}
