//! Custodia Engine - The escrow agreement lifecycle state machine
//!
//! The engine owns the agreement registry and the escrow-balance registry
//! and exposes the lifecycle operations:
//!
//! - `create_agreement` (anyone; caller becomes the vendor)
//! - `fund_agreement` (buyer; MOVES FUNDS into custody)
//! - `accept_agreement` (buyer)
//! - `complete_agreement` (buyer; MOVES FUNDS to the vendor)
//! - `dispute_agreement` (buyer)
//! - `refund_agreement` (arbiter; MOVES FUNDS back to the buyer)
//! - `get_agreement` / `get_escrow_balance` (read-only)
//!
//! # Key Principle
//!
//! Every mutating operation runs the same short-circuiting pipeline before
//! any side effect: existence check, authorization check, status check.
//! Fund-moving operations perform the ledger transfer after the checks and
//! before the status commit, so no status change is ever observable
//! without its paired transfer having succeeded.

pub mod engine;

pub use engine::EscrowEngine;

pub use custodia_ledger::{EntryReason, InMemoryLedger, LedgerGateway};
pub use custodia_types::{
    Agreement, AgreementId, AgreementStatus, Amount, EscrowBalance, EscrowError, PartyId, Result,
};
