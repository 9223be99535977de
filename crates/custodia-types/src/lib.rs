//! Custodia Types - Canonical domain types for two-party escrow
//!
//! This crate contains all foundational types for Custodia with zero
//! dependencies on other custodia crates:
//!
//! - Identity types (PartyId, AgreementId)
//! - Amount type with checked arithmetic
//! - Agreement record and status state machine
//! - Escrow balance record
//! - Error taxonomy
//!
//! # Architectural Invariants
//!
//! 1. Agreement IDs are dense and monotonically increasing from 1
//! 2. An escrow balance exists iff the agreement is Funded, Accepted,
//!    or Disputed
//! 3. `vendor`, `buyer`, `amount`, `description`, `created_at` never
//!    change after creation
//! 4. Every status transition is paired with its authorization rule

pub mod agreement;
pub mod amount;
pub mod error;
pub mod identity;

pub use agreement::*;
pub use amount::*;
pub use error::*;
pub use identity::*;

/// Version of the Custodia types schema
pub const TYPES_VERSION: &str = "0.1.0";
