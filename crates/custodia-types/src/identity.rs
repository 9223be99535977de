//! Identity types for Custodia
//!
//! Party identities are strongly typed wrappers around UUIDs to prevent
//! accidental mixing with other ID types. Agreement IDs are sequential
//! integers assigned by the engine's counter, so they wrap a `u64` instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a transacting party (vendor, buyer, arbiter, custody account)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyId(pub Uuid);

impl PartyId {
    /// Create a new random identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse from a string (with or without the `party_` prefix)
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        let s = s.strip_prefix("party_").unwrap_or(s);
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PartyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "party_{}", self.0)
    }
}

impl From<Uuid> for PartyId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Identifier of an escrow agreement
///
/// Assigned by the engine from a single counter: dense, monotonically
/// increasing from 1, never reused or skipped.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AgreementId(pub u64);

impl AgreementId {
    /// The first ID the engine hands out
    pub const FIRST: AgreementId = AgreementId(1);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The ID that follows this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AgreementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agreement_{}", self.0)
    }
}

impl From<u64> for AgreementId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
