//! Custodia Ledger - Value-transfer gateway and in-memory reference ledger
//!
//! The escrow engine consumes value transfer through the [`LedgerGateway`]
//! trait and never implements it. [`InMemoryLedger`] is the reference
//! implementation used by tests and the CLI: account-keyed balances with an
//! append-only entry journal.
//!
//! # Invariants
//!
//! 1. No negative balances
//! 2. Every entry has a reason
//! 3. Transfers are atomic: both legs apply or neither does
//! 4. The journal is append-only

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use custodia_types::{AgreementId, Amount, EscrowError, PartyId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in ledger operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Account {account} not found")]
    AccountNotFound { account: PartyId },

    #[error("Insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: u64, required: u64 },

    #[error("Balance overflow on account {account}")]
    AmountOverflow { account: PartyId },
}

// The engine surfaces every refused transfer as InsufficientFunds; an
// account with no ledger record simply has nothing to spend.
impl From<LedgerError> for EscrowError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance {
                available,
                required,
            } => EscrowError::InsufficientFunds {
                available,
                required,
            },
            LedgerError::AccountNotFound { .. } | LedgerError::AmountOverflow { .. } => {
                EscrowError::InsufficientFunds {
                    available: 0,
                    required: 0,
                }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Value-transfer primitive the escrow engine relies on
///
/// `transfer` must be atomic: on failure (for example insufficient balance)
/// no partial effect is observable. The engine performs no retries; a
/// failure is surfaced immediately. The reason annotates the journal and
/// has no effect on the transfer itself.
pub trait LedgerGateway {
    /// Move `amount` from one account to another, all-or-nothing
    fn transfer(
        &mut self,
        from: &PartyId,
        to: &PartyId,
        amount: Amount,
        reason: EntryReason,
    ) -> Result<()>;

    /// Current balance of an account (zero if it has no record)
    fn balance(&self, account: &PartyId) -> Amount;
}

/// Unique identifier for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn new() -> Self {
        Self(format!("entry_{}", Uuid::new_v4()))
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

/// Type of ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    /// Credit (increase) to an account
    Credit,
    /// Debit (decrease) from an account
    Debit,
}

/// Reason for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryReason {
    /// External deposit seeding an account
    Deposit,
    /// Plain transfer between accounts
    Transfer,
    /// Buyer's deposit locked into custody
    EscrowLock { agreement_id: AgreementId },
    /// Custody released to the vendor on completion
    EscrowRelease { agreement_id: AgreementId },
    /// Custody returned to the buyer on refund
    EscrowRefund { agreement_id: AgreementId },
}

/// A single ledger entry (one side of a double-entry)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,
    pub account: PartyId,
    pub entry_type: EntryType,
    pub amount: Amount,
    pub balance_after: Amount,
    pub reason: EntryReason,
    pub created_at: DateTime<Utc>,
}

/// In-memory reference ledger
///
/// Account-keyed balances with an append-only journal. Synchronous and
/// single-writer, matching the engine's execution model; a host that needs
/// concurrent access wraps it in its own lock.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    accounts: HashMap<PartyId, Amount>,
    entries: Vec<LedgerEntry>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account, creating it if needed
    ///
    /// Used to seed balances before escrow flows run. Returns the new
    /// balance.
    pub fn credit(&mut self, account: &PartyId, amount: Amount, reason: EntryReason) -> Result<Amount> {
        let current = self.balance(account);
        let new_balance = current
            .checked_add(amount)
            .ok_or_else(|| LedgerError::AmountOverflow {
                account: account.clone(),
            })?;

        self.accounts.insert(account.clone(), new_balance);
        self.entries.push(LedgerEntry {
            entry_id: EntryId::new(),
            account: account.clone(),
            entry_type: EntryType::Credit,
            amount,
            balance_after: new_balance,
            reason,
            created_at: Utc::now(),
        });

        Ok(new_balance)
    }

    /// Debit an account
    ///
    /// Fails if the balance would go negative. Returns the new balance.
    pub fn debit(&mut self, account: &PartyId, amount: Amount, reason: EntryReason) -> Result<Amount> {
        let current = self
            .accounts
            .get(account)
            .copied()
            .ok_or_else(|| LedgerError::AccountNotFound {
                account: account.clone(),
            })?;

        let new_balance =
            current
                .checked_sub(amount)
                .ok_or(LedgerError::InsufficientBalance {
                    available: current.value(),
                    required: amount.value(),
                })?;

        self.accounts.insert(account.clone(), new_balance);
        self.entries.push(LedgerEntry {
            entry_id: EntryId::new(),
            account: account.clone(),
            entry_type: EntryType::Debit,
            amount,
            balance_after: new_balance,
            reason,
            created_at: Utc::now(),
        });

        Ok(new_balance)
    }

    /// All entries touching an account, oldest first
    pub fn entries_for(&self, account: &PartyId) -> Vec<&LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| &e.account == account)
            .collect()
    }

    /// Total number of journal entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl LedgerGateway for InMemoryLedger {
    /// Checks both legs before touching anything so a failure leaves zero
    /// entries behind.
    fn transfer(
        &mut self,
        from: &PartyId,
        to: &PartyId,
        amount: Amount,
        reason: EntryReason,
    ) -> Result<()> {
        let available = self
            .accounts
            .get(from)
            .copied()
            .ok_or_else(|| LedgerError::AccountNotFound {
                account: from.clone(),
            })?;
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                available: available.value(),
                required: amount.value(),
            });
        }
        // Receiving side must not overflow either, checked up front.
        let receiving = self.balance(to);
        if receiving.checked_add(amount).is_none() {
            return Err(LedgerError::AmountOverflow { account: to.clone() });
        }

        self.debit(from, amount, reason.clone())?;
        self.credit(to, amount, reason)?;
        Ok(())
    }

    fn balance(&self, account: &PartyId) -> Amount {
        self.accounts.get(account).copied().unwrap_or(Amount::zero())
    }
}
