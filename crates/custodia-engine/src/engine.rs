//! The escrow engine: agreement registry, custody bookkeeping, and the
//! status transition pipeline.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info};

use custodia_ledger::{EntryReason, LedgerGateway};
use custodia_types::{
    Agreement, AgreementId, AgreementStatus, Amount, EscrowBalance, EscrowError, PartyId, Result,
    MAX_DESCRIPTION_CHARS,
};

/// The escrow agreement lifecycle engine
///
/// Owns both registries and the ID counter; the hosting environment owns
/// serialization of concurrent calls. Each operation runs to completion
/// against the current stored state: checks first, then the ledger
/// transfer where one applies, then the status commit. A transfer failure
/// therefore leaves the record exactly as it was.
pub struct EscrowEngine<L: LedgerGateway> {
    ledger: L,
    /// Account that holds escrowed funds between funding and disbursal
    custody: PartyId,
    /// Distinguished identity allowed to resolve disputes
    arbiter: PartyId,
    agreements: HashMap<AgreementId, Agreement>,
    balances: HashMap<AgreementId, EscrowBalance>,
    /// Next ID to assign; IDs are dense, monotonic, never reused
    next_id: AgreementId,
}

impl<L: LedgerGateway> EscrowEngine<L> {
    /// Create an engine over the given ledger with a fresh custody account
    pub fn new(ledger: L, arbiter: PartyId) -> Self {
        Self::with_custody_account(ledger, arbiter, PartyId::new())
    }

    /// Create an engine with an explicit custody account
    pub fn with_custody_account(ledger: L, arbiter: PartyId, custody: PartyId) -> Self {
        Self {
            ledger,
            custody,
            arbiter,
            agreements: HashMap::new(),
            balances: HashMap::new(),
            next_id: AgreementId::FIRST,
        }
    }

    /// Create a new agreement; the caller becomes its vendor
    ///
    /// Note: `vendor == buyer` is not rejected. The state machine does not
    /// care, and callers that do must check before calling.
    pub fn create_agreement(
        &mut self,
        caller: &PartyId,
        buyer: PartyId,
        amount: Amount,
        description: String,
    ) -> Result<AgreementId> {
        let length = description.chars().count();
        if length > MAX_DESCRIPTION_CHARS {
            return Err(EscrowError::DescriptionTooLong { length });
        }

        let id = self.next_id;
        // Counter-consistency guard: the slot for a fresh ID must be empty.
        if self.agreements.contains_key(&id) {
            return Err(EscrowError::AlreadyExists {
                agreement_id: id.value(),
            });
        }

        self.agreements.insert(
            id,
            Agreement {
                id,
                vendor: caller.clone(),
                buyer,
                amount,
                description,
                status: AgreementStatus::Pending,
                created_at: Utc::now(),
            },
        );
        self.next_id = id.next();

        info!(agreement = %id, vendor = %caller, %amount, "agreement created");
        Ok(id)
    }

    /// Fund a pending agreement - MOVES FUNDS
    ///
    /// Transfers the agreed amount from the buyer to custody and records
    /// the escrow balance.
    pub fn fund_agreement(&mut self, caller: &PartyId, id: AgreementId) -> Result<bool> {
        let agreement = self.buyer_checked(caller, id, AgreementStatus::Pending)?;
        let buyer = agreement.buyer.clone();
        let amount = agreement.amount;

        self.ledger.transfer(
            &buyer,
            &self.custody,
            amount,
            EntryReason::EscrowLock { agreement_id: id },
        )?;

        self.balances.insert(
            id,
            EscrowBalance {
                agreement_id: id,
                balance: amount,
            },
        );
        self.agreements.get_mut(&id).unwrap().status = AgreementStatus::Funded;

        info!(agreement = %id, %amount, "agreement funded, amount locked in custody");
        Ok(true)
    }

    /// Acknowledge a funded agreement (no fund movement)
    pub fn accept_agreement(&mut self, caller: &PartyId, id: AgreementId) -> Result<bool> {
        self.buyer_checked(caller, id, AgreementStatus::Funded)?;
        self.agreements.get_mut(&id).unwrap().status = AgreementStatus::Accepted;

        info!(agreement = %id, "agreement accepted");
        Ok(true)
    }

    /// Complete an accepted agreement - MOVES FUNDS
    ///
    /// Releases the escrow balance to the vendor and removes the custody
    /// record.
    pub fn complete_agreement(&mut self, caller: &PartyId, id: AgreementId) -> Result<bool> {
        let agreement = self.buyer_checked(caller, id, AgreementStatus::Accepted)?;
        let vendor = agreement.vendor.clone();
        // Invariant: Funded/Accepted/Disputed implies a custody record.
        let held = self.balances[&id].balance;

        self.ledger.transfer(
            &self.custody,
            &vendor,
            held,
            EntryReason::EscrowRelease { agreement_id: id },
        )?;

        self.balances.remove(&id);
        self.agreements.get_mut(&id).unwrap().status = AgreementStatus::Completed;

        info!(agreement = %id, %vendor, amount = %held, "agreement completed, custody released to vendor");
        Ok(true)
    }

    /// Divert an accepted agreement into dispute (no fund movement)
    pub fn dispute_agreement(&mut self, caller: &PartyId, id: AgreementId) -> Result<bool> {
        self.buyer_checked(caller, id, AgreementStatus::Accepted)?;
        self.agreements.get_mut(&id).unwrap().status = AgreementStatus::Disputed;

        info!(agreement = %id, "agreement disputed");
        Ok(true)
    }

    /// Resolve a dispute by refunding the buyer - MOVES FUNDS
    ///
    /// Only the arbiter may call this, and refunding is the only
    /// resolution the engine offers.
    pub fn refund_agreement(&mut self, caller: &PartyId, id: AgreementId) -> Result<bool> {
        let agreement = self
            .agreements
            .get(&id)
            .ok_or(EscrowError::NotFound {
                agreement_id: id.value(),
            })?;
        if caller != &self.arbiter {
            debug!(agreement = %id, %caller, "refund rejected: caller is not the arbiter");
            return Err(EscrowError::NotAuthorized {
                agreement_id: id.value(),
                caller: caller.clone(),
            });
        }
        if agreement.status != AgreementStatus::Disputed {
            debug!(agreement = %id, status = %agreement.status, "refund rejected: not disputed");
            return Err(EscrowError::InvalidStatus {
                agreement_id: id.value(),
                expected: AgreementStatus::Disputed,
                actual: agreement.status,
            });
        }

        let buyer = agreement.buyer.clone();
        // Invariant: Funded/Accepted/Disputed implies a custody record.
        let held = self.balances[&id].balance;

        self.ledger.transfer(
            &self.custody,
            &buyer,
            held,
            EntryReason::EscrowRefund { agreement_id: id },
        )?;

        self.balances.remove(&id);
        self.agreements.get_mut(&id).unwrap().status = AgreementStatus::Refunded;

        info!(agreement = %id, %buyer, amount = %held, "dispute resolved, custody refunded to buyer");
        Ok(true)
    }

    /// Look up an agreement
    pub fn get_agreement(&self, id: AgreementId) -> Option<&Agreement> {
        self.agreements.get(&id)
    }

    /// Look up the custody record for an agreement
    ///
    /// `None` after completion or refund, or if the agreement was never
    /// funded.
    pub fn get_escrow_balance(&self, id: AgreementId) -> Option<&EscrowBalance> {
        self.balances.get(&id)
    }

    /// Number of agreements ever created
    pub fn agreement_count(&self) -> usize {
        self.agreements.len()
    }

    /// All agreements where the party is vendor or buyer
    pub fn agreements_for_party(&self, party: &PartyId) -> Vec<&Agreement> {
        let mut found: Vec<&Agreement> = self
            .agreements
            .values()
            .filter(|a| &a.vendor == party || &a.buyer == party)
            .collect();
        found.sort_by_key(|a| a.id);
        found
    }

    /// The distinguished dispute-resolution identity
    pub fn arbiter(&self) -> &PartyId {
        &self.arbiter
    }

    /// The account holding escrowed funds
    pub fn custody_account(&self) -> &PartyId {
        &self.custody
    }

    /// The underlying ledger
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Shared pipeline for buyer-driven transitions, in the fixed order:
    /// existence, authorization, status. Short-circuits with no mutation.
    fn buyer_checked(
        &self,
        caller: &PartyId,
        id: AgreementId,
        expected: AgreementStatus,
    ) -> Result<&Agreement> {
        let agreement = self
            .agreements
            .get(&id)
            .ok_or(EscrowError::NotFound {
                agreement_id: id.value(),
            })?;
        if caller != &agreement.buyer {
            debug!(agreement = %id, %caller, "rejected: caller is not the buyer");
            return Err(EscrowError::NotAuthorized {
                agreement_id: id.value(),
                caller: caller.clone(),
            });
        }
        if agreement.status != expected {
            debug!(agreement = %id, status = %agreement.status, %expected, "rejected: wrong status");
            return Err(EscrowError::InvalidStatus {
                agreement_id: id.value(),
                expected,
                actual: agreement.status,
            });
        }
        Ok(agreement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custodia_ledger::InMemoryLedger;

    fn seeded_engine(
        buyer_funds: u64,
    ) -> (EscrowEngine<InMemoryLedger>, PartyId, PartyId, PartyId) {
        let vendor = PartyId::new();
        let buyer = PartyId::new();
        let arbiter = PartyId::new();

        let mut ledger = InMemoryLedger::new();
        ledger
            .credit(&buyer, Amount::new(buyer_funds), EntryReason::Deposit)
            .unwrap();

        let engine = EscrowEngine::new(ledger, arbiter.clone());
        (engine, vendor, buyer, arbiter)
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let (mut engine, vendor, buyer, _) = seeded_engine(0);

        let first = engine
            .create_agreement(&vendor, buyer.clone(), Amount::new(10), "one".into())
            .unwrap();
        let second = engine
            .create_agreement(&vendor, buyer, Amount::new(20), "two".into())
            .unwrap();

        assert_eq!(first, AgreementId::new(1));
        assert_eq!(second, AgreementId::new(2));
        assert_eq!(engine.agreement_count(), 2);
    }

    #[test]
    fn test_create_stores_record_as_pending() {
        let (mut engine, vendor, buyer, _) = seeded_engine(0);

        let id = engine
            .create_agreement(&vendor, buyer.clone(), Amount::new(1000), "site".into())
            .unwrap();
        let agreement = engine.get_agreement(id).unwrap();

        assert_eq!(agreement.vendor, vendor);
        assert_eq!(agreement.buyer, buyer);
        assert_eq!(agreement.amount, Amount::new(1000));
        assert_eq!(agreement.status, AgreementStatus::Pending);
        assert!(engine.get_escrow_balance(id).is_none());
    }

    #[test]
    fn test_create_rejects_long_description() {
        let (mut engine, vendor, buyer, _) = seeded_engine(0);

        let result = engine.create_agreement(&vendor, buyer.clone(), Amount::new(1), "x".repeat(257));
        assert_eq!(result, Err(EscrowError::DescriptionTooLong { length: 257 }));
        // No record stored and no ID consumed by the rejection
        assert_eq!(engine.agreement_count(), 0);
        let id = engine
            .create_agreement(&vendor, buyer, Amount::new(1), "x".repeat(256))
            .unwrap();
        assert_eq!(id, AgreementId::new(1));
    }

    #[test]
    fn test_fund_moves_amount_into_custody() {
        let (mut engine, vendor, buyer, _) = seeded_engine(1500);

        let id = engine
            .create_agreement(&vendor, buyer.clone(), Amount::new(1000), "site".into())
            .unwrap();
        assert!(engine.fund_agreement(&buyer, id).unwrap());

        assert_eq!(
            engine.get_agreement(id).unwrap().status,
            AgreementStatus::Funded
        );
        assert_eq!(
            engine.get_escrow_balance(id).unwrap().balance,
            Amount::new(1000)
        );
        assert_eq!(engine.ledger().balance(&buyer), Amount::new(500));
        assert_eq!(
            engine.ledger().balance(engine.custody_account()),
            Amount::new(1000)
        );
    }

    #[test]
    fn test_fund_requires_buyer() {
        let (mut engine, vendor, buyer, _) = seeded_engine(1000);
        let outsider = PartyId::new();

        let id = engine
            .create_agreement(&vendor, buyer, Amount::new(1000), "site".into())
            .unwrap();
        let result = engine.fund_agreement(&outsider, id);

        assert_eq!(
            result,
            Err(EscrowError::NotAuthorized {
                agreement_id: 1,
                caller: outsider,
            })
        );
        assert_eq!(
            engine.get_agreement(id).unwrap().status,
            AgreementStatus::Pending
        );
    }

    #[test]
    fn test_fund_unknown_agreement() {
        let (mut engine, _, buyer, _) = seeded_engine(1000);
        let result = engine.fund_agreement(&buyer, AgreementId::new(1));
        assert_eq!(result, Err(EscrowError::NotFound { agreement_id: 1 }));
    }

    #[test]
    fn test_fund_with_insufficient_balance_leaves_state_unchanged() {
        let (mut engine, vendor, buyer, _) = seeded_engine(400);

        let id = engine
            .create_agreement(&vendor, buyer.clone(), Amount::new(1000), "site".into())
            .unwrap();
        let result = engine.fund_agreement(&buyer, id);

        assert_eq!(
            result,
            Err(EscrowError::InsufficientFunds {
                available: 400,
                required: 1000,
            })
        );
        assert_eq!(
            engine.get_agreement(id).unwrap().status,
            AgreementStatus::Pending
        );
        assert!(engine.get_escrow_balance(id).is_none());
        assert_eq!(engine.ledger().balance(&buyer), Amount::new(400));
    }

    #[test]
    fn test_accept_only_from_funded() {
        let (mut engine, vendor, buyer, _) = seeded_engine(1000);

        let id = engine
            .create_agreement(&vendor, buyer.clone(), Amount::new(1000), "site".into())
            .unwrap();

        // accept before fund
        assert_eq!(
            engine.accept_agreement(&buyer, id),
            Err(EscrowError::InvalidStatus {
                agreement_id: 1,
                expected: AgreementStatus::Funded,
                actual: AgreementStatus::Pending,
            })
        );

        engine.fund_agreement(&buyer, id).unwrap();
        assert!(engine.accept_agreement(&buyer, id).unwrap());

        // second accept: Accepted is not Funded
        assert_eq!(
            engine.accept_agreement(&buyer, id),
            Err(EscrowError::InvalidStatus {
                agreement_id: 1,
                expected: AgreementStatus::Funded,
                actual: AgreementStatus::Accepted,
            })
        );
    }

    #[test]
    fn test_complete_releases_to_vendor() {
        let (mut engine, vendor, buyer, _) = seeded_engine(1000);

        let id = engine
            .create_agreement(&vendor, buyer.clone(), Amount::new(1000), "site".into())
            .unwrap();
        engine.fund_agreement(&buyer, id).unwrap();
        engine.accept_agreement(&buyer, id).unwrap();
        assert!(engine.complete_agreement(&buyer, id).unwrap());

        assert_eq!(
            engine.get_agreement(id).unwrap().status,
            AgreementStatus::Completed
        );
        assert!(engine.get_escrow_balance(id).is_none());
        assert_eq!(engine.ledger().balance(&vendor), Amount::new(1000));
        assert_eq!(
            engine.ledger().balance(engine.custody_account()),
            Amount::zero()
        );
    }

    #[test]
    fn test_vendor_cannot_drive_the_flow() {
        let (mut engine, vendor, buyer, _) = seeded_engine(1000);

        let id = engine
            .create_agreement(&vendor, buyer.clone(), Amount::new(1000), "site".into())
            .unwrap();
        engine.fund_agreement(&buyer, id).unwrap();
        engine.accept_agreement(&buyer, id).unwrap();

        for result in [
            engine.complete_agreement(&vendor, id),
            engine.dispute_agreement(&vendor, id),
        ] {
            assert_eq!(
                result,
                Err(EscrowError::NotAuthorized {
                    agreement_id: 1,
                    caller: vendor.clone(),
                })
            );
        }
    }

    #[test]
    fn test_refund_requires_arbiter() {
        let (mut engine, vendor, buyer, arbiter) = seeded_engine(1000);

        let id = engine
            .create_agreement(&vendor, buyer.clone(), Amount::new(1000), "site".into())
            .unwrap();
        engine.fund_agreement(&buyer, id).unwrap();
        engine.accept_agreement(&buyer, id).unwrap();
        engine.dispute_agreement(&buyer, id).unwrap();

        // Neither vendor nor buyer may resolve
        assert!(matches!(
            engine.refund_agreement(&vendor, id),
            Err(EscrowError::NotAuthorized { .. })
        ));
        assert!(matches!(
            engine.refund_agreement(&buyer, id),
            Err(EscrowError::NotAuthorized { .. })
        ));

        assert!(engine.refund_agreement(&arbiter, id).unwrap());
        assert_eq!(
            engine.get_agreement(id).unwrap().status,
            AgreementStatus::Refunded
        );
        assert!(engine.get_escrow_balance(id).is_none());
        assert_eq!(engine.ledger().balance(&buyer), Amount::new(1000));
    }

    #[test]
    fn test_refund_only_from_disputed() {
        let (mut engine, vendor, buyer, arbiter) = seeded_engine(1000);

        let id = engine
            .create_agreement(&vendor, buyer.clone(), Amount::new(1000), "site".into())
            .unwrap();
        engine.fund_agreement(&buyer, id).unwrap();

        assert_eq!(
            engine.refund_agreement(&arbiter, id),
            Err(EscrowError::InvalidStatus {
                agreement_id: 1,
                expected: AgreementStatus::Disputed,
                actual: AgreementStatus::Funded,
            })
        );
    }

    #[test]
    fn test_agreements_for_party() {
        let (mut engine, vendor, buyer, _) = seeded_engine(0);
        let other_buyer = PartyId::new();

        engine
            .create_agreement(&vendor, buyer.clone(), Amount::new(1), "a".into())
            .unwrap();
        engine
            .create_agreement(&vendor, other_buyer.clone(), Amount::new(2), "b".into())
            .unwrap();

        assert_eq!(engine.agreements_for_party(&vendor).len(), 2);
        assert_eq!(engine.agreements_for_party(&buyer).len(), 1);
        assert_eq!(engine.agreements_for_party(&other_buyer).len(), 1);
        assert_eq!(engine.agreements_for_party(&PartyId::new()).len(), 0);
    }
}
