// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Ledger Market Simulation - Conservation Logic

//! Conservation checks for the group economy.
//!
//! Trades only move value between participants:
//!
//! ```text
//! tokens_after   == tokens_before
//! bases_after    == bases_before
//! products_after == products_before + products_per_base * bases_bought
//! ```
//!
//! [`ConservationLaw`] verifies every committed transaction and trips a
//! breaker that halts trading in the group on the first violation.
//! [`replay_ledger`] rebuilds balances from the initial endowment and the
//! ledger alone, so an exported ledger can be audited independently.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::balances::Balances;
use crate::config::MarketConfig;
use crate::error::{MarketError, MarketResult};
use crate::ledger::Ledger;
use crate::types::{Participant, ParticipantId, RoleAssignment, TransactionKind, GROUP_SIZE};

// ---------------------------------------------------------------------------
// Totals
// ---------------------------------------------------------------------------

/// Sum of every participant's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTotals {
    pub tokens: u64,
    pub bases: u64,
    pub products: u64,
}

impl GroupTotals {
    pub fn of<'a>(balances: impl IntoIterator<Item = &'a Balances>) -> Self {
        balances.into_iter().fold(Self::default(), |acc, b| Self {
            tokens: acc.tokens + u64::from(b.tokens()),
            bases: acc.bases + u64::from(b.bases()),
            products: acc.products + u64::from(b.products()),
        })
    }

    pub fn of_participants(participants: &[Participant]) -> Self {
        Self::of(participants.iter().map(|p| &p.balances))
    }
}

// ---------------------------------------------------------------------------
// Conservation law (breaker)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConservationLaw {
    checks: u64,
    tripped: Option<String>,
}

impl ConservationLaw {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails while the breaker is tripped.
    pub fn ensure_open(&self) -> MarketResult<()> {
        match &self.tripped {
            Some(reason) => Err(MarketError::ConservationBreach(reason.clone())),
            None => Ok(()),
        }
    }

    /// Check one transaction's effect on the group totals.
    pub fn verify_transaction(
        &mut self,
        kind: TransactionKind,
        quantity: u32,
        products_per_base: u32,
        before: GroupTotals,
        after: GroupTotals,
    ) -> MarketResult<()> {
        self.ensure_open()?;
        self.checks += 1;

        let created = match kind {
            TransactionKind::BasePurchase => u64::from(products_per_base) * u64::from(quantity),
            TransactionKind::ProductSale => 0,
        };
        let expected = GroupTotals {
            tokens: before.tokens,
            bases: before.bases,
            products: before.products + created,
        };
        if after != expected {
            let reason = format!(
                "{kind} check #{}: expected {expected:?}, got {after:?}",
                self.checks
            );
            error!(%reason, "conservation breaker tripped");
            self.tripped = Some(reason.clone());
            return Err(MarketError::ConservationBreach(reason));
        }
        Ok(())
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.is_some()
    }

    pub fn checks(&self) -> u64 {
        self.checks
    }
}

// ---------------------------------------------------------------------------
// Ledger replay
// ---------------------------------------------------------------------------

/// Rebuild every participant's balances from the round's initial endowment
/// and `ledger`, indexed by `id - 1`.
pub fn replay_ledger(
    config: &MarketConfig,
    roles: &RoleAssignment,
    ledger: &Ledger,
) -> MarketResult<[Balances; GROUP_SIZE]> {
    let mut balances: [Balances; GROUP_SIZE] = roles.0.map(|role| config.initial_balances(role));

    for (i, record) in ledger.read().iter().enumerate() {
        let buyer = slot(record.buyer_id)?;
        let seller = slot(record.seller_id)?;
        if roles.0[buyer] != record.buyer_role || roles.0[seller] != record.seller_role {
            return Err(MarketError::validation(format!(
                "ledger entry {i}: roles do not match the group's assignment"
            )));
        }
        match record.kind {
            TransactionKind::BasePurchase => {
                // buyer_id is the producer, seller_id the seller who paid.
                balances[seller].debit_tokens(record.seller_id, record.amount)?;
                balances[seller].add_bases(record.quantity)?;
                balances[seller].add_products(record.quantity.saturating_mul(config.products_per_base))?;
                balances[buyer].take_bases(record.buyer_id, record.quantity)?;
                balances[buyer].credit_tokens(record.amount)?;
            }
            TransactionKind::ProductSale => {
                balances[buyer].debit_tokens(record.buyer_id, record.amount)?;
                balances[buyer].add_products(record.quantity)?;
                balances[seller].take_products(record.seller_id, record.quantity)?;
                balances[seller].credit_tokens(record.amount)?;
                if record.remaining_stock != Some(balances[seller].products()) {
                    return Err(MarketError::validation(format!(
                        "ledger entry {i}: remaining stock {:?} but replay has {}",
                        record.remaining_stock,
                        balances[seller].products()
                    )));
                }
            }
        }
    }
    Ok(balances)
}

/// Replay `ledger` and compare against the live participants.
pub fn verify_replay(
    config: &MarketConfig,
    roles: &RoleAssignment,
    ledger: &Ledger,
    participants: &[Participant],
) -> MarketResult<()> {
    let replayed = replay_ledger(config, roles, ledger)?;
    for p in participants {
        let expected = replayed[slot(p.id)?];
        if p.balances != expected {
            return Err(MarketError::validation(format!(
                "participant {} holds {:?} but the ledger replays to {:?}",
                p.id, p.balances, expected
            )));
        }
    }
    Ok(())
}

fn slot(id: ParticipantId) -> MarketResult<usize> {
    if id.0 == 0 || usize::from(id.0) > GROUP_SIZE {
        return Err(MarketError::UnknownParticipant(id.into()));
    }
    Ok(id.index())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Role, TransactionRecord};

    fn totals(tokens: u64, bases: u64, products: u64) -> GroupTotals {
        GroupTotals { tokens, bases, products }
    }

    #[test]
    fn totals_sum_every_counter() {
        let b = [Balances::new(3, 1, 2), Balances::new(5, 0, 1)];
        assert_eq!(GroupTotals::of(&b), totals(8, 1, 3));
    }

    #[test]
    fn base_purchase_creates_products_only() {
        let mut law = ConservationLaw::new();
        let result = law.verify_transaction(
            TransactionKind::BasePurchase,
            1,
            2,
            totals(21, 2, 0),
            totals(21, 2, 2),
        );
        assert!(result.is_ok());
        assert_eq!(law.checks(), 1);
    }

    #[test]
    fn token_leak_trips_breaker() {
        let mut law = ConservationLaw::new();
        let err = law
            .verify_transaction(TransactionKind::ProductSale, 1, 2, totals(21, 2, 4), totals(20, 2, 4))
            .expect_err("test: leak");
        assert_eq!(err.kind(), "conservation_breach");
        assert!(law.is_tripped());
    }

    #[test]
    fn breaker_blocks_after_trip() {
        let mut law = ConservationLaw::new();
        let _ = law.verify_transaction(
            TransactionKind::ProductSale,
            1,
            2,
            totals(21, 2, 4),
            totals(22, 2, 4),
        );
        let result = law.verify_transaction(
            TransactionKind::ProductSale,
            1,
            2,
            totals(21, 2, 4),
            totals(21, 2, 4),
        );
        assert!(matches!(result, Err(MarketError::ConservationBreach(_))));
        assert!(law.ensure_open().is_err());
    }

    #[test]
    fn replay_reproduces_trades() {
        let config = MarketConfig::default();
        let roles = RoleAssignment::standard();
        let mut ledger = Ledger::new(1);
        ledger
            .append(TransactionRecord {
                round: 1,
                kind: TransactionKind::BasePurchase,
                buyer_id: ParticipantId(1),
                buyer_role: Role::Producer,
                seller_id: ParticipantId(2),
                seller_role: Role::Seller,
                amount: 2,
                quantity: 1,
                remaining_stock: None,
            })
            .expect("test: base");
        ledger
            .append(TransactionRecord {
                round: 1,
                kind: TransactionKind::ProductSale,
                buyer_id: ParticipantId(4),
                buyer_role: Role::Buyer,
                seller_id: ParticipantId(2),
                seller_role: Role::Seller,
                amount: 3,
                quantity: 1,
                remaining_stock: Some(1),
            })
            .expect("test: sale");

        let replayed = replay_ledger(&config, &roles, &ledger).expect("test: replay");
        assert_eq!(replayed[0], Balances::new(2, 1, 0));
        assert_eq!(replayed[1], Balances::new(4, 1, 1));
        assert_eq!(replayed[3], Balances::new(2, 0, 1));
        assert_eq!(replayed[4], Balances::new(5, 0, 0));
    }

    #[test]
    fn replay_rejects_wrong_remaining_stock() {
        let config = MarketConfig::default();
        let roles = RoleAssignment::standard();
        let mut ledger = Ledger::new(1);
        ledger
            .append(TransactionRecord {
                round: 1,
                kind: TransactionKind::BasePurchase,
                buyer_id: ParticipantId(1),
                buyer_role: Role::Producer,
                seller_id: ParticipantId(3),
                seller_role: Role::Seller,
                amount: 1,
                quantity: 1,
                remaining_stock: None,
            })
            .expect("test: base");
        ledger
            .append(TransactionRecord {
                round: 1,
                kind: TransactionKind::ProductSale,
                buyer_id: ParticipantId(6),
                buyer_role: Role::Buyer,
                seller_id: ParticipantId(3),
                seller_role: Role::Seller,
                amount: 2,
                quantity: 1,
                remaining_stock: Some(0),
            })
            .expect("test: sale");
        assert!(replay_ledger(&config, &roles, &ledger).is_err());
    }

    #[test]
    fn replay_rejects_overdraft() {
        let config = MarketConfig::default();
        let roles = RoleAssignment::standard();
        let mut ledger = Ledger::new(1);
        ledger
            .append(TransactionRecord {
                round: 1,
                kind: TransactionKind::BasePurchase,
                buyer_id: ParticipantId(1),
                buyer_role: Role::Producer,
                seller_id: ParticipantId(2),
                seller_role: Role::Seller,
                amount: 4,
                quantity: 1,
                remaining_stock: None,
            })
            .expect("test: record is well-formed");
        let err = replay_ledger(&config, &roles, &ledger).expect_err("test: overdraft");
        assert_eq!(err.kind(), "insufficient_funds");
    }
}
