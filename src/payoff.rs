// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Ledger Market Simulation - Payoffs

//! End-of-round scores derived from terminal balances.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{BuyerPayoffRule, MarketConfig};
use crate::ledger::Ledger;
use crate::types::{Participant, ParticipantId, Role, TransactionKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payoff {
    pub participant: ParticipantId,
    pub role: Role,
    pub points: u64,
    /// `points * currency_per_point`.
    pub currency: Decimal,
}

/// Score every participant. Pure: reads balances and, for the legacy buyer
/// rule, the round's ledger.
pub fn compute(
    config: &MarketConfig,
    participants: &[Participant],
    ledger: &Ledger,
) -> BTreeMap<ParticipantId, Payoff> {
    let first_seller = participants
        .iter()
        .filter(|p| p.role == Role::Seller)
        .map(|p| p.id)
        .min();

    participants
        .iter()
        .map(|p| {
            let tokens = u64::from(p.tokens());
            let points = match p.role {
                Role::Producer => tokens,
                Role::Seller => tokens * u64::from(config.seller_token_multiplier),
                Role::Buyer => {
                    let units = match config.buyer_payoff_rule {
                        BuyerPayoffRule::AllLegs => u64::from(p.products()),
                        BuyerPayoffRule::FirstLegDoubled => {
                            let first_leg = first_seller
                                .map(|s| units_bought(ledger, p.id, s))
                                .unwrap_or(0);
                            first_leg + first_leg
                        }
                    };
                    units * u64::from(config.buyer_unit_value) + tokens
                }
            };
            let payoff = Payoff {
                participant: p.id,
                role: p.role,
                points,
                currency: Decimal::from(points) * config.currency_per_point,
            };
            (p.id, payoff)
        })
        .collect()
}

fn units_bought(ledger: &Ledger, buyer: ParticipantId, seller: ParticipantId) -> u64 {
    ledger
        .read()
        .iter()
        .filter(|r| r.kind == TransactionKind::ProductSale)
        .filter(|r| r.buyer_id == buyer && r.seller_id == seller)
        .map(|r| u64::from(r.quantity))
        .sum()
}
