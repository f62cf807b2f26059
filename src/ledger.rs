// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Ledger Market Simulation - Public Ledger

//! Append-only, group-scoped record of completed transactions.
//!
//! There is no removal or in-place edit. Everything the group sees about past
//! trades in a round comes from [`Ledger::read`].

use serde::{Deserialize, Serialize};

use crate::error::{MarketError, MarketResult};
use crate::types::{Role, TransactionKind, TransactionRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    round: u32,
    records: Vec<TransactionRecord>,
}

impl Ledger {
    pub fn new(round: u32) -> Self {
        Self { round, records: Vec::new() }
    }

    /// Rebuild a ledger from exported records, re-validating each one.
    pub fn from_records(round: u32, records: Vec<TransactionRecord>) -> MarketResult<Self> {
        let mut ledger = Self::new(round);
        for record in records {
            ledger.append(record)?;
        }
        Ok(ledger)
    }

    pub fn from_json(round: u32, raw: &str) -> MarketResult<Self> {
        let records: Vec<TransactionRecord> = serde_json::from_str(raw)
            .map_err(|e| MarketError::validation(format!("ledger json: {e}")))?;
        Self::from_records(round, records)
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Adds `record` to the end. Malformed records are rejected untouched.
    pub fn append(&mut self, record: TransactionRecord) -> MarketResult<()> {
        self.validate(&record)?;
        self.records.push(record);
        Ok(())
    }

    pub fn read(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn snapshot(&self) -> Vec<TransactionRecord> {
        self.records.clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Flat record list, the layout external audits replay.
    pub fn to_json(&self) -> MarketResult<String> {
        serde_json::to_string(&self.records)
            .map_err(|e| MarketError::validation(format!("ledger json: {e}")))
    }

    fn validate(&self, record: &TransactionRecord) -> MarketResult<()> {
        if record.round != self.round {
            return Err(MarketError::validation(format!(
                "record for round {} does not belong in the round {} ledger",
                record.round, self.round
            )));
        }
        if record.buyer_id == record.seller_id {
            return Err(MarketError::validation(format!(
                "participant {} cannot trade with itself",
                record.buyer_id
            )));
        }
        if record.quantity == 0 {
            return Err(MarketError::validation("record quantity must be positive"));
        }
        match record.kind {
            TransactionKind::BasePurchase => {
                expect_roles(record, Role::Producer, Role::Seller)?;
                if record.amount == 0 {
                    return Err(MarketError::validation("base purchase must transfer tokens"));
                }
                if record.remaining_stock.is_some() {
                    return Err(MarketError::validation(
                        "base purchase records carry no remaining stock",
                    ));
                }
            }
            TransactionKind::ProductSale => {
                expect_roles(record, Role::Buyer, Role::Seller)?;
                if record.remaining_stock.is_none() {
                    return Err(MarketError::validation(
                        "product sale records must carry the seller's remaining stock",
                    ));
                }
            }
        }
        Ok(())
    }
}

fn expect_roles(record: &TransactionRecord, buyer: Role, seller: Role) -> MarketResult<()> {
    if record.buyer_role != buyer || record.seller_role != seller {
        return Err(MarketError::validation(format!(
            "{} record needs buyer role {buyer} and seller role {seller}, got {} and {}",
            record.kind, record.buyer_role, record.seller_role
        )));
    }
    Ok(())
}
