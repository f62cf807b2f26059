// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Ledger Market Simulation - Participant Balances

//! Per-participant counters: tokens, bases and products.
//!
//! Readable everywhere, writable only from inside the crate. The only caller
//! of the mutators is the trade executor, which stages every leg of a
//! transaction on copies and commits them together.

use serde::{Deserialize, Serialize};

use crate::error::{MarketError, MarketResult};
use crate::types::ParticipantId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    tokens: u32,
    bases: u32,
    products: u32,
}

impl Balances {
    pub fn new(tokens: u32, bases: u32, products: u32) -> Self {
        Self { tokens, bases, products }
    }

    pub fn tokens(&self) -> u32 {
        self.tokens
    }

    pub fn bases(&self) -> u32 {
        self.bases
    }

    pub fn products(&self) -> u32 {
        self.products
    }

    pub(crate) fn debit_tokens(&mut self, owner: ParticipantId, amount: u32) -> MarketResult<()> {
        self.tokens = self
            .tokens
            .checked_sub(amount)
            .ok_or(MarketError::InsufficientFunds {
                participant: owner,
                available: self.tokens,
                required: amount,
            })?;
        Ok(())
    }

    pub(crate) fn credit_tokens(&mut self, amount: u32) -> MarketResult<()> {
        self.tokens = checked_add(self.tokens, amount, "tokens")?;
        Ok(())
    }

    pub(crate) fn take_bases(&mut self, owner: ParticipantId, count: u32) -> MarketResult<()> {
        self.bases = self
            .bases
            .checked_sub(count)
            .ok_or(MarketError::InsufficientStock {
                participant: owner,
                good: "bases",
                available: self.bases,
                required: count,
            })?;
        Ok(())
    }

    pub(crate) fn add_bases(&mut self, count: u32) -> MarketResult<()> {
        self.bases = checked_add(self.bases, count, "bases")?;
        Ok(())
    }

    pub(crate) fn take_products(&mut self, owner: ParticipantId, count: u32) -> MarketResult<()> {
        self.products = self
            .products
            .checked_sub(count)
            .ok_or(MarketError::InsufficientStock {
                participant: owner,
                good: "products",
                available: self.products,
                required: count,
            })?;
        Ok(())
    }

    pub(crate) fn add_products(&mut self, count: u32) -> MarketResult<()> {
        self.products = checked_add(self.products, count, "products")?;
        Ok(())
    }
}

fn checked_add(current: u32, amount: u32, field: &str) -> MarketResult<u32> {
    current
        .checked_add(amount)
        .ok_or_else(|| MarketError::validation(format!("{field} counter overflow")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_past_zero_is_rejected_and_leaves_balance() {
        let mut b = Balances::new(5, 0, 0);
        let err = b.debit_tokens(ParticipantId(4), 6).expect_err("test: overdraft");
        assert!(matches!(
            err,
            MarketError::InsufficientFunds { available: 5, required: 6, .. }
        ));
        assert_eq!(b.tokens(), 5);
    }

    #[test]
    fn take_bases_reports_stock() {
        let mut b = Balances::new(0, 0, 0);
        let err = b.take_bases(ParticipantId(1), 1).expect_err("test: no bases");
        assert_eq!(err.kind(), "insufficient_stock");
    }

    #[test]
    fn credit_overflow_is_validation_error() {
        let mut b = Balances::new(u32::MAX, 0, 0);
        assert!(b.credit_tokens(1).is_err());
        assert_eq!(b.tokens(), u32::MAX);
    }
}
