// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Ledger Market Simulation - Configuration

//! Experiment constants. Defaults reproduce the original experiment; a JSON
//! file may override any subset of them.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::balances::Balances;
use crate::error::{MarketError, MarketResult};
use crate::types::Role;

/// How a buyer's purchased products count toward the buyer's payoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyerPayoffRule {
    /// `buyer_unit_value * (units bought from every seller) + tokens`.
    AllLegs,
    /// Units bought from the lowest-id seller, counted twice; purchases from
    /// the other seller are ignored. Kept for replaying data collected with
    /// the first version of the experiment.
    FirstLegDoubled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub num_rounds: u32,
    pub treatment: String,

    pub producer_initial_bases: u32,
    pub seller_initial_tokens: u32,
    pub buyer_initial_tokens: u32,

    /// Products a seller gets for each base bought.
    pub products_per_base: u32,
    pub min_offer: u32,
    pub max_offer: u32,
    pub min_product_price: u32,
    pub max_product_price: u32,
    pub base_price_suggestion: u32,
    pub product_price_suggestion: u32,

    pub guess_min: u8,
    pub guess_max: u8,

    pub seller_token_multiplier: u32,
    pub buyer_unit_value: u32,
    pub buyer_payoff_rule: BuyerPayoffRule,

    /// Real-world currency paid per payoff point.
    pub currency_per_point: Decimal,
    /// Flat amount paid once per session regardless of play.
    pub participation_fee: Decimal,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            num_rounds: 4,
            treatment: "default".to_string(),
            producer_initial_bases: 2,
            seller_initial_tokens: 3,
            buyer_initial_tokens: 5,
            products_per_base: 2,
            min_offer: 1,
            max_offer: 3,
            min_product_price: 1,
            max_product_price: 10,
            base_price_suggestion: 2,
            product_price_suggestion: 3,
            guess_min: 1,
            guess_max: 100,
            seller_token_multiplier: 2,
            buyer_unit_value: 5,
            buyer_payoff_rule: BuyerPayoffRule::AllLegs,
            currency_per_point: dec!(1.00),
            participation_fee: dec!(0.00),
        }
    }
}

impl MarketConfig {
    pub fn from_json(raw: &str) -> MarketResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| MarketError::validation(format!("config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MarketResult<()> {
        if self.num_rounds == 0 {
            return Err(MarketError::validation("num_rounds must be at least 1"));
        }
        if self.min_offer == 0 || self.min_offer > self.max_offer {
            return Err(MarketError::validation(format!(
                "offer range {}..={} is empty or starts at zero",
                self.min_offer, self.max_offer
            )));
        }
        if self.min_product_price == 0 || self.min_product_price > self.max_product_price {
            return Err(MarketError::validation(format!(
                "product price range {}..={} is empty or starts at zero",
                self.min_product_price, self.max_product_price
            )));
        }
        if self.guess_min == 0 || self.guess_min > self.guess_max || self.guess_max > 100 {
            return Err(MarketError::validation(format!(
                "guess range {}..={} must lie within 1..=100",
                self.guess_min, self.guess_max
            )));
        }
        if self.products_per_base == 0 {
            return Err(MarketError::validation("products_per_base must be at least 1"));
        }
        if self.currency_per_point.is_sign_negative() || self.participation_fee.is_sign_negative() {
            return Err(MarketError::validation("currency amounts must not be negative"));
        }
        Ok(())
    }

    /// Starting balances for a role at the beginning of every round.
    pub fn initial_balances(&self, role: Role) -> Balances {
        match role {
            Role::Producer => Balances::new(0, self.producer_initial_bases, 0),
            Role::Seller => Balances::new(self.seller_initial_tokens, 0, 0),
            Role::Buyer => Balances::new(self.buyer_initial_tokens, 0, 0),
        }
    }
}
