// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Ledger Market Simulation

pub mod types;
pub mod error;
pub mod config;
pub mod balances;
pub mod ledger;
pub mod ranking;
pub mod turn_gate;
pub mod conservation;
pub(crate) mod trade;
pub mod payoff;
pub mod group;
pub mod session;

pub use config::{BuyerPayoffRule, MarketConfig};
pub use error::{MarketError, MarketResult};
pub use group::{Group, GroupView, LegOutcome, OfferOutcome, OfferSettlement, TurnReport};
pub use ledger::Ledger;
pub use payoff::Payoff;
pub use ranking::BuyerOrder;
pub use session::{MarketSession, Payout, RoundSummary};
pub use types::*;

use serde::Serialize;
use wasm_bindgen::prelude::*;

// ─── WASM Interface ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct JsError<'a> {
    kind: &'static str,
    message: String,
    detail: &'a MarketError,
}

fn to_js<T: Serialize>(value: &T) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or(JsValue::NULL)
}

fn js_err(e: MarketError) -> JsValue {
    let payload = JsError { kind: e.kind(), message: e.to_string(), detail: &e };
    serde_wasm_bindgen::to_value(&payload).unwrap_or_else(|_| JsValue::from_str(&e.to_string()))
}

fn js_result<T: Serialize>(result: MarketResult<T>) -> Result<JsValue, JsValue> {
    result.map(|v| to_js(&v)).map_err(js_err)
}

#[wasm_bindgen]
impl MarketSession {
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64, group_count: u32) -> Result<MarketSession, JsValue> {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        MarketSession::with_config(MarketConfig::default(), seed, group_count).map_err(js_err)
    }

    /// Build a session from a JSON config; missing keys keep their defaults.
    pub fn from_config_json(raw: &str, seed: u64, group_count: u32) -> Result<MarketSession, JsValue> {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        MarketConfig::from_json(raw)
            .and_then(|config| MarketSession::with_config(config, seed, group_count))
            .map_err(js_err)
    }

    // ── Session ──

    pub fn start_round(&mut self) -> Result<u8, JsValue> {
        self.begin_round().map(RoundTarget::value).map_err(js_err)
    }

    pub fn end_round(&mut self) -> Result<JsValue, JsValue> {
        js_result(self.finish_round().cloned())
    }

    pub fn current_round(&self) -> u32 {
        self.round
    }

    pub fn complete(&self) -> bool {
        self.is_complete()
    }

    pub fn get_group(&self, group: u32) -> Result<JsValue, JsValue> {
        js_result(self.group(GroupId(group)).map(Group::view))
    }

    pub fn get_ledger(&self, group: u32) -> Result<JsValue, JsValue> {
        js_result(self.ledger(GroupId(group)))
    }

    pub fn get_history(&self) -> JsValue {
        to_js(&self.round_history())
    }

    pub fn get_payouts(&self) -> JsValue {
        to_js(&self.payouts())
    }

    pub fn get_config(&self) -> JsValue {
        to_js(&self.config)
    }

    // ── Participant actions ──

    pub fn available_action(&self, group: u32, participant: u32) -> Result<JsValue, JsValue> {
        js_result(
            ParticipantId::try_from(participant)
                .and_then(|id| self.group(GroupId(group))?.available_action(id)),
        )
    }

    pub fn buyer_position(&self, group: u32, buyer: u32) -> Result<Option<u32>, JsValue> {
        let buyer = ParticipantId::try_from(buyer).map_err(js_err)?;
        self.group(GroupId(group))
            .map(|g| g.buyer_position(buyer).map(|p| p as u32))
            .map_err(js_err)
    }

    pub fn record_offer(&mut self, group: u32, seller: u32, offer: u32) -> Result<(), JsValue> {
        let seller = ParticipantId::try_from(seller).map_err(js_err)?;
        self.group_mut(GroupId(group))
            .and_then(|g| g.record_offer(seller, offer))
            .map_err(js_err)
    }

    pub fn close_offers(&mut self, group: u32) -> Result<(), JsValue> {
        self.group_mut(GroupId(group))
            .and_then(Group::close_offers)
            .map_err(js_err)
    }

    pub fn record_acceptance(
        &mut self,
        group: u32,
        producer: u32,
        seller: u32,
        accepted: bool,
    ) -> Result<(), JsValue> {
        let producer = ParticipantId::try_from(producer).map_err(js_err)?;
        let seller = ParticipantId::try_from(seller).map_err(js_err)?;
        self.group_mut(GroupId(group))
            .and_then(|g| g.record_acceptance(producer, seller, accepted))
            .map_err(js_err)
    }

    pub fn close_acceptance(&mut self, group: u32) -> Result<JsValue, JsValue> {
        js_result(self.group_mut(GroupId(group)).and_then(Group::close_acceptance))
    }

    pub fn set_product_price(&mut self, group: u32, seller: u32, price: u32) -> Result<(), JsValue> {
        let seller = ParticipantId::try_from(seller).map_err(js_err)?;
        self.group_mut(GroupId(group))
            .and_then(|g| g.set_product_price(seller, price))
            .map_err(js_err)
    }

    pub fn close_pricing(&mut self, group: u32) -> Result<(), JsValue> {
        self.group_mut(GroupId(group))
            .and_then(Group::close_pricing)
            .map_err(js_err)
    }

    /// `guess` stays wide so values past 255 are reported as out of range.
    pub fn submit_guess(&mut self, group: u32, buyer: u32, guess: u32) -> Result<(), JsValue> {
        let buyer = ParticipantId::try_from(buyer).map_err(js_err)?;
        self.group_mut(GroupId(group))
            .and_then(|g| g.submit_guess(buyer, guess))
            .map_err(js_err)
    }

    pub fn rank_buyers(&mut self, group: u32) -> Result<JsValue, JsValue> {
        js_result(self.resolve_ranking(GroupId(group)))
    }

    pub fn record_sale_decision(
        &mut self,
        group: u32,
        buyer: u32,
        seller: u32,
        buy: bool,
        quantity: u32,
    ) -> Result<(), JsValue> {
        let buyer = ParticipantId::try_from(buyer).map_err(js_err)?;
        let seller = ParticipantId::try_from(seller).map_err(js_err)?;
        self.group_mut(GroupId(group))
            .and_then(|g| g.record_sale_decision(buyer, seller, buy, quantity))
            .map_err(js_err)
    }

    pub fn submit_turn(&mut self, group: u32, buyer: u32) -> Result<JsValue, JsValue> {
        js_result(
            ParticipantId::try_from(buyer)
                .and_then(|buyer| self.group_mut(GroupId(group))?.submit_turn(buyer)),
        )
    }

    pub fn end_turn(&mut self, group: u32, buyer: u32) -> Result<(), JsValue> {
        let buyer = ParticipantId::try_from(buyer).map_err(js_err)?;
        self.group_mut(GroupId(group))
            .and_then(|g| g.end_turn(buyer))
            .map_err(js_err)
    }
}
