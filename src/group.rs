// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Ledger Market Simulation - Group State Machine

//! One group of six for one round: participants, public ledger, buyer order
//! and the stage machine that decides who may act.
//!
//! Stage order is fixed: `Offers -> Acceptance -> Pricing -> Trading ->
//! Closed`. Guesses may arrive at any stage until the ranking is resolved.
//! Transitions happen only on explicit calls (`close_offers`,
//! `close_acceptance`, `close_pricing`, and the last buyer finishing).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::conservation::{self, ConservationLaw};
use crate::config::MarketConfig;
use crate::error::{MarketError, MarketResult};
use crate::ledger::Ledger;
use crate::payoff::{self, Payoff};
use crate::ranking::{self, BuyerOrder};
use crate::trade::Executor;
use crate::turn_gate::TurnGate;
use crate::types::{
    Action, GroupId, Participant, ParticipantId, Role, RoleAssignment, RoundTarget, Stage,
    TransactionRecord, GROUP_SIZE, SELLERS_PER_GROUP,
};

// ─── Decision tables ─────────────────────────────────────────────────────────

/// Producer's answers to the sellers' offers, one slot per seller.
#[derive(Debug, Clone)]
struct AcceptanceTable {
    sellers: [ParticipantId; SELLERS_PER_GROUP],
    accepted: [Option<bool>; SELLERS_PER_GROUP],
    settled: [bool; SELLERS_PER_GROUP],
    /// Sellers in the order the producer last answered them.
    answer_order: Vec<ParticipantId>,
}

impl AcceptanceTable {
    fn new(sellers: [ParticipantId; SELLERS_PER_GROUP]) -> Self {
        Self {
            sellers,
            accepted: [None; SELLERS_PER_GROUP],
            settled: [false; SELLERS_PER_GROUP],
            answer_order: Vec::with_capacity(SELLERS_PER_GROUP),
        }
    }

    fn slot(&self, seller: ParticipantId) -> Option<usize> {
        self.sellers.iter().position(|s| *s == seller)
    }

    fn record(&mut self, slot: usize, accepted: bool) {
        let seller = self.sellers[slot];
        self.accepted[slot] = Some(accepted);
        self.answer_order.retain(|s| *s != seller);
        self.answer_order.push(seller);
    }

    /// Accepted, unsettled offers in answer order.
    fn pending(&self) -> Vec<(usize, ParticipantId)> {
        self.answer_order
            .iter()
            .filter_map(|s| self.slot(*s).map(|slot| (slot, *s)))
            .filter(|(slot, _)| self.accepted[*slot] == Some(true) && !self.settled[*slot])
            .collect()
    }
}

/// A buyer's intent toward one seller during its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleDecision {
    pub buy: bool,
    pub quantity: u32,
}

// ─── Reports ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OfferOutcome {
    Settled { record: TransactionRecord },
    Rejected,
    Failed { error: MarketError },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferSettlement {
    pub seller: ParticipantId,
    pub offer: u32,
    pub outcome: OfferOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LegOutcome {
    Declined,
    /// Said yes, but the capped quantity was zero.
    Skipped,
    Bought { record: TransactionRecord },
    Failed { error: MarketError },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leg {
    pub seller: ParticipantId,
    pub requested: u32,
    pub outcome: LegOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReport {
    pub buyer: ParticipantId,
    pub legs: Vec<Leg>,
    /// False when a leg failed; the failed decisions stay pending.
    pub completed: bool,
}

impl TurnReport {
    pub fn failed_legs(&self) -> impl Iterator<Item = &Leg> {
        self.legs
            .iter()
            .filter(|l| matches!(l.outcome, LegOutcome::Failed { .. }))
    }
}

/// What a buyer sees about one seller during trading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SellerListing {
    pub seller: ParticipantId,
    pub price: Option<u32>,
    pub stock: u32,
}

/// Owned snapshot of a group, as handed to a front end.
#[derive(Debug, Clone, Serialize)]
pub struct GroupView {
    pub id: GroupId,
    pub round: u32,
    pub stage: Stage,
    pub participants: Vec<Participant>,
    pub ledger: Vec<TransactionRecord>,
    pub buyer_order: Option<BuyerOrder>,
    pub current_buyer: Option<ParticipantId>,
    pub listings: Vec<SellerListing>,
}

// ─── Group ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Group {
    id: GroupId,
    round: u32,
    config: MarketConfig,
    roles: RoleAssignment,
    participants: [Participant; GROUP_SIZE],
    producer: ParticipantId,
    sellers: [ParticipantId; SELLERS_PER_GROUP],
    ledger: Ledger,
    law: ConservationLaw,
    stage: Stage,
    acceptances: AcceptanceTable,
    order: Option<BuyerOrder>,
    gate: Option<TurnGate>,
    decisions: BTreeMap<(ParticipantId, ParticipantId), SaleDecision>,
}

impl Group {
    /// Fresh group for `round` with every balance at its role default.
    pub fn initialize(
        id: GroupId,
        round: u32,
        roles: RoleAssignment,
        config: &MarketConfig,
    ) -> MarketResult<Self> {
        roles.validate()?;
        config.validate()?;

        let participants = std::array::from_fn(|i| {
            let role = roles.0[i];
            Participant::new(ParticipantId(i as u8 + 1), role, config.initial_balances(role))
        });
        let producer = roles
            .ids_with(Role::Producer)
            .next()
            .ok_or_else(|| MarketError::validation("no producer"))?;
        let seller_ids: Vec<ParticipantId> = roles.ids_with(Role::Seller).collect();
        let sellers: [ParticipantId; SELLERS_PER_GROUP] = seller_ids
            .try_into()
            .map_err(|_| MarketError::validation("wrong seller count"))?;

        info!(group = %id, round, "group initialized");
        Ok(Self {
            id,
            round,
            config: config.clone(),
            roles,
            participants,
            producer,
            sellers,
            ledger: Ledger::new(round),
            law: ConservationLaw::new(),
            stage: Stage::Offers,
            acceptances: AcceptanceTable::new(sellers),
            order: None,
            gate: None,
            decisions: BTreeMap::new(),
        })
    }

    // ── Accessors ──

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn roles(&self) -> &RoleAssignment {
        &self.roles
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, id: ParticipantId) -> MarketResult<&Participant> {
        self.slot(id).map(|i| &self.participants[i])
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn buyer_order(&self) -> Option<&BuyerOrder> {
        self.order.as_ref()
    }

    pub fn turn_gate(&self) -> Option<&TurnGate> {
        self.gate.as_ref()
    }

    pub fn pending_decision(&self, buyer: ParticipantId, seller: ParticipantId) -> Option<SaleDecision> {
        self.decisions.get(&(buyer, seller)).copied()
    }

    /// 1-based position of `buyer` in the acting order, once resolved.
    pub fn buyer_position(&self, buyer: ParticipantId) -> Option<usize> {
        self.order.as_ref()?.position(buyer).map(|p| p + 1)
    }

    /// Sellers with products on offer, for the buying screen.
    pub fn listings(&self) -> Vec<SellerListing> {
        self.sellers
            .iter()
            .map(|s| &self.participants[s.index()])
            .filter(|p| p.products() > 0)
            .map(|p| SellerListing { seller: p.id, price: p.product_price, stock: p.products() })
            .collect()
    }

    pub fn view(&self) -> GroupView {
        GroupView {
            id: self.id,
            round: self.round,
            stage: self.stage,
            participants: self.participants.to_vec(),
            ledger: self.ledger.snapshot(),
            buyer_order: self.order.clone(),
            current_buyer: self.gate.as_ref().and_then(TurnGate::current),
            listings: self.listings(),
        }
    }

    /// What `id` may do right now, given stage, role, balances and turn order.
    pub fn available_action(&self, id: ParticipantId) -> MarketResult<Action> {
        let p = self.participant(id)?;
        let action = match (p.role, self.stage) {
            (Role::Buyer, _) if p.guess.is_none() && self.order.is_none() => Action::SubmitGuess,
            (Role::Buyer, Stage::Trading) if self.is_admitted(id) => Action::BuyProducts,
            (Role::Seller, Stage::Offers) => Action::MakeOffer,
            (Role::Seller, Stage::Pricing) if p.bases() > 0 => Action::SetPrice,
            (Role::Producer, Stage::Acceptance)
                if self.sellers.iter().any(|s| self.participants[s.index()].offer.is_some()) =>
            {
                Action::DecideOffers
            }
            _ => Action::Wait,
        };
        Ok(action)
    }

    // ── Offers ──

    pub fn record_offer(&mut self, seller: ParticipantId, offer: u32) -> MarketResult<()> {
        self.expect_actor(seller, Role::Seller, Stage::Offers, "make an offer")?;
        MarketError::check_range(
            "offer",
            i64::from(offer),
            i64::from(self.config.min_offer),
            i64::from(self.config.max_offer),
        )?;
        let i = self.slot(seller)?;
        self.participants[i].offer = Some(offer);
        debug!(group = %self.id, %seller, offer, "offer recorded");
        Ok(())
    }

    pub fn close_offers(&mut self) -> MarketResult<()> {
        self.expect_stage(Stage::Offers, "close offers")?;
        self.advance(Stage::Acceptance);
        Ok(())
    }

    // ── Acceptance ──

    pub fn record_acceptance(
        &mut self,
        producer: ParticipantId,
        seller: ParticipantId,
        accepted: bool,
    ) -> MarketResult<()> {
        self.expect_actor(producer, Role::Producer, Stage::Acceptance, "answer offers")?;
        let slot = self
            .acceptances
            .slot(seller)
            .ok_or_else(|| MarketError::validation(format!("participant {seller} is not a seller")))?;
        if self.participants[seller.index()].offer.is_none() {
            return Err(MarketError::validation(format!("seller {seller} made no offer")));
        }
        if self.acceptances.settled[slot] {
            return Err(MarketError::validation(format!(
                "offer from seller {seller} is already settled"
            )));
        }
        self.acceptances.record(slot, accepted);
        debug!(group = %self.id, %seller, accepted, "acceptance recorded");
        Ok(())
    }

    /// Execute accepted offers in answer order. Each offer stands alone; if
    /// any fails, the stage stays open and the failed answer stays pending.
    pub fn close_acceptance(&mut self) -> MarketResult<Vec<OfferSettlement>> {
        self.expect_stage(Stage::Acceptance, "close acceptance")?;
        let producer = self.producer;
        let pending = self.acceptances.pending();

        let mut settlements = Vec::with_capacity(SELLERS_PER_GROUP);
        for (slot, seller) in pending {
            let Some(offer) = self.participants[seller.index()].offer else {
                continue;
            };
            let result = self.executor().base_purchase(producer, seller, offer);
            let outcome = match result {
                Ok(record) => {
                    self.acceptances.settled[slot] = true;
                    OfferOutcome::Settled { record }
                }
                Err(e @ MarketError::ConservationBreach(_)) => return Err(e),
                Err(error) => {
                    warn!(group = %self.id, %seller, offer, %error, "offer settlement failed");
                    OfferOutcome::Failed { error }
                }
            };
            settlements.push(OfferSettlement { seller, offer, outcome });
        }
        for (slot, seller) in self.sellers.iter().enumerate() {
            if let (Some(offer), false) = (self.participants[seller.index()].offer, self.acceptances.settled[slot]) {
                if self.acceptances.accepted[slot] != Some(true) {
                    settlements.push(OfferSettlement { seller: *seller, offer, outcome: OfferOutcome::Rejected });
                }
            }
        }

        if settlements.iter().any(|s| matches!(s.outcome, OfferOutcome::Failed { .. })) {
            return Ok(settlements);
        }
        self.advance(Stage::Pricing);
        Ok(settlements)
    }

    // ── Pricing ──

    pub fn set_product_price(&mut self, seller: ParticipantId, price: u32) -> MarketResult<()> {
        self.expect_actor(seller, Role::Seller, Stage::Pricing, "set a price")?;
        let i = self.slot(seller)?;
        if self.participants[i].bases() == 0 {
            return Err(self.out_of_turn(seller, "set a price without a base"));
        }
        MarketError::check_range(
            "product_price",
            i64::from(price),
            i64::from(self.config.min_product_price),
            i64::from(self.config.max_product_price),
        )?;
        self.participants[i].product_price = Some(price);
        debug!(group = %self.id, %seller, price, "product price set");
        Ok(())
    }

    /// Open trading. Needs the buyer order and a price from every seller
    /// with products in stock.
    pub fn close_pricing(&mut self) -> MarketResult<()> {
        self.expect_stage(Stage::Pricing, "close pricing")?;
        let order = self
            .order
            .clone()
            .ok_or_else(|| MarketError::validation("buyer ranking is not resolved yet"))?;
        let unpriced: Vec<String> = self
            .sellers
            .iter()
            .map(|s| &self.participants[s.index()])
            .filter(|p| p.products() > 0 && p.product_price.is_none())
            .map(|p| p.id.to_string())
            .collect();
        if !unpriced.is_empty() {
            return Err(MarketError::validation(format!(
                "sellers without a price: {}",
                unpriced.join(", ")
            )));
        }
        self.gate = Some(TurnGate::new(order));
        self.advance(Stage::Trading);
        Ok(())
    }

    // ── Guessing game ──

    pub fn submit_guess(&mut self, buyer: ParticipantId, guess: u32) -> MarketResult<()> {
        let i = self.slot(buyer)?;
        if self.participants[i].role != Role::Buyer {
            return Err(self.out_of_turn(buyer, "guess"));
        }
        if self.order.is_some() {
            return Err(MarketError::validation("ranking already resolved for this round"));
        }
        if self.participants[i].guess.is_some() {
            return Err(MarketError::validation(format!(
                "buyer {buyer} already guessed this round"
            )));
        }
        MarketError::check_range(
            "guess",
            i64::from(guess),
            i64::from(self.config.guess_min),
            i64::from(self.config.guess_max),
        )?;
        let guess = u8::try_from(guess)
            .map_err(|_| MarketError::validation(format!("guess {guess} does not fit")))?;
        self.participants[i].guess = Some(guess);
        debug!(group = %self.id, %buyer, guess, "guess recorded");
        Ok(())
    }

    /// Rank buyers against `target`. Calling again with the same target
    /// returns the same order.
    pub fn resolve_ranking(&mut self, target: RoundTarget) -> MarketResult<BuyerOrder> {
        if let Some(order) = &self.order {
            if order.target() == target {
                return Ok(order.clone());
            }
            return Err(MarketError::validation(format!(
                "ranking already resolved against target {}",
                order.target().value()
            )));
        }

        let mut guesses = Vec::with_capacity(3);
        let mut missing = Vec::new();
        for p in self.participants.iter().filter(|p| p.role == Role::Buyer) {
            match p.guess {
                Some(g) => guesses.push((p.id, g)),
                None => missing.push(p.id.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(MarketError::validation(format!(
                "waiting for guesses from buyers {}",
                missing.join(", ")
            )));
        }

        let order = ranking::resolve(&guesses, target)?;
        for entry in order.entries() {
            self.participants[entry.buyer.index()].rank = Some(entry.rank);
        }
        info!(
            group = %self.id,
            round = self.round,
            target = target.value(),
            order = ?order.ids(),
            "buyer order resolved"
        );
        self.order = Some(order.clone());
        Ok(order)
    }

    // ── Trading ──

    pub fn record_sale_decision(
        &mut self,
        buyer: ParticipantId,
        seller: ParticipantId,
        buy: bool,
        quantity: u32,
    ) -> MarketResult<()> {
        self.expect_admitted(buyer, "record a purchase")?;
        let s = self.participant(seller)?;
        if s.role != Role::Seller {
            return Err(MarketError::validation(format!("participant {seller} is not a seller")));
        }
        if buy && s.products() == 0 {
            return Err(MarketError::InsufficientStock {
                participant: seller,
                good: "products",
                available: 0,
                required: quantity,
            });
        }
        self.decisions.insert((buyer, seller), SaleDecision { buy, quantity });
        debug!(group = %self.id, %buyer, %seller, buy, quantity, "sale decision recorded");
        Ok(())
    }

    /// Execute the admitted buyer's pending decisions in seller-id order.
    ///
    /// Each leg is atomic on its own. When every leg succeeds the turn is
    /// complete and the next buyer is admitted; otherwise the failed legs
    /// stay pending and the same buyer may revise and resubmit.
    pub fn submit_turn(&mut self, buyer: ParticipantId) -> MarketResult<TurnReport> {
        self.expect_admitted(buyer, "submit a turn")?;

        let mut legs = Vec::with_capacity(SELLERS_PER_GROUP);
        for seller in self.sellers {
            let Some(decision) = self.decisions.get(&(buyer, seller)).copied() else {
                continue;
            };
            let outcome = if !decision.buy {
                LegOutcome::Declined
            } else {
                let result = self.executor().product_sale(buyer, seller, decision.quantity);
                match result {
                    Ok(Some(record)) => LegOutcome::Bought { record },
                    Ok(None) => LegOutcome::Skipped,
                    Err(e @ MarketError::ConservationBreach(_)) => return Err(e),
                    Err(error) => {
                        warn!(group = %self.id, %buyer, %seller, %error, "purchase leg failed");
                        LegOutcome::Failed { error }
                    }
                }
            };
            if !matches!(outcome, LegOutcome::Failed { .. }) {
                self.decisions.remove(&(buyer, seller));
            }
            legs.push(Leg { seller, requested: decision.quantity, outcome });
        }

        let completed = !legs.iter().any(|l| matches!(l.outcome, LegOutcome::Failed { .. }));
        if completed {
            self.finish_turn(buyer);
        }
        Ok(TurnReport { buyer, legs, completed })
    }

    /// Close the admitted buyer's turn, dropping anything still pending.
    pub fn end_turn(&mut self, buyer: ParticipantId) -> MarketResult<()> {
        self.expect_admitted(buyer, "end a turn")?;
        self.decisions.retain(|(b, _), _| *b != buyer);
        self.finish_turn(buyer);
        Ok(())
    }

    // ── Results ──

    pub fn compute_payoffs(&self) -> MarketResult<BTreeMap<ParticipantId, Payoff>> {
        if self.stage != Stage::Closed {
            return Err(MarketError::validation(format!(
                "payoffs are computed after trading closes; stage is {}",
                self.stage
            )));
        }
        Ok(payoff::compute(&self.config, &self.participants, &self.ledger))
    }

    /// Replay the ledger from the initial endowment and compare with the
    /// live balances.
    pub fn verify_ledger(&self) -> MarketResult<()> {
        conservation::verify_replay(&self.config, &self.roles, &self.ledger, &self.participants)
    }

    // ── Internals ──

    fn executor(&mut self) -> Executor<'_> {
        Executor {
            participants: &mut self.participants,
            ledger: &mut self.ledger,
            law: &mut self.law,
            products_per_base: self.config.products_per_base,
        }
    }

    fn finish_turn(&mut self, buyer: ParticipantId) {
        let Some(gate) = self.gate.as_mut() else {
            return;
        };
        if gate.complete(buyer) {
            info!(group = %self.id, %buyer, next = ?gate.current(), "buyer turn complete");
            if gate.is_finished() {
                self.advance(Stage::Closed);
            }
        }
    }

    fn advance(&mut self, next: Stage) {
        info!(group = %self.id, round = self.round, from = %self.stage, to = %next, "stage change");
        self.stage = next;
    }

    fn is_admitted(&self, buyer: ParticipantId) -> bool {
        self.stage == Stage::Trading && self.gate.as_ref().is_some_and(|g| g.is_admitted(buyer))
    }

    fn slot(&self, id: ParticipantId) -> MarketResult<usize> {
        if id.0 == 0 || usize::from(id.0) > GROUP_SIZE {
            return Err(MarketError::UnknownParticipant(id.into()));
        }
        Ok(id.index())
    }

    fn out_of_turn(&self, id: ParticipantId, action: &'static str) -> MarketError {
        let role = self.participants[id.index()].role;
        debug!(group = %self.id, participant = %id, %role, stage = %self.stage, action, "rejected out of turn");
        MarketError::OutOfTurn { participant: id, role, stage: self.stage, action }
    }

    fn expect_stage(&self, stage: Stage, action: &str) -> MarketResult<()> {
        if self.stage != stage {
            return Err(MarketError::validation(format!(
                "cannot {action} during the {} stage",
                self.stage
            )));
        }
        Ok(())
    }

    fn expect_actor(
        &self,
        id: ParticipantId,
        role: Role,
        stage: Stage,
        action: &'static str,
    ) -> MarketResult<()> {
        let i = self.slot(id)?;
        if self.participants[i].role != role || self.stage != stage {
            return Err(self.out_of_turn(id, action));
        }
        Ok(())
    }

    fn expect_admitted(&self, buyer: ParticipantId, action: &'static str) -> MarketResult<()> {
        self.slot(buyer)?;
        if !self.is_admitted(buyer) {
            return Err(self.out_of_turn(buyer, action));
        }
        Ok(())
    }
}

#[cfg(test)]
impl Group {
    pub(crate) fn overwrite_balances(&mut self, id: ParticipantId, balances: crate::balances::Balances) {
        self.participants[id.index()].balances = balances;
    }
}
