// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Ledger Market Simulation - Multi-Round Session

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;
use wasm_bindgen::prelude::*;

use crate::config::MarketConfig;
use crate::conservation::GroupTotals;
use crate::error::{MarketError, MarketResult};
use crate::group::Group;
use crate::payoff::Payoff;
use crate::ranking::{self, BuyerOrder};
use crate::types::{GroupId, ParticipantId, Role, RoleAssignment, RoundTarget, Stage, TransactionRecord};

// ─── Summaries ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group: GroupId,
    pub ledger: Vec<TransactionRecord>,
    pub payoffs: Vec<Payoff>,
    pub totals: GroupTotals,
}

/// Everything kept about a finished round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round: u32,
    pub target: RoundTarget,
    pub groups: Vec<GroupSummary>,
}

/// Cumulative earnings of one participant across finished rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub group: GroupId,
    pub participant: ParticipantId,
    pub role: Role,
    pub points: u64,
    pub earnings: Decimal,
    pub participation_fee: Decimal,
    pub total: Decimal,
}

// ─── MarketSession struct ────────────────────────────────────────────────────

/// A seeded run of `num_rounds` rounds over a fixed set of groups. The round
/// target is drawn once per round and shared by every group.
#[wasm_bindgen]
pub struct MarketSession {
    pub(crate) config: MarketConfig,
    pub(crate) seed: u64,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) group_count: u32,
    pub(crate) roles: RoleAssignment,

    pub(crate) round: u32,
    pub(crate) target: Option<RoundTarget>,
    pub(crate) groups: BTreeMap<GroupId, Group>,

    pub(crate) history: Vec<RoundSummary>,
    pub(crate) earnings: BTreeMap<(GroupId, ParticipantId), (Role, u64, Decimal)>,
}

// ─── Internal Logic (Testable, pure Rust) ────────────────────────────────────

impl MarketSession {
    pub fn with_config(config: MarketConfig, seed: u64, group_count: u32) -> MarketResult<Self> {
        config.validate()?;
        if group_count == 0 {
            return Err(MarketError::validation("a session needs at least one group"));
        }
        info!(seed, group_count, treatment = %config.treatment, "session created");
        Ok(Self {
            config,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            group_count,
            roles: RoleAssignment::standard(),
            round: 0,
            target: None,
            groups: BTreeMap::new(),
            history: Vec::new(),
            earnings: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Current round, 1-based; 0 before the first round starts.
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn target(&self) -> Option<RoundTarget> {
        self.target
    }

    pub fn is_round_open(&self) -> bool {
        self.target.is_some()
    }

    pub fn is_complete(&self) -> bool {
        !self.is_round_open() && self.round >= self.config.num_rounds
    }

    /// Draw the round target and set up fresh groups with initial balances.
    pub fn begin_round(&mut self) -> MarketResult<RoundTarget> {
        if self.is_round_open() {
            return Err(MarketError::validation(format!(
                "round {} is still open",
                self.round
            )));
        }
        if self.round >= self.config.num_rounds {
            return Err(MarketError::validation(format!(
                "session already played all {} rounds",
                self.config.num_rounds
            )));
        }

        let round = self.round + 1;
        let target = ranking::draw_target(&mut self.rng, self.config.guess_min, self.config.guess_max)?;
        let mut groups = BTreeMap::new();
        for n in 1..=self.group_count {
            let id = GroupId(n);
            groups.insert(id, Group::initialize(id, round, self.roles, &self.config)?);
        }

        self.round = round;
        self.groups = groups;
        self.target = Some(target);
        info!(round, groups = self.group_count, "round started");
        Ok(target)
    }

    pub fn group(&self, id: GroupId) -> MarketResult<&Group> {
        self.groups.get(&id).ok_or(MarketError::UnknownGroup(id))
    }

    pub fn group_mut(&mut self, id: GroupId) -> MarketResult<&mut Group> {
        self.groups.get_mut(&id).ok_or(MarketError::UnknownGroup(id))
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn group_ids(&self) -> Vec<GroupId> {
        self.groups.keys().copied().collect()
    }

    pub fn ledger(&self, id: GroupId) -> MarketResult<&[TransactionRecord]> {
        self.group(id).map(|g| g.ledger().read())
    }

    /// Rank the group's buyers against this round's target.
    pub fn resolve_ranking(&mut self, id: GroupId) -> MarketResult<BuyerOrder> {
        let target = self
            .target
            .ok_or_else(|| MarketError::validation("no round in progress"))?;
        self.group_mut(id)?.resolve_ranking(target)
    }

    /// Score every group, audit its ledger and archive the round.
    pub fn finish_round(&mut self) -> MarketResult<&RoundSummary> {
        let target = self
            .target
            .ok_or_else(|| MarketError::validation("no round in progress"))?;
        let open: Vec<String> = self
            .groups
            .values()
            .filter(|g| g.stage() != Stage::Closed)
            .map(|g| format!("{} ({})", g.id(), g.stage()))
            .collect();
        if !open.is_empty() {
            return Err(MarketError::validation(format!(
                "groups still trading: {}",
                open.join(", ")
            )));
        }

        // Nothing is credited until every group has passed its audit.
        let mut summaries = Vec::with_capacity(self.groups.len());
        for group in self.groups.values() {
            group.verify_ledger()?;
            let payoffs = group.compute_payoffs()?;
            summaries.push(GroupSummary {
                group: group.id(),
                ledger: group.ledger().snapshot(),
                payoffs: payoffs.into_values().collect(),
                totals: GroupTotals::of_participants(group.participants()),
            });
        }
        for summary in &summaries {
            for payoff in &summary.payoffs {
                let entry = self
                    .earnings
                    .entry((summary.group, payoff.participant))
                    .or_insert((payoff.role, 0, Decimal::ZERO));
                entry.1 += payoff.points;
                entry.2 += payoff.currency;
            }
        }

        self.groups.clear();
        self.target = None;
        info!(round = self.round, "round finished");
        self.history.push(RoundSummary { round: self.round, target, groups: summaries });
        self.history
            .last()
            .ok_or_else(|| MarketError::validation("round history is empty"))
    }

    pub fn round_history(&self) -> &[RoundSummary] {
        &self.history
    }

    /// Earnings so far plus the participation fee, per participant.
    pub fn payouts(&self) -> Vec<Payout> {
        let fee = self.config.participation_fee;
        self.earnings
            .iter()
            .map(|(&(group, participant), &(role, points, earnings))| Payout {
                group,
                participant,
                role,
                points,
                earnings,
                participation_fee: fee,
                total: earnings + fee,
            })
            .collect()
    }
}
