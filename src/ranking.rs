// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Ledger Market Simulation - Guessing Game Ranking

//! Turns the buyers' guesses into a strict acting order.
//!
//! `rank = |guess - target|`, ascending; equal ranks keep ascending
//! participant id. The resolver is a pure function of (guesses, target).

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{MarketError, MarketResult};
use crate::types::{ParticipantId, RoundTarget, BUYERS_PER_GROUP};

/// One buyer's position in the acting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedBuyer {
    pub buyer: ParticipantId,
    pub guess: u8,
    pub rank: u32,
}

/// Strict acting order of the three buyers. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerOrder {
    target: RoundTarget,
    entries: [RankedBuyer; BUYERS_PER_GROUP],
}

impl BuyerOrder {
    pub fn target(&self) -> RoundTarget {
        self.target
    }

    pub fn entries(&self) -> &[RankedBuyer] {
        &self.entries
    }

    pub fn ids(&self) -> [ParticipantId; BUYERS_PER_GROUP] {
        self.entries.map(|e| e.buyer)
    }

    /// Zero-based turn position of `buyer`, if it is in the order.
    pub fn position(&self, buyer: ParticipantId) -> Option<usize> {
        self.entries.iter().position(|e| e.buyer == buyer)
    }

    pub fn at(&self, turn: usize) -> Option<ParticipantId> {
        self.entries.get(turn).map(|e| e.buyer)
    }
}

/// Rank exactly three `(buyer, guess)` pairs against `target`.
pub fn resolve(guesses: &[(ParticipantId, u8)], target: RoundTarget) -> MarketResult<BuyerOrder> {
    if guesses.len() != BUYERS_PER_GROUP {
        return Err(MarketError::validation(format!(
            "ranking needs {BUYERS_PER_GROUP} guesses, got {}",
            guesses.len()
        )));
    }
    let mut ranked: Vec<RankedBuyer> = guesses
        .iter()
        .map(|&(buyer, guess)| RankedBuyer {
            buyer,
            guess,
            rank: u32::from(guess.abs_diff(target.value())),
        })
        .collect();

    // Input order is irrelevant: sort by id first, then stably by rank.
    ranked.sort_by_key(|e| e.buyer);
    if let Some(pair) = ranked.windows(2).find(|w| w[0].buyer == w[1].buyer) {
        return Err(MarketError::validation(format!(
            "buyer {} guessed twice",
            pair[0].buyer
        )));
    }
    ranked.sort_by_key(|e| e.rank);

    let entries = [ranked[0], ranked[1], ranked[2]];
    Ok(BuyerOrder { target, entries })
}

/// Draw the round's target uniformly from `min..=max`.
pub fn draw_target<R: Rng>(rng: &mut R, min: u8, max: u8) -> MarketResult<RoundTarget> {
    RoundTarget::new(rng.gen_range(min..=max))
}
