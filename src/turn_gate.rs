// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Ledger Market Simulation - Buyer Turn Gate

//! FIFO gate admitting one buyer at a time, in [`BuyerOrder`] sequence.
//!
//! The turn index only moves forward, and only when the admitted buyer's turn
//! is marked complete. No timers, no preemption, no re-entry.

use serde::{Deserialize, Serialize};

use crate::ranking::BuyerOrder;
use crate::types::{ParticipantId, BUYERS_PER_GROUP};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnGate {
    order: BuyerOrder,
    turn_index: usize,
}

impl TurnGate {
    pub fn new(order: BuyerOrder) -> Self {
        Self { order, turn_index: 0 }
    }

    pub fn order(&self) -> &BuyerOrder {
        &self.order
    }

    pub fn turn_index(&self) -> usize {
        self.turn_index
    }

    /// The buyer currently admitted, or `None` once every turn is done.
    pub fn current(&self) -> Option<ParticipantId> {
        self.order.at(self.turn_index)
    }

    pub fn is_admitted(&self, buyer: ParticipantId) -> bool {
        self.current() == Some(buyer)
    }

    /// Whether `buyer` already finished its turn this round.
    pub fn has_completed(&self, buyer: ParticipantId) -> bool {
        self.order
            .position(buyer)
            .is_some_and(|pos| pos < self.turn_index)
    }

    /// Close the admitted buyer's turn. Returns `false` (and changes nothing)
    /// when `buyer` is not the one admitted.
    pub fn complete(&mut self, buyer: ParticipantId) -> bool {
        if !self.is_admitted(buyer) {
            return false;
        }
        self.turn_index += 1;
        true
    }

    pub fn is_finished(&self) -> bool {
        self.turn_index >= BUYERS_PER_GROUP
    }
}
