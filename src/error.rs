// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Ledger Market Simulation - Error Kinds

//! Error kinds shared by every market operation.
//!
//! Every variant is recoverable at the stage boundary: the acting participant
//! is asked to resubmit. None of them poisons the group except
//! [`MarketError::ConservationBreach`], which halts further trading.

use serde::Serialize;

use crate::types::{GroupId, ParticipantId, Role, Stage};

/// Errors raised by the ledger, the turn gate and the trade executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum MarketError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{field} = {value} is outside the allowed range {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("participant {participant} has {available} tokens but needs {required}")]
    InsufficientFunds {
        participant: ParticipantId,
        available: u32,
        required: u32,
    },

    #[error("participant {participant} has {available} {good} in stock but needs {required}")]
    InsufficientStock {
        participant: ParticipantId,
        good: &'static str,
        available: u32,
        required: u32,
    },

    #[error("participant {participant} ({role}) may not {action} during the {stage} stage")]
    OutOfTurn {
        participant: ParticipantId,
        role: Role,
        stage: Stage,
        action: &'static str,
    },

    #[error("no participant {0} in this group")]
    UnknownParticipant(u32),

    #[error("no group {0} in the current round")]
    UnknownGroup(GroupId),

    #[error("conservation breach in {0}; trading halted")]
    ConservationBreach(String),
}

impl MarketError {
    /// Short machine-readable kind, used in logs and the WASM surface.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::OutOfRange { .. } => "out_of_range",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::OutOfTurn { .. } => "out_of_turn",
            Self::UnknownParticipant(_) => "unknown_participant",
            Self::UnknownGroup(_) => "unknown_group",
            Self::ConservationBreach(_) => "conservation_breach",
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Range check helper for the integer inputs participants submit.
    pub(crate) fn check_range(
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    ) -> Result<(), Self> {
        if value < min || value > max {
            return Err(Self::OutOfRange { field, value, min, max });
        }
        Ok(())
    }
}

pub type MarketResult<T> = Result<T, MarketError>;
