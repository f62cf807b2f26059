// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Ledger Market Simulation - Type Definitions

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::balances::Balances;
use crate::error::{MarketError, MarketResult};

/// Participants per group: one producer, two sellers, three buyers.
pub const GROUP_SIZE: usize = 6;
pub const SELLERS_PER_GROUP: usize = 2;
pub const BUYERS_PER_GROUP: usize = 3;

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Group-local participant id, 1..=6, stable for the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u8);

impl ParticipantId {
    /// Zero-based slot in the group's participant array.
    pub(crate) fn index(self) -> usize {
        usize::from(self.0).saturating_sub(1)
    }
}

impl From<ParticipantId> for u32 {
    fn from(id: ParticipantId) -> u32 {
        u32::from(id.0)
    }
}

/// Ids arriving over the JS boundary are wide; anything past `u8` names
/// nobody.
impl TryFrom<u32> for ParticipantId {
    type Error = MarketError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        u8::try_from(raw)
            .map(ParticipantId)
            .map_err(|_| MarketError::UnknownParticipant(raw))
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.0)
    }
}

// ─── Roles ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    Producer,
    Seller,
    Buyer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Producer => "Producer",
            Self::Seller => "Seller",
            Self::Buyer => "Buyer",
        };
        f.write_str(label)
    }
}

/// Role of each group-local id, indexed by `id - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment(pub [Role; GROUP_SIZE]);

impl RoleAssignment {
    /// Id 1 produces, ids 2-3 sell, ids 4-6 buy.
    pub fn standard() -> Self {
        Self([
            Role::Producer,
            Role::Seller,
            Role::Seller,
            Role::Buyer,
            Role::Buyer,
            Role::Buyer,
        ])
    }

    /// Exactly one producer, two sellers and three buyers.
    pub fn validate(&self) -> MarketResult<()> {
        let count = |role: Role| self.0.iter().filter(|r| **r == role).count();
        let (producers, sellers, buyers) =
            (count(Role::Producer), count(Role::Seller), count(Role::Buyer));
        if producers != 1 || sellers != SELLERS_PER_GROUP || buyers != BUYERS_PER_GROUP {
            return Err(MarketError::validation(format!(
                "role assignment needs 1 producer, {SELLERS_PER_GROUP} sellers and \
                 {BUYERS_PER_GROUP} buyers; got {producers}/{sellers}/{buyers}"
            )));
        }
        Ok(())
    }

    pub fn ids_with(&self, role: Role) -> impl Iterator<Item = ParticipantId> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(move |(_, r)| **r == role)
            .map(|(i, _)| ParticipantId(i as u8 + 1))
    }
}

impl Default for RoleAssignment {
    fn default() -> Self {
        Self::standard()
    }
}

// ─── Participant ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub role: Role,
    pub balances: Balances,
    /// Tokens offered to the producer for one base (sellers, Offers stage).
    pub offer: Option<u32>,
    /// Unit price of products (sellers holding a base, Pricing stage).
    pub product_price: Option<u32>,
    /// Guessing-game entry (buyers).
    pub guess: Option<u8>,
    /// Distance between guess and round target (buyers, after ranking).
    pub rank: Option<u32>,
}

impl Participant {
    pub(crate) fn new(id: ParticipantId, role: Role, balances: Balances) -> Self {
        Self {
            id,
            role,
            balances,
            offer: None,
            product_price: None,
            guess: None,
            rank: None,
        }
    }

    pub fn tokens(&self) -> u32 {
        self.balances.tokens()
    }

    pub fn bases(&self) -> u32 {
        self.balances.bases()
    }

    pub fn products(&self) -> u32 {
        self.balances.products()
    }
}

// ─── Round target ────────────────────────────────────────────────────────────

/// The guessing game's secret number, drawn once per round and shared by
/// every group in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundTarget(u8);

impl RoundTarget {
    pub fn new(value: u8) -> MarketResult<Self> {
        MarketError::check_range("target", i64::from(value), 1, 100)?;
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

// ─── Ledger records ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionKind {
    #[serde(rename = "Base Purchase")]
    BasePurchase,
    #[serde(rename = "Product Sale")]
    ProductSale,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BasePurchase => f.write_str("Base Purchase"),
            Self::ProductSale => f.write_str("Product Sale"),
        }
    }
}

/// One completed transaction, as shown to the whole group.
///
/// Ids follow the role labels, not the flow of tokens: on a base purchase the
/// `seller_id` is the Seller participant who bought the base and `buyer_id` is
/// the Producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub round: u32,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub buyer_id: ParticipantId,
    pub buyer_role: Role,
    pub seller_id: ParticipantId,
    pub seller_role: Role,
    /// Tokens transferred.
    pub amount: u32,
    /// Units transferred.
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_stock: Option<u32>,
}

// ─── Stages ──────────────────────────────────────────────────────────────────

/// Decision stages of one round, in order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Offers,
    Acceptance,
    Pricing,
    Trading,
    Closed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Offers => "offers",
            Self::Acceptance => "acceptance",
            Self::Pricing => "pricing",
            Self::Trading => "trading",
            Self::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// What a participant may do right now.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Action {
    MakeOffer,
    DecideOffers,
    SetPrice,
    SubmitGuess,
    BuyProducts,
    Wait,
}
