// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Ledger Market Simulation - Trade Executor

//! Validate-then-commit execution of the two transaction kinds.
//!
//! Each step works on copies of the two parties' balances. Only when every
//! check has passed, the conservation law agrees and the ledger has accepted
//! the record are the copies written back, so a failure leaves balances and
//! ledger exactly as they were.

use tracing::{debug, warn};

use crate::balances::Balances;
use crate::conservation::{ConservationLaw, GroupTotals};
use crate::error::{MarketError, MarketResult};
use crate::ledger::Ledger;
use crate::types::{
    Participant, ParticipantId, Role, TransactionKind, TransactionRecord, GROUP_SIZE,
};

/// Mutable view of one group's trading state for the duration of one step.
pub(crate) struct Executor<'a> {
    pub participants: &'a mut [Participant; GROUP_SIZE],
    pub ledger: &'a mut Ledger,
    pub law: &'a mut ConservationLaw,
    pub products_per_base: u32,
}

impl Executor<'_> {
    /// Seller pays `offer` tokens to the producer for one base, which the
    /// seller turns into `products_per_base` products.
    pub fn base_purchase(
        &mut self,
        producer: ParticipantId,
        seller: ParticipantId,
        offer: u32,
    ) -> MarketResult<TransactionRecord> {
        self.law.ensure_open()?;
        self.expect_role(producer, Role::Producer)?;
        self.expect_role(seller, Role::Seller)?;

        let mut seller_bal = self.participants[seller.index()].balances;
        let mut producer_bal = self.participants[producer.index()].balances;

        seller_bal.debit_tokens(seller, offer)?;
        producer_bal.take_bases(producer, 1)?;
        producer_bal.credit_tokens(offer)?;
        seller_bal.add_bases(1)?;
        seller_bal.add_products(self.products_per_base)?;

        let record = TransactionRecord {
            round: self.ledger.round(),
            kind: TransactionKind::BasePurchase,
            buyer_id: producer,
            buyer_role: Role::Producer,
            seller_id: seller,
            seller_role: Role::Seller,
            amount: offer,
            quantity: 1,
            remaining_stock: None,
        };
        self.commit(record, (seller, seller_bal), (producer, producer_bal))
    }

    /// Buyer purchases up to `requested` products from `seller`.
    ///
    /// The quantity is capped at the seller's stock. A cap of zero is not an
    /// error; nothing is committed and `Ok(None)` is returned.
    pub fn product_sale(
        &mut self,
        buyer: ParticipantId,
        seller: ParticipantId,
        requested: u32,
    ) -> MarketResult<Option<TransactionRecord>> {
        self.law.ensure_open()?;
        self.expect_role(buyer, Role::Buyer)?;
        self.expect_role(seller, Role::Seller)?;

        let seller_p = &self.participants[seller.index()];
        let price = seller_p.product_price.ok_or_else(|| {
            MarketError::validation(format!("seller {seller} has not set a product price"))
        })?;
        let quantity = requested.min(seller_p.products());
        if quantity == 0 {
            debug!(%buyer, %seller, requested, "nothing to buy; leg skipped");
            return Ok(None);
        }
        let cost = quantity.checked_mul(price).ok_or_else(|| {
            MarketError::validation(format!("cost of {quantity} x {price} overflows"))
        })?;

        let mut buyer_bal = self.participants[buyer.index()].balances;
        let mut seller_bal = seller_p.balances;

        buyer_bal.debit_tokens(buyer, cost)?;
        seller_bal.take_products(seller, quantity)?;
        seller_bal.credit_tokens(cost)?;
        buyer_bal.add_products(quantity)?;

        let record = TransactionRecord {
            round: self.ledger.round(),
            kind: TransactionKind::ProductSale,
            buyer_id: buyer,
            buyer_role: Role::Buyer,
            seller_id: seller,
            seller_role: Role::Seller,
            amount: cost,
            quantity,
            remaining_stock: Some(seller_bal.products()),
        };
        self.commit(record, (buyer, buyer_bal), (seller, seller_bal))
            .map(Some)
    }

    fn expect_role(&self, id: ParticipantId, role: Role) -> MarketResult<()> {
        let actual = self.participants[id.index()].role;
        if actual != role {
            return Err(MarketError::validation(format!(
                "participant {id} is a {actual}, not a {role}"
            )));
        }
        Ok(())
    }

    fn commit(
        &mut self,
        record: TransactionRecord,
        (a, a_bal): (ParticipantId, Balances),
        (b, b_bal): (ParticipantId, Balances),
    ) -> MarketResult<TransactionRecord> {
        let before = GroupTotals::of_participants(&self.participants[..]);
        let after = GroupTotals::of(self.participants.iter().map(|p| {
            if p.id == a {
                &a_bal
            } else if p.id == b {
                &b_bal
            } else {
                &p.balances
            }
        }));
        if let Err(e) = self.law.verify_transaction(
            record.kind,
            record.quantity,
            self.products_per_base,
            before,
            after,
        ) {
            warn!(kind = %record.kind, error = %e, "transaction refused by conservation check");
            return Err(e);
        }

        self.ledger.append(record.clone())?;
        self.participants[a.index()].balances = a_bal;
        self.participants[b.index()].balances = b_bal;
        debug!(
            kind = %record.kind,
            buyer = %record.buyer_id,
            seller = %record.seller_id,
            amount = record.amount,
            quantity = record.quantity,
            "transaction committed"
        );
        Ok(record)
    }
}
