// Scripted Participants — seeded bots that play every role in a group
// Offers, acceptances, prices, guesses and purchases are drawn from ChaCha8Rng

use ledger_market::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Counters for one group over one round.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundTally {
    pub offers_made: u32,
    pub offers_accepted: u32,
    pub offers_failed: u32,
    pub legs_bought: u32,
    pub legs_failed: u32,
}

impl RoundTally {
    pub fn absorb(&mut self, other: RoundTally) {
        self.offers_made += other.offers_made;
        self.offers_accepted += other.offers_accepted;
        self.offers_failed += other.offers_failed;
        self.legs_bought += other.legs_bought;
        self.legs_failed += other.legs_failed;
    }
}

pub struct Bots {
    rng: ChaCha8Rng,
    offer_rate: f64,
    accept_rate: f64,
    buy_rate: f64,
}

impl Bots {
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self { rng, offer_rate: 0.9, accept_rate: 0.75, buy_rate: 0.6 }
    }

    /// Drive one group from `Offers` to `Closed`. Failed offers and purchase
    /// legs are withdrawn and resubmitted, the way a participant would after
    /// seeing the error on screen.
    pub fn play_group(&mut self, session: &mut MarketSession, id: GroupId) -> MarketResult<RoundTally> {
        let config = session.config().clone();
        let mut tally = RoundTally::default();

        let g = session.group_mut(id)?;
        let producer = g
            .roles()
            .ids_with(Role::Producer)
            .next()
            .ok_or_else(|| MarketError::Validation(format!("{id} has no producer")))?;
        let sellers: Vec<ParticipantId> = g.roles().ids_with(Role::Seller).collect();
        let buyers: Vec<ParticipantId> = g.roles().ids_with(Role::Buyer).collect();

        // Offers
        for &seller in &sellers {
            if self.rng.gen_bool(self.offer_rate) {
                let offer = self.rng.gen_range(config.min_offer..=config.max_offer);
                g.record_offer(seller, offer)?;
                tally.offers_made += 1;
            }
        }
        g.close_offers()?;

        // Acceptance
        for &seller in &sellers {
            if g.participant(seller)?.offer.is_some() {
                g.record_acceptance(producer, seller, self.rng.gen_bool(self.accept_rate))?;
            }
        }
        while g.stage() == Stage::Acceptance {
            for settlement in g.close_acceptance()? {
                match settlement.outcome {
                    OfferOutcome::Settled { .. } => tally.offers_accepted += 1,
                    OfferOutcome::Failed { .. } => {
                        tally.offers_failed += 1;
                        g.record_acceptance(producer, settlement.seller, false)?;
                    }
                    OfferOutcome::Rejected => {}
                }
            }
        }

        // Pricing and guesses
        let suggestion = config.product_price_suggestion;
        let (lo, hi) = (
            suggestion.saturating_sub(2).max(config.min_product_price),
            (suggestion + 2).min(config.max_product_price),
        );
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (config.min_product_price, config.max_product_price) };
        for &seller in &sellers {
            if g.available_action(seller)? == Action::SetPrice {
                g.set_product_price(seller, self.rng.gen_range(lo..=hi))?;
            }
        }
        for &buyer in &buyers {
            g.submit_guess(buyer, u32::from(self.rng.gen_range(config.guess_min..=config.guess_max)))?;
        }
        session.resolve_ranking(id)?;

        // Trading
        let g = session.group_mut(id)?;
        g.close_pricing()?;
        while g.stage() == Stage::Trading {
            let buyer = g
                .turn_gate()
                .and_then(|gate| gate.current())
                .ok_or_else(|| MarketError::Validation(format!("{id} is trading with no buyer admitted")))?;

            for listing in g.listings() {
                if self.rng.gen_bool(self.buy_rate) {
                    let quantity = self.rng.gen_range(1..=listing.stock);
                    g.record_sale_decision(buyer, listing.seller, true, quantity)?;
                } else {
                    g.record_sale_decision(buyer, listing.seller, false, 0)?;
                }
            }

            let report = g.submit_turn(buyer)?;
            tally.legs_bought += report
                .legs
                .iter()
                .filter(|l| matches!(l.outcome, LegOutcome::Bought { .. }))
                .count() as u32;
            if report.completed {
                continue;
            }
            for leg in report.failed_legs() {
                tally.legs_failed += 1;
                g.record_sale_decision(buyer, leg.seller, false, 0)?;
            }
            if !g.submit_turn(buyer)?.completed {
                g.end_turn(buyer)?;
            }
        }

        Ok(tally)
    }
}
