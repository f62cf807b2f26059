#[cfg(test)]
mod tests {
    use ledger_market::conservation::{replay_ledger, GroupTotals};
    use ledger_market::*;

    fn pid(n: u8) -> ParticipantId {
        ParticipantId(n)
    }

    fn target(v: u8) -> RoundTarget {
        RoundTarget::new(v).expect("test: target")
    }

    fn fresh(config: &MarketConfig) -> Group {
        Group::initialize(GroupId(1), 1, RoleAssignment::standard(), config).expect("test: group")
    }

    /// Drive a group to `Trading`. Buyer order is 4, 5, 6 (guesses 50, 40, 30
    /// against target 50).
    fn to_trading(g: &mut Group, offers: &[(u8, u32)], prices: &[(u8, u32)]) {
        for &(seller, offer) in offers {
            g.record_offer(pid(seller), offer).expect("test: offer");
        }
        g.close_offers().expect("test: close offers");
        for &(seller, _) in offers {
            g.record_acceptance(pid(1), pid(seller), true).expect("test: accept");
        }
        g.close_acceptance().expect("test: settle offers");
        for &(seller, price) in prices {
            g.set_product_price(pid(seller), price).expect("test: price");
        }
        for (buyer, guess) in [(4, 50), (5, 40), (6, 30)] {
            g.submit_guess(pid(buyer), guess).expect("test: guess");
        }
        g.resolve_ranking(target(50)).expect("test: ranking");
        g.close_pricing().expect("test: open trading");
    }

    fn balances(g: &Group) -> Vec<(u32, u32, u32)> {
        g.participants()
            .iter()
            .map(|p| (p.tokens(), p.bases(), p.products()))
            .collect()
    }

    // ========== Base Purchase ==========

    #[test]
    fn test_accepted_offer_of_two_tokens() {
        let mut g = fresh(&MarketConfig::default());
        g.record_offer(pid(2), 2).expect("test: offer");
        g.close_offers().expect("test: close");
        g.record_acceptance(pid(1), pid(2), true).expect("test: accept");
        let settled = g.close_acceptance().expect("test: settle");

        assert_eq!(settled.len(), 1);
        let producer = g.participant(pid(1)).expect("test: producer");
        assert_eq!((producer.tokens(), producer.bases()), (2, 1));
        let seller = g.participant(pid(2)).expect("test: seller");
        assert_eq!((seller.tokens(), seller.bases(), seller.products()), (1, 1, 2));

        let record = &g.ledger().read()[0];
        assert_eq!(record.kind, TransactionKind::BasePurchase);
        assert_eq!((record.buyer_id, record.seller_id), (pid(1), pid(2)));
        assert_eq!((record.amount, record.quantity), (2, 1));
    }

    // ========== Product Sale ==========

    #[test]
    fn test_clamped_purchase_still_overspends() {
        let mut g = fresh(&MarketConfig::default());
        to_trading(&mut g, &[(2, 1)], &[(2, 3)]);
        let before = balances(&g);
        let ledger_len = g.ledger().len();

        g.record_sale_decision(pid(4), pid(2), true, 3).expect("test: decision");
        let report = g.submit_turn(pid(4)).expect("test: submit");

        assert!(!report.completed);
        assert_eq!(
            report.legs[0].outcome,
            LegOutcome::Failed {
                error: MarketError::InsufficientFunds { participant: pid(4), available: 5, required: 6 }
            }
        );
        assert_eq!(balances(&g), before, "failed leg must not touch balances");
        assert_eq!(g.ledger().len(), ledger_len);
        assert_eq!(g.available_action(pid(4)), Ok(Action::BuyProducts));
    }

    #[test]
    fn test_purchase_records_remaining_stock() {
        let mut g = fresh(&MarketConfig::default());
        to_trading(&mut g, &[(2, 2), (3, 3)], &[(2, 2), (3, 1)]);
        g.record_sale_decision(pid(4), pid(2), true, 1).expect("test: leg 2");
        g.record_sale_decision(pid(4), pid(3), true, 2).expect("test: leg 3");
        let report = g.submit_turn(pid(4)).expect("test: submit");
        assert!(report.completed);

        let sales: Vec<&TransactionRecord> = g
            .ledger()
            .read()
            .iter()
            .filter(|r| r.kind == TransactionKind::ProductSale)
            .collect();
        assert_eq!(sales.len(), 2);
        assert_eq!((sales[0].seller_id, sales[0].remaining_stock), (pid(2), Some(1)));
        assert_eq!((sales[1].seller_id, sales[1].remaining_stock), (pid(3), Some(0)));
        let buyer = g.participant(pid(4)).expect("test: buyer");
        assert_eq!((buyer.tokens(), buyer.products()), (1, 3));
    }

    // ========== Turn Exclusivity ==========

    #[test]
    fn test_later_buyers_wait_for_their_turn() {
        let mut g = fresh(&MarketConfig::default());
        to_trading(&mut g, &[(2, 1)], &[(2, 1)]);

        for buyer in [5, 6] {
            let err = g
                .record_sale_decision(pid(buyer), pid(2), true, 1)
                .expect_err("test: not admitted");
            assert!(matches!(err, MarketError::OutOfTurn { .. }), "got: {err}");
            assert!(g.submit_turn(pid(buyer)).is_err());
        }

        g.end_turn(pid(4)).expect("test: 4 done");
        assert!(g.record_sale_decision(pid(4), pid(2), true, 1).is_err(), "no re-entry");
        g.record_sale_decision(pid(5), pid(2), true, 1).expect("test: 5 admitted");
        assert_eq!(g.buyer_position(pid(5)), Some(2));
    }

    #[test]
    fn test_sellers_and_producer_cannot_buy() {
        let mut g = fresh(&MarketConfig::default());
        to_trading(&mut g, &[(2, 1)], &[(2, 1)]);
        for id in [1, 2, 3] {
            assert!(g.record_sale_decision(pid(id), pid(2), true, 1).is_err());
        }
    }

    // ========== Full Round ==========

    #[test]
    fn test_full_round_ledger_and_payoffs() {
        let config = MarketConfig::default();
        let mut g = fresh(&config);
        let start = GroupTotals::of_participants(g.participants());
        to_trading(&mut g, &[(2, 2), (3, 1)], &[(2, 2), (3, 3)]);

        g.record_sale_decision(pid(4), pid(2), true, 2).expect("test: 4 buys");
        assert!(g.submit_turn(pid(4)).expect("test: 4").completed);
        g.record_sale_decision(pid(5), pid(3), true, 1).expect("test: 5 buys");
        let err = g
            .record_sale_decision(pid(5), pid(2), true, 1)
            .expect_err("test: seller 2 sold out");
        assert_eq!(err.kind(), "insufficient_stock");
        let report = g.submit_turn(pid(5)).expect("test: 5");
        assert_eq!(report.legs.len(), 1);
        assert!(matches!(report.legs[0].outcome, LegOutcome::Bought { .. }));
        g.end_turn(pid(6)).expect("test: 6");
        assert_eq!(g.stage(), Stage::Closed);

        let end = GroupTotals::of_participants(g.participants());
        assert_eq!(end.tokens, start.tokens);
        assert_eq!(end.bases, start.bases);
        assert_eq!(end.products, start.products + 4);

        let replayed = replay_ledger(&config, g.roles(), g.ledger()).expect("test: replay");
        for p in g.participants() {
            assert_eq!(replayed[usize::from(p.id.0) - 1], p.balances);
        }

        let payoffs = g.compute_payoffs().expect("test: payoffs");
        // producer sold two bases for 3 tokens
        assert_eq!(payoffs[&pid(1)].points, 3);
        // seller 2: 1 + 4 tokens, doubled
        assert_eq!(payoffs[&pid(2)].points, 10);
        // seller 3: 2 + 3 tokens, doubled
        assert_eq!(payoffs[&pid(3)].points, 10);
        // buyer 4: 2 units * 5 + 1 token
        assert_eq!(payoffs[&pid(4)].points, 11);
        // buyer 5: 1 unit * 5 + 2 tokens
        assert_eq!(payoffs[&pid(5)].points, 7);
        assert_eq!(payoffs[&pid(6)].points, 5);
    }

    #[test]
    fn test_legacy_rule_ignores_second_seller() {
        let config = MarketConfig {
            buyer_payoff_rule: BuyerPayoffRule::FirstLegDoubled,
            ..MarketConfig::default()
        };
        let mut g = fresh(&config);
        to_trading(&mut g, &[(2, 1), (3, 1)], &[(2, 1), (3, 1)]);
        g.record_sale_decision(pid(4), pid(2), true, 1).expect("test: leg 2");
        g.record_sale_decision(pid(4), pid(3), true, 1).expect("test: leg 3");
        g.submit_turn(pid(4)).expect("test: 4");
        g.end_turn(pid(5)).expect("test: 5");
        g.end_turn(pid(6)).expect("test: 6");

        let payoffs = g.compute_payoffs().expect("test: payoffs");
        // (1 + 1) * 5 + 3 tokens, the unit from seller 3 does not count
        assert_eq!(payoffs[&pid(4)].points, 13);
    }

    #[test]
    fn test_ledger_json_layout() {
        let mut g = fresh(&MarketConfig::default());
        to_trading(&mut g, &[(3, 3)], &[(3, 4)]);
        g.record_sale_decision(pid(4), pid(3), true, 1).expect("test: buy");
        g.submit_turn(pid(4)).expect("test: submit");

        let json = g.ledger().to_json().expect("test: json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("test: parse");
        let rows = value.as_array().expect("test: array");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["type"], "Base Purchase");
        assert_eq!(rows[0]["buyer_role"], "Producer");
        assert_eq!(rows[1]["type"], "Product Sale");
        assert_eq!(rows[1]["remaining_stock"], 1);
        assert_eq!(rows[1]["amount"], 4);

        let imported = Ledger::from_json(1, &json).expect("test: import");
        assert_eq!(imported.read(), g.ledger().read());
    }

    // ========== Session ==========

    #[test]
    fn test_session_groups_share_target_not_state() {
        let mut session = MarketSession::with_config(MarketConfig::default(), 9, 2).expect("test: session");
        let round_target = session.begin_round().expect("test: round");

        let g1 = session.group_mut(GroupId(1)).expect("test: g1");
        g1.record_offer(pid(2), 3).expect("test: offer");
        assert!(session.group(GroupId(2)).expect("test: g2").participant(pid(2)).map(|p| p.offer) == Ok(None));

        for id in [GroupId(1), GroupId(2)] {
            let g = session.group_mut(id).expect("test: group");
            for (buyer, guess) in [(4, 1), (5, 2), (6, 3)] {
                g.submit_guess(pid(buyer), guess).expect("test: guess");
            }
            let order = session.resolve_ranking(id).expect("test: rank");
            assert_eq!(order.target(), round_target);
        }
        assert!(matches!(session.ledger(GroupId(3)), Err(MarketError::UnknownGroup(_))));
    }

    #[test]
    fn test_groups_run_on_separate_threads() {
        fn assert_send<T: Send>() {}
        assert_send::<Group>();
        assert_send::<MarketSession>();

        let config = MarketConfig::default();
        let mut groups: Vec<Group> = (1..=4)
            .map(|n| {
                Group::initialize(GroupId(n), 1, RoleAssignment::standard(), &config)
                    .expect("test: group")
            })
            .collect();

        std::thread::scope(|scope| {
            for g in groups.iter_mut() {
                scope.spawn(move || {
                    to_trading(g, &[(2, 2)], &[(2, 1)]);
                    g.record_sale_decision(pid(4), pid(2), true, 2).expect("test: buy");
                    g.submit_turn(pid(4)).expect("test: 4");
                    g.end_turn(pid(5)).expect("test: 5");
                    g.end_turn(pid(6)).expect("test: 6");
                });
            }
        });

        for g in &groups {
            assert_eq!(g.stage(), Stage::Closed);
            assert_eq!(g.ledger().len(), 2);
            assert!(g.verify_ledger().is_ok());
        }
    }
}
