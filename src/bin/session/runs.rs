// Monte Carlo Runs — N seeded sessions with statistical aggregation
// Each run plays every round of every group with scripted participants

use ledger_market::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::ToPrimitive;
use std::time::Instant;

use crate::report::*;
use crate::strategies::{Bots, RoundTally};

/// Tokens each group starts every round with.
fn endowed_tokens(config: &MarketConfig) -> u64 {
    RoleAssignment::standard()
        .0
        .iter()
        .map(|role| u64::from(config.initial_balances(*role).tokens()))
        .sum()
}

fn mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f64>() / v.len() as f64
}

/// Play one full session with `seed`.
pub fn run_single(config: &MarketConfig, seed: u64, groups: u32, print_ledgers: bool) -> MarketResult<RunResult> {
    let start = Instant::now();
    let mut session = MarketSession::with_config(config.clone(), seed, groups)?;
    // Bots draw from their own stream so the session's targets stay fixed per seed.
    let mut bots = Bots::new(ChaCha8Rng::seed_from_u64(seed.wrapping_add(0x9E37_79B9)));
    let mut tally = RoundTally::default();
    let expected_tokens = endowed_tokens(config);
    let mut conservation_holds = true;

    while !session.is_complete() {
        session.begin_round()?;
        for id in session.group_ids() {
            tally.absorb(bots.play_group(&mut session, id)?);
        }
        let summary = session.finish_round()?;
        for group in &summary.groups {
            if group.totals.tokens != expected_tokens {
                conservation_holds = false;
            }
            if print_ledgers {
                println!("    seed {seed} round {} {}:", summary.round, group.group);
                for record in &group.ledger {
                    println!(
                        "      {:<14} {}({}) <- {}({})  amount {:>2}  qty {}",
                        record.kind.to_string(),
                        record.buyer_role,
                        record.buyer_id,
                        record.seller_role,
                        record.seller_id,
                        record.amount,
                        record.quantity,
                    );
                }
            }
        }
    }

    let mut base_purchases = 0;
    let mut product_sales = 0;
    let mut units_sold = 0;
    let mut revenue = 0u64;
    let mut points: [Vec<f64>; 3] = Default::default();
    for round in session.round_history() {
        for group in &round.groups {
            for record in &group.ledger {
                match record.kind {
                    TransactionKind::BasePurchase => base_purchases += 1,
                    TransactionKind::ProductSale => {
                        product_sales += 1;
                        units_sold += record.quantity;
                        revenue += u64::from(record.amount);
                    }
                }
            }
            for payoff in &group.payoffs {
                let slot = match payoff.role {
                    Role::Producer => 0,
                    Role::Seller => 1,
                    Role::Buyer => 2,
                };
                points[slot].push(payoff.points as f64);
            }
        }
    }
    let total_payout: f64 = session
        .payouts()
        .iter()
        .map(|p| p.total.to_f64().unwrap_or(0.0))
        .sum();

    Ok(RunResult {
        seed,
        rounds: session.round(),
        groups,
        base_purchases,
        product_sales,
        units_sold,
        avg_unit_price: if units_sold > 0 { revenue as f64 / f64::from(units_sold) } else { 0.0 },
        offers_made: tally.offers_made,
        offers_accepted: tally.offers_accepted,
        offers_failed: tally.offers_failed,
        legs_failed: tally.legs_failed,
        mean_producer_points: mean(&points[0]),
        mean_seller_points: mean(&points[1]),
        mean_buyer_points: mean(&points[2]),
        total_payout,
        conservation_holds,
        elapsed_ms: start.elapsed().as_millis(),
    })
}

/// Run `runs` sessions with seeds `base_seed..base_seed + runs`.
pub fn run_monte_carlo(
    config: &MarketConfig,
    runs: usize,
    base_seed: u64,
    groups: u32,
    print_ledgers: bool,
    mut on_run: impl FnMut(&Result<RunResult, RunFailure>),
) -> MonteCarloReport {
    let mut results = Vec::with_capacity(runs);
    let mut failures = Vec::new();

    for i in 0..runs {
        let seed = base_seed.wrapping_add(i as u64);
        let outcome = run_single(config, seed, groups, print_ledgers).map_err(|e| RunFailure {
            seed,
            kind: e.kind(),
            message: e.to_string(),
        });
        on_run(&outcome);
        match outcome {
            Ok(result) => results.push(result),
            Err(failure) => failures.push(failure),
        }
    }

    let collect = |f: fn(&RunResult) -> f64| -> Stats {
        let samples: Vec<f64> = results.iter().map(f).collect();
        Stats::from_samples(&samples)
    };
    let passed = results.iter().filter(|r| r.conservation_holds).count();

    MonteCarloReport {
        n_runs: runs,
        pass_rate: if runs > 0 { passed as f64 / runs as f64 } else { 0.0 },
        base_purchases: collect(|r| f64::from(r.base_purchases)),
        product_sales: collect(|r| f64::from(r.product_sales)),
        units_sold: collect(|r| f64::from(r.units_sold)),
        avg_unit_price: collect(|r| r.avg_unit_price),
        producer_points: collect(|r| r.mean_producer_points),
        seller_points: collect(|r| r.mean_seller_points),
        buyer_points: collect(|r| r.mean_buyer_points),
        total_payout: collect(|r| r.total_payout),
        legs_failed: collect(|r| f64::from(r.legs_failed)),
        elapsed_ms: collect(|r| r.elapsed_ms as f64),
        individual_runs: results,
        failures,
    }
}
