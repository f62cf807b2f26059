// Ledger Market Session Runner v0.1.0
// Seeded sessions of scripted participants, conservation and ledger audit per group
//
// Usage:
//   cargo run --release --bin session                      # 30 sessions, 4 groups each
//   cargo run --release --bin session -- --runs 5          # Quick mode
//   cargo run --release --bin session -- --seed 42         # Custom base seed
//   cargo run --release --bin session -- --groups 8        # Groups per session
//   cargo run --release --bin session -- --config t.json   # Override experiment constants
//   cargo run --release --bin session -- --ledger          # Print every group ledger
//   RUST_LOG=ledger_market=debug cargo run --bin session   # Trace every transaction

mod report;
mod runs;
mod strategies;

use ledger_market::MarketConfig;
use report::*;
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "info";

fn log_filter(env: Option<&str>) -> EnvFilter {
    env.and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

// ─── CLI Parsing ────────────────────────────────────────────────────────────

struct CliArgs {
    runs: usize,
    seed: u64,
    groups: u32,
    config: Option<PathBuf>,
    ledger: bool,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli = CliArgs {
        runs: 30,
        seed: 0,
        groups: 4,
        config: None,
        ledger: false,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--runs" => {
                i += 1;
                if i < args.len() {
                    cli.runs = args[i].parse().unwrap_or(30);
                }
            }
            "--seed" => {
                i += 1;
                if i < args.len() {
                    cli.seed = args[i].parse().unwrap_or(0);
                }
            }
            "--groups" => {
                i += 1;
                if i < args.len() {
                    cli.groups = args[i].parse().unwrap_or(4);
                }
            }
            "--config" => {
                i += 1;
                if i < args.len() {
                    cli.config = Some(PathBuf::from(&args[i]));
                }
            }
            "--ledger" => {
                cli.ledger = true;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
            }
        }
        i += 1;
    }

    cli
}

fn load_config(path: Option<&PathBuf>) -> MarketConfig {
    let Some(path) = path else {
        return MarketConfig::default();
    };
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Cannot read {}: {}", path.display(), e);
            std::process::exit(2);
        }
    };
    match MarketConfig::from_json(&raw) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid config {}: {}", path.display(), e);
            std::process::exit(2);
        }
    }
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = parse_args();
    let config = load_config(cli.config.as_ref());

    println!("\n  Ledger Market Session Runner v0.1.0");
    println!(
        "  PRNG: ChaCha8Rng | Sessions: {} | Groups/session: {} | Rounds: {} | Base seed: {} | Treatment: {}",
        cli.runs, cli.groups, config.num_rounds, cli.seed, config.treatment
    );
    println!("\n  {:>6} {:>6} {:>6} {:>6} {:>7} {:>6} {:>6} {:>6} {:>9} {:>7} {:>6}",
        "Seed", "Bases", "Sales", "Units", "Price", "Prod", "Sell", "Buy", "Payout", "Audit", "Time");
    println!("  {}", "-".repeat(84));

    let suite_start = Instant::now();
    let results = runs::run_monte_carlo(&config, cli.runs, cli.seed, cli.groups, cli.ledger, |outcome| {
        match outcome {
            Ok(r) => println!(
                "  {:>6} {:>6} {:>6} {:>6} {:>7.2} {:>6.1} {:>6.1} {:>6.1} {:>9.2} {:>7} {:>4}ms",
                r.seed,
                r.base_purchases,
                r.product_sales,
                r.units_sold,
                r.avg_unit_price,
                r.mean_producer_points,
                r.mean_seller_points,
                r.mean_buyer_points,
                r.total_payout,
                if r.conservation_holds { "OK" } else { "LEAK" },
                r.elapsed_ms,
            ),
            Err(f) => println!("  {:>6}  FAILED [{}] {}", f.seed, f.kind, f.message),
        }
    });
    let suite_elapsed = suite_start.elapsed();

    // ─── Summary ────────────────────────────────────────────────────────

    let failed = results.failures.len() + results.individual_runs.iter().filter(|r| !r.conservation_holds).count();
    println!("  {}", "-".repeat(84));
    println!("  Sessions: {}  Passed: {}  Failed: {}  Suite time: {:.1}s\n",
        results.n_runs, results.n_runs - failed, failed, suite_elapsed.as_secs_f64());

    let line = |label: &str, s: &Stats| {
        println!("    {:<22} {:>8.2} ± {:<6.2} (sd {:.2}, min {:.1}, max {:.1})",
            label, s.mean, s.half_width(), s.std_dev, s.min, s.max);
    };
    println!("  Aggregates (mean ± 95% CI):");
    line("Base purchases", &results.base_purchases);
    line("Product sales", &results.product_sales);
    line("Units sold", &results.units_sold);
    line("Avg unit price", &results.avg_unit_price);
    line("Producer points/round", &results.producer_points);
    line("Seller points/round", &results.seller_points);
    line("Buyer points/round", &results.buyer_points);
    line("Session payout", &results.total_payout);
    line("Failed purchase legs", &results.legs_failed);
    println!();

    // ─── Write JSON Report ──────────────────────────────────────────────

    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let timestamp = format!("{}", ts);

    let report = SessionReport {
        timestamp: timestamp.clone(),
        version: "0.1.0",
        prng: "ChaCha8Rng",
        base_seed: cli.seed,
        groups_per_session: cli.groups,
        config,
        results,
    };

    let dir = std::path::Path::new("session-results");
    if !dir.exists() {
        std::fs::create_dir_all(dir).expect("Failed to create session-results/");
    }
    let path = dir.join(format!("session-{}.json", timestamp));
    let json = serde_json::to_string_pretty(&report).expect("Failed to serialize");
    std::fs::write(&path, &json).expect("Failed to write session report");
    println!("  Results saved to: {}\n", path.display());

    if failed > 0 {
        std::process::exit(1);
    }
}
