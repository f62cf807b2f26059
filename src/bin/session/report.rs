// Session Report Types
// Per-run results, Monte Carlo aggregation and the JSON file layout

use ledger_market::MarketConfig;
use serde::Serialize;

// ─── Statistics (per-metric aggregation across runs) ────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl Stats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self { mean: 0.0, std_dev: 0.0, ci_lower: 0.0, ci_upper: 0.0, min: 0.0, max: 0.0, n: 0 };
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let std_dev = variance.sqrt();
        let half_width = 1.96 * std_dev / (n as f64).sqrt(); // 95% CI
        Self {
            mean,
            std_dev,
            ci_lower: mean - half_width,
            ci_upper: mean + half_width,
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            n,
        }
    }

    pub fn half_width(&self) -> f64 {
        (self.ci_upper - self.ci_lower) / 2.0
    }
}

// ─── Single-Run Result ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub seed: u64,
    pub rounds: u32,
    pub groups: u32,
    pub base_purchases: u32,
    pub product_sales: u32,
    pub units_sold: u32,
    pub avg_unit_price: f64,
    pub offers_made: u32,
    pub offers_accepted: u32,
    pub offers_failed: u32,
    pub legs_failed: u32,
    pub mean_producer_points: f64,
    pub mean_seller_points: f64,
    pub mean_buyer_points: f64,
    pub total_payout: f64,
    pub conservation_holds: bool,
    pub elapsed_ms: u128,
}

/// A run that stopped on an error instead of finishing.
#[derive(Debug, Clone, Serialize)]
pub struct RunFailure {
    pub seed: u64,
    pub kind: &'static str,
    pub message: String,
}

// ─── Monte Carlo Report ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloReport {
    pub n_runs: usize,
    pub pass_rate: f64,
    pub base_purchases: Stats,
    pub product_sales: Stats,
    pub units_sold: Stats,
    pub avg_unit_price: Stats,
    pub producer_points: Stats,
    pub seller_points: Stats,
    pub buyer_points: Stats,
    pub total_payout: Stats,
    pub legs_failed: Stats,
    pub elapsed_ms: Stats,
    pub individual_runs: Vec<RunResult>,
    pub failures: Vec<RunFailure>,
}

// ─── Top-Level Report ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub timestamp: String,
    pub version: &'static str,
    pub prng: &'static str,
    pub base_seed: u64,
    pub groups_per_session: u32,
    pub config: MarketConfig,
    pub results: MonteCarloReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_of_constant_samples_have_zero_width() {
        let s = Stats::from_samples(&[4.0, 4.0, 4.0]);
        assert_eq!(s.mean, 4.0);
        assert_eq!(s.std_dev, 0.0);
        assert_eq!(s.half_width(), 0.0);
        assert_eq!((s.min, s.max, s.n), (4.0, 4.0, 3));
    }

    #[test]
    fn stats_of_nothing() {
        let s = Stats::from_samples(&[]);
        assert_eq!(s.n, 0);
        assert_eq!(s.mean, 0.0);
    }

    #[test]
    fn sample_std_dev_uses_n_minus_one() {
        let s = Stats::from_samples(&[1.0, 3.0]);
        assert_eq!(s.mean, 2.0);
        assert!((s.std_dev - 2f64.sqrt()).abs() < 1e-12);
    }
}
