use common::types::RawTransaction;
use rayon::prelude::*;

use crate::normalizer::{normalize_records, NormalizedRecord};
use crate::risk_category::{score_distribution, RiskCategory, ScoreDistribution};
use crate::wallet_features::{aggregate_wallet_features, FeatureParams, WalletFeatures};
use crate::wallet_scoring::{score_breakdown, CreditScoreWeights, ScoreBreakdown};

#[derive(Debug, Clone, PartialEq)]
pub struct WalletScoreRow {
    pub wallet: String,
    pub features: WalletFeatures,
    pub score: u32,
    pub risk_category: RiskCategory,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringReport {
    /// One row per wallet, ordered by wallet id.
    pub rows: Vec<WalletScoreRow>,
    pub distribution: ScoreDistribution,
    pub records_loaded: usize,
    pub records_dropped: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringPipeline {
    pub params: FeatureParams,
    pub weights: CreditScoreWeights,
}

impl ScoringPipeline {
    pub fn new(params: FeatureParams, weights: CreditScoreWeights) -> Self {
        Self { params, weights }
    }

    pub fn from_scoring(s: &common::config::Scoring) -> Self {
        Self::new(
            FeatureParams::from_scoring(s),
            CreditScoreWeights::from_scoring(s),
        )
    }

    pub fn score_wallet(&self, features: WalletFeatures) -> WalletScoreRow {
        let breakdown = score_breakdown(&features, &self.weights);
        WalletScoreRow {
            wallet: features.wallet.clone(),
            score: breakdown.score,
            risk_category: RiskCategory::classify(breakdown.score),
            features,
            breakdown,
        }
    }

    /// Group (sequential barrier), then finalize and score each wallet in parallel.
    /// Row order is wallet-id order regardless of thread scheduling.
    pub fn score_records(&self, records: &[NormalizedRecord]) -> Vec<WalletScoreRow> {
        aggregate_wallet_features(records, &self.params)
            .into_par_iter()
            .map(|features| self.score_wallet(features))
            .collect()
    }

    pub fn run(&self, raw: &[RawTransaction]) -> ScoringReport {
        let span = tracing::info_span!("score_run", records = raw.len());
        let _g = span.enter();
        let start = std::time::Instant::now();

        metrics::counter!("scorer_records_loaded_total").increment(raw.len() as u64);

        let batch = normalize_records(raw);
        if !batch.dropped.is_empty() {
            tracing::warn!(
                dropped = batch.dropped.len(),
                kept = batch.records.len(),
                "malformed records dropped"
            );
        }

        let rows = self.score_records(&batch.records);
        let scores: Vec<u32> = rows.iter().map(|r| r.score).collect();
        let distribution = score_distribution(&scores);

        metrics::counter!("scorer_wallets_scored_total").increment(rows.len() as u64);
        for c in &distribution.categories {
            metrics::gauge!("scorer_risk_category_wallets", "category" => c.category.as_str())
                .set(c.count as f64);
        }
        metrics::histogram!("scorer_pipeline_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);

        if let Some(s) = &distribution.stats {
            tracing::info!(
                wallets = rows.len(),
                min = s.min,
                max = s.max,
                mean = s.mean,
                "credit scores calculated"
            );
        } else {
            tracing::info!("no wallets to score");
        }

        ScoringReport {
            rows,
            distribution,
            records_loaded: raw.len(),
            records_dropped: batch.dropped.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Tuesday 2021-08-17 10:00:00 UTC
    const TUE_10AM: i64 = 1_629_194_400;

    fn tx(wallet: &str, ts: i64, action: &str, amount: &str, symbol: &str) -> RawTransaction {
        serde_json::from_value(json!({
            "userWallet": wallet,
            "timestamp": ts,
            "action": action,
            "actionData": {"amount": amount, "assetSymbol": symbol, "assetPriceUSD": "1.0"}
        }))
        .unwrap()
    }

    fn row<'a>(report: &'a ScoringReport, wallet: &str) -> &'a WalletScoreRow {
        report.rows.iter().find(|r| r.wallet == wallet).unwrap()
    }

    #[test]
    fn test_end_to_end_scenarios() {
        let mut raw: Vec<RawTransaction> = (0..5)
            .map(|_| tx("0xdepositor", TUE_10AM, "deposit", "1000", "USDC"))
            .collect();
        raw.push(tx("0xborrower", TUE_10AM, "borrow", "50", "DAI"));
        raw.push(tx("0xliquidated", TUE_10AM, "liquidationcall", "1", "WETH"));

        let report = ScoringPipeline::default().run(&raw);
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.records_loaded, 7);
        assert_eq!(report.records_dropped, 0);

        let d = row(&report, "0xdepositor");
        assert_eq!(d.score, 680);
        assert_eq!(d.risk_category, RiskCategory::LowRisk);

        let b = row(&report, "0xborrower");
        assert_eq!(b.score, 127);
        assert_eq!(b.risk_category, RiskCategory::HighRisk);

        let l = row(&report, "0xliquidated");
        assert_eq!(l.score, 0);
        assert!((l.features.liquidation_ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_malformed_records_do_not_create_wallets() {
        let mut bad = tx("0xghost", TUE_10AM, "deposit", "1", "USDC");
        bad.action = None;
        let raw = vec![bad, tx("0xreal", TUE_10AM, "deposit", "1", "USDC")];
        let report = ScoringPipeline::default().run(&raw);
        assert_eq!(report.records_dropped, 1);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].wallet, "0xreal");
    }

    #[test]
    fn test_run_is_deterministic_and_order_independent() {
        let raw: Vec<RawTransaction> = (0..200)
            .map(|i| {
                let action = ["deposit", "borrow", "repay", "redeemunderlying"][i % 4];
                tx(
                    &format!("0x{:02}", i % 17),
                    TUE_10AM + (i as i64) * 3_700,
                    action,
                    &format!("{}", 10 + i * 7),
                    ["USDC", "DAI", "WETH"][i % 3],
                )
            })
            .collect();
        let pipeline = ScoringPipeline::default();
        let first = pipeline.run(&raw);
        let second = pipeline.run(&raw);
        assert_eq!(first, second);

        let mut reversed = raw.clone();
        reversed.reverse();
        let third = pipeline.run(&reversed);
        let scores = |r: &ScoringReport| {
            r.rows
                .iter()
                .map(|row| (row.wallet.clone(), row.score))
                .collect::<Vec<_>>()
        };
        assert_eq!(scores(&first), scores(&third));
    }

    #[test]
    fn test_invariants_hold_for_every_row() {
        let raw: Vec<RawTransaction> = (0..120)
            .map(|i| {
                let action = ["deposit", "borrow", "liquidationcall", "swap"][i % 4];
                tx(
                    &format!("0x{}", i % 9),
                    TUE_10AM + (i as i64) * 600,
                    action,
                    "25",
                    "USDC",
                )
            })
            .collect();
        let report = ScoringPipeline::default().run(&raw);
        for r in &report.rows {
            let f = &r.features;
            assert!(r.score <= 1000);
            assert_eq!(r.risk_category, RiskCategory::classify(r.score));
            assert!((0.0..=1.0).contains(&f.liquidation_ratio));
            assert_eq!(
                f.deposit_count
                    + f.borrow_count
                    + f.repay_count
                    + f.redeem_underlying_count
                    + f.liquidation_call_count
                    + f.other_action_count,
                f.total_transactions
            );
        }
        let total: u32 = report.rows.iter().map(|r| r.features.total_transactions).sum();
        assert_eq!(total, 120);
    }

    #[test]
    fn test_wallet_and_asset_ids_are_not_normalized() {
        let raw = vec![
            tx("0xa", TUE_10AM, "deposit", "10", "USDC"),
            tx("0xa ", TUE_10AM, "deposit", "10", "USDC "),
            tx("0xb", TUE_10AM, "deposit", "10", ""),
            tx("0xb", TUE_10AM + 60, "deposit", "10", "USDC"),
        ];
        let report = ScoringPipeline::default().run(&raw);
        let wallets: Vec<&str> = report.rows.iter().map(|r| r.wallet.as_str()).collect();
        assert_eq!(wallets, vec!["0xa", "0xa ", "0xb"]);
        assert_eq!(row(&report, "0xa").features.total_transactions, 1);
        assert_eq!(row(&report, "0xa ").features.total_transactions, 1);
        assert_eq!(row(&report, "0xb").features.unique_assets, 2);
    }

    #[test]
    fn test_empty_input_yields_empty_report() {
        let report = ScoringPipeline::default().run(&[]);
        assert!(report.rows.is_empty());
        assert!(report.distribution.stats.is_none());
    }
}
