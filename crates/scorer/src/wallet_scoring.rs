use crate::wallet_features::WalletFeatures;

pub const SCORE_MIN: u32 = 0;
pub const SCORE_MAX: u32 = 1000;

/// Every constant of the credit score formula. Built from config or defaults.
#[derive(Debug, Clone, Copy)]
pub struct CreditScoreWeights {
    pub baseline: f64,

    pub repay_weight: f64,
    pub repay_cap: f64,
    pub activity_weight: f64,
    pub activity_cap: f64,
    pub diversity_weight: f64,
    pub diversity_cap: f64,
    pub deposit_weight: f64,
    pub deposit_cap: f64,
    pub longevity_weight: f64,
    pub longevity_cap: f64,
    pub consistency_weight: f64,
    pub regular_user_bonus: f64,

    pub liquidation_weight: f64,
    pub never_repaid_penalty: f64,
    pub burst_penalty: f64,
    pub night_threshold: f64,
    pub night_weight: f64,
    pub night_cap: f64,
    pub single_transaction_penalty: f64,
    pub zero_activity_penalty: f64,
}

impl Default for CreditScoreWeights {
    fn default() -> Self {
        Self::from_scoring(&common::config::Scoring::default())
    }
}

impl CreditScoreWeights {
    /// Build from the `[scoring]` config section (for production).
    pub fn from_scoring(s: &common::config::Scoring) -> Self {
        Self {
            baseline: s.baseline,
            repay_weight: s.repay_weight,
            repay_cap: s.repay_cap,
            activity_weight: s.activity_weight,
            activity_cap: s.activity_cap,
            diversity_weight: s.diversity_weight,
            diversity_cap: s.diversity_cap,
            deposit_weight: s.deposit_weight,
            deposit_cap: s.deposit_cap,
            longevity_weight: s.longevity_weight,
            longevity_cap: s.longevity_cap,
            consistency_weight: s.consistency_weight,
            regular_user_bonus: s.regular_user_bonus,
            liquidation_weight: s.liquidation_weight,
            never_repaid_penalty: s.never_repaid_penalty,
            burst_penalty: s.burst_penalty,
            night_threshold: s.night_threshold,
            night_weight: s.night_weight,
            night_cap: s.night_cap,
            single_transaction_penalty: s.single_transaction_penalty,
            zero_activity_penalty: s.zero_activity_penalty,
        }
    }
}

/// Each adjustment after its own clamp. Penalties are stored as positive magnitudes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub baseline: f64,

    pub repayment: f64,
    pub activity: f64,
    pub diversity: f64,
    pub deposit_health: f64,
    pub longevity: f64,
    pub consistency: f64,
    pub regular_user: f64,

    pub liquidation: f64,
    pub never_repaid: f64,
    pub burst: f64,
    pub night_activity: f64,
    pub single_transaction: f64,
    pub zero_activity: f64,

    /// Baseline plus bonuses minus penalties, before the final clamp.
    pub raw_total: f64,
    pub score: u32,
}

impl ScoreBreakdown {
    pub fn bonuses(&self) -> f64 {
        self.repayment
            + self.activity
            + self.diversity
            + self.deposit_health
            + self.longevity
            + self.consistency
            + self.regular_user
    }

    pub fn penalties(&self) -> f64 {
        self.liquidation
            + self.never_repaid
            + self.burst
            + self.night_activity
            + self.single_transaction
            + self.zero_activity
    }
}

/// Clamp to `[0, cap]`. NaN collapses to 0.
fn capped(x: f64, cap: f64) -> f64 {
    x.max(0.0).min(cap)
}

fn flat(condition: bool, amount: f64) -> f64 {
    if condition {
        amount
    } else {
        0.0
    }
}

/// Round half away from zero and saturate into `[SCORE_MIN, SCORE_MAX]`.
pub fn finalize_score(raw_total: f64) -> u32 {
    if raw_total.is_nan() {
        return SCORE_MIN;
    }
    raw_total
        .clamp(f64::from(SCORE_MIN), f64::from(SCORE_MAX))
        .round() as u32
}

pub fn score_breakdown(f: &WalletFeatures, w: &CreditScoreWeights) -> ScoreBreakdown {
    let mut b = ScoreBreakdown {
        baseline: w.baseline,

        repayment: capped(f.repay_to_borrow_ratio * w.repay_weight, w.repay_cap),
        activity: capped(
            f64::from(f.total_transactions).ln_1p() * w.activity_weight,
            w.activity_cap,
        ),
        diversity: capped(f64::from(f.unique_assets) * w.diversity_weight, w.diversity_cap),
        deposit_health: capped(f.deposit_to_borrow_ratio * w.deposit_weight, w.deposit_cap),
        longevity: capped(f.days_active.max(0.0).ln_1p() * w.longevity_weight, w.longevity_cap),
        // size_consistency is in (0, 1] already.
        consistency: f.size_consistency * w.consistency_weight,
        regular_user: flat(f.regular_user, w.regular_user_bonus),

        liquidation: f.liquidation_ratio * w.liquidation_weight,
        never_repaid: flat(f.has_borrowed && !f.has_repaid, w.never_repaid_penalty),
        burst: flat(f.burst_activity, w.burst_penalty),
        night_activity: capped(
            (f.night_activity_ratio - w.night_threshold) * w.night_weight,
            w.night_cap,
        ),
        single_transaction: flat(f.total_transactions == 1, w.single_transaction_penalty),
        zero_activity: flat(f.total_transactions == 0, w.zero_activity_penalty),

        raw_total: 0.0,
        score: 0,
    };
    b.raw_total = b.baseline + b.bonuses() - b.penalties();
    b.score = finalize_score(b.raw_total);
    b
}

/// Credit score in `[0, 1000]`. Pure and deterministic.
pub fn compute_credit_score(features: &WalletFeatures, weights: &CreditScoreWeights) -> u32 {
    score_breakdown(features, weights).score
}
