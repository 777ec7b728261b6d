use std::collections::{BTreeMap, BTreeSet};

use common::types::ActionKind;
use rayon::prelude::*;

use crate::normalizer::NormalizedRecord;
use crate::stats;

const SECS_PER_DAY: f64 = 86_400.0;
const DEFAULT_ACTIVE_HOUR: u32 = 12;

/// Thresholds behind the behavioral flags. Built from config or defaults.
#[derive(Debug, Clone, Copy)]
pub struct FeatureParams {
    /// Hours strictly below this count as night.
    pub night_start_hour: u32,
    /// Hours strictly above this count as night.
    pub night_end_hour: u32,
    pub burst_tx_per_day: f64,
    pub regular_min_transactions: u32,
    pub regular_min_days: f64,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self::from_scoring(&common::config::Scoring::default())
    }
}

impl FeatureParams {
    pub fn from_scoring(s: &common::config::Scoring) -> Self {
        Self {
            night_start_hour: s.night_start_hour,
            night_end_hour: s.night_end_hour,
            burst_tx_per_day: s.burst_tx_per_day,
            regular_min_transactions: s.regular_min_transactions,
            regular_min_days: s.regular_min_days,
        }
    }

    fn is_night(&self, hour: u32) -> bool {
        hour < self.night_start_hour || hour > self.night_end_hour
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalletFeatures {
    pub wallet: String,

    pub total_transactions: u32,
    pub unique_actions: u32,
    pub unique_assets: u32,
    pub days_active: f64,
    pub avg_transactions_per_day: f64,

    pub total_volume_usd: f64,
    pub avg_transaction_size_usd: f64,
    pub max_transaction_size_usd: f64,
    pub std_transaction_size_usd: f64,
    pub median_transaction_size_usd: f64,

    pub deposit_count: u32,
    pub borrow_count: u32,
    pub repay_count: u32,
    pub redeem_underlying_count: u32,
    pub liquidation_call_count: u32,
    pub other_action_count: u32,

    pub most_active_hour: u32,
    pub night_activity_ratio: f64,
    pub weekend_activity_ratio: f64,

    pub repay_to_borrow_ratio: f64,
    pub deposit_to_borrow_ratio: f64,
    pub liquidation_ratio: f64,
    pub has_borrowed: bool,
    pub has_repaid: bool,
    pub has_been_liquidated: bool,
    pub volume_volatility: f64,
    pub size_consistency: f64,
    pub burst_activity: bool,
    pub regular_user: bool,
}

/// Running per-wallet state, built in one pass and owned by whoever finalizes it.
#[derive(Debug, Clone, Default)]
pub struct WalletAccumulator {
    count: u32,
    actions: BTreeSet<ActionKind>,
    assets: BTreeSet<String>,
    first_ts: Option<i64>,
    last_ts: Option<i64>,
    /// Present USD values only; missing values never enter the statistics.
    usd_values: Vec<f64>,
    deposit: u32,
    borrow: u32,
    repay: u32,
    redeem: u32,
    liquidation: u32,
    other: u32,
    hour_counts: [u32; 24],
    night: u32,
    weekend: u32,
}

impl WalletAccumulator {
    pub fn push(&mut self, rec: &NormalizedRecord, params: &FeatureParams) {
        self.count += 1;

        if !self.actions.contains(&rec.action) {
            self.actions.insert(rec.action.clone());
        }
        if let Some(sym) = &rec.asset_symbol {
            if !self.assets.contains(sym) {
                self.assets.insert(sym.clone());
            }
        }

        self.first_ts = Some(self.first_ts.map_or(rec.timestamp, |t| t.min(rec.timestamp)));
        self.last_ts = Some(self.last_ts.map_or(rec.timestamp, |t| t.max(rec.timestamp)));

        if let Some(v) = rec.usd_value {
            self.usd_values.push(v);
        }

        match rec.action {
            ActionKind::Deposit => self.deposit += 1,
            ActionKind::Borrow => self.borrow += 1,
            ActionKind::Repay => self.repay += 1,
            ActionKind::RedeemUnderlying => self.redeem += 1,
            ActionKind::LiquidationCall => self.liquidation += 1,
            ActionKind::Other(_) => self.other += 1,
        }

        let hour = rec.hour_of_day.min(23);
        self.hour_counts[hour as usize] += 1;
        if params.is_night(hour) {
            self.night += 1;
        }
        if rec.day_of_week >= 5 {
            self.weekend += 1;
        }
    }

    /// Mode of the hour histogram; ties go to the earliest hour.
    fn most_active_hour(&self) -> u32 {
        let mut best: Option<(u32, u32)> = None;
        for (hour, &n) in (0u32..).zip(self.hour_counts.iter()) {
            let beats = match best {
                Some((_, b)) => n > b,
                None => true,
            };
            if n > 0 && beats {
                best = Some((hour, n));
            }
        }
        best.map_or(DEFAULT_ACTIVE_HOUR, |(hour, _)| hour)
    }

    pub fn finalize(self, wallet: String, params: &FeatureParams) -> WalletFeatures {
        let total = self.count;
        let per_tx = |n: u32| {
            if total == 0 {
                0.0
            } else {
                f64::from(n) / f64::from(total)
            }
        };

        let days_active = match (self.first_ts, self.last_ts) {
            (Some(first), Some(last)) => (last - first) as f64 / SECS_PER_DAY,
            _ => 0.0,
        };
        let avg_transactions_per_day = f64::from(total) / days_active.max(1.0);

        let total_volume_usd: f64 = self.usd_values.iter().sum();
        let avg_transaction_size_usd = stats::mean(&self.usd_values);
        let std_transaction_size_usd = stats::sample_std(&self.usd_values);

        let borrow_denominator = f64::from(self.borrow.max(1));
        let volume_volatility = std_transaction_size_usd / avg_transaction_size_usd.max(1.0);

        WalletFeatures {
            total_transactions: total,
            unique_actions: self.actions.len() as u32,
            unique_assets: self.assets.len() as u32,
            days_active,
            avg_transactions_per_day,

            total_volume_usd,
            avg_transaction_size_usd,
            max_transaction_size_usd: stats::max(&self.usd_values),
            std_transaction_size_usd,
            median_transaction_size_usd: stats::median(&self.usd_values),

            deposit_count: self.deposit,
            borrow_count: self.borrow,
            repay_count: self.repay,
            redeem_underlying_count: self.redeem,
            liquidation_call_count: self.liquidation,
            other_action_count: self.other,

            most_active_hour: self.most_active_hour(),
            night_activity_ratio: per_tx(self.night),
            weekend_activity_ratio: per_tx(self.weekend),

            repay_to_borrow_ratio: f64::from(self.repay) / borrow_denominator,
            deposit_to_borrow_ratio: f64::from(self.deposit) / borrow_denominator,
            liquidation_ratio: per_tx(self.liquidation),
            has_borrowed: self.borrow > 0,
            has_repaid: self.repay > 0,
            has_been_liquidated: self.liquidation > 0,
            volume_volatility,
            size_consistency: 1.0 / (1.0 + volume_volatility),
            burst_activity: avg_transactions_per_day > params.burst_tx_per_day,
            regular_user: total > params.regular_min_transactions
                && days_active > params.regular_min_days,

            wallet,
        }
    }
}

/// Group records by wallet in one pass. Output is ordered by wallet id so
/// everything downstream is independent of input order.
pub fn group_by_wallet(
    records: &[NormalizedRecord],
    params: &FeatureParams,
) -> Vec<(String, WalletAccumulator)> {
    let mut groups: BTreeMap<String, WalletAccumulator> = BTreeMap::new();
    for rec in records {
        match groups.get_mut(&rec.wallet) {
            Some(acc) => acc.push(rec, params),
            None => {
                let mut acc = WalletAccumulator::default();
                acc.push(rec, params);
                groups.insert(rec.wallet.clone(), acc);
            }
        }
    }
    groups.into_iter().collect()
}

/// One feature vector per wallet observed in `records`, ordered by wallet id.
pub fn aggregate_wallet_features(
    records: &[NormalizedRecord],
    params: &FeatureParams,
) -> Vec<WalletFeatures> {
    group_by_wallet(records, params)
        .into_par_iter()
        .map(|(wallet, acc)| acc.finalize(wallet, params))
        .collect()
}
