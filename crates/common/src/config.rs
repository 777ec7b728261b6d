use anyhow::{Context, Result};
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub general: General,
    pub database: Database,
    pub input: Input,
    pub output: Output,
    #[serde(default)]
    pub scoring: Scoring,
    #[serde(default)]
    pub observability: Observability,
}

#[derive(Debug, Deserialize)]
pub struct General {
    pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Database {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct Input {
    pub transactions_path: String,
}

#[derive(Debug, Deserialize)]
pub struct Output {
    pub csv_path: String,
}

/// Credit score constants. Every field has a default so partial `[scoring]`
/// sections only override what they name.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Scoring {
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

    pub burst_tx_per_day: f64,
    pub regular_min_transactions: u32,
    pub regular_min_days: f64,
    pub night_start_hour: u32,
    pub night_end_hour: u32,
}

impl Default for Scoring {
    fn default() -> Self {
        Self {
            baseline: 500.0,
            repay_weight: 120.0,
            repay_cap: 180.0,
            activity_weight: 25.0,
            activity_cap: 120.0,
            diversity_weight: 20.0,
            diversity_cap: 100.0,
            deposit_weight: 15.0,
            deposit_cap: 100.0,
            longevity_weight: 15.0,
            longevity_cap: 80.0,
            consistency_weight: 40.0,
            regular_user_bonus: 50.0,
            liquidation_weight: 500.0,
            never_repaid_penalty: 300.0,
            burst_penalty: 100.0,
            night_threshold: 0.7,
            night_weight: 200.0,
            night_cap: 150.0,
            single_transaction_penalty: 150.0,
            zero_activity_penalty: 400.0,
            burst_tx_per_day: 10.0,
            regular_min_transactions: 10,
            regular_min_days: 30.0,
            night_start_hour: 6,
            night_end_hour: 22,
        }
    }
}

impl Scoring {
    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            (0.0..=1000.0).contains(&self.baseline),
            "scoring.baseline must be in [0, 1000]"
        );
        let caps = [
            ("repay_cap", self.repay_cap),
            ("activity_cap", self.activity_cap),
            ("diversity_cap", self.diversity_cap),
            ("deposit_cap", self.deposit_cap),
            ("longevity_cap", self.longevity_cap),
            ("night_cap", self.night_cap),
        ];
        for (name, cap) in caps {
            anyhow::ensure!(cap >= 0.0, "scoring.{name} must be >= 0");
        }
        anyhow::ensure!(
            self.night_start_hour <= 23 && self.night_end_hour <= 23,
            "scoring night hours must be in [0, 23]"
        );
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Observability {
    /// When set, the batch run serves Prometheus metrics on this port while it runs.
    pub prometheus_port: Option<u16>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config/default.toml")
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {path}"))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).context("failed to parse config")?;
        config.scoring.validate()?;
        Ok(config)
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}
