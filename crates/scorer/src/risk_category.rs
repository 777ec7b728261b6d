use serde::{Deserialize, Serialize};
use std::fmt;

use crate::stats;
use crate::wallet_scoring::SCORE_MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskCategory {
    #[serde(rename = "High Risk")]
    HighRisk,
    #[serde(rename = "Medium Risk")]
    MediumRisk,
    #[serde(rename = "Low Risk")]
    LowRisk,
    #[serde(rename = "Very Low Risk")]
    VeryLowRisk,
    #[serde(rename = "Excellent")]
    Excellent,
}

impl RiskCategory {
    /// Worst to best.
    pub const ALL: [Self; 5] = [
        Self::HighRisk,
        Self::MediumRisk,
        Self::LowRisk,
        Self::VeryLowRisk,
        Self::Excellent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HighRisk => "High Risk",
            Self::MediumRisk => "Medium Risk",
            Self::LowRisk => "Low Risk",
            Self::VeryLowRisk => "Very Low Risk",
            Self::Excellent => "Excellent",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// `[0,300)` High, `[300,500)` Medium, `[500,700)` Low, `[700,900)` Very Low,
    /// `[900,1000]` Excellent. Each lower edge belongs to the higher bucket.
    pub fn classify(score: u32) -> Self {
        match score {
            0..=299 => Self::HighRisk,
            300..=499 => Self::MediumRisk,
            500..=699 => Self::LowRisk,
            700..=899 => Self::VeryLowRisk,
            _ => Self::Excellent,
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub min: u32,
    pub max: u32,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; 0 for a single wallet.
    pub std: f64,
}

/// Wallets whose score falls in `[lower, upper)`; the top bucket also includes 1000.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketCount {
    pub lower: u32,
    pub upper: u32,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: RiskCategory,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDistribution {
    pub wallet_count: usize,
    /// `None` when nothing was scored.
    pub stats: Option<ScoreStats>,
    pub buckets: Vec<BucketCount>,
    pub categories: Vec<CategoryCount>,
}

const BUCKET_WIDTH: u32 = 100;

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

pub fn score_distribution(scores: &[u32]) -> ScoreDistribution {
    let total = scores.len();

    let stats = if scores.is_empty() {
        None
    } else {
        let as_f64: Vec<f64> = scores.iter().map(|&s| f64::from(s)).collect();
        Some(ScoreStats {
            min: scores.iter().copied().min().unwrap_or(0),
            max: scores.iter().copied().max().unwrap_or(0),
            mean: stats::mean(&as_f64),
            median: stats::median(&as_f64),
            std: stats::sample_std(&as_f64),
        })
    };

    let bucket_total = (SCORE_MAX / BUCKET_WIDTH) as usize;
    let mut bucket_counts = vec![0usize; bucket_total];
    let mut category_counts = [0usize; RiskCategory::ALL.len()];
    for &s in scores {
        let idx = ((s / BUCKET_WIDTH) as usize).min(bucket_total - 1);
        bucket_counts[idx] += 1;
        category_counts[RiskCategory::classify(s) as usize] += 1;
    }

    let buckets = (0u32..)
        .zip(bucket_counts)
        .map(|(i, count)| BucketCount {
            lower: i * BUCKET_WIDTH,
            upper: (i + 1) * BUCKET_WIDTH,
            count,
            percentage: percentage(count, total),
        })
        .collect();

    let categories = RiskCategory::ALL
        .into_iter()
        .zip(category_counts)
        .map(|(category, count)| CategoryCount {
            category,
            count,
            percentage: percentage(count, total),
        })
        .collect();

    ScoreDistribution {
        wallet_count: total,
        stats,
        buckets,
        categories,
    }
}
