pub mod cli;
pub mod export;
pub mod ingestion;
pub mod metrics;
pub mod normalizer;
pub mod pipeline;
pub mod risk_category;
pub mod stats;
pub mod wallet_features;
pub mod wallet_scoring;
