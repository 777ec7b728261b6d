use anyhow::Result;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

pub fn describe() {
    describe_counter!(
        "scorer_records_loaded_total",
        "Raw transaction records handed to the pipeline."
    );
    describe_counter!(
        "scorer_records_dropped_total",
        "Records dropped as malformed, labelled by reason."
    );
    describe_counter!(
        "scorer_wallets_scored_total",
        "Wallets that received a credit score."
    );
    describe_gauge!(
        "scorer_risk_category_wallets",
        "Wallets per risk category in the latest run."
    );
    describe_histogram!(
        "scorer_pipeline_duration_ms",
        "Wall-clock time of one scoring run in milliseconds."
    );
    describe_histogram!(
        "scorer_db_query_latency_ms",
        "SQLite operation latency in milliseconds."
    );
}

/// Install the global recorder and serve `/metrics` on `port`. Must be called
/// from within the tokio runtime, which drives the listener.
pub fn install_prometheus(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    Ok(())
}
