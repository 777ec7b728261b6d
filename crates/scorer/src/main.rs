use anyhow::Result;
use scorer::cli::{self, Command};
use scorer::pipeline::ScoringPipeline;

#[tokio::main]
async fn main() -> Result<()> {
    let config = common::config::Config::load()?;

    let (dispatch, _otel_guard) =
        common::observability::build_dispatch("scorer", &config.general.log_level);
    tracing::dispatcher::set_global_default(dispatch).map_err(anyhow::Error::msg)?;

    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Read-only commands use the sync Database and exit immediately.
    let cmd = cli::parse_args(std::env::args()).map_err(anyhow::Error::msg)?;
    let (input, output) = match cmd {
        Command::Run => (
            config.input.transactions_path.clone(),
            config.output.csv_path.clone(),
        ),
        Command::Score { input, output } => {
            let output = output.unwrap_or_else(|| config.output.csv_path.clone());
            (input, output)
        }
        other => {
            let db = common::db::Database::open(&config.database.path)?;
            db.run_migrations()?;
            return cli::run_command(&db, other);
        }
    };

    if let Some(port) = config.observability.prometheus_port {
        scorer::metrics::install_prometheus(port)?;
        tracing::info!(port, "prometheus exporter listening");
    }
    scorer::metrics::describe();

    tracing::info!(input = %input, output = %output, "wallet credit scorer starting");

    let pipeline = ScoringPipeline::from_scoring(&config.scoring);
    let source = input.clone();
    // Loading and scoring are CPU/disk bound; keep them off the async workers.
    let report = tokio::task::spawn_blocking(move || -> Result<_> {
        let raw = scorer::ingestion::load_transactions(&input)?;
        Ok(pipeline.run(&raw))
    })
    .await??;

    scorer::export::write_csv_file(&report.rows, &output)?;

    let mut db = common::db::Database::open(&config.database.path)?;
    db.run_migrations()?;
    let run_id = scorer::export::save_score_run(&mut db, &source, &report)?;

    for c in &report.distribution.categories {
        tracing::info!(
            category = c.category.as_str(),
            wallets = c.count,
            pct = c.percentage,
            "risk category"
        );
    }
    tracing::info!(
        run_id,
        wallets = report.rows.len(),
        records_loaded = report.records_loaded,
        records_dropped = report.records_dropped,
        "scoring run complete"
    );
    Ok(())
}
