use anyhow::{Context, Result};
use common::db::Database;
use rusqlite::OptionalExtension;

use crate::risk_category::{RiskCategory, ScoreDistribution};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Score the configured input and write the configured outputs.
    Run,
    /// Score an explicit input file, optionally to an explicit CSV path.
    Score {
        input: String,
        output: Option<String>,
    },
    Wallet {
        address: String,
    },
    Summary,
}

pub fn parse_args<I>(mut args: I) -> std::result::Result<Command, String>
where
    I: Iterator<Item = String>,
{
    // Drop argv[0].
    let _ = args.next();

    let Some(cmd) = args.next() else {
        return Ok(Command::Run);
    };

    match cmd.as_str() {
        "run" => Ok(Command::Run),
        "score" => {
            let input = args
                .next()
                .ok_or_else(|| "usage: scorer score <input.json> [output.csv]".to_string())?;
            Ok(Command::Score {
                input,
                output: args.next(),
            })
        }
        "wallet" => {
            let address = args
                .next()
                .ok_or_else(|| "usage: scorer wallet <address>".to_string())?;
            Ok(Command::Wallet { address })
        }
        "summary" => Ok(Command::Summary),
        other => Err(format!("unknown command: {other}")),
    }
}

/// Handles the read-only commands. `Run` and `Score` need the pipeline and are
/// driven from `main`.
pub fn run_command(db: &Database, cmd: Command) -> Result<()> {
    match cmd {
        Command::Run | Command::Score { .. } => {
            anyhow::bail!("{cmd:?} is a scoring command, not a database query")
        }
        Command::Wallet { address } => show_wallet(db, &address),
        Command::Summary => show_summary(db),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredWalletScore {
    pub run_id: i64,
    pub run_at: String,
    pub credit_score: u32,
    pub risk_category: RiskCategory,
    pub total_transactions: i64,
    pub unique_assets: i64,
    pub days_active: f64,
    pub repay_to_borrow_ratio: f64,
    pub has_been_liquidated: bool,
    pub total_volume_usd: f64,
}

fn category_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<RiskCategory> {
    let label: String = row.get(idx)?;
    RiskCategory::from_str_loose(&label).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(idx, label, rusqlite::types::Type::Text)
    })
}

pub fn query_latest_wallet_score(
    db: &Database,
    address: &str,
) -> Result<Option<StoredWalletScore>> {
    let row = db
        .conn
        .query_row(
            r#"
            SELECT w.run_id, r.created_at, w.credit_score, w.risk_category,
                   w.total_transactions, w.unique_assets, w.days_active,
                   w.repay_to_borrow_ratio, w.has_been_liquidated, w.total_volume_usd
            FROM wallet_credit_scores w
            JOIN score_runs r ON r.id = w.run_id
            WHERE w.wallet = ?1
            ORDER BY w.run_id DESC
            LIMIT 1
            "#,
            rusqlite::params![address],
            |row| {
                Ok(StoredWalletScore {
                    run_id: row.get(0)?,
                    run_at: row.get(1)?,
                    credit_score: row.get(2)?,
                    risk_category: category_column(row, 3)?,
                    total_transactions: row.get(4)?,
                    unique_assets: row.get(5)?,
                    days_active: row.get(6)?,
                    repay_to_borrow_ratio: row.get(7)?,
                    has_been_liquidated: row.get(8)?,
                    total_volume_usd: row.get(9)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn show_wallet(db: &Database, address: &str) -> Result<()> {
    println!("Wallet: {address}");
    let Some(s) = query_latest_wallet_score(db, address)? else {
        println!("  not scored yet");
        return Ok(());
    };
    println!(
        "  score={}  category={}  run={} ({})",
        s.credit_score, s.risk_category, s.run_id, s.run_at
    );
    println!(
        "  txs={}  assets={}  days_active={:.0}  repay/borrow={:.2}  liquidated={}  volume_usd={:.2}",
        s.total_transactions,
        s.unique_assets,
        s.days_active,
        s.repay_to_borrow_ratio,
        s.has_been_liquidated,
        s.total_volume_usd
    );
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: i64,
    pub source: String,
    pub created_at: String,
    pub records_loaded: i64,
    pub records_dropped: i64,
    pub distribution: ScoreDistribution,
}

pub fn query_latest_run(db: &Database) -> Result<Option<RunSummary>> {
    let row: Option<(i64, String, String, i64, i64, String)> = db
        .conn
        .query_row(
            r#"
            SELECT id, source, created_at, records_loaded, records_dropped, summary_json
            FROM score_runs
            ORDER BY id DESC
            LIMIT 1
            "#,
            [],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            },
        )
        .optional()?;

    let Some((run_id, source, created_at, records_loaded, records_dropped, json)) = row else {
        return Ok(None);
    };
    let distribution: ScoreDistribution = serde_json::from_str(&json)
        .with_context(|| format!("corrupt summary_json for run {run_id}"))?;
    Ok(Some(RunSummary {
        run_id,
        source,
        created_at,
        records_loaded,
        records_dropped,
        distribution,
    }))
}

fn show_summary(db: &Database) -> Result<()> {
    let Some(run) = query_latest_run(db)? else {
        println!("No scoring runs recorded.");
        return Ok(());
    };
    let d = &run.distribution;
    println!(
        "Run {} ({})  source={}  records={}  dropped={}  wallets={}",
        run.run_id,
        run.created_at,
        run.source,
        run.records_loaded,
        run.records_dropped,
        d.wallet_count
    );
    if let Some(s) = &d.stats {
        println!(
            "  min={}  max={}  mean={:.1}  median={:.1}  std={:.1}",
            s.min, s.max, s.mean, s.median, s.std
        );
    }
    println!("Score buckets:");
    for b in &d.buckets {
        println!(
            "  {:>4}-{:<4}  {:>6}  {:>5.1}%",
            b.lower, b.upper, b.count, b.percentage
        );
    }
    println!("Risk categories:");
    for c in &d.categories {
        let label = c.category.as_str();
        println!("  {label:<14}  {:>6}  {:>5.1}%", c.count, c.percentage);
    }
    let risky = d
        .categories
        .iter()
        .find(|c| c.category == RiskCategory::HighRisk)
        .map_or(0, |c| c.count);
    if risky > 0 {
        println!("{risky} wallet(s) in High Risk");
    }
    Ok(())
}
