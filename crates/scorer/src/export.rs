use anyhow::{Context, Result};
use common::db::Database;
use std::io::Write;

use crate::pipeline::{ScoringReport, WalletScoreRow};

pub const CSV_HEADER: [&str; 13] = [
    "wallet",
    "credit_score",
    "risk_category",
    "total_transactions",
    "unique_assets",
    "days_active",
    "repay_to_borrow_ratio",
    "deposit_to_borrow_ratio",
    "has_borrowed",
    "has_repaid",
    "has_been_liquidated",
    "total_volume_usd",
    "liquidation_ratio",
];

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn flag(b: bool) -> u8 {
    u8::from(b)
}

pub fn write_csv<W: Write>(rows: &[WalletScoreRow], mut out: W) -> Result<()> {
    writeln!(out, "{}", CSV_HEADER.join(","))?;
    for r in rows {
        let f = &r.features;
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{}",
            csv_field(&r.wallet),
            r.score,
            r.risk_category,
            f.total_transactions,
            f.unique_assets,
            f.days_active,
            f.repay_to_borrow_ratio,
            f.deposit_to_borrow_ratio,
            flag(f.has_borrowed),
            flag(f.has_repaid),
            flag(f.has_been_liquidated),
            f.total_volume_usd,
            f.liquidation_ratio,
        )?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_csv_file(rows: &[WalletScoreRow], path: &str) -> Result<()> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory for {path}"))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create output file: {path}"))?;
    write_csv(rows, std::io::BufWriter::new(file))?;
    tracing::info!(path, wallets = rows.len(), "results saved");
    Ok(())
}

/// Persist one run and all of its rows in a single transaction. Returns the run id.
pub fn save_score_run(db: &mut Database, source: &str, report: &ScoringReport) -> Result<i64> {
    let summary_json = serde_json::to_string(&report.distribution)?;
    let stats = report.distribution.stats.clone();

    db.call_named("export.save_score_run", |conn| {
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO score_runs
             (source, records_loaded, records_dropped, wallet_count,
              score_min, score_max, score_mean, score_median, score_std, summary_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                source,
                report.records_loaded as i64,
                report.records_dropped as i64,
                report.rows.len() as i64,
                stats.as_ref().map(|s| s.min),
                stats.as_ref().map(|s| s.max),
                stats.as_ref().map(|s| s.mean),
                stats.as_ref().map(|s| s.median),
                stats.as_ref().map(|s| s.std),
                summary_json,
            ],
        )?;
        let run_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO wallet_credit_scores
                 (run_id, wallet, credit_score, risk_category, total_transactions, unique_assets,
                  days_active, repay_to_borrow_ratio, deposit_to_borrow_ratio, has_borrowed,
                  has_repaid, has_been_liquidated, total_volume_usd, liquidation_ratio)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            )?;
            for r in &report.rows {
                let f = &r.features;
                stmt.execute(rusqlite::params![
                    run_id,
                    r.wallet,
                    r.score,
                    r.risk_category.as_str(),
                    f.total_transactions,
                    f.unique_assets,
                    f.days_active,
                    f.repay_to_borrow_ratio,
                    f.deposit_to_borrow_ratio,
                    f.has_borrowed,
                    f.has_repaid,
                    f.has_been_liquidated,
                    f.total_volume_usd,
                    f.liquidation_ratio,
                ])?;
            }
        }

        tx.commit()?;
        Ok(run_id)
    })
}
