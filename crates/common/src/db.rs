use anyhow::Result;
use rusqlite::Connection;

pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        // Another run (or an operator's sqlite3 shell) may hold the lock briefly.
        conn.busy_timeout(std::time::Duration::from_secs(30))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    pub fn run_migrations(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Run `function` against the connection and record latency and errors under `op`.
    pub fn call_named<F, R>(&mut self, op: &'static str, function: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> Result<R>,
    {
        let start = std::time::Instant::now();
        let res = function(&mut self.conn);
        let ms = start.elapsed().as_secs_f64() * 1000.0;

        let status = if res.is_ok() { "ok" } else { "err" };
        metrics::histogram!("scorer_db_query_latency_ms", "op" => op, "status" => status)
            .record(ms);
        if res.is_err() {
            metrics::counter!("scorer_db_query_errors_total", "op" => op).increment(1);
        }
        res
    }
}

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS score_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,              -- input path or label
    records_loaded INTEGER NOT NULL,
    records_dropped INTEGER NOT NULL,
    wallet_count INTEGER NOT NULL,
    score_min INTEGER,                 -- NULL when no wallets were scored
    score_max INTEGER,
    score_mean REAL,
    score_median REAL,
    score_std REAL,
    summary_json TEXT NOT NULL,        -- full distribution (buckets + categories)
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS wallet_credit_scores (
    run_id INTEGER NOT NULL REFERENCES score_runs(id) ON DELETE CASCADE,
    wallet TEXT NOT NULL,
    credit_score INTEGER NOT NULL,
    risk_category TEXT NOT NULL,
    total_transactions INTEGER NOT NULL,
    unique_assets INTEGER NOT NULL,
    days_active REAL NOT NULL,
    repay_to_borrow_ratio REAL NOT NULL,
    deposit_to_borrow_ratio REAL NOT NULL,
    has_borrowed INTEGER NOT NULL,
    has_repaid INTEGER NOT NULL,
    has_been_liquidated INTEGER NOT NULL,
    total_volume_usd REAL NOT NULL,
    liquidation_ratio REAL NOT NULL,
    PRIMARY KEY (run_id, wallet)
);

CREATE INDEX IF NOT EXISTS idx_wallet_credit_scores_wallet ON wallet_credit_scores(wallet, run_id);
CREATE INDEX IF NOT EXISTS idx_score_runs_created_at ON score_runs(created_at);
";

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_objects(db: &Database, kind: &str) -> Vec<String> {
        let mut stmt = db
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = ?1 AND name NOT LIKE 'sqlite_%'")
            .unwrap();
        let mut names = stmt
            .query_map([kind], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();
        names.sort();
        names
    }

    #[test]
    fn test_migrations_create_schema_and_rerun_cleanly() {
        let db = Database::open(":memory:").unwrap();
        db.run_migrations().unwrap();
        db.run_migrations().unwrap();

        assert_eq!(
            schema_objects(&db, "table"),
            vec!["score_runs", "wallet_credit_scores"]
        );
        assert_eq!(
            schema_objects(&db, "index"),
            vec!["idx_score_runs_created_at", "idx_wallet_credit_scores_wallet"]
        );
    }

    #[test]
    fn test_scores_cascade_with_run() {
        let db = Database::open(":memory:").unwrap();
        db.run_migrations().unwrap();
        db.conn
            .execute(
                "INSERT INTO score_runs (source, records_loaded, records_dropped, wallet_count, summary_json)
                 VALUES ('test', 1, 0, 1, '{}')",
                [],
            )
            .unwrap();
        let run_id = db.conn.last_insert_rowid();
        db.conn
            .execute(
                "INSERT INTO wallet_credit_scores
                 (run_id, wallet, credit_score, risk_category, total_transactions, unique_assets,
                  days_active, repay_to_borrow_ratio, deposit_to_borrow_ratio, has_borrowed,
                  has_repaid, has_been_liquidated, total_volume_usd, liquidation_ratio)
                 VALUES (?1, '0xabc', 550, 'Low Risk', 1, 1, 0.0, 0.0, 1.0, 0, 0, 0, 10.0, 0.0)",
                [run_id],
            )
            .unwrap();
        db.conn
            .execute("DELETE FROM score_runs WHERE id = ?1", [run_id])
            .unwrap();
        let left: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM wallet_credit_scores", [], |r| r.get(0))
            .unwrap();
        assert_eq!(left, 0);
    }
}
