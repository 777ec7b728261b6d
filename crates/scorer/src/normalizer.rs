use chrono::{DateTime, Datelike, Timelike};
use common::types::{ActionKind, RawTransaction, RecordError, TransactionRecord};

/// A transaction with its derived numeric and calendar fields.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub wallet: String,
    pub timestamp: i64,
    pub action: ActionKind,
    pub amount: Option<f64>,
    pub asset_symbol: Option<String>,
    pub asset_price_usd: Option<f64>,
    /// `amount * asset_price_usd`; `None` when either operand is missing.
    pub usd_value: Option<f64>,
    /// 0..=23, UTC.
    pub hour_of_day: u32,
    /// 0 = Monday ..= 6 = Sunday, UTC.
    pub day_of_week: u32,
}

/// Records that survived normalization plus the ones that were dropped, by input index.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub records: Vec<NormalizedRecord>,
    pub dropped: Vec<(usize, RecordError)>,
}

pub fn usd_value(amount: Option<f64>, price: Option<f64>) -> Option<f64> {
    let v = amount? * price?;
    v.is_finite().then_some(v)
}

/// Hour of day and Monday-based weekday for a unix timestamp, in UTC.
pub fn utc_hour_and_weekday(timestamp: i64) -> Option<(u32, u32)> {
    let dt = DateTime::from_timestamp(timestamp, 0)?;
    Some((dt.hour(), dt.weekday().num_days_from_monday()))
}

pub fn normalize_record(record: TransactionRecord) -> Result<NormalizedRecord, RecordError> {
    let (hour_of_day, day_of_week) = utc_hour_and_weekday(record.timestamp)
        .ok_or_else(|| RecordError::InvalidTimestamp(record.timestamp.to_string()))?;

    Ok(NormalizedRecord {
        usd_value: usd_value(record.amount, record.asset_price_usd),
        wallet: record.wallet,
        timestamp: record.timestamp,
        action: record.action,
        amount: record.amount,
        asset_symbol: record.asset_symbol,
        asset_price_usd: record.asset_price_usd,
        hour_of_day,
        day_of_week,
    })
}

/// Normalize every raw record, preserving input order. Records missing a
/// wallet, timestamp or action are dropped and reported; nothing else is.
pub fn normalize_records(raw: &[RawTransaction]) -> NormalizedBatch {
    let mut batch = NormalizedBatch {
        records: Vec::with_capacity(raw.len()),
        dropped: Vec::new(),
    };

    for (index, r) in raw.iter().enumerate() {
        match TransactionRecord::try_from(r).and_then(normalize_record) {
            Ok(rec) => batch.records.push(rec),
            Err(err) => {
                tracing::warn!(index, reason = err.reason(), error = %err, "dropping malformed record");
                metrics::counter!("scorer_records_dropped_total", "reason" => err.reason())
                    .increment(1);
                batch.dropped.push((index, err));
            }
        }
    }

    batch
}
