use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lending-protocol action taken by a wallet.
///
/// Known kinds are matched case-insensitively so `redeemunderlying` and
/// `redeemUnderlying` land on the same variant. Anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    Deposit,
    Borrow,
    Repay,
    RedeemUnderlying,
    LiquidationCall,
    Other(String),
}

impl ActionKind {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "deposit" => Self::Deposit,
            "borrow" => Self::Borrow,
            "repay" => Self::Repay,
            "redeemunderlying" => Self::RedeemUnderlying,
            "liquidationcall" => Self::LiquidationCall,
            _ => Self::Other(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Deposit => "deposit",
            Self::Borrow => "borrow",
            Self::Repay => "repay",
            Self::RedeemUnderlying => "redeemUnderlying",
            Self::LiquidationCall => "liquidationCall",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction record as it appears in the exported JSON array.
///
/// Every field is loosely typed: upstream dumps mix strings and numbers for
/// the same key, and a record with a bad field must not poison the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawTransaction {
    #[serde(rename = "userWallet", default)]
    pub user_wallet: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub action: Option<Value>,
    #[serde(rename = "actionData", default)]
    pub action_data: Option<Value>,
}

/// Why a raw record could not become a [`TransactionRecord`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("record has no userWallet")]
    MissingWallet,
    #[error("record has no timestamp")]
    MissingTimestamp,
    #[error("timestamp is not a valid unix epoch: {0}")]
    InvalidTimestamp(String),
    #[error("record has no action")]
    MissingAction,
}

impl RecordError {
    /// Stable label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingWallet => "missing_wallet",
            Self::MissingTimestamp => "missing_timestamp",
            Self::InvalidTimestamp(_) => "invalid_timestamp",
            Self::MissingAction => "missing_action",
        }
    }
}

/// A structurally usable transaction. Numeric payload fields stay optional:
/// missing and unparsable both become `None`, never zero.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub wallet: String,
    /// Unix epoch seconds.
    pub timestamp: i64,
    pub action: ActionKind,
    pub amount: Option<f64>,
    pub asset_symbol: Option<String>,
    pub asset_price_usd: Option<f64>,
}

impl TryFrom<&RawTransaction> for TransactionRecord {
    type Error = RecordError;

    fn try_from(raw: &RawTransaction) -> Result<Self, Self::Error> {
        let wallet = raw
            .user_wallet
            .as_ref()
            .and_then(value_as_text)
            .ok_or(RecordError::MissingWallet)?;

        let ts_value = raw
            .timestamp
            .as_ref()
            .filter(|v| !v.is_null())
            .ok_or(RecordError::MissingTimestamp)?;
        let timestamp = value_as_epoch(ts_value)
            .ok_or_else(|| RecordError::InvalidTimestamp(ts_value.to_string()))?;

        let action = raw
            .action
            .as_ref()
            .and_then(value_as_text)
            .map(|s| ActionKind::parse(&s))
            .ok_or(RecordError::MissingAction)?;

        let payload = raw.action_data.as_ref();
        let field = |key: &str| payload.and_then(|p| p.get(key));

        Ok(Self {
            wallet,
            timestamp,
            action,
            amount: field("amount").and_then(value_as_f64),
            asset_symbol: field("assetSymbol").and_then(value_as_text),
            asset_price_usd: field("assetPriceUSD").and_then(value_as_f64),
        })
    }
}

/// String content exactly as given. Identifiers are compared byte for byte, so
/// `"0xa"` and `"0xa "` stay distinct. Numbers are not coerced into identifiers.
fn value_as_text(v: &Value) -> Option<String> {
    v.as_str().map(str::to_string)
}

/// Numeric coercion: JSON numbers and numeric strings; anything else (including
/// NaN/inf spellings) is missing.
pub fn value_as_f64(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn value_as_epoch(v: &Value) -> Option<i64> {
    let secs = match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(f64::floor).and_then(f64_to_i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(f64::floor).and_then(f64_to_i64))
        }
        _ => None,
    }?;
    // Reject values chrono cannot represent so hour/day derivation is total.
    chrono::DateTime::from_timestamp(secs, 0).map(|_| secs)
}

#[allow(clippy::cast_possible_truncation)]
fn f64_to_i64(x: f64) -> Option<i64> {
    (x.is_finite() && x.abs() < 9.0e15).then_some(x as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: Value) -> RawTransaction {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_action_kind_parse_is_case_insensitive() {
        assert_eq!(ActionKind::parse("deposit"), ActionKind::Deposit);
        assert_eq!(ActionKind::parse("redeemunderlying"), ActionKind::RedeemUnderlying);
        assert_eq!(ActionKind::parse("redeemUnderlying"), ActionKind::RedeemUnderlying);
        assert_eq!(ActionKind::parse("liquidationcall"), ActionKind::LiquidationCall);
        assert_eq!(ActionKind::parse("LiquidationCall"), ActionKind::LiquidationCall);
    }

    #[test]
    fn test_unknown_action_preserved_verbatim() {
        let kind = ActionKind::parse("flashLoan");
        assert_eq!(kind, ActionKind::Other("flashLoan".to_string()));
        assert_eq!(kind.as_str(), "flashLoan");
    }

    #[test]
    fn test_record_from_full_payload() {
        let r = raw(json!({
            "_id": {"$oid": "abc"},
            "userWallet": "0xabc",
            "network": "polygon",
            "timestamp": 1_629_178_166,
            "action": "deposit",
            "actionData": {"amount": "2000000000", "assetSymbol": "USDC", "assetPriceUSD": "0.99"}
        }));
        let rec = TransactionRecord::try_from(&r).unwrap();
        assert_eq!(rec.wallet, "0xabc");
        assert_eq!(rec.timestamp, 1_629_178_166);
        assert_eq!(rec.action, ActionKind::Deposit);
        assert_eq!(rec.amount, Some(2_000_000_000.0));
        assert_eq!(rec.asset_symbol.as_deref(), Some("USDC"));
        assert!((rec.asset_price_usd.unwrap() - 0.99).abs() < 1e-12);
    }

    #[test]
    fn test_unparsable_numbers_become_missing() {
        let r = raw(json!({
            "userWallet": "0xabc",
            "timestamp": "1629178166",
            "action": "borrow",
            "actionData": {"amount": "lots", "assetPriceUSD": "NaN"}
        }));
        let rec = TransactionRecord::try_from(&r).unwrap();
        assert_eq!(rec.timestamp, 1_629_178_166);
        assert_eq!(rec.amount, None);
        assert_eq!(rec.asset_price_usd, None);
        assert_eq!(rec.asset_symbol, None);
    }

    #[test]
    fn test_missing_action_data_is_not_an_error() {
        let r = raw(json!({"userWallet": "0xabc", "timestamp": 1, "action": "repay"}));
        let rec = TransactionRecord::try_from(&r).unwrap();
        assert_eq!(rec.amount, None);
    }

    #[test]
    fn test_missing_required_fields_rejected() {
        let no_wallet = raw(json!({"timestamp": 1, "action": "repay"}));
        assert_eq!(
            TransactionRecord::try_from(&no_wallet).unwrap_err(),
            RecordError::MissingWallet
        );

        let no_ts = raw(json!({"userWallet": "0xabc", "action": "repay"}));
        assert_eq!(
            TransactionRecord::try_from(&no_ts).unwrap_err(),
            RecordError::MissingTimestamp
        );

        let bad_ts = raw(json!({"userWallet": "0xabc", "timestamp": "yesterday", "action": "repay"}));
        assert_eq!(
            TransactionRecord::try_from(&bad_ts).unwrap_err().reason(),
            "invalid_timestamp"
        );

        let no_action = raw(json!({"userWallet": "0xabc", "timestamp": 1, "action": null}));
        assert_eq!(
            TransactionRecord::try_from(&no_action).unwrap_err(),
            RecordError::MissingAction
        );
    }

    #[test]
    fn test_identifiers_kept_verbatim() {
        let r = raw(json!({
            "userWallet": "0xabc ",
            "timestamp": 1,
            "action": " Deposit",
            "actionData": {"assetSymbol": ""}
        }));
        let rec = TransactionRecord::try_from(&r).unwrap();
        assert_eq!(rec.wallet, "0xabc ");
        assert_eq!(rec.action, ActionKind::Other(" Deposit".to_string()));
        assert_eq!(rec.asset_symbol.as_deref(), Some(""));

        let numeric_wallet = raw(json!({"userWallet": 42, "timestamp": 1, "action": "repay"}));
        assert_eq!(
            TransactionRecord::try_from(&numeric_wallet).unwrap_err(),
            RecordError::MissingWallet
        );
    }

    #[test]
    fn test_float_timestamp_floors() {
        let r = raw(json!({"userWallet": "0xabc", "timestamp": 1_629_178_166.9, "action": "repay"}));
        assert_eq!(TransactionRecord::try_from(&r).unwrap().timestamp, 1_629_178_166);
    }
}
