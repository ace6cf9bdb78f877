//! Typed records for the lending, oracle and token tables.
//!
//! Table rows arrive as loosely shaped JSON. Every numeric field goes
//! through one of the lenient deserializers below, so a malformed value
//! becomes its default (0, or 1 for the borrow index) instead of failing
//! the row. Rows that are not objects at all are dropped by
//! [`decode_rows`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::symbol::{Asset, Symbol};

/// Decode raw table rows into typed records, skipping rows that do not fit.
pub fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<Value>) -> Vec<T> {
    let total = rows.len();
    let decoded: Vec<T> = rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(table, error = %e, "Skipping malformed row");
                None
            }
        })
        .collect();

    if decoded.len() < total {
        debug!(
            table,
            total,
            decoded = decoded.len(),
            "Some rows were dropped during decoding"
        );
    }

    decoded
}

/// Extended symbol field (`{sym: "8,XBTC", contract: "xtokens"}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtendedSymbolField {
    #[serde(default, deserialize_with = "lenient_string")]
    pub sym: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub contract: String,
}

impl ExtendedSymbolField {
    /// Parsed symbol.
    pub fn symbol(&self) -> Symbol {
        Symbol::parse(&self.sym)
    }
}

/// Extended asset field (`{quantity: "1.00000000 XBTC", contract: "xtokens"}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtendedAssetField {
    #[serde(default, deserialize_with = "lenient_string")]
    pub quantity: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub contract: String,
}

impl ExtendedAssetField {
    /// Parsed quantity.
    pub fn asset(&self) -> Asset {
        Asset::parse(&self.quantity)
    }
}

/// Row of `lending.loan::markets`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketRow {
    #[serde(default)]
    pub share_symbol: ExtendedSymbolField,
    #[serde(default)]
    pub underlying_symbol: ExtendedSymbolField,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub collateral_factor: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub reserve_factor: f64,
    #[serde(default = "default_index", deserialize_with = "lenient_index")]
    pub borrow_index: f64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub oracle_feed_index: u64,
    #[serde(default)]
    pub total_variable_borrows: ExtendedAssetField,
    #[serde(default)]
    pub total_reserves: ExtendedAssetField,
}

/// Row of `lending.loan::shares`: L-token balances of one account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShareRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub account: String,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub tokens: Vec<ShareEntry>,
}

/// One L-token balance inside a [`ShareRow`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShareEntry {
    #[serde(default)]
    pub key: ExtendedSymbolField,
    /// Raw share units (scaled by the symbol precision)
    #[serde(default, deserialize_with = "lenient_f64")]
    pub value: f64,
}

/// Row of `lending.loan::borrows`: open loans of one account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BorrowRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub account: String,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub tokens: Vec<BorrowEntry>,
}

/// One loan inside a [`BorrowRow`], keyed by the underlying symbol.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BorrowEntry {
    #[serde(default)]
    pub key: ExtendedSymbolField,
    #[serde(default)]
    pub value: BorrowSnapshot,
}

/// Loan state for one underlying token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BorrowSnapshot {
    /// Raw principal units (scaled by the symbol precision)
    #[serde(default, deserialize_with = "lenient_f64")]
    pub variable_principal: f64,
    #[serde(default = "default_index", deserialize_with = "lenient_index")]
    pub variable_interest_index: f64,
}

/// Row of `oracles::data`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OracleDataRow {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub feed_index: u64,
    #[serde(default)]
    pub aggregate: OracleAggregate,
}

/// Aggregated oracle value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OracleAggregate {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub d_double: f64,
}

/// Row of a token contract's `stat` table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub supply: String,
}

impl StatRow {
    /// Parsed circulating supply.
    pub fn supply(&self) -> Asset {
        Asset::parse(&self.supply)
    }
}

/// Row of a token contract's `accounts` table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountBalanceRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub balance: String,
}

impl AccountBalanceRow {
    /// Parsed balance.
    pub fn balance(&self) -> Asset {
        Asset::parse(&self.balance)
    }
}

fn default_index() -> f64 {
    1.0
}

/// Numbers or numeric strings; anything else is `None`.
fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_f64(&value).unwrap_or(0.0))
}

/// Index fields fall back to 1 when missing, malformed or zero.
fn lenient_index<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_f64(&value).filter(|v| *v != 0.0).unwrap_or(1.0))
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_f64(&value)
        .filter(|v| *v >= 0.0)
        .map(|v| v as u64)
        .unwrap_or(0))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Arrays of records; non-array values and undecodable elements are dropped.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}
