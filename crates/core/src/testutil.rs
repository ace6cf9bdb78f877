//! Table row builders shared by unit tests.

use serde_json::{json, Value};
use xpr_lending_chain::InMemoryTables;

pub const LENDING: &str = "lending.loan";
pub const SHARES: &str = "shares.loan";
pub const ORACLE: &str = "oracles";

fn quantity(amount: f64, symbol: &str, precision: i32) -> String {
    format!("{:.*} {}", precision.max(0) as usize, amount, symbol)
}

pub fn market_row(
    l_symbol: &str,
    underlying: &str,
    precision: i32,
    collateral_factor: f64,
    borrow_index: f64,
    feed_index: u64,
) -> Value {
    market_row_with_totals(
        l_symbol,
        underlying,
        precision,
        collateral_factor,
        borrow_index,
        feed_index,
        0.0,
        0.0,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn market_row_with_totals(
    l_symbol: &str,
    underlying: &str,
    precision: i32,
    collateral_factor: f64,
    borrow_index: f64,
    feed_index: u64,
    total_borrows: f64,
    total_reserves: f64,
) -> Value {
    json!({
        "share_symbol": { "sym": format!("{},{}", precision, l_symbol), "contract": SHARES },
        "underlying_symbol": { "sym": format!("{},{}", precision, underlying), "contract": "xtokens" },
        "collateral_factor": collateral_factor.to_string(),
        "reserve_factor": "0.10000000000000001",
        "borrow_index": borrow_index.to_string(),
        "oracle_feed_index": feed_index,
        "total_variable_borrows": {
            "quantity": quantity(total_borrows, underlying, precision),
            "contract": "xtokens"
        },
        "total_reserves": {
            "quantity": quantity(total_reserves, underlying, precision),
            "contract": "xtokens"
        }
    })
}

pub fn share_row(account: &str, tokens: &[(&str, i32, u64)]) -> Value {
    let tokens: Vec<Value> = tokens
        .iter()
        .map(|(symbol, precision, raw)| {
            json!({
                "key": { "sym": format!("{},{}", precision, symbol), "contract": SHARES },
                "value": raw
            })
        })
        .collect();
    json!({ "account": account, "tokens": tokens })
}

pub fn borrow_row(account: &str, tokens: &[(&str, i32, u64)]) -> Value {
    let tokens: Vec<Value> = tokens
        .iter()
        .map(|(symbol, precision, raw)| {
            json!({
                "key": { "sym": format!("{},{}", precision, symbol), "contract": "xtokens" },
                "value": {
                    "variable_principal": raw,
                    "variable_interest_index": "1.00000000000000000",
                    "stable_principal": 0,
                    "last_stable_update": "2024-01-01T00:00:00",
                    "stable_rate": "0.00000000000000000"
                }
            })
        })
        .collect();
    json!({ "account": account, "tokens": tokens })
}

pub fn oracle_row(feed_index: u64, price: f64) -> Value {
    json!({
        "feed_index": feed_index,
        "aggregate": { "d_string": null, "d_uint64_t": null, "d_double": price.to_string() }
    })
}

pub fn stat_row(supply: f64, l_symbol: &str, precision: i32) -> Value {
    json!({ "supply": quantity(supply, l_symbol, precision), "issuer": LENDING })
}

pub fn balance_row(amount: f64, symbol: &str, precision: i32) -> Value {
    json!({ "balance": quantity(amount, symbol, precision) })
}

/// One BTC market (CF 0.70, index 1.0) priced at 50,000 with no minted
/// L-tokens, so the exchange rate is exactly 1.
pub fn btc_market_tables() -> InMemoryTables {
    InMemoryTables::new()
        .with_rows(
            LENDING,
            "markets",
            LENDING,
            vec![market_row("LBTC", "XBTC", 8, 0.70, 1.0, 4)],
        )
        .with_rows(ORACLE, "data", ORACLE, vec![oracle_row(4, 50_000.0)])
}
