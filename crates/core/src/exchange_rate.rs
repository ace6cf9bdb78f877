//! L-token to underlying exchange rates.
//!
//! Each market needs two reads: the L-token supply from the share
//! contract's `stat` table and the lending contract's underlying balance
//! ("cash") from the token contract's `accounts` table. A failed read counts
//! as 0 for that market and never fails the batch.

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};
use xpr_lending_chain::{fetch_rows, AccountBalanceRow, StatRow, TableQuery};

use crate::config::EngineConfig;
use crate::market::{Market, MarketRegistry};
use crate::math::calculate_exchange_rate;

/// Exchange rate of one market, with the inputs it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExchangeRate {
    pub cash: f64,
    pub total_borrows: f64,
    pub total_reserves: f64,
    pub total_l_tokens: f64,
    pub rate: f64,
}

impl ExchangeRate {
    pub fn compute(cash: f64, total_borrows: f64, total_reserves: f64, total_l_tokens: f64) -> Self {
        Self {
            cash,
            total_borrows,
            total_reserves,
            total_l_tokens,
            rate: calculate_exchange_rate(cash, total_borrows, total_reserves, total_l_tokens),
        }
    }

    /// Rate used before any shares are minted.
    pub fn unit() -> Self {
        Self::compute(0.0, 0.0, 0.0, 0.0)
    }
}

/// L-symbol to exchange rate.
pub type ExchangeRates = HashMap<String, ExchangeRate>;

/// Compute exchange rates for every market.
#[instrument(skip_all, fields(markets = markets.len()))]
pub async fn load_exchange_rates(
    source: &dyn TableQuery,
    config: &EngineConfig,
    markets: &MarketRegistry,
) -> ExchangeRates {
    let pending: Vec<_> = markets
        .iter()
        .map(|market| keyed_exchange_rate(source, config, market))
        .collect();

    let rates: ExchangeRates = stream::iter(pending)
        .buffer_unordered(config.limits.concurrent_reads.max(1))
        .collect()
        .await;

    info!(count = rates.len(), "Exchange rates computed");
    rates
}

async fn keyed_exchange_rate(
    source: &dyn TableQuery,
    config: &EngineConfig,
    market: &Market,
) -> (String, ExchangeRate) {
    let rate = market_exchange_rate(source, config, market).await;
    (market.l_symbol.clone(), rate)
}

async fn market_exchange_rate(
    source: &dyn TableQuery,
    config: &EngineConfig,
    market: &Market,
) -> ExchangeRate {
    let (total_l_tokens, cash) = tokio::join!(
        l_token_supply(source, config, market),
        lending_cash(source, config, market)
    );

    let rate = ExchangeRate::compute(
        cash,
        market.total_variable_borrows,
        market.total_reserves,
        total_l_tokens,
    );

    debug!(
        l_symbol = %market.l_symbol,
        cash,
        total_l_tokens,
        rate = rate.rate,
        "Exchange rate"
    );

    rate
}

/// Circulating L-tokens of a market, 0 on failure.
async fn l_token_supply(source: &dyn TableQuery, config: &EngineConfig, market: &Market) -> f64 {
    let contract = &config.contracts.shares;
    match fetch_rows::<StatRow>(source, contract, "stat", &market.l_symbol, 1).await {
        Ok(rows) => rows.first().map(|row| row.supply().amount).unwrap_or(0.0),
        Err(e) => {
            warn!(
                l_symbol = %market.l_symbol,
                contract = %contract,
                error = %e,
                "Failed to read L-token supply"
            );
            0.0
        }
    }
}

/// Underlying tokens held by the lending contract.
///
/// Reads the market's own token contract when the market names one,
/// otherwise every configured token contract.
async fn lending_cash(source: &dyn TableQuery, config: &EngineConfig, market: &Market) -> f64 {
    if !market.underlying_contract.is_empty() {
        return balance_on(source, config, market, &market.underlying_contract).await;
    }

    join_all(
        config
            .contracts
            .token_contracts
            .iter()
            .map(|contract| balance_on(source, config, market, contract)),
    )
    .await
    .into_iter()
    .sum()
}

async fn balance_on(
    source: &dyn TableQuery,
    config: &EngineConfig,
    market: &Market,
    token_contract: &str,
) -> f64 {
    let lending = &config.contracts.lending;
    match fetch_rows::<AccountBalanceRow>(
        source,
        token_contract,
        "accounts",
        lending,
        config.limits.balance_rows,
    )
    .await
    {
        Ok(rows) => rows
            .iter()
            .map(AccountBalanceRow::balance)
            .filter(|asset| asset.code() == market.underlying)
            .map(|asset| asset.amount)
            .sum(),
        Err(e) => {
            warn!(
                l_symbol = %market.l_symbol,
                contract = token_contract,
                error = %e,
                "Failed to read lending cash"
            );
            0.0
        }
    }
}
