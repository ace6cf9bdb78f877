//! Lending market registry.
//!
//! Markets are keyed by their L-token symbol. Borrows are keyed by the
//! underlying symbol instead, so the registry keeps a second index from
//! underlying to L-symbol built once at load time.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, instrument};
use xpr_lending_chain::{fetch_rows, MarketRow, TableQuery};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::exchange_rate::ExchangeRates;

/// Lending market configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Market {
    /// Share token symbol (e.g. "LBTC")
    pub l_symbol: String,
    /// Share token precision
    pub share_precision: i32,
    /// Underlying token symbol (e.g. "XBTC")
    pub underlying: String,
    /// Underlying token precision
    pub underlying_precision: i32,
    /// Contract issuing the underlying token
    pub underlying_contract: String,
    /// Fraction of value counted as borrowing power (0 = not collateral)
    pub collateral_factor: f64,
    pub reserve_factor: f64,
    /// Interest accrual factor applied to borrow principals
    pub borrow_index: f64,
    /// `oracles::data.feed_index` pricing the underlying
    pub oracle_feed_index: u64,
    /// Outstanding variable borrows (underlying units)
    pub total_variable_borrows: f64,
    /// Protocol reserves (underlying units)
    pub total_reserves: f64,
    /// Underlying held by the lending contract, once loaded
    pub cash: Option<f64>,
    /// Circulating L-tokens, once loaded
    pub total_l_tokens: Option<f64>,
    /// L-token to underlying rate, once loaded
    pub exchange_rate: Option<f64>,
}

impl Market {
    /// Build a market from a table row. Rows without a share symbol are dropped.
    pub fn from_row(row: &MarketRow) -> Option<Self> {
        let share = row.share_symbol.symbol();
        if share.is_empty() {
            return None;
        }
        let underlying = row.underlying_symbol.symbol();

        Some(Self {
            l_symbol: share.code,
            share_precision: share.precision,
            underlying: underlying.code,
            underlying_precision: underlying.precision,
            underlying_contract: row.underlying_symbol.contract.clone(),
            collateral_factor: row.collateral_factor,
            reserve_factor: row.reserve_factor,
            borrow_index: row.borrow_index,
            oracle_feed_index: row.oracle_feed_index,
            total_variable_borrows: row.total_variable_borrows.asset().amount,
            total_reserves: row.total_reserves.asset().amount,
            cash: None,
            total_l_tokens: None,
            exchange_rate: None,
        })
    }

    /// Whether deposits in this market count toward borrowing power.
    pub fn is_collateral_eligible(&self) -> bool {
        self.collateral_factor > 0.0
    }
}

/// Markets indexed by L-symbol and by underlying symbol.
#[derive(Debug, Clone, Default)]
pub struct MarketRegistry {
    markets: HashMap<String, Market>,
    /// underlying symbol -> L-symbol
    by_underlying: HashMap<String, String>,
    /// L-symbols in table order
    order: Vec<String>,
}

impl MarketRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from decoded table rows.
    pub fn from_rows(rows: &[MarketRow]) -> Self {
        let mut registry = Self::new();
        for market in rows.iter().filter_map(Market::from_row) {
            registry.insert(market);
        }
        registry
    }

    /// Add a market. A later market with the same L-symbol replaces the
    /// earlier one; the first market claiming an underlying keeps it.
    pub fn insert(&mut self, market: Market) {
        if !market.underlying.is_empty() {
            self.by_underlying
                .entry(market.underlying.clone())
                .or_insert_with(|| market.l_symbol.clone());
        }
        if !self.markets.contains_key(&market.l_symbol) {
            self.order.push(market.l_symbol.clone());
        }
        self.markets.insert(market.l_symbol.clone(), market);
    }

    /// Market by L-symbol.
    pub fn get(&self, l_symbol: &str) -> Option<&Market> {
        self.markets.get(l_symbol)
    }

    /// Market lending the given underlying symbol.
    pub fn by_underlying(&self, underlying: &str) -> Option<&Market> {
        self.by_underlying
            .get(underlying)
            .and_then(|l_symbol| self.markets.get(l_symbol))
    }

    /// Markets in table order.
    pub fn iter(&self) -> impl Iterator<Item = &Market> {
        self.order.iter().filter_map(|s| self.markets.get(s))
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    /// Copy of the registry with liquidity figures filled in.
    pub fn with_exchange_rates(&self, rates: &ExchangeRates) -> Self {
        let mut enriched = self.clone();
        for market in enriched.markets.values_mut() {
            if let Some(rate) = rates.get(&market.l_symbol) {
                market.cash = Some(rate.cash);
                market.total_l_tokens = Some(rate.total_l_tokens);
                market.exchange_rate = Some(rate.rate);
            }
        }
        enriched
    }
}

/// Load all markets from the lending contract.
#[instrument(skip_all)]
pub async fn load_markets(source: &dyn TableQuery, config: &EngineConfig) -> Result<MarketRegistry> {
    let contract = &config.contracts.lending;
    let rows: Vec<MarketRow> = fetch_rows(
        source,
        contract,
        "markets",
        contract,
        config.limits.market_rows,
    )
    .await
    .map_err(|e| EngineError::chain_query(contract, "markets", e))?;

    let registry = MarketRegistry::from_rows(&rows);

    for market in registry.iter() {
        debug!(
            l_symbol = %market.l_symbol,
            underlying = %market.underlying,
            collateral_factor = market.collateral_factor,
            borrow_index = market.borrow_index,
            feed = market.oracle_feed_index,
            "Loaded market"
        );
    }
    info!(rows = rows.len(), markets = registry.len(), "Markets loaded");

    Ok(registry)
}
