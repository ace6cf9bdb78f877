//! Lending risk engine.
//!
//! Owns the table source, the configuration and a cache of markets,
//! prices and exchange rates. Position tables are read fresh on every call.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};
use xpr_lending_chain::{fetch_rows, BorrowRow, ShareRow, TableQuery};

use crate::cache::EngineCache;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::exchange_rate::{load_exchange_rates, ExchangeRates};
use crate::liquidation::{
    find_at_risk, find_liquidatable, AtRiskScan, LiquidationScan, PositionLookup, PositionReport,
};
use crate::market::{load_markets, MarketRegistry};
use crate::math::{round_to, round_usd, RATE_DECIMALS};
use crate::position::{aggregate_positions, find_position, Position, PricingContext};
use crate::prices::{load_prices, PriceBook, PriceEntry};

/// Market line of the overview.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSummary {
    pub symbol: String,
    pub l_symbol: String,
    pub total_borrows: f64,
    pub total_borrows_usd: f64,
    pub collateral_factor: f64,
    pub price_usd: f64,
    pub exchange_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketOverview {
    pub markets: Vec<MarketSummary>,
    pub count: usize,
    pub total_borrows_usd: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceList {
    pub prices: Vec<PriceEntry>,
    pub count: usize,
}

/// Market data for one computation.
struct Snapshot {
    markets: Arc<MarketRegistry>,
    prices: Arc<PriceBook>,
    rates: Arc<ExchangeRates>,
}

impl Snapshot {
    fn pricing(&self) -> PricingContext<'_> {
        PricingContext::new(&self.markets, &self.prices, &self.rates)
    }
}

pub struct LendingEngine {
    source: Arc<dyn TableQuery>,
    config: Arc<EngineConfig>,
    cache: EngineCache,
}

impl LendingEngine {
    pub fn new(source: Arc<dyn TableQuery>, config: Arc<EngineConfig>) -> Self {
        let cache = EngineCache::new(config.cache.ttl());
        Self {
            source,
            config,
            cache,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Drop cached markets, prices and exchange rates.
    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    /// Markets, from cache when fresh.
    pub async fn markets(&self) -> Result<Arc<MarketRegistry>> {
        self.cache
            .markets
            .get_or_try_fill(self.cache.ttl(), || {
                load_markets(self.source.as_ref(), &self.config)
            })
            .await
    }

    /// Prices, from cache when fresh.
    pub async fn prices(&self) -> Result<Arc<PriceBook>> {
        let markets = self.markets().await?;
        self.prices_for(&markets).await
    }

    /// Exchange rates, from cache when fresh.
    pub async fn exchange_rates(&self) -> Result<Arc<ExchangeRates>> {
        let markets = self.markets().await?;
        Ok(self.rates_for(&markets).await)
    }

    async fn prices_for(&self, markets: &MarketRegistry) -> Result<Arc<PriceBook>> {
        self.cache
            .prices
            .get_or_try_fill(self.cache.ttl(), || {
                load_prices(self.source.as_ref(), &self.config, markets)
            })
            .await
    }

    async fn rates_for(&self, markets: &MarketRegistry) -> Arc<ExchangeRates> {
        let ttl = self.cache.ttl();
        if let Some(rates) = self.cache.rates.get(ttl) {
            return rates;
        }
        let rates = load_exchange_rates(self.source.as_ref(), &self.config, markets).await;
        self.cache.rates.put(rates)
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let markets = self.markets().await?;
        let (prices, rates) = tokio::join!(self.prices_for(&markets), self.rates_for(&markets));
        Ok(Snapshot {
            prices: prices?,
            rates,
            markets,
        })
    }

    /// Read the `shares` and `borrows` tables together.
    async fn position_rows(&self, limit: u32) -> Result<(Vec<ShareRow>, Vec<BorrowRow>)> {
        let source = self.source.as_ref();
        let lending = &self.config.contracts.lending;

        let shares = async {
            fetch_rows::<ShareRow>(source, lending, "shares", lending, limit)
                .await
                .map_err(|e| EngineError::chain_query(lending, "shares", e))
        };
        let borrows = async {
            fetch_rows::<BorrowRow>(source, lending, "borrows", lending, limit)
                .await
                .map_err(|e| EngineError::chain_query(lending, "borrows", e))
        };

        tokio::try_join!(shares, borrows)
    }

    async fn all_positions(&self) -> Result<Vec<Position>> {
        let (snapshot, (shares, borrows)) = tokio::try_join!(
            self.snapshot(),
            self.position_rows(self.config.limits.scan_rows)
        )?;

        let positions = aggregate_positions(&snapshot.pricing(), &shares, &borrows);
        debug!(
            shares = shares.len(),
            borrows = borrows.len(),
            accounts = positions.len(),
            "Positions aggregated"
        );
        Ok(positions)
    }

    /// Every market with its borrows valued in USD.
    #[instrument(skip(self))]
    pub async fn market_overview(&self) -> Result<MarketOverview> {
        let snapshot = self.snapshot().await?;

        let markets: Vec<MarketSummary> = snapshot
            .markets
            .with_exchange_rates(&snapshot.rates)
            .iter()
            .map(|m| {
                let price_usd = snapshot.prices.price_or_zero(&m.underlying);
                MarketSummary {
                    symbol: m.underlying.clone(),
                    l_symbol: m.l_symbol.clone(),
                    total_borrows: m.total_variable_borrows,
                    total_borrows_usd: round_usd(m.total_variable_borrows * price_usd),
                    collateral_factor: m.collateral_factor,
                    price_usd,
                    exchange_rate: round_to(m.exchange_rate.unwrap_or(1.0), RATE_DECIMALS),
                }
            })
            .collect();

        let total_borrows_usd = round_usd(markets.iter().map(|m| m.total_borrows_usd).sum());
        Ok(MarketOverview {
            count: markets.len(),
            total_borrows_usd,
            markets,
        })
    }

    /// Current USD prices, restricted to `symbols` when given.
    #[instrument(skip(self))]
    pub async fn oracle_prices(&self, symbols: Option<&[String]>) -> Result<PriceList> {
        let prices = self.prices().await?.filter(symbols);
        Ok(PriceList {
            count: prices.len(),
            prices,
        })
    }

    /// Liquidatable positions earning at least `min_profit_usd`
    /// (configured default when `None`).
    #[instrument(skip(self))]
    pub async fn liquidatable_positions(&self, min_profit_usd: Option<f64>) -> Result<LiquidationScan> {
        let min_profit = min_profit_usd.unwrap_or(self.config.liquidation.default_min_profit_usd);
        if !min_profit.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "min_profit_usd must be a finite number, got {min_profit}"
            )));
        }

        let start = Instant::now();
        let positions = self.all_positions().await?;
        let scan = find_liquidatable(&positions, min_profit, &self.config.liquidation);

        info!(
            accounts = positions.len(),
            liquidatable = scan.count,
            total_profit = scan.total_profit_available,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Liquidation scan complete"
        );
        Ok(scan)
    }

    /// Positions between the liquidation line and `hf_threshold`
    /// (configured default when `None`).
    #[instrument(skip(self))]
    pub async fn at_risk_positions(&self, hf_threshold: Option<f64>) -> Result<AtRiskScan> {
        let threshold = hf_threshold.unwrap_or(self.config.liquidation.default_at_risk_hf);
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "hf_threshold must be a positive number, got {threshold}"
            )));
        }

        let start = Instant::now();
        let positions = self.all_positions().await?;
        let scan = find_at_risk(&positions, threshold, &self.config.liquidation);

        info!(
            accounts = positions.len(),
            at_risk = scan.count,
            threshold,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "At-risk scan complete"
        );
        Ok(scan)
    }

    /// Full report for one account.
    #[instrument(skip(self))]
    pub async fn lending_position(&self, account: &str) -> Result<PositionLookup> {
        let account = account.trim();
        if account.is_empty() {
            return Err(EngineError::InvalidInput("account name is required".to_string()));
        }

        let (snapshot, (shares, borrows)) = tokio::try_join!(
            self.snapshot(),
            self.position_rows(self.config.limits.position_rows)
        )?;

        let lookup = match find_position(&snapshot.pricing(), account, &shares, &borrows) {
            Some(position) => {
                PositionLookup::Found(PositionReport::from_position(&position, &self.config.liquidation))
            }
            None => PositionLookup::not_found(account),
        };

        debug!(account, found = lookup.has_position(), "Position lookup");
        Ok(lookup)
    }
}
