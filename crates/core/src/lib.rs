//! Lending risk engine core.
//!
//! This crate provides the health-factor and liquidation-scan engine for
//! the XPR lending protocol:
//! - Market registry with an underlying-symbol index
//! - Oracle price reader with stablecoin pegs
//! - L-token exchange rates derived from cash, borrows, reserves and supply
//! - Per-account collateral/debt aggregation
//! - Liquidation ranking, at-risk scans and single-account reports
//! - An explicit per-engine cache with optional TTL
//!
//! All chain reads go through [`xpr_lending_chain::TableQuery`].

mod cache;
pub mod config;
mod engine;
mod error;
mod exchange_rate;
mod liquidation;
mod market;
pub mod math;
mod position;
mod prices;

#[cfg(test)]
mod testutil;

pub use cache::{CacheSlot, EngineCache};
pub use config::{EngineConfig, LiquidationConfig};
pub use engine::{LendingEngine, MarketOverview, MarketSummary, PriceList};
pub use error::{EngineError, Result};
pub use exchange_rate::{load_exchange_rates, ExchangeRate, ExchangeRates};
pub use liquidation::{
    find_at_risk, find_liquidatable, AssetValue, AtRiskPosition, AtRiskScan, CollateralDetail,
    CollateralSummary, DebtDetail, DebtSummary, LiquidationOpportunity, LiquidationScan,
    NoPosition, PositionLookup, PositionReport,
};
pub use market::{load_markets, Market, MarketRegistry};
pub use position::{aggregate_positions, find_position, Collateral, Debt, Position, PricingContext};
pub use prices::{load_prices, FeedTable, PriceBook, PriceEntry};
