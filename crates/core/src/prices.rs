//! USD prices from the oracle contract.
//!
//! Feed indices are resolved through the live markets first and the
//! configured fallback table second. Stablecoins are pinned to 1.0 after
//! the oracle values are applied.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, instrument};
use xpr_lending_chain::{fetch_rows, OracleDataRow, TableQuery};

use crate::config::{EngineConfig, FeedEntry};
use crate::error::{EngineError, Result};
use crate::market::MarketRegistry;

/// Oracle feed index to token symbol.
#[derive(Debug, Clone, Default)]
pub struct FeedTable {
    feeds: HashMap<u64, String>,
}

impl FeedTable {
    /// Build from market feed indices, then fill gaps from the fallback table.
    pub fn build(markets: &MarketRegistry, fallback: &[FeedEntry]) -> Self {
        let mut feeds = HashMap::new();

        // Index 0 is the decoded default for a missing field
        for market in markets.iter() {
            if market.oracle_feed_index == 0 || market.underlying.is_empty() {
                continue;
            }
            feeds
                .entry(market.oracle_feed_index)
                .or_insert_with(|| market.underlying.clone());
        }

        for entry in fallback {
            feeds
                .entry(entry.feed_index)
                .or_insert_with(|| entry.symbol.clone());
        }

        Self { feeds }
    }

    /// Symbol priced by a feed.
    pub fn symbol(&self, feed_index: u64) -> Option<&str> {
        self.feeds.get(&feed_index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

/// Price list entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceEntry {
    pub symbol: String,
    pub price_usd: f64,
}

/// Token symbol to USD price.
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    prices: HashMap<String, f64>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from oracle rows, then pin the stablecoins to 1.0.
    ///
    /// Rows whose feed index is unknown are dropped.
    pub fn from_rows(rows: &[OracleDataRow], feeds: &FeedTable, stablecoins: &[String]) -> Self {
        let mut book = Self::new();

        for row in rows {
            match feeds.symbol(row.feed_index) {
                Some(symbol) => book.set(symbol, row.aggregate.d_double),
                None => debug!(feed_index = row.feed_index, "Ignoring unknown oracle feed"),
            }
        }

        for symbol in stablecoins {
            book.set(symbol, 1.0);
        }

        book
    }

    pub fn set(&mut self, symbol: &str, price_usd: f64) {
        self.prices.insert(symbol.to_string(), price_usd);
    }

    /// Price of a symbol, if known.
    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.prices.get(symbol).copied()
    }

    /// Price of a symbol, 0 when unknown.
    pub fn price_or_zero(&self, symbol: &str) -> f64 {
        self.price(symbol).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// All prices sorted by symbol, optionally restricted to `symbols`
    /// (case-insensitive). An empty filter returns everything.
    pub fn filter(&self, symbols: Option<&[String]>) -> Vec<PriceEntry> {
        let wanted: Option<Vec<String>> = symbols
            .filter(|s| !s.is_empty())
            .map(|s| s.iter().map(|sym| sym.trim().to_uppercase()).collect());

        let mut entries: Vec<PriceEntry> = self
            .prices
            .iter()
            .filter(|(symbol, _)| {
                wanted
                    .as_ref()
                    .map_or(true, |w| w.iter().any(|s| s == &symbol.to_uppercase()))
            })
            .map(|(symbol, price)| PriceEntry {
                symbol: symbol.clone(),
                price_usd: *price,
            })
            .collect();

        entries.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        entries
    }
}

/// Load prices for all known feeds.
#[instrument(skip_all)]
pub async fn load_prices(
    source: &dyn TableQuery,
    config: &EngineConfig,
    markets: &MarketRegistry,
) -> Result<PriceBook> {
    let contract = &config.contracts.oracle;
    let rows: Vec<OracleDataRow> =
        fetch_rows(source, contract, "data", contract, config.limits.oracle_rows)
            .await
            .map_err(|e| EngineError::chain_query(contract, "data", e))?;

    let feeds = FeedTable::build(markets, &config.oracle.feeds);
    let book = PriceBook::from_rows(&rows, &feeds, &config.oracle.stablecoins);

    info!(
        rows = rows.len(),
        feeds = feeds.len(),
        prices = book.len(),
        "Oracle prices loaded"
    );

    Ok(book)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use xpr_lending_chain::{decode_rows, InMemoryTables, MarketRow};

    fn stablecoins() -> Vec<String> {
        vec!["XUSDC".into(), "XUSDT".into(), "XMD".into()]
    }

    fn markets(rows: Vec<serde_json::Value>) -> MarketRegistry {
        MarketRegistry::from_rows(&decode_rows::<MarketRow>("markets", rows))
    }

    #[test]
    fn test_feed_table_prefers_markets() {
        // Market says feed 6 prices XPR; fallback says XMT
        let reg = markets(vec![market_row("LXPR", "XPR", 4, 0.40, 1.0, 6)]);
        let fallback = vec![
            FeedEntry { feed_index: 6, symbol: "XMT".into(), precision: 6 },
            FeedEntry { feed_index: 4, symbol: "XBTC".into(), precision: 8 },
        ];

        let feeds = FeedTable::build(&reg, &fallback);
        assert_eq!(feeds.symbol(6), Some("XPR"));
        assert_eq!(feeds.symbol(4), Some("XBTC"));
        assert_eq!(feeds.symbol(99), None);
    }

    #[test]
    fn test_stablecoins_pinned() {
        let feeds = FeedTable::build(&MarketRegistry::new(), &crate::config::default_feeds());
        let rows: Vec<OracleDataRow> = decode_rows(
            "data",
            vec![
                oracle_row(5, 0.9987),  // XUSDC
                oracle_row(9, 1.0213),  // XUSDT
                oracle_row(12, 0.97),   // XMD
                oracle_row(4, 50_000.0),
            ],
        );

        let book = PriceBook::from_rows(&rows, &feeds, &stablecoins());
        assert_eq!(book.price("XUSDC"), Some(1.0));
        assert_eq!(book.price("XUSDT"), Some(1.0));
        assert_eq!(book.price("XMD"), Some(1.0));
        assert_eq!(book.price("XBTC"), Some(50_000.0));
    }

    #[test]
    fn test_stablecoins_present_without_oracle_rows() {
        let book = PriceBook::from_rows(&[], &FeedTable::default(), &stablecoins());
        assert_eq!(book.len(), 3);
        assert_eq!(book.price_or_zero("XMD"), 1.0);
        assert_eq!(book.price_or_zero("XBTC"), 0.0);
    }

    #[test]
    fn test_unknown_feed_dropped_and_missing_value_zero() {
        let feeds = FeedTable::build(&MarketRegistry::new(), &crate::config::default_feeds());
        let rows: Vec<OracleDataRow> = decode_rows(
            "data",
            vec![
                oracle_row(77, 123.0),
                serde_json::json!({ "feed_index": 7 }),
            ],
        );

        let book = PriceBook::from_rows(&rows, &feeds, &[]);
        assert_eq!(book.len(), 1);
        assert_eq!(book.price("XETH"), Some(0.0));
    }

    #[test]
    fn test_entries_filter() {
        let mut book = PriceBook::new();
        book.set("XBTC", 50_000.0);
        book.set("XETH", 3_000.0);
        book.set("XPR", 0.002);

        let all = book.filter(None);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].symbol, "XBTC");

        let filtered = book.filter(Some(&["xeth".to_string(), "NOPE".to_string()]));
        assert_eq!(filtered, vec![PriceEntry { symbol: "XETH".into(), price_usd: 3_000.0 }]);

        assert_eq!(book.filter(Some(&[])).len(), 3);
    }

    #[tokio::test]
    async fn test_load_prices() {
        let tables = btc_market_tables();
        let config = EngineConfig::default();
        let reg = crate::market::load_markets(&tables, &config).await.unwrap();

        let book = load_prices(&tables, &config, &reg).await.unwrap();
        assert_eq!(book.price("XBTC"), Some(50_000.0));
        assert_eq!(book.price("XMD"), Some(1.0));
    }

    #[tokio::test]
    async fn test_load_prices_failure() {
        let tables = InMemoryTables::new();
        tables.fail(ORACLE, "data", None, "API error: 502");

        let err = load_prices(&tables, &EngineConfig::default(), &MarketRegistry::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ChainQuery { ref contract, .. } if contract == "oracles"));
    }
}
