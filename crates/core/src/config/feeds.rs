//! Static oracle feed table and token constants for MetalX lending.
//!
//! Feed indices here are only a fallback. The authoritative mapping is the
//! `oracle_feed_index` carried by each live market row; see
//! [`crate::prices::FeedTable`].

use serde::{Deserialize, Serialize};

/// Oracle feed description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    /// `oracles::data.feed_index`
    pub feed_index: u64,
    /// Token symbol priced by the feed
    pub symbol: String,
    /// Token precision
    pub precision: i32,
}

impl FeedEntry {
    fn new(feed_index: u64, symbol: &str, precision: i32) -> Self {
        Self {
            feed_index,
            symbol: symbol.to_string(),
            precision,
        }
    }
}

/// Fallback feed table (`feed_index`, symbol, precision).
const FEEDS: &[(u64, &str, i32)] = &[
    (3, "XPR", 4),
    (4, "XBTC", 8),
    (5, "XUSDC", 6),
    (6, "XMT", 6),
    (7, "XETH", 8),
    (8, "XDOGE", 6),
    (9, "XUSDT", 6),
    (10, "XUST", 6),
    (11, "XLUNA", 6),
    (12, "XMD", 6),
    (16, "XLTC", 8),
    (18, "XXRP", 6),
    (19, "XSOL", 6),
    (21, "XHBAR", 6),
    (22, "XADA", 6),
    (23, "XXLM", 6),
];

/// USD-pegged symbols priced at exactly 1.0.
pub const STABLECOINS: &[&str] = &["XUSDC", "XUSDT", "XMD"];

/// Token contracts that issue lending underlyings.
pub const TOKEN_CONTRACTS: &[&str] = &["xtokens", "eosio.token", "xmd.token"];

/// Default fallback feed table.
pub fn default_feeds() -> Vec<FeedEntry> {
    FEEDS
        .iter()
        .map(|(index, symbol, precision)| FeedEntry::new(*index, symbol, *precision))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_feed_indices_unique() {
        let feeds = default_feeds();
        let indices: HashSet<_> = feeds.iter().map(|f| f.feed_index).collect();
        assert_eq!(indices.len(), feeds.len());
    }

    #[test]
    fn test_feed_lookup() {
        let feeds = default_feeds();
        let btc = feeds.iter().find(|f| f.symbol == "XBTC").unwrap();
        assert_eq!(btc.feed_index, 4);
        assert_eq!(btc.precision, 8);
    }

    #[test]
    fn test_stablecoins_have_feeds() {
        let feeds = default_feeds();
        for coin in STABLECOINS {
            assert!(feeds.iter().any(|f| f.symbol == *coin), "missing feed for {}", coin);
        }
    }
}
