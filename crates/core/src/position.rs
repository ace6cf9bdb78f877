//! Per-account position aggregation.
//!
//! Joins `shares` rows (collateral, keyed by L-symbol) and `borrows` rows
//! (debt, keyed by underlying symbol) into one [`Position`] per account.
//! Line items that cannot be valued are skipped, never raised:
//! non-positive amounts, unknown markets and symbols without a precision.

use serde::Serialize;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use xpr_lending_chain::{BorrowEntry, BorrowRow, ShareEntry, ShareRow};

use crate::exchange_rate::ExchangeRates;
use crate::market::MarketRegistry;
use crate::math::{calculate_effective_collateral, calculate_health_factor, from_raw};
use crate::prices::PriceBook;

/// Collateral line: one L-token balance.
#[derive(Debug, Clone, Serialize)]
pub struct Collateral {
    pub l_symbol: String,
    pub underlying: String,
    /// Raw share units
    pub shares: f64,
    /// Shares converted to underlying units
    pub underlying_amount: f64,
    pub price_usd: f64,
    pub value_usd: f64,
    /// `value_usd` weighted by the collateral factor
    pub effective_value_usd: f64,
    pub collateral_factor: f64,
}

/// Debt line: one borrowed underlying token.
#[derive(Debug, Clone, Serialize)]
pub struct Debt {
    pub symbol: String,
    /// Principal in token units, before interest
    pub principal: f64,
    /// Principal with accrued interest
    pub amount: f64,
    pub borrow_index: f64,
    pub price_usd: f64,
    pub value_usd: f64,
}

/// Aggregated position of one account.
#[derive(Debug, Clone, Serialize)]
pub struct Position {
    pub account: String,
    pub collaterals: SmallVec<[Collateral; 4]>,
    pub debts: SmallVec<[Debt; 4]>,
    pub total_collateral_usd: f64,
    pub effective_collateral_usd: f64,
    pub total_debt_usd: f64,
    pub health_factor: f64,
}

impl Position {
    fn new(account: &str, collaterals: SmallVec<[Collateral; 4]>, debts: SmallVec<[Debt; 4]>) -> Self {
        let total_collateral_usd = collaterals.iter().map(|c| c.value_usd).sum();
        let effective_collateral_usd = collaterals.iter().map(|c| c.effective_value_usd).sum();
        let total_debt_usd = debts.iter().map(|d| d.value_usd).sum();

        Self {
            account: account.to_string(),
            collaterals,
            debts,
            total_collateral_usd,
            effective_collateral_usd,
            total_debt_usd,
            health_factor: calculate_health_factor(effective_collateral_usd, total_debt_usd),
        }
    }

    pub fn has_debt(&self) -> bool {
        self.total_debt_usd > 0.0
    }

    /// Collateral line worth the most, the one a liquidator would seize.
    pub fn largest_collateral(&self) -> Option<&Collateral> {
        self.collaterals
            .iter()
            .max_by(|a, b| a.value_usd.total_cmp(&b.value_usd))
    }

    /// Debt line worth the most, the one a liquidator would repay.
    pub fn largest_debt(&self) -> Option<&Debt> {
        self.debts
            .iter()
            .max_by(|a, b| a.value_usd.total_cmp(&b.value_usd))
    }
}

/// Market data needed to value line items.
#[derive(Debug, Clone, Copy)]
pub struct PricingContext<'a> {
    pub markets: &'a MarketRegistry,
    pub prices: &'a PriceBook,
    pub rates: &'a ExchangeRates,
}

impl<'a> PricingContext<'a> {
    pub fn new(markets: &'a MarketRegistry, prices: &'a PriceBook, rates: &'a ExchangeRates) -> Self {
        Self {
            markets,
            prices,
            rates,
        }
    }

    /// Value one L-token balance.
    pub fn collateral_line(&self, entry: &ShareEntry) -> Option<Collateral> {
        let symbol = entry.key.symbol();
        if entry.value <= 0.0 || !symbol.has_precision() {
            return None;
        }
        let market = self.markets.get(&symbol.code)?;

        let rate = self
            .rates
            .get(&market.l_symbol)
            .map(|r| r.rate)
            .unwrap_or(1.0);
        let underlying_amount = from_raw(entry.value, symbol.precision) * rate;
        let price_usd = self.prices.price_or_zero(&market.underlying);
        let value_usd = underlying_amount * price_usd;

        Some(Collateral {
            l_symbol: market.l_symbol.clone(),
            underlying: market.underlying.clone(),
            shares: entry.value,
            underlying_amount,
            price_usd,
            value_usd,
            effective_value_usd: calculate_effective_collateral(value_usd, market.collateral_factor),
            collateral_factor: market.collateral_factor,
        })
    }

    /// Value one loan, with interest accrued through the market borrow index.
    pub fn debt_line(&self, entry: &BorrowEntry) -> Option<Debt> {
        let symbol = entry.key.symbol();
        let raw = entry.value.variable_principal;
        if raw <= 0.0 || !symbol.has_precision() {
            return None;
        }
        let market = self.markets.by_underlying(&symbol.code)?;

        let principal = from_raw(raw, symbol.precision);
        let amount = principal * market.borrow_index;
        let price_usd = self.prices.price_or_zero(&symbol.code);

        Some(Debt {
            symbol: symbol.code,
            principal,
            amount,
            borrow_index: market.borrow_index,
            price_usd,
            value_usd: amount * price_usd,
        })
    }

    /// Build the position of one account from its table entries.
    pub fn position(&self, account: &str, shares: &[ShareEntry], borrows: &[BorrowEntry]) -> Position {
        let collaterals = shares.iter().filter_map(|e| self.collateral_line(e)).collect();
        let debts = borrows.iter().filter_map(|e| self.debt_line(e)).collect();
        Position::new(account, collaterals, debts)
    }
}

#[derive(Default)]
struct AccountRows<'r> {
    shares: &'r [ShareEntry],
    borrows: &'r [BorrowEntry],
}

/// Group rows by account. A later row for the same account replaces an earlier one.
fn group_rows<'r>(
    shares: &'r [ShareRow],
    borrows: &'r [BorrowRow],
    account: Option<&str>,
) -> BTreeMap<&'r str, AccountRows<'r>> {
    let wanted = |name: &str| account.map_or(true, |a| a == name);
    let mut grouped: BTreeMap<&str, AccountRows> = BTreeMap::new();

    for row in shares.iter().filter(|r| wanted(r.account.as_str())) {
        grouped.entry(row.account.as_str()).or_default().shares = row.tokens.as_slice();
    }
    for row in borrows.iter().filter(|r| wanted(r.account.as_str())) {
        grouped.entry(row.account.as_str()).or_default().borrows = row.tokens.as_slice();
    }

    grouped
}

/// Positions of every account with a `shares` or `borrows` row, by account name.
pub fn aggregate_positions(
    ctx: &PricingContext<'_>,
    shares: &[ShareRow],
    borrows: &[BorrowRow],
) -> Vec<Position> {
    group_rows(shares, borrows, None)
        .into_iter()
        .map(|(account, rows)| ctx.position(account, rows.shares, rows.borrows))
        .collect()
}

/// Position of a single account, `None` when it has no rows at all.
pub fn find_position(
    ctx: &PricingContext<'_>,
    account: &str,
    shares: &[ShareRow],
    borrows: &[BorrowRow],
) -> Option<Position> {
    group_rows(shares, borrows, Some(account))
        .remove(account)
        .map(|rows| ctx.position(account, rows.shares, rows.borrows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange_rate::ExchangeRate;
    use crate::math::NO_DEBT_HEALTH_FACTOR;
    use crate::testutil::*;
    use xpr_lending_chain::{decode_rows, MarketRow};

    struct Fixture {
        markets: MarketRegistry,
        prices: PriceBook,
        rates: ExchangeRates,
    }

    impl Fixture {
        fn new() -> Self {
            let markets = MarketRegistry::from_rows(&decode_rows::<MarketRow>(
                "markets",
                vec![
                    market_row("LBTC", "XBTC", 8, 0.70, 1.0, 4),
                    market_row("LUSDC", "XUSDC", 6, 0.80, 1.05, 5),
                    market_row("LXMT", "XMT", 6, 0.0, 1.0, 6),
                ],
            ));
            let mut prices = PriceBook::new();
            prices.set("XBTC", 50_000.0);
            prices.set("XUSDC", 1.0);
            prices.set("XMT", 2.0);

            Self {
                markets,
                prices,
                rates: ExchangeRates::new(),
            }
        }

        fn ctx(&self) -> PricingContext<'_> {
            PricingContext::new(&self.markets, &self.prices, &self.rates)
        }
    }

    fn shares(rows: Vec<serde_json::Value>) -> Vec<ShareRow> {
        decode_rows("shares", rows)
    }

    fn borrows(rows: Vec<serde_json::Value>) -> Vec<BorrowRow> {
        decode_rows("borrows", rows)
    }

    #[test]
    fn test_btc_collateral_line() {
        let fx = Fixture::new();
        let rows = shares(vec![share_row("alice", &[("LBTC", 8, 100_000_000)])]);

        let pos = find_position(&fx.ctx(), "alice", &rows, &[]).unwrap();
        let c = &pos.collaterals[0];
        assert_eq!(c.underlying_amount, 1.0);
        assert_eq!(c.value_usd, 50_000.0);
        assert_eq!(c.effective_value_usd, 35_000.0);
        assert_eq!(pos.effective_collateral_usd, 35_000.0);
        assert!(!pos.has_debt());
        assert_eq!(pos.health_factor, NO_DEBT_HEALTH_FACTOR);
    }

    #[test]
    fn test_btc_debt_line() {
        let fx = Fixture::new();
        let s = shares(vec![share_row("alice", &[("LBTC", 8, 100_000_000)])]);
        let b = borrows(vec![borrow_row("alice", &[("XBTC", 8, 2_000_000_000)])]);

        let pos = find_position(&fx.ctx(), "alice", &s, &b).unwrap();
        let d = &pos.debts[0];
        assert_eq!(d.amount, 20.0);
        assert_eq!(d.value_usd, 1_000_000.0);
        assert!((pos.health_factor - 0.035).abs() < 1e-12);
    }

    #[test]
    fn test_exchange_rate_applied_to_shares() {
        let mut fx = Fixture::new();
        fx.rates
            .insert("LBTC".to_string(), ExchangeRate::compute(3.0, 1.0, 0.0, 2.0));
        let rows = shares(vec![share_row("alice", &[("LBTC", 8, 100_000_000)])]);

        let pos = find_position(&fx.ctx(), "alice", &rows, &[]).unwrap();
        assert_eq!(pos.collaterals[0].underlying_amount, 2.0);
        assert_eq!(pos.total_collateral_usd, 100_000.0);
    }

    #[test]
    fn test_borrow_index_accrues_interest() {
        let fx = Fixture::new();
        let b = borrows(vec![borrow_row("bob", &[("XUSDC", 6, 100_000_000)])]);

        let pos = find_position(&fx.ctx(), "bob", &[], &b).unwrap();
        let d = &pos.debts[0];
        assert_eq!(d.principal, 100.0);
        assert!((d.amount - 105.0).abs() < 1e-9);
        assert_eq!(d.borrow_index, 1.05);
        // Debt without collateral
        assert_eq!(pos.health_factor, 0.0);
    }

    #[test]
    fn test_unvaluable_lines_skipped() {
        let fx = Fixture::new();
        let s = shares(vec![share_row(
            "carol",
            &[
                ("LBTC", 8, 0),          // nothing held
                ("LDOGE", 6, 5_000_000), // unknown market
                ("LBTC", 0, 5),          // no precision
            ],
        )]);
        let b = borrows(vec![borrow_row("carol", &[("LBTC", 8, 100)])]); // keyed by L-symbol

        let pos = find_position(&fx.ctx(), "carol", &s, &b).unwrap();
        assert!(pos.collaterals.is_empty());
        assert!(pos.debts.is_empty());
        assert_eq!(pos.health_factor, NO_DEBT_HEALTH_FACTOR);
    }

    #[test]
    fn test_zero_collateral_factor_counts_no_borrowing_power() {
        let fx = Fixture::new();
        let s = shares(vec![share_row("dave", &[("LXMT", 6, 10_000_000)])]);

        let pos = find_position(&fx.ctx(), "dave", &s, &[]).unwrap();
        assert_eq!(pos.total_collateral_usd, 20.0);
        assert_eq!(pos.effective_collateral_usd, 0.0);
    }

    #[test]
    fn test_aggregate_positions() {
        let fx = Fixture::new();
        let s = shares(vec![
            share_row("bob", &[("LBTC", 8, 100_000_000)]),
            share_row("alice", &[("LUSDC", 6, 1_000_000)]),
        ]);
        let b = borrows(vec![
            borrow_row("erin", &[("XUSDC", 6, 1_000_000)]),
            borrow_row("bob", &[("XUSDC", 6, 10_000_000_000)]),
        ]);

        let positions = aggregate_positions(&fx.ctx(), &s, &b);
        let accounts: Vec<&str> = positions.iter().map(|p| p.account.as_str()).collect();
        assert_eq!(accounts, vec!["alice", "bob", "erin"]);

        let bob = &positions[1];
        assert_eq!(bob.collaterals.len(), 1);
        assert_eq!(bob.debts.len(), 1);
    }

    #[test]
    fn test_later_row_replaces_earlier() {
        let fx = Fixture::new();
        let s = shares(vec![
            share_row("alice", &[("LBTC", 8, 100_000_000)]),
            share_row("alice", &[("LBTC", 8, 200_000_000)]),
        ]);

        let positions = aggregate_positions(&fx.ctx(), &s, &[]);
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].collaterals[0].underlying_amount, 2.0);
    }

    #[test]
    fn test_account_without_rows() {
        let fx = Fixture::new();
        let s = shares(vec![share_row("alice", &[("LBTC", 8, 100_000_000)])]);
        assert!(find_position(&fx.ctx(), "nobody", &s, &[]).is_none());
    }

    #[test]
    fn test_largest_lines() {
        let fx = Fixture::new();
        let s = shares(vec![share_row(
            "alice",
            &[("LUSDC", 6, 1_000_000), ("LBTC", 8, 100_000_000)],
        )]);
        let b = borrows(vec![borrow_row(
            "alice",
            &[("XBTC", 8, 1_000_000), ("XUSDC", 6, 1_000_000)],
        )]);

        let pos = find_position(&fx.ctx(), "alice", &s, &b).unwrap();
        assert_eq!(pos.largest_collateral().unwrap().l_symbol, "LBTC");
        assert_eq!(pos.largest_debt().unwrap().symbol, "XBTC");
    }
}
