//! Parsing for EOSIO symbol and asset strings.
//!
//! Both parsers are lenient: malformed input yields zeroed components
//! instead of an error, since ledger rows are historically inconsistent.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token symbol with precision, written on-chain as `"8,XBTC"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    /// Decimal places of the token (0 when unparseable)
    pub precision: i32,
    /// Symbol code, e.g. `XBTC` (empty when missing)
    pub code: String,
}

impl Symbol {
    /// Create a symbol from its parts.
    pub fn new(precision: i32, code: impl Into<String>) -> Self {
        Self {
            precision,
            code: code.into(),
        }
    }

    /// Parse `"<precision>,<CODE>"`.
    pub fn parse(s: &str) -> Self {
        let mut parts = s.splitn(2, ',');
        let precision = parts
            .next()
            .and_then(|p| p.trim().parse::<i32>().ok())
            .unwrap_or(0);
        let code = parts.next().map(|c| c.trim().to_string()).unwrap_or_default();

        Self { precision, code }
    }

    /// Whether the precision component parsed to a usable value.
    pub fn has_precision(&self) -> bool {
        self.precision > 0
    }

    /// Whether the symbol code is present.
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.precision, self.code)
    }
}

/// Token quantity, written on-chain as `"1.00000000 XBTC"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Decimal amount
    pub amount: f64,
    /// Symbol, with precision taken from the number of fraction digits
    pub symbol: Symbol,
}

impl Asset {
    /// Parse `"<decimal> <CODE>"`. The amount falls back to 0.
    pub fn parse(s: &str) -> Self {
        let mut parts = s.split_whitespace();
        let quantity = parts.next().unwrap_or("");
        let code = parts.next().unwrap_or("").to_string();

        let amount = quantity.parse::<f64>().unwrap_or(0.0);
        let precision = quantity
            .split_once('.')
            .map(|(_, frac)| frac.len() as i32)
            .unwrap_or(0);

        Self {
            amount,
            symbol: Symbol { precision, code },
        }
    }

    /// Symbol code of the asset.
    pub fn code(&self) -> &str {
        &self.symbol.code
    }
}
