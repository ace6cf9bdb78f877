//! Lending math: unit conversion, exchange rates, health factors and
//! liquidation economics.
//!
//! All values are `f64`. Table quantities are already decimal strings or
//! raw integers small enough to be exact in a double, and every result is
//! rounded for display before it leaves the engine.

/// Health factor reported for accounts without debt.
pub const NO_DEBT_HEALTH_FACTOR: f64 = 999.0;

/// Decimal places for token amounts in reports.
pub const AMOUNT_DECIMALS: u32 = 4;

/// Decimal places for USD values in reports.
pub const USD_DECIMALS: u32 = 2;

/// Decimal places for exchange rates in reports.
pub const RATE_DECIMALS: u32 = 6;

/// Decimal places for health factors in reports.
pub const HF_DECIMALS: u32 = 4;

/// Round to `decimals` places (half away from zero).
#[inline]
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Round a token amount for display.
#[inline]
pub fn round_amount(value: f64) -> f64 {
    round_to(value, AMOUNT_DECIMALS)
}

/// Round a USD value for display.
#[inline]
pub fn round_usd(value: f64) -> f64 {
    round_to(value, USD_DECIMALS)
}

/// Round a health factor for display.
#[inline]
pub fn round_hf(value: f64) -> f64 {
    round_to(value, HF_DECIMALS)
}

/// Convert raw integer units to a decimal amount.
///
/// Example: `from_raw(100_000_000.0, 8) = 1.0`
#[inline]
pub fn from_raw(raw: f64, precision: i32) -> f64 {
    raw / 10f64.powi(precision)
}

/// Convert a decimal amount to raw integer units.
///
/// Example: `to_raw(1.0, 8) = 100_000_000.0`
#[inline]
pub fn to_raw(value: f64, precision: i32) -> f64 {
    (value * 10f64.powi(precision)).round()
}

/// L-token to underlying conversion rate.
///
/// Formula: (cash + borrows - reserves) / l_token_supply
///
/// Returns 1.0 when no L-tokens exist or the numerator is not positive.
pub fn calculate_exchange_rate(
    cash: f64,
    total_borrows: f64,
    total_reserves: f64,
    total_l_tokens: f64,
) -> f64 {
    if total_l_tokens <= 0.0 {
        return 1.0;
    }
    let numerator = cash + total_borrows - total_reserves;
    if numerator <= 0.0 {
        return 1.0;
    }
    numerator / total_l_tokens
}

/// Health factor = effective collateral / debt, or the sentinel without debt.
#[inline]
pub fn calculate_health_factor(effective_collateral_usd: f64, total_debt_usd: f64) -> f64 {
    if total_debt_usd <= 0.0 {
        return NO_DEBT_HEALTH_FACTOR;
    }
    effective_collateral_usd / total_debt_usd
}

/// Collateral value counted toward borrowing power.
#[inline]
pub fn calculate_effective_collateral(value_usd: f64, collateral_factor: f64) -> f64 {
    value_usd * collateral_factor
}

/// Largest debt value repayable in a single liquidation.
#[inline]
pub fn calculate_max_repay(total_debt_usd: f64, close_factor: f64) -> f64 {
    total_debt_usd * close_factor
}

/// Liquidator bonus earned on a repayment.
#[inline]
pub fn calculate_liquidation_profit(repay_usd: f64, liquidation_incentive: f64) -> f64 {
    repay_usd * liquidation_incentive
}

/// Percentage headroom above the liquidation line (HF 1.05 = 5%).
#[inline]
pub fn distance_to_liquidation_pct(health_factor: f64) -> f64 {
    (health_factor - 1.0) * 100.0
}
