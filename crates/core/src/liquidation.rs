//! Health factor classification and liquidation ranking.
//!
//! Every figure leaving this module is rounded for display (amounts 4 dp,
//! USD 2 dp, health factor 4 dp). Classification, filtering and ordering
//! run on the unrounded health factor and profit.

use serde::Serialize;

use crate::config::LiquidationConfig;
use crate::math::{
    calculate_liquidation_profit, calculate_max_repay, distance_to_liquidation_pct, round_amount,
    round_hf, round_usd,
};
use crate::position::{Collateral, Debt, Position};

/// Symbol and USD value of a single line item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetValue {
    pub symbol: String,
    pub value_usd: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollateralSummary {
    pub l_symbol: String,
    pub underlying: String,
    pub amount: f64,
    pub value_usd: f64,
}

impl From<&Collateral> for CollateralSummary {
    fn from(c: &Collateral) -> Self {
        Self {
            l_symbol: c.l_symbol.clone(),
            underlying: c.underlying.clone(),
            amount: round_amount(c.underlying_amount),
            value_usd: round_usd(c.value_usd),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DebtSummary {
    pub symbol: String,
    pub amount: f64,
    pub value_usd: f64,
}

impl From<&Debt> for DebtSummary {
    fn from(d: &Debt) -> Self {
        Self {
            symbol: d.symbol.clone(),
            amount: round_amount(d.amount),
            value_usd: round_usd(d.value_usd),
        }
    }
}

/// A position that can be liquidated now.
#[derive(Debug, Clone, Serialize)]
pub struct LiquidationOpportunity {
    pub account: String,
    pub health_factor: f64,
    pub collateral_usd: f64,
    pub effective_collateral_usd: f64,
    pub debt_usd: f64,
    /// Debt repayable in one call (close factor applied)
    pub max_repay_usd: f64,
    /// Liquidator bonus on `max_repay_usd`
    #[serde(rename = "potential_profit_usd")]
    pub profit_usd: f64,
    /// Collateral to seize
    pub best_collateral: Option<AssetValue>,
    /// Debt to repay
    pub best_debt: Option<AssetValue>,
    pub debts: Vec<DebtSummary>,
    pub collaterals: Vec<CollateralSummary>,
}

impl LiquidationOpportunity {
    /// Opportunity for a position with debt and a health factor below the
    /// liquidation line, `None` otherwise.
    pub fn from_position(position: &Position, config: &LiquidationConfig) -> Option<Self> {
        if !is_liquidatable(position, config) {
            return None;
        }

        let max_repay = calculate_max_repay(position.total_debt_usd, config.close_factor);
        let profit = calculate_liquidation_profit(max_repay, config.liquidation_incentive);

        Some(Self {
            account: position.account.clone(),
            health_factor: round_hf(position.health_factor),
            collateral_usd: round_usd(position.total_collateral_usd),
            effective_collateral_usd: round_usd(position.effective_collateral_usd),
            debt_usd: round_usd(position.total_debt_usd),
            max_repay_usd: round_usd(max_repay),
            profit_usd: round_usd(profit),
            best_collateral: position.largest_collateral().map(|c| AssetValue {
                symbol: c.underlying.clone(),
                value_usd: round_usd(c.value_usd),
            }),
            best_debt: position.largest_debt().map(|d| AssetValue {
                symbol: d.symbol.clone(),
                value_usd: round_usd(d.value_usd),
            }),
            debts: position.debts.iter().map(DebtSummary::from).collect(),
            collaterals: position.collaterals.iter().map(CollateralSummary::from).collect(),
        })
    }
}

fn is_liquidatable(position: &Position, config: &LiquidationConfig) -> bool {
    position.has_debt() && position.health_factor < config.liquidation_hf
}

fn liquidation_profit(position: &Position, config: &LiquidationConfig) -> f64 {
    let max_repay = calculate_max_repay(position.total_debt_usd, config.close_factor);
    calculate_liquidation_profit(max_repay, config.liquidation_incentive)
}

/// Result of a liquidation scan.
#[derive(Debug, Clone, Serialize)]
pub struct LiquidationScan {
    pub positions: Vec<LiquidationOpportunity>,
    pub count: usize,
    pub total_profit_available: f64,
}

/// Liquidatable positions earning at least `min_profit_usd`, most profitable first.
pub fn find_liquidatable(
    positions: &[Position],
    min_profit_usd: f64,
    config: &LiquidationConfig,
) -> LiquidationScan {
    let mut candidates: Vec<(&Position, f64)> = positions
        .iter()
        .filter(|p| is_liquidatable(p, config))
        .map(|p| (p, liquidation_profit(p, config)))
        .filter(|(_, profit)| *profit >= min_profit_usd)
        .collect();

    candidates.sort_by(|(a, a_profit), (b, b_profit)| {
        b_profit
            .total_cmp(a_profit)
            .then_with(|| a.account.cmp(&b.account))
    });

    let total: f64 = candidates.iter().map(|(_, profit)| profit).sum();
    let opportunities: Vec<LiquidationOpportunity> = candidates
        .into_iter()
        .filter_map(|(p, _)| LiquidationOpportunity::from_position(p, config))
        .collect();

    LiquidationScan {
        count: opportunities.len(),
        total_profit_available: round_usd(total),
        positions: opportunities,
    }
}

/// A position close to, but not yet below, the liquidation line.
#[derive(Debug, Clone, Serialize)]
pub struct AtRiskPosition {
    pub account: String,
    pub health_factor: f64,
    pub effective_collateral_usd: f64,
    pub debt_usd: f64,
    pub distance_to_liquidation_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AtRiskScan {
    pub positions: Vec<AtRiskPosition>,
    pub count: usize,
}

/// Positions with `liquidation_hf <= HF < hf_threshold`, lowest HF first.
pub fn find_at_risk(
    positions: &[Position],
    hf_threshold: f64,
    config: &LiquidationConfig,
) -> AtRiskScan {
    let mut candidates: Vec<&Position> = positions
        .iter()
        .filter(|p| p.has_debt())
        .filter(|p| p.health_factor >= config.liquidation_hf && p.health_factor < hf_threshold)
        .collect();

    candidates.sort_by(|a, b| {
        a.health_factor
            .total_cmp(&b.health_factor)
            .then_with(|| a.account.cmp(&b.account))
    });

    let at_risk: Vec<AtRiskPosition> = candidates
        .into_iter()
        .map(|p| AtRiskPosition {
            account: p.account.clone(),
            health_factor: round_hf(p.health_factor),
            effective_collateral_usd: round_usd(p.effective_collateral_usd),
            debt_usd: round_usd(p.total_debt_usd),
            distance_to_liquidation_pct: round_usd(distance_to_liquidation_pct(p.health_factor)),
        })
        .collect();

    AtRiskScan {
        count: at_risk.len(),
        positions: at_risk,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CollateralDetail {
    pub l_symbol: String,
    pub underlying: String,
    pub amount: f64,
    pub price_usd: f64,
    pub value_usd: f64,
    pub effective_value_usd: f64,
    pub collateral_factor: f64,
}

impl From<&Collateral> for CollateralDetail {
    fn from(c: &Collateral) -> Self {
        Self {
            l_symbol: c.l_symbol.clone(),
            underlying: c.underlying.clone(),
            amount: round_amount(c.underlying_amount),
            price_usd: c.price_usd,
            value_usd: round_usd(c.value_usd),
            effective_value_usd: round_usd(c.effective_value_usd),
            collateral_factor: c.collateral_factor,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DebtDetail {
    pub symbol: String,
    pub principal: f64,
    pub amount: f64,
    pub borrow_index: f64,
    pub price_usd: f64,
    pub value_usd: f64,
}

impl From<&Debt> for DebtDetail {
    fn from(d: &Debt) -> Self {
        Self {
            symbol: d.symbol.clone(),
            principal: round_amount(d.principal),
            amount: round_amount(d.amount),
            borrow_index: d.borrow_index,
            price_usd: d.price_usd,
            value_usd: round_usd(d.value_usd),
        }
    }
}

/// Full report for a single account.
#[derive(Debug, Clone, Serialize)]
pub struct PositionReport {
    pub account: String,
    pub has_position: bool,
    pub has_debt: bool,
    pub collaterals: Vec<CollateralDetail>,
    pub debts: Vec<DebtDetail>,
    pub total_collateral_usd: f64,
    pub effective_collateral_usd: f64,
    pub total_debt_usd: f64,
    pub health_factor: f64,
    pub is_liquidatable: bool,
    /// Uses the report's own at-risk line, not a scan threshold
    pub is_at_risk: bool,
}

impl PositionReport {
    pub fn from_position(position: &Position, config: &LiquidationConfig) -> Self {
        let health_factor = position.health_factor;

        Self {
            account: position.account.clone(),
            has_position: true,
            has_debt: position.has_debt(),
            collaterals: position.collaterals.iter().map(CollateralDetail::from).collect(),
            debts: position.debts.iter().map(DebtDetail::from).collect(),
            total_collateral_usd: round_usd(position.total_collateral_usd),
            effective_collateral_usd: round_usd(position.effective_collateral_usd),
            total_debt_usd: round_usd(position.total_debt_usd),
            health_factor: round_hf(health_factor),
            is_liquidatable: position.has_debt() && health_factor < config.liquidation_hf,
            is_at_risk: health_factor < config.report_at_risk_hf,
        }
    }
}

/// Account with no `shares` or `borrows` row.
#[derive(Debug, Clone, Serialize)]
pub struct NoPosition {
    pub account: String,
    pub has_position: bool,
    pub message: String,
}

/// Outcome of a single-account lookup.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PositionLookup {
    Found(PositionReport),
    NotFound(NoPosition),
}

impl PositionLookup {
    pub fn not_found(account: &str) -> Self {
        Self::NotFound(NoPosition {
            account: account.to_string(),
            has_position: false,
            message: "No lending position found".to_string(),
        })
    }

    pub fn has_position(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}
