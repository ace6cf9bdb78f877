//! Engine configuration with profile support.
//!
//! Provides all tunables of the risk engine (endpoints, contract names,
//! row limits, liquidation parameters, cache lifetime, oracle feeds) with
//! named profiles (default, testing, production) and TOML file loading.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use xpr_lending_chain::{BACKUP_ENDPOINT, DEFAULT_ENDPOINT};

use super::feeds::{default_feeds, FeedEntry, STABLECOINS, TOKEN_CONTRACTS};

/// Environment variable selecting the profile.
pub const PROFILE_ENV: &str = "XPR_LENDING_PROFILE";

/// Environment variable overriding the primary API endpoint.
pub const ENDPOINT_ENV: &str = "PROTON_API";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Profile name (for logging/identification)
    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// Chain API endpoints and request bounds
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// Contract account names
    #[serde(default)]
    pub contracts: ContractConfig,

    /// Row limits per table read
    #[serde(default)]
    pub limits: LimitConfig,

    /// Liquidation economics and thresholds
    #[serde(default)]
    pub liquidation: LiquidationConfig,

    /// Market/price/exchange-rate cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Oracle feed mapping and stablecoin pegs
    #[serde(default)]
    pub oracle: OracleConfig,
}

fn default_profile_name() -> String {
    "default".to_string()
}

/// Chain API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Primary API node
    #[serde(default = "default_primary")]
    pub primary: String,

    /// Failover nodes, tried in order
    #[serde(default)]
    pub backups: Vec<String>,

    /// Per-request HTTP timeout (milliseconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Deadline for a whole tool call (milliseconds, none = unbounded)
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

fn default_primary() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_request_timeout() -> u64 {
    10_000
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            backups: Vec::new(),
            request_timeout_ms: default_request_timeout(),
            deadline_ms: None,
        }
    }
}

impl EndpointConfig {
    /// Primary followed by backups.
    pub fn all(&self) -> Vec<String> {
        std::iter::once(self.primary.clone())
            .chain(self.backups.iter().cloned())
            .collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

/// Contract account names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Lending contract (`markets`, `shares`, `borrows`)
    #[serde(default = "default_lending_contract")]
    pub lending: String,

    /// L-token contract (`stat` per L-symbol)
    #[serde(default = "default_shares_contract")]
    pub shares: String,

    /// Oracle contract (`data`)
    #[serde(default = "default_oracle_contract")]
    pub oracle: String,

    /// Token contracts searched for lending cash
    #[serde(default = "default_token_contracts")]
    pub token_contracts: Vec<String>,
}

fn default_lending_contract() -> String {
    "lending.loan".to_string()
}
fn default_shares_contract() -> String {
    "shares.loan".to_string()
}
fn default_oracle_contract() -> String {
    "oracles".to_string()
}
fn default_token_contracts() -> Vec<String> {
    TOKEN_CONTRACTS.iter().map(|c| c.to_string()).collect()
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            lending: default_lending_contract(),
            shares: default_shares_contract(),
            oracle: default_oracle_contract(),
            token_contracts: default_token_contracts(),
        }
    }
}

/// Row limits per table read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitConfig {
    /// `markets` rows
    #[serde(default = "default_market_rows")]
    pub market_rows: u32,

    /// `oracles::data` rows
    #[serde(default = "default_oracle_rows")]
    pub oracle_rows: u32,

    /// `borrows`/`shares` rows for full scans
    #[serde(default = "default_scan_rows")]
    pub scan_rows: u32,

    /// `borrows`/`shares` rows for single-account lookups
    #[serde(default = "default_position_rows")]
    pub position_rows: u32,

    /// `accounts` rows when reading lending cash
    #[serde(default = "default_balance_rows")]
    pub balance_rows: u32,

    /// Markets whose supply and cash are read at the same time
    #[serde(default = "default_concurrent_reads")]
    pub concurrent_reads: usize,
}

fn default_market_rows() -> u32 {
    100
}
fn default_oracle_rows() -> u32 {
    50
}
fn default_scan_rows() -> u32 {
    500
}
fn default_position_rows() -> u32 {
    1000
}
fn default_balance_rows() -> u32 {
    100
}
fn default_concurrent_reads() -> usize {
    8
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            market_rows: default_market_rows(),
            oracle_rows: default_oracle_rows(),
            scan_rows: default_scan_rows(),
            position_rows: default_position_rows(),
            balance_rows: default_balance_rows(),
            concurrent_reads: default_concurrent_reads(),
        }
    }
}

/// Liquidation economics and thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationConfig {
    /// Fraction of debt repayable per liquidation
    #[serde(default = "default_close_factor")]
    pub close_factor: f64,

    /// Liquidator bonus on repaid debt
    #[serde(default = "default_liquidation_incentive")]
    pub liquidation_incentive: f64,

    /// HF below which a position is liquidatable
    #[serde(default = "default_liquidation_hf")]
    pub liquidation_hf: f64,

    /// Fixed at-risk line of the single-account report
    #[serde(default = "default_report_at_risk_hf")]
    pub report_at_risk_hf: f64,

    /// Scan threshold when the caller gives none
    #[serde(default = "default_at_risk_hf")]
    pub default_at_risk_hf: f64,

    /// Minimum profit when the caller gives none
    #[serde(default = "default_min_profit")]
    pub default_min_profit_usd: f64,
}

fn default_close_factor() -> f64 {
    0.10
}
fn default_liquidation_incentive() -> f64 {
    0.10
}
fn default_liquidation_hf() -> f64 {
    1.0
}
fn default_report_at_risk_hf() -> f64 {
    1.1
}
fn default_at_risk_hf() -> f64 {
    1.1
}
fn default_min_profit() -> f64 {
    0.5
}

impl Default for LiquidationConfig {
    fn default() -> Self {
        Self {
            close_factor: default_close_factor(),
            liquidation_incentive: default_liquidation_incentive(),
            liquidation_hf: default_liquidation_hf(),
            report_at_risk_hf: default_report_at_risk_hf(),
            default_at_risk_hf: default_at_risk_hf(),
            default_min_profit_usd: default_min_profit(),
        }
    }
}

/// Cache lifetime for markets, prices and exchange rates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds before an entry is refetched (none = until invalidated)
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

/// Oracle feed mapping and stablecoin pegs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Symbols forced to exactly 1.0 USD
    #[serde(default = "default_stablecoins")]
    pub stablecoins: Vec<String>,

    /// Fallback feed table for feeds no live market references
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedEntry>,
}

fn default_stablecoins() -> Vec<String> {
    STABLECOINS.iter().map(|s| s.to_string()).collect()
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            stablecoins: default_stablecoins(),
            feeds: default_feeds(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            endpoints: EndpointConfig::default(),
            contracts: ContractConfig::default(),
            limits: LimitConfig::default(),
            liquidation: LiquidationConfig::default(),
            cache: CacheConfig::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML content.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Profile for local runs against fixtures: no minimum profit, no TTL.
    pub fn testing() -> Self {
        Self {
            profile: "testing".to_string(),
            endpoints: EndpointConfig {
                request_timeout_ms: 5_000,
                ..Default::default()
            },
            liquidation: LiquidationConfig {
                default_min_profit_usd: 0.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Profile for long-running services: failover, bounded calls, short TTL.
    pub fn production() -> Self {
        Self {
            profile: "production".to_string(),
            endpoints: EndpointConfig {
                primary: default_primary(),
                backups: vec![BACKUP_ENDPOINT.to_string()],
                request_timeout_ms: 8_000,
                deadline_ms: Some(30_000),
            },
            cache: CacheConfig { ttl_secs: Some(30) },
            ..Default::default()
        }
    }

    /// Load a named profile.
    pub fn load_profile(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "testing" | "test" => Some(Self::testing()),
            "production" | "prod" => Some(Self::production()),
            "default" => Some(Self::default()),
            _ => None,
        }
    }

    /// Get profile from environment variable XPR_LENDING_PROFILE, or default.
    /// Supported values: default, testing, production
    pub fn from_env() -> Self {
        let profile = std::env::var(PROFILE_ENV).unwrap_or_else(|_| "default".to_string());
        Self::load_profile(&profile)
            .unwrap_or_default()
            .with_env_overrides()
    }

    /// Apply PROTON_API, if set, as the primary endpoint.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                self.endpoints.primary = endpoint.trim().to_string();
            }
        }
        self
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(profile = %self.profile, "Engine configuration loaded");
        tracing::info!(
            primary = %self.endpoints.primary,
            backups = self.endpoints.backups.len(),
            request_timeout_ms = self.endpoints.request_timeout_ms,
            deadline_ms = ?self.endpoints.deadline_ms,
            "Chain endpoints"
        );
        tracing::info!(
            lending = %self.contracts.lending,
            shares = %self.contracts.shares,
            oracle = %self.contracts.oracle,
            "Contracts"
        );
        tracing::info!(
            close_factor = self.liquidation.close_factor,
            incentive = self.liquidation.liquidation_incentive,
            liquidation_hf = self.liquidation.liquidation_hf,
            report_at_risk_hf = self.liquidation.report_at_risk_hf,
            "Liquidation parameters"
        );
        tracing::info!(
            ttl_secs = ?self.cache.ttl_secs,
            feeds = self.oracle.feeds.len(),
            stablecoins = ?self.oracle.stablecoins,
            "Cache and oracle"
        );
    }
}
