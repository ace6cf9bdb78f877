//! Configuration for the lending risk engine.
//!
//! This module provides:
//! - Engine configuration (profiles, endpoints, limits, thresholds)
//! - The fallback oracle feed table and token constants

mod engine;
mod feeds;

pub use engine::{
    CacheConfig, ContractConfig, EndpointConfig, EngineConfig, LimitConfig, LiquidationConfig,
    OracleConfig, ENDPOINT_ENV, PROFILE_ENV,
};
pub use feeds::{default_feeds, FeedEntry, STABLECOINS, TOKEN_CONTRACTS};
