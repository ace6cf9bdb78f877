//! Chain table access for the XPR lending risk engine.
//!
//! This crate provides:
//! - The [`TableQuery`] read interface over contract tables
//! - An HTTP client for Proton API nodes with endpoint failover
//! - An in-memory table source for fixtures and offline runs
//! - Typed row records with lenient numeric decoding
//! - Symbol (`"8,XBTC"`) and asset (`"1.00000000 XBTC"`) parsing

mod client;
mod error;
mod memory;
pub mod rows;
mod symbol;

pub use client::{fetch_rows, ProtonClient, TableQuery, BACKUP_ENDPOINT, DEFAULT_ENDPOINT};
pub use error::{ChainError, Result};
pub use memory::InMemoryTables;
pub use rows::{
    decode_rows, AccountBalanceRow, BorrowEntry, BorrowRow, BorrowSnapshot, MarketRow,
    OracleDataRow, ShareEntry, ShareRow, StatRow,
};
pub use symbol::{Asset, Symbol};
