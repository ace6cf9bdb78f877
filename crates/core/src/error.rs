//! Error types for the risk engine.
//!
//! Only unrecoverable failures surface here. Malformed row data is
//! defaulted during decoding and never becomes an error.

use thiserror::Error;
use xpr_lending_chain::ChainError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A required table read failed outright.
    #[error("chain query {contract}::{table} failed: {source}")]
    ChainQuery {
        contract: String,
        table: String,
        #[source]
        source: ChainError,
    },

    /// The caller passed an unusable argument.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl EngineError {
    pub fn chain_query(contract: &str, table: &str, source: ChainError) -> Self {
        Self::ChainQuery {
            contract: contract.to_string(),
            table: table.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
