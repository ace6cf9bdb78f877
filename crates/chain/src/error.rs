//! Errors raised by table queries.

use thiserror::Error;

/// Failure of a chain table read.
///
/// The client never retries on its own beyond walking its endpoint list;
/// callers decide whether a failed read is fatal.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Transport-level failure (connect, TLS, timeout).
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success status.
    #[error("API error: {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },

    /// The response body was not the expected JSON.
    #[error("invalid response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// No endpoint was configured.
    #[error("no API endpoint configured")]
    NoEndpoint,

    /// Failure injected or reported by a non-HTTP table source.
    #[error("table {contract}::{table} unavailable: {message}")]
    Unavailable {
        contract: String,
        table: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, ChainError>;
