//! Caller-facing tools for the XPR lending risk engine.
//!
//! This crate provides:
//! - The five lending tools (markets, prices, liquidatable, at-risk, position)
//! - Success/error envelopes with ISO-8601 timestamps and error codes
//! - Per-call deadline enforcement

mod response;
mod tools;

pub use response::{timestamp, ErrorCode, ToolError, ToolResponse};
pub use tools::LendingTools;
