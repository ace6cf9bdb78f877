//! Caller-facing lending tools.
//!
//! Each tool runs the engine computation on its own task under an optional
//! deadline and always answers with a [`ToolResponse`], never an error.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{info, warn};
use xpr_lending_core::{
    AtRiskScan, EngineError, LendingEngine, LiquidationScan, MarketOverview, PositionLookup,
    PriceList,
};

use crate::response::{ToolError, ToolResponse};

/// The five lending tools over one engine.
#[derive(Clone)]
pub struct LendingTools {
    engine: Arc<LendingEngine>,
    deadline: Option<Duration>,
}

impl LendingTools {
    /// Tools using the engine's configured deadline.
    pub fn new(engine: Arc<LendingEngine>) -> Self {
        let deadline = engine.config().endpoints.deadline();
        Self { engine, deadline }
    }

    /// Override the per-call deadline (`None` = unbounded).
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn engine(&self) -> &Arc<LendingEngine> {
        &self.engine
    }

    /// All lending markets with borrows valued in USD.
    pub async fn get_lending_markets(&self) -> ToolResponse<MarketOverview> {
        self.run("get_lending_markets", |engine| async move {
            engine.market_overview().await
        })
        .await
    }

    /// Oracle prices, restricted to `symbols` when non-empty.
    pub async fn get_oracle_prices(&self, symbols: Option<Vec<String>>) -> ToolResponse<PriceList> {
        self.run("get_oracle_prices", move |engine| async move {
            engine.oracle_prices(symbols.as_deref()).await
        })
        .await
    }

    /// Positions below HF 1.0 earning at least `min_profit_usd`.
    pub async fn get_liquidatable_positions(
        &self,
        min_profit_usd: Option<f64>,
    ) -> ToolResponse<LiquidationScan> {
        self.run("get_liquidatable_positions", move |engine| async move {
            engine.liquidatable_positions(min_profit_usd).await
        })
        .await
    }

    /// Positions with `1.0 <= HF < hf_threshold`.
    pub async fn get_at_risk_positions(&self, hf_threshold: Option<f64>) -> ToolResponse<AtRiskScan> {
        self.run("get_at_risk_positions", move |engine| async move {
            engine.at_risk_positions(hf_threshold).await
        })
        .await
    }

    /// Detailed position of one account.
    pub async fn get_lending_position(&self, account: &str) -> ToolResponse<PositionLookup> {
        let account = account.to_string();
        self.run("get_lending_position", move |engine| async move {
            engine.lending_position(&account).await
        })
        .await
    }

    async fn run<T, F, Fut>(&self, tool: &'static str, call: F) -> ToolResponse<T>
    where
        F: FnOnce(Arc<LendingEngine>) -> Fut,
        Fut: Future<Output = Result<T, EngineError>> + Send + 'static,
        T: Send + 'static,
    {
        let start = Instant::now();
        let mut task = tokio::spawn(call(Arc::clone(&self.engine)));

        let joined = match self.deadline {
            Some(deadline) => match timeout(deadline, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    warn!(tool, deadline_ms = deadline.as_millis() as u64, "Tool call timed out");
                    return ToolResponse::failure(ToolError::timeout(tool, deadline));
                }
            },
            None => task.await,
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match joined {
            Ok(Ok(data)) => {
                info!(tool, elapsed_ms, "Tool call complete");
                ToolResponse::ok(data)
            }
            Ok(Err(e)) => {
                warn!(tool, elapsed_ms, error = %e, "Tool call failed");
                ToolResponse::failure(ToolError::from(&e))
            }
            Err(e) => {
                warn!(tool, elapsed_ms, error = %e, "Tool task aborted");
                ToolResponse::failure(ToolError::internal(tool, e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use xpr_lending_chain::{InMemoryTables, TableQuery};
    use xpr_lending_core::EngineConfig;

    fn fixture() -> InMemoryTables {
        InMemoryTables::from_json(
            &json!({
                "tables": [
                    {
                        "contract": "lending.loan",
                        "table": "markets",
                        "rows": [{
                            "share_symbol": { "sym": "8,LBTC", "contract": "shares.loan" },
                            "underlying_symbol": { "sym": "8,XBTC", "contract": "xtokens" },
                            "collateral_factor": "0.69999999999999996",
                            "borrow_index": "1.00000000000000000",
                            "oracle_feed_index": 4,
                            "total_variable_borrows": { "quantity": "20.00000000 XBTC", "contract": "xtokens" },
                            "total_reserves": { "quantity": "0.00000000 XBTC", "contract": "xtokens" }
                        }]
                    },
                    {
                        "contract": "oracles",
                        "table": "data",
                        "rows": [
                            { "feed_index": 4, "aggregate": { "d_double": "50000.00000000000000000" } },
                            { "feed_index": 5, "aggregate": { "d_double": "0.99950000000000006" } }
                        ]
                    },
                    {
                        "contract": "lending.loan",
                        "table": "shares",
                        "rows": [{
                            "account": "alice",
                            "tokens": [{ "key": { "sym": "8,LBTC", "contract": "shares.loan" }, "value": 100000000 }]
                        }]
                    },
                    {
                        "contract": "lending.loan",
                        "table": "borrows",
                        "rows": [{
                            "account": "alice",
                            "tokens": [{
                                "key": { "sym": "8,XBTC", "contract": "xtokens" },
                                "value": { "variable_principal": 2000000000, "variable_interest_index": "1.0" }
                            }]
                        }]
                    }
                ]
            })
            .to_string(),
        )
        .unwrap()
    }

    fn tools_over(source: Arc<dyn TableQuery>) -> LendingTools {
        let engine = LendingEngine::new(source, Arc::new(EngineConfig::default()));
        LendingTools::new(Arc::new(engine))
    }

    fn tools() -> LendingTools {
        tools_over(Arc::new(fixture()))
    }

    #[tokio::test]
    async fn test_get_lending_markets() {
        let json = tools().get_lending_markets().await.to_json();
        assert_eq!(json["success"], true);
        assert_eq!(json["count"], 1);
        assert_eq!(json["markets"][0]["symbol"], "XBTC");
        assert_eq!(json["total_borrows_usd"], 1_000_000.0);
    }

    #[tokio::test]
    async fn test_get_oracle_prices() {
        let tools = tools();

        let all = tools.get_oracle_prices(None).await.to_json();
        // XBTC plus the three stablecoins
        assert_eq!(all["count"], 4);

        let some = tools
            .get_oracle_prices(Some(vec!["XUSDC".to_string()]))
            .await
            .to_json();
        assert_eq!(some["prices"], json!([{ "symbol": "XUSDC", "price_usd": 1.0 }]));
    }

    #[tokio::test]
    async fn test_get_liquidatable_positions() {
        let json = tools().get_liquidatable_positions(None).await.to_json();
        assert_eq!(json["success"], true);
        assert_eq!(json["count"], 1);
        assert_eq!(json["positions"][0]["account"], "alice");
        assert_eq!(json["positions"][0]["potential_profit_usd"], 10_000.0);
        assert_eq!(json["total_profit_available"], 10_000.0);
    }

    #[tokio::test]
    async fn test_get_at_risk_positions() {
        let json = tools().get_at_risk_positions(Some(1.2)).await.to_json();
        assert_eq!(json["success"], true);
        assert_eq!(json["count"], 0);
        assert_eq!(json["positions"], json!([]));
    }

    #[tokio::test]
    async fn test_get_lending_position() {
        let tools = tools();

        let found = tools.get_lending_position("alice").await.to_json();
        assert_eq!(found["has_position"], true);
        assert_eq!(found["is_liquidatable"], true);
        assert_eq!(found["health_factor"], 0.035);

        let missing = tools.get_lending_position("nobody").await.to_json();
        assert_eq!(missing["success"], true);
        assert_eq!(missing["has_position"], false);
        assert_eq!(missing["message"], "No lending position found");
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let response = tools().get_lending_position("").await;
        assert!(!response.is_success());

        let json = response.to_json();
        assert_eq!(json["error"]["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_chain_query_error() {
        let tables = fixture();
        tables.fail("oracles", "data", None, "API error: 502");
        let json = tools_over(Arc::new(tables))
            .get_liquidatable_positions(None)
            .await
            .to_json();

        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "CHAIN_QUERY_ERROR");
        assert_eq!(json["error"]["details"]["contract"], "oracles");
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_bundled_fixture() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../fixtures/lending.json");
        let tools = tools_over(Arc::new(InMemoryTables::from_file(path).unwrap()));

        let markets = tools.get_lending_markets().await.to_json();
        assert_eq!(markets["count"], 2);
        assert_eq!(markets["total_borrows_usd"], 1_033_700.0);
        // (2.35 + 20.65 - 0.01) / 22.5
        assert_eq!(markets["markets"][0]["exchange_rate"], 1.021778);

        let scan = tools.get_liquidatable_positions(None).await.to_json();
        assert_eq!(scan["count"], 1);
        assert_eq!(scan["positions"][0]["account"], "alice");
        assert_eq!(scan["positions"][0]["health_factor"], 0.0358);
        assert_eq!(scan["positions"][0]["potential_profit_usd"], 10_000.0);

        let saver = tools.get_lending_position("saver").await.to_json();
        assert_eq!(saver["has_debt"], false);
        assert_eq!(saver["is_liquidatable"], false);

        let at_risk = tools.get_at_risk_positions(None).await.to_json();
        assert_eq!(at_risk["count"], 0);
    }

    struct SlowTables;

    #[async_trait]
    impl TableQuery for SlowTables {
        async fn query_table(
            &self,
            _contract: &str,
            _table: &str,
            _scope: &str,
            _limit: u32,
        ) -> xpr_lending_chain::Result<Vec<Value>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_deadline() {
        let tools = tools_over(Arc::new(SlowTables)).with_deadline(Some(Duration::from_millis(50)));

        let json = tools.get_lending_markets().await.to_json();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "TIMEOUT");
    }
}
