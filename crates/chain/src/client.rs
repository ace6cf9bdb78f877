//! Table query interface and its HTTP implementation.
//!
//! Reads go through `POST /v1/chain/get_table_rows` on a Proton API node.
//! The client walks an ordered endpoint list and returns the first
//! successful response.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::{ChainError, Result};
use crate::rows::decode_rows;

/// Primary public Proton API node.
pub const DEFAULT_ENDPOINT: &str = "https://proton.eosusa.io";

/// Fallback public Proton API node.
pub const BACKUP_ENDPOINT: &str = "https://api.protonnz.com";

/// Read-only access to contract tables.
#[async_trait]
pub trait TableQuery: Send + Sync {
    /// Fetch up to `limit` rows of `contract::table` in `scope`.
    async fn query_table(
        &self,
        contract: &str,
        table: &str,
        scope: &str,
        limit: u32,
    ) -> Result<Vec<Value>>;
}

/// Fetch and decode rows in one step.
pub async fn fetch_rows<T: DeserializeOwned>(
    source: &dyn TableQuery,
    contract: &str,
    table: &str,
    scope: &str,
    limit: u32,
) -> Result<Vec<T>> {
    let rows = source.query_table(contract, table, scope, limit).await?;
    Ok(decode_rows(table, rows))
}

/// Request body for `get_table_rows`.
#[derive(Debug, Serialize)]
struct TableRowsRequest<'a> {
    code: &'a str,
    table: &'a str,
    scope: &'a str,
    limit: u32,
    json: bool,
}

/// Response body for `get_table_rows`.
#[derive(Debug, Deserialize)]
struct TableRowsResponse {
    #[serde(default)]
    rows: Vec<Value>,
    #[serde(default)]
    more: Value,
}

/// Proton chain API client.
#[derive(Debug, Clone)]
pub struct ProtonClient {
    client: reqwest::Client,
    /// Endpoints in priority order
    endpoints: Vec<String>,
}

impl ProtonClient {
    /// Create a client for a single endpoint with reqwest defaults.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints: vec![trim_endpoint(endpoint.into())],
        }
    }

    /// Create a client with failover endpoints and a per-request timeout.
    pub fn with_endpoints(endpoints: Vec<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ChainError::Client)?;

        Ok(Self {
            client,
            endpoints: endpoints.into_iter().map(trim_endpoint).collect(),
        })
    }

    /// Configured endpoints.
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    async fn query_endpoint(
        &self,
        endpoint: &str,
        request: &TableRowsRequest<'_>,
    ) -> Result<Vec<Value>> {
        let url = format!("{}/v1/chain/get_table_rows", endpoint);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|source| ChainError::Http {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChainError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body: TableRowsResponse =
            response.json().await.map_err(|e| ChainError::Decode {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;

        if body.more.as_bool() == Some(true) {
            debug!(
                code = request.code,
                table = request.table,
                limit = request.limit,
                "Table has more rows than the requested limit"
            );
        }

        Ok(body.rows)
    }
}

#[async_trait]
impl TableQuery for ProtonClient {
    #[instrument(skip(self))]
    async fn query_table(
        &self,
        contract: &str,
        table: &str,
        scope: &str,
        limit: u32,
    ) -> Result<Vec<Value>> {
        let request = TableRowsRequest {
            code: contract,
            table,
            scope,
            limit,
            json: true,
        };

        let mut last_error = ChainError::NoEndpoint;

        for endpoint in &self.endpoints {
            match self.query_endpoint(endpoint, &request).await {
                Ok(rows) => {
                    debug!(endpoint = %endpoint, rows = rows.len(), "Fetched table rows");
                    return Ok(rows);
                }
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, "Table query failed");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

fn trim_endpoint(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let client = ProtonClient::new("https://proton.eosusa.io/");
        assert_eq!(client.endpoints(), &["https://proton.eosusa.io".to_string()]);
    }

    #[test]
    fn test_request_body_shape() {
        let request = TableRowsRequest {
            code: "lending.loan",
            table: "markets",
            scope: "lending.loan",
            limit: 100,
            json: true,
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["code"], "lending.loan");
        assert_eq!(body["scope"], "lending.loan");
        assert_eq!(body["limit"], 100);
        assert_eq!(body["json"], true);
    }

    #[test]
    fn test_response_without_rows() {
        let body: TableRowsResponse = serde_json::from_str(r#"{"more": false}"#).unwrap();
        assert!(body.rows.is_empty());
    }

    #[tokio::test]
    async fn test_no_endpoints() {
        let client = ProtonClient::with_endpoints(Vec::new(), Duration::from_secs(1)).unwrap();
        let err = client
            .query_table("lending.loan", "markets", "lending.loan", 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::NoEndpoint));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_http_error() {
        let client = ProtonClient::with_endpoints(
            vec!["http://127.0.0.1:1".to_string()],
            Duration::from_secs(2),
        )
        .unwrap();
        let err = client
            .query_table("lending.loan", "markets", "lending.loan", 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Http { .. }));
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_fetch_markets_live() {
        let client = ProtonClient::with_endpoints(
            vec![DEFAULT_ENDPOINT.to_string(), BACKUP_ENDPOINT.to_string()],
            Duration::from_secs(10),
        )
        .unwrap();
        let rows = client
            .query_table("lending.loan", "markets", "lending.loan", 100)
            .await
            .unwrap();
        assert!(!rows.is_empty());
    }
}
