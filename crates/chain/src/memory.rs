//! In-memory table source for fixtures and offline runs.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::client::TableQuery;
use crate::error::{ChainError, Result};

type TableKey = (String, String, String);

/// Injected failure; `scope: None` matches every scope.
#[derive(Debug, Clone)]
struct Failure {
    contract: String,
    table: String,
    scope: Option<String>,
    message: String,
}

/// Fixture file layout.
#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    tables: Vec<FixtureTable>,
}

#[derive(Debug, Deserialize)]
struct FixtureTable {
    contract: String,
    table: String,
    /// Defaults to the contract name, like the chain API
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    rows: Vec<Value>,
}

/// Table source backed by a map of `(contract, table, scope)` to rows.
///
/// Unknown tables read as empty. Every query is counted so callers can
/// assert how many reads a computation issued.
#[derive(Debug, Default)]
pub struct InMemoryTables {
    tables: RwLock<HashMap<TableKey, Vec<Value>>>,
    failures: RwLock<Vec<Failure>>,
    queries: AtomicUsize,
}

impl InMemoryTables {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load tables from a JSON fixture file.
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Load tables from fixture JSON (`{"tables": [{contract, table, scope?, rows}]}`).
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        let fixture: Fixture = serde_json::from_str(content)?;
        let source = Self::new();
        for t in fixture.tables {
            let scope = t.scope.unwrap_or_else(|| t.contract.clone());
            source.insert(&t.contract, &t.table, &scope, t.rows);
        }
        Ok(source)
    }

    /// Replace the rows of a table.
    pub fn insert(&self, contract: &str, table: &str, scope: &str, rows: Vec<Value>) {
        self.tables.write().insert(
            (contract.to_string(), table.to_string(), scope.to_string()),
            rows,
        );
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_rows(self, contract: &str, table: &str, scope: &str, rows: Vec<Value>) -> Self {
        self.insert(contract, table, scope, rows);
        self
    }

    /// Make reads of a table fail. `scope: None` fails every scope.
    pub fn fail(&self, contract: &str, table: &str, scope: Option<&str>, message: &str) {
        self.failures.write().push(Failure {
            contract: contract.to_string(),
            table: table.to_string(),
            scope: scope.map(str::to_string),
            message: message.to_string(),
        });
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.failures.write().clear();
    }

    /// Number of queries served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TableQuery for InMemoryTables {
    async fn query_table(
        &self,
        contract: &str,
        table: &str,
        scope: &str,
        limit: u32,
    ) -> Result<Vec<Value>> {
        self.queries.fetch_add(1, Ordering::Relaxed);

        let failure = self
            .failures
            .read()
            .iter()
            .find(|f| {
                f.contract == contract
                    && f.table == table
                    && f.scope.as_deref().map_or(true, |s| s == scope)
            })
            .cloned();

        if let Some(f) = failure {
            return Err(ChainError::Unavailable {
                contract: f.contract,
                table: f.table,
                message: f.message,
            });
        }

        let key = (contract.to_string(), table.to_string(), scope.to_string());
        Ok(self
            .tables
            .read()
            .get(&key)
            .map(|rows| rows.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }
}
