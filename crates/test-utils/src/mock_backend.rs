// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Mock backend implementation for testing
//!
//! Provides an in-memory database with builder pattern for easy test setup.
//! Tables carry columns, primary keys and rows; queries are answered from
//! scripted responses or, for `SELECT * FROM <table>`, from the table's rows.
//! Counters and failure switches let tests observe and disturb the engine.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::Value;
use sqlgate_catalog::{Backend, CatalogError, CatalogResult, DbConnection};
use sqlgate_ir::{ColumnDetail, ColumnRef, Dialect, ForeignKey, Row};

/// One in-memory table
#[derive(Debug, Clone, Default)]
pub struct MockTable {
    pub columns: Vec<ColumnDetail>,
    pub rows: Vec<Row>,
}

/// Scripted answer for one query
#[derive(Debug, Clone)]
enum Scripted {
    Rows(Vec<Row>),
    Error(String),
}

/// Immutable database contents
#[derive(Debug, Default)]
struct MockData {
    tables: BTreeMap<String, MockTable>,
    foreign_keys: Vec<ForeignKey>,
    responses: HashMap<String, Scripted>,
    failing_columns: HashSet<String>,
    failing_foreign_keys: HashSet<String>,
    failing_probes: HashSet<(String, String)>,
    latency: Option<Duration>,
}

/// Shared counters and runtime switches
#[derive(Debug, Default)]
struct MockState {
    unavailable: AtomicBool,
    refuse_connections: AtomicBool,
    connections_opened: AtomicUsize,
    connections_closed: AtomicUsize,
    queries_executed: AtomicUsize,
    table_listings: AtomicUsize,
    executed: parking_lot::Mutex<Vec<String>>,
}

/// In-memory backend for testing
///
/// Cloning is cheap; clones share contents and counters.
#[derive(Debug, Clone)]
pub struct MockBackend {
    dialect: Dialect,
    data: Arc<MockData>,
    state: Arc<MockState>,
}

impl MockBackend {
    /// Start building a mock backend
    pub fn builder() -> MockBackendBuilder {
        MockBackendBuilder::new()
    }

    /// Make introspection and queries fail (simulates a lost database)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `open_readonly_connection` fail
    pub fn set_refuse_connections(&self, refuse: bool) {
        self.state.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Connections opened so far
    pub fn connections_opened(&self) -> usize {
        self.state.connections_opened.load(Ordering::SeqCst)
    }

    /// Connections explicitly closed so far
    pub fn connections_closed(&self) -> usize {
        self.state.connections_closed.load(Ordering::SeqCst)
    }

    /// `fetch_rows` calls so far (distinct probes excluded)
    pub fn queries_executed(&self) -> usize {
        self.state.queries_executed.load(Ordering::SeqCst)
    }

    /// `introspect_tables` calls so far
    pub fn table_listings(&self) -> usize {
        self.state.table_listings.load(Ordering::SeqCst)
    }

    /// SQL text of every `fetch_rows` call, in order
    pub fn executed_sql(&self) -> Vec<String> {
        self.state.executed.lock().clone()
    }

    /// Table contents, if the table exists
    pub fn table(&self, name: &str) -> Option<&MockTable> {
        self.data.tables.get(name)
    }
}

#[async_trait::async_trait]
impl Backend for MockBackend {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn describe(&self) -> String {
        format!("mock:{}", self.dialect)
    }

    async fn open_readonly_connection(&self) -> CatalogResult<Box<dyn DbConnection>> {
        if self.state.refuse_connections.load(Ordering::SeqCst) {
            return Err(CatalogError::ConnectionFailed("mock refused connection".to_string()));
        }
        self.state.connections_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            backend: self.clone(),
            closed: false,
        }))
    }
}

/// One connection to a [`MockBackend`]
pub struct MockConnection {
    backend: MockBackend,
    closed: bool,
}

impl MockConnection {
    async fn enter(&self) -> CatalogResult<&MockData> {
        if self.closed {
            return Err(CatalogError::ConnectionFailed("connection already closed".to_string()));
        }
        if let Some(latency) = self.backend.data.latency {
            tokio::time::sleep(latency).await;
        }
        if self.backend.state.unavailable.load(Ordering::SeqCst) {
            return Err(CatalogError::QueryFailed("mock database is unavailable".to_string()));
        }
        Ok(&self.backend.data)
    }
}

#[async_trait::async_trait]
impl DbConnection for MockConnection {
    fn dialect(&self) -> Dialect {
        self.backend.dialect
    }

    async fn fetch_rows(&mut self, sql: &str) -> CatalogResult<Vec<Row>> {
        let state = &self.backend.state;
        state.queries_executed.fetch_add(1, Ordering::SeqCst);
        state.executed.lock().push(sql.to_string());

        let data = self.enter().await?;
        let key = normalize_sql(sql);
        match data.responses.get(&key) {
            Some(Scripted::Rows(rows)) => Ok(rows.clone()),
            Some(Scripted::Error(message)) => Err(CatalogError::QueryFailed(message.clone())),
            None => match scanned_table(&key).and_then(|t| data.tables.get(t)) {
                Some(table) => Ok(table.rows.clone()),
                None => Err(CatalogError::QueryFailed(format!("no scripted response for: {}", sql))),
            },
        }
    }

    async fn introspect_tables(&mut self) -> CatalogResult<Vec<String>> {
        self.backend.state.table_listings.fetch_add(1, Ordering::SeqCst);
        let data = self.enter().await?;
        Ok(data.tables.keys().cloned().collect())
    }

    async fn introspect_columns(&mut self, table: &str) -> CatalogResult<Vec<ColumnDetail>> {
        let data = self.enter().await?;
        if data.failing_columns.contains(table) {
            return Err(CatalogError::QueryFailed(format!("cannot read columns of {}", table)));
        }
        data.tables
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| CatalogError::QueryFailed(format!("no such table: {}", table)))
    }

    async fn introspect_foreign_keys(&mut self, table: &str) -> CatalogResult<Vec<ForeignKey>> {
        let data = self.enter().await?;
        if data.failing_foreign_keys.contains(table) {
            return Err(CatalogError::QueryFailed(format!("cannot read foreign keys of {}", table)));
        }
        Ok(data
            .foreign_keys
            .iter()
            .filter(|fk| fk.from.table == table)
            .cloned()
            .collect())
    }

    async fn probe_distinct(
        &mut self,
        table: &str,
        column: &str,
        limit: usize,
    ) -> CatalogResult<Vec<Value>> {
        let data = self.enter().await?;
        if data.failing_probes.contains(&(table.to_string(), column.to_string())) {
            return Err(CatalogError::QueryFailed(format!("probe failed on {}.{}", table, column)));
        }
        let rows = data
            .tables
            .get(table)
            .map(|t| t.rows.as_slice())
            .unwrap_or_default();

        let mut distinct: Vec<Value> = Vec::new();
        for value in rows.iter().filter_map(|row| row.get(column)) {
            if distinct.len() == limit {
                break;
            }
            if !value.is_null() && !distinct.contains(value) {
                distinct.push(value.clone());
            }
        }
        Ok(distinct)
    }

    async fn close(&mut self) -> CatalogResult<()> {
        if !self.closed {
            self.closed = true;
            self.backend.state.connections_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Lower-case and collapse whitespace so scripted keys match regardless of layout
fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Table named by a plain `select * from <table> ...` scan
fn scanned_table(normalized: &str) -> Option<&str> {
    let rest = normalized.strip_prefix("select * from ")?;
    rest.split(|c: char| c.is_whitespace() || c == ';')
        .next()
        .filter(|t| !t.is_empty())
}

/// Builder for creating mock backends with a fluent API
#[derive(Debug, Default)]
pub struct MockBackendBuilder {
    dialect: Option<Dialect>,
    data: MockData,
}

impl MockBackendBuilder {
    /// Create a new builder (SQLite dialect, no tables)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reported dialect
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Add a table from `(name, declared_type)` pairs
    pub fn with_table(mut self, name: &str, columns: &[(&str, &str)]) -> Self {
        let columns = columns
            .iter()
            .map(|(column, declared_type)| ColumnDetail::new(*column, *declared_type))
            .collect();
        self.data.tables.entry(name.to_string()).or_default().columns = columns;
        self
    }

    /// Add a table from full column details
    pub fn with_table_columns(mut self, name: &str, columns: Vec<ColumnDetail>) -> Self {
        self.data.tables.entry(name.to_string()).or_default().columns = columns;
        self
    }

    /// Mark `table.column` as primary key
    pub fn with_primary_key(mut self, table: &str, column: &str) -> Self {
        if let Some(t) = self.data.tables.get_mut(table) {
            for c in t.columns.iter_mut().filter(|c| c.name == column) {
                c.is_primary_key = true;
            }
        }
        self
    }

    /// Append rows to a table
    pub fn with_rows(mut self, table: &str, rows: Vec<Row>) -> Self {
        self.data.tables.entry(table.to_string()).or_default().rows.extend(rows);
        self
    }

    /// Declare a foreign key `from_table.from_column -> to_table.to_column`
    pub fn with_foreign_key(
        mut self,
        from_table: &str,
        from_column: &str,
        to_table: &str,
        to_column: &str,
    ) -> Self {
        self.data.foreign_keys.push(ForeignKey::new(
            ColumnRef::new(from_table, from_column),
            ColumnRef::new(to_table, to_column),
        ));
        self
    }

    /// Answer `sql` (whitespace and case insensitive) with `rows`
    pub fn with_query_response(mut self, sql: &str, rows: Vec<Row>) -> Self {
        self.data.responses.insert(normalize_sql(sql), Scripted::Rows(rows));
        self
    }

    /// Fail `sql` with a driver-style message
    pub fn with_query_error(mut self, sql: &str, message: &str) -> Self {
        self.data
            .responses
            .insert(normalize_sql(sql), Scripted::Error(message.to_string()));
        self
    }

    /// Make column introspection of `table` fail
    pub fn with_failing_columns(mut self, table: &str) -> Self {
        self.data.failing_columns.insert(table.to_string());
        self
    }

    /// Make foreign key introspection of `table` fail
    pub fn with_failing_foreign_keys(mut self, table: &str) -> Self {
        self.data.failing_foreign_keys.insert(table.to_string());
        self
    }

    /// Make the distinct-value probe of `table.column` fail
    pub fn with_failing_probe(mut self, table: &str, column: &str) -> Self {
        self.data
            .failing_probes
            .insert((table.to_string(), column.to_string()));
        self
    }

    /// Delay every database call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.data.latency = Some(latency);
        self
    }

    /// Finish building
    pub fn build(self) -> MockBackend {
        MockBackend {
            dialect: self.dialect.unwrap_or(Dialect::SQLite),
            data: Arc::new(self.data),
            state: Arc::new(MockState::default()),
        }
    }

    /// Finish building, wrapped for sharing
    pub fn build_shared(self) -> Arc<MockBackend> {
        Arc::new(self.build())
    }
}
