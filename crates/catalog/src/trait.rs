// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Backend capability traits
//!
//! A [`Backend`] knows how to open read-only connections to one database.
//! A [`DbConnection`] is one open handle: it runs queries and answers the
//! introspection questions the schema catalog asks, using whatever system
//! catalogs its dialect provides.
//!
//! One implementation exists per dialect (see `live_sqlite`, `live_postgres`,
//! `live_mysql`); tests use the in-memory backend from the test-utils crate.

use serde_json::Value;
use sqlgate_ir::{ColumnDetail, Dialect, ForeignKey, Row};

use crate::error::CatalogResult;

/// Factory for read-only connections to one database
///
/// # Examples
///
/// ```rust,ignore
/// let backend = connect_backend(Dialect::SQLite, "sqlite://sample.db")?;
/// let mut conn = backend.open_readonly_connection().await?;
/// let tables = conn.introspect_tables().await?;
/// ```
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Dialect of the database behind this backend
    fn dialect(&self) -> Dialect;

    /// Human-readable target for logs (never includes credentials)
    fn describe(&self) -> String;

    /// Open a new connection with writes disabled at the connection level
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ConnectionFailed` if the database cannot be reached
    /// or the read-only switch cannot be applied.
    async fn open_readonly_connection(&self) -> CatalogResult<Box<dyn DbConnection>>;
}

/// One open, read-only database handle
#[async_trait::async_trait]
pub trait DbConnection: Send {
    /// Dialect of the connected database
    fn dialect(&self) -> Dialect;

    /// Run a query and normalize every row into a [`Row`]
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::QueryFailed` with the driver's message.
    async fn fetch_rows(&mut self, sql: &str) -> CatalogResult<Vec<Row>>;

    /// User tables, sorted alphabetically
    async fn introspect_tables(&mut self) -> CatalogResult<Vec<String>>;

    /// Columns of `table` in catalog order, with declared type and PK flag
    async fn introspect_columns(&mut self, table: &str) -> CatalogResult<Vec<ColumnDetail>>;

    /// Foreign keys declared on `table`
    async fn introspect_foreign_keys(&mut self, table: &str) -> CatalogResult<Vec<ForeignKey>>;

    /// Up to `limit` distinct non-null values of `table.column`
    async fn probe_distinct(
        &mut self,
        table: &str,
        column: &str,
        limit: usize,
    ) -> CatalogResult<Vec<Value>> {
        let dialect = self.dialect();
        let column = dialect.quote_identifier(column);
        let sql = format!(
            "SELECT DISTINCT {column} FROM {} WHERE {column} IS NOT NULL LIMIT {limit}",
            dialect.quote_identifier(table),
        );

        let rows = self.fetch_rows(&sql).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().map(|(_, v)| v))
            .filter(|v| !v.is_null())
            .collect())
    }

    /// Close the underlying handle; further calls fail
    async fn close(&mut self) -> CatalogResult<()>;
}
