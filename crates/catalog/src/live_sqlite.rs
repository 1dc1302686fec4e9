// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Live SQLite backend
//!
//! Opens file databases through sqlx and answers introspection questions from
//! `sqlite_master` and the `pragma_table_info` / `pragma_foreign_key_list`
//! table-valued functions.
//!
//! Every connection runs `PRAGMA query_only = ON` right after opening, so a
//! statement that slips past the validator still cannot write.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sqlgate_catalog::LiveSqliteBackend;
//!
//! let backend = LiveSqliteBackend::new("sqlite://sample.db")?;
//! let mut conn = backend.open_readonly_connection().await?;
//! println!("{:?}", conn.introspect_tables().await?);
//! ```

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{Connection, Executor};
use tracing::debug;

use sqlgate_ir::{ColumnDetail, ColumnRef, Dialect, ForeignKey, Row};

use crate::decode::normalize_row;
use crate::error::{CatalogError, CatalogResult};
use crate::r#trait::{Backend, DbConnection};

/// Statements applied to every new connection
const SESSION_SETUP: &[&str] = &[
    "PRAGMA query_only = ON",
    "PRAGMA cache_size = -64000",
    "PRAGMA temp_store = MEMORY",
];

/// Live SQLite backend
pub struct LiveSqliteBackend {
    /// Connection string as given (`sqlite://path` or a bare path)
    connection_string: String,
    options: SqliteConnectOptions,
}

impl LiveSqliteBackend {
    /// Create a backend for the given connection string
    ///
    /// A bare file path is accepted and treated as `sqlite://<path>`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ConfigurationError` if the string is empty or unparsable.
    pub fn new(connection_string: impl Into<String>) -> CatalogResult<Self> {
        let connection_string = connection_string.into();
        if connection_string.trim().is_empty() {
            return Err(CatalogError::ConfigurationError(
                "connection_string cannot be empty".to_string(),
            ));
        }

        let url = if connection_string.starts_with("sqlite:") {
            connection_string.clone()
        } else {
            format!("sqlite://{}", connection_string)
        };

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| CatalogError::ConfigurationError(format!("invalid sqlite url: {}", e)))?;

        Ok(Self {
            connection_string,
            options,
        })
    }

    /// Get the connection string
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

#[async_trait]
impl Backend for LiveSqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::SQLite
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.options.get_filename().display())
    }

    async fn open_readonly_connection(&self) -> CatalogResult<Box<dyn DbConnection>> {
        let mut conn = SqliteConnection::connect_with(&self.options)
            .await
            .map_err(|e| CatalogError::connection("Failed to open SQLite database", e))?;

        for statement in SESSION_SETUP {
            conn.execute(*statement)
                .await
                .map_err(|e| CatalogError::connection("Failed to configure SQLite connection", e))?;
        }

        debug!(target = %self.describe(), "Opened read-only SQLite connection");
        Ok(Box::new(LiveSqliteConnection { conn: Some(conn) }))
    }
}

/// One open SQLite handle
pub struct LiveSqliteConnection {
    conn: Option<SqliteConnection>,
}

impl LiveSqliteConnection {
    fn inner(&mut self) -> CatalogResult<&mut SqliteConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| CatalogError::ConnectionFailed("connection already closed".to_string()))
    }

    /// Primary key column of `table`, used when a foreign key omits its target column
    async fn primary_key_of(&mut self, table: &str) -> CatalogResult<Option<String>> {
        let conn = self.inner()?;
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk LIMIT 1",
        )
        .bind(table)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| CatalogError::query(&format!("Failed to read primary key of '{}'", table), e))
    }
}

#[async_trait]
impl DbConnection for LiveSqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::SQLite
    }

    async fn fetch_rows(&mut self, sql: &str) -> CatalogResult<Vec<Row>> {
        let conn = self.inner()?;
        let rows = conn
            .fetch_all(sqlx::raw_sql(sql))
            .await
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        Ok(rows.iter().map(normalize_row).collect())
    }

    async fn introspect_tables(&mut self) -> CatalogResult<Vec<String>> {
        let conn = self.inner()?;
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| CatalogError::query("Failed to list tables", e))
    }

    async fn introspect_columns(&mut self, table: &str) -> CatalogResult<Vec<ColumnDetail>> {
        let conn = self.inner()?;
        let rows = sqlx::query_as::<_, (String, String, i64)>(
            "SELECT name, type, pk FROM pragma_table_info(?1) ORDER BY cid",
        )
        .bind(table)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| CatalogError::query(&format!("Failed to get columns for table '{}'", table), e))?;

        Ok(rows
            .into_iter()
            .map(|(name, declared_type, pk)| {
                let column = ColumnDetail::new(name, declared_type);
                if pk > 0 { column.with_primary_key() } else { column }
            })
            .collect())
    }

    async fn introspect_foreign_keys(&mut self, table: &str) -> CatalogResult<Vec<ForeignKey>> {
        let conn = self.inner()?;
        let rows = sqlx::query_as::<_, (String, String, Option<String>)>(
            "SELECT \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
        )
        .bind(table)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            CatalogError::query(&format!("Failed to get foreign keys for table '{}'", table), e)
        })?;

        let mut foreign_keys = Vec::with_capacity(rows.len());
        for (from_column, target_table, target_column) in rows {
            // `REFERENCES parent` without a column list targets the parent's primary key
            let target_column = match target_column {
                Some(column) => column,
                None => self
                    .primary_key_of(&target_table)
                    .await?
                    .unwrap_or_else(|| "rowid".to_string()),
            };
            foreign_keys.push(ForeignKey::new(
                ColumnRef::new(table, from_column),
                ColumnRef::new(target_table, target_column),
            ));
        }
        Ok(foreign_keys)
    }

    async fn close(&mut self) -> CatalogResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| CatalogError::connection("Failed to close SQLite connection", e))?;
        }
        Ok(())
    }
}
