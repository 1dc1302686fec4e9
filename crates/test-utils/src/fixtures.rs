// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Test fixtures: sample SQL, schemas and YAML-described databases

use serde::Deserialize;
use sqlgate_ir::{ColumnDetail, Dialect, Row, Schema};
use thiserror::Error;

use crate::mock_backend::{MockBackend, MockBackendBuilder};

/// The retail database used across test suites
pub const SHOP_FIXTURE: &str = include_str!("../fixtures/shop.yaml");

/// Errors raised while loading a YAML fixture
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Invalid fixture YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid foreign key '{0}', expected 'table.column'")]
    ForeignKey(String),

    #[error("Query fixture '{0}' must have exactly one of 'rows' or 'error'")]
    Query(String),
}

/// A database described in YAML
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseFixture {
    #[serde(default = "default_dialect")]
    pub dialect: Dialect,
    #[serde(default)]
    pub tables: Vec<TableFixture>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyFixture>,
    #[serde(default)]
    pub queries: Vec<QueryFixture>,
}

fn default_dialect() -> Dialect {
    Dialect::SQLite
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableFixture {
    pub name: String,
    pub columns: Vec<ColumnFixture>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnFixture {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: String,
    #[serde(default)]
    pub primary_key: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForeignKeyFixture {
    pub from: String,
    pub to: String,
}

/// Scripted query: either rows or a driver error message
#[derive(Debug, Clone, Deserialize)]
pub struct QueryFixture {
    pub sql: String,
    pub rows: Option<Vec<Row>>,
    pub error: Option<String>,
}

impl DatabaseFixture {
    /// Parse a fixture from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, FixtureError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Simple schema view of the fixture
    pub fn schema(&self) -> Schema {
        let mut schema = Schema::new();
        for table in &self.tables {
            schema.insert_table(&table.name, table.columns.iter().map(|c| c.name.as_str()));
        }
        schema
    }

    /// Builder pre-loaded with the fixture, for further customization
    pub fn into_builder(self) -> Result<MockBackendBuilder, FixtureError> {
        let mut builder = MockBackendBuilder::new().dialect(self.dialect);

        for table in self.tables {
            let columns = table
                .columns
                .iter()
                .map(|c| {
                    let column = ColumnDetail::new(&c.name, &c.declared_type);
                    if c.primary_key { column.with_primary_key() } else { column }
                })
                .collect();
            builder = builder
                .with_table_columns(&table.name, columns)
                .with_rows(&table.name, table.rows);
        }

        for fk in &self.foreign_keys {
            let (from_table, from_column) = split_column(&fk.from)?;
            let (to_table, to_column) = split_column(&fk.to)?;
            builder = builder.with_foreign_key(from_table, from_column, to_table, to_column);
        }

        for query in self.queries {
            builder = match (query.rows, query.error) {
                (Some(rows), None) => builder.with_query_response(&query.sql, rows),
                (None, Some(error)) => builder.with_query_error(&query.sql, &error),
                _ => return Err(FixtureError::Query(query.sql)),
            };
        }

        Ok(builder)
    }

    /// Build a mock backend from the fixture
    pub fn into_backend(self) -> Result<MockBackend, FixtureError> {
        Ok(self.into_builder()?.build())
    }
}

fn split_column(reference: &str) -> Result<(&str, &str), FixtureError> {
    reference
        .split_once('.')
        .filter(|(t, c)| !t.is_empty() && !c.is_empty())
        .ok_or_else(|| FixtureError::ForeignKey(reference.to_string()))
}

/// The parsed retail fixture
pub fn shop_fixture() -> DatabaseFixture {
    DatabaseFixture::from_yaml(SHOP_FIXTURE).expect("bundled shop fixture is valid")
}

/// Mock backend over the retail fixture
pub fn shop_backend() -> MockBackend {
    shop_fixture()
        .into_backend()
        .expect("bundled shop fixture is valid")
}

/// Sample SQL queries for testing
pub struct SqlFixtures;

impl SqlFixtures {
    // ===== Admissible queries =====

    /// Simple SELECT with column list
    pub const fn simple_select() -> &'static str {
        "SELECT id, name FROM customers"
    }

    /// SELECT with all columns
    pub const fn select_all() -> &'static str {
        "SELECT * FROM orders"
    }

    /// Aliased JOIN with aggregation
    pub const fn aliased_join() -> &'static str {
        "SELECT c.name, SUM(o.total) AS spent
         FROM orders o
         JOIN customers AS c ON o.customer_id = c.id
         GROUP BY c.name
         ORDER BY spent DESC"
    }

    /// Subquery in WHERE
    pub const fn subquery() -> &'static str {
        "SELECT name FROM customers WHERE id IN (SELECT customer_id FROM orders WHERE status = 'shipped')"
    }

    /// Oversized LIMIT
    pub const fn huge_limit() -> &'static str {
        "SELECT * FROM orders LIMIT 10000"
    }

    // ===== Rejected queries =====

    /// Write statement
    pub const fn drop_table() -> &'static str {
        "DROP TABLE orders"
    }

    /// Destructive keyword inside a SELECT
    pub const fn select_then_delete() -> &'static str {
        "SELECT * FROM orders WHERE id IN (DELETE FROM orders)"
    }

    /// Statement chaining
    pub const fn stacked_statements() -> &'static str {
        "SELECT 1; DROP TABLE orders"
    }

    /// Missing table
    pub const fn unknown_table() -> &'static str {
        "SELECT * FROM invoices"
    }

    /// Missing column
    pub const fn unknown_column() -> &'static str {
        "SELECT o.discount FROM orders o"
    }
}

/// Common schemas
pub struct SchemaFixtures;

impl SchemaFixtures {
    /// Schema of the retail fixture
    pub fn shop() -> Schema {
        shop_fixture().schema()
    }

    /// Single `orders(id, total)` table
    pub fn orders_only() -> Schema {
        Schema::new().with_table("orders", ["id", "total"])
    }
}
