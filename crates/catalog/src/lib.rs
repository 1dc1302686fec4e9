// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # sqlgate - Catalog Layer
//!
//! This crate owns everything that talks to a database:
//!
//! - **Backends**: the [`Backend`] / [`DbConnection`] capability traits and one
//!   live implementation per dialect (SQLite, PostgreSQL, MySQL), each behind
//!   its own cargo feature
//! - **Connection pool**: [`ConnectionPool`], a fixed set of pre-opened
//!   read-only connections with a temporary-connection fallback
//! - **Schema catalog**: [`SchemaCatalog`], TTL-cached introspection producing
//!   the simple [`Schema`](sqlgate_ir::Schema) used for validation and the
//!   [`DetailedSchema`](sqlgate_ir::DetailedSchema) used for prompting
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sqlgate_catalog::{connect_backend, ConnectionPool, PoolConfig, SchemaCatalog};
//! use sqlgate_ir::Dialect;
//!
//! let backend = connect_backend(Dialect::SQLite, "sqlite://sample.db")?;
//! let pool = ConnectionPool::new(backend, PoolConfig::default()).await?;
//! let catalog = SchemaCatalog::new(pool.clone());
//!
//! let schema = catalog.get_schema(false).await?;
//! for (table, columns) in schema.iter() {
//!     println!("{}: {}", table, columns.join(", "));
//! }
//! ```
//!
//! ## Implementing a Backend
//!
//! ```rust,ignore
//! use sqlgate_catalog::{Backend, CatalogResult, DbConnection};
//! use async_trait::async_trait;
//!
//! struct MyBackend;
//!
//! #[async_trait]
//! impl Backend for MyBackend {
//!     fn dialect(&self) -> Dialect { Dialect::SQLite }
//!     fn describe(&self) -> String { "my-backend".into() }
//!     async fn open_readonly_connection(&self) -> CatalogResult<Box<dyn DbConnection>> {
//!         // Your implementation here
//!     }
//! }
//! ```

use std::sync::Arc;

use sqlgate_ir::Dialect;

pub mod catalog;
#[cfg(any(feature = "sqlite", feature = "postgresql", feature = "mysql"))]
mod decode;
pub mod error;
#[cfg(feature = "mysql")]
pub mod live_mysql;
#[cfg(feature = "postgresql")]
pub mod live_postgres;
#[cfg(feature = "sqlite")]
pub mod live_sqlite;
pub mod pool;
pub mod r#trait;

// Re-exports
pub use catalog::{DEFAULT_SCHEMA_TTL, DISTINCT_PROBE_LIMIT, SchemaCatalog};
pub use error::{CatalogError, CatalogResult};
#[cfg(feature = "mysql")]
pub use live_mysql::LiveMySqlBackend;
#[cfg(feature = "postgresql")]
pub use live_postgres::LivePostgresBackend;
#[cfg(feature = "sqlite")]
pub use live_sqlite::LiveSqliteBackend;
pub use pool::{ConnectionPool, PoolConfig, PoolStats, PooledConnection};
pub use r#trait::{Backend, DbConnection};

/// Build the live backend for `dialect`
///
/// # Errors
///
/// - `CatalogError::ConfigurationError` if the connection string is malformed
/// - `CatalogError::NotSupported` if the dialect's feature is not compiled in
pub fn connect_backend(dialect: Dialect, connection_string: &str) -> CatalogResult<Arc<dyn Backend>> {
    match dialect {
        #[cfg(feature = "sqlite")]
        Dialect::SQLite => Ok(Arc::new(LiveSqliteBackend::new(connection_string)?)),
        #[cfg(feature = "postgresql")]
        Dialect::PostgreSQL => Ok(Arc::new(LivePostgresBackend::new(connection_string)?)),
        #[cfg(feature = "mysql")]
        Dialect::MySQL => Ok(Arc::new(LiveMySqlBackend::new(connection_string)?)),
        #[allow(unreachable_patterns)]
        other => {
            let _ = connection_string;
            Err(CatalogError::NotSupported(format!(
                "{} backend is not enabled in this build (enable the '{}' feature)",
                other,
                feature_name(other)
            )))
        }
    }
}

/// Cargo feature that enables the backend for `dialect`
fn feature_name(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::SQLite => "sqlite",
        Dialect::PostgreSQL => "postgresql",
        Dialect::MySQL => "mysql",
    }
}

/// Strip credentials from a URL for logging
#[cfg(any(feature = "postgresql", feature = "mysql"))]
pub(crate) fn redact_url(connection_string: &str) -> String {
    let Ok(mut url) = url::Url::parse(connection_string) else {
        return "<unparseable connection string>".to_string();
    };
    if !url.username().is_empty() || url.password().is_some() {
        // Only fails for URLs without a host, which cannot carry credentials
        let _ = url.set_password(None);
        let _ = url.set_username("***");
    }
    url.to_string()
}
