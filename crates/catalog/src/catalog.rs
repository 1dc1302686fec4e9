// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Schema catalog
//!
//! [`SchemaCatalog`] introspects the database behind a [`ConnectionPool`] and
//! keeps two TTL-cached views of it:
//!
//! - [`Schema`]: table → column names, the namespace the validator checks against
//! - [`DetailedSchema`]: column types, primary keys, inferred value sets and
//!   foreign keys, used to describe the database to a language model
//!
//! Cached values sit behind a read-write lock that is never held across I/O.
//! Recomputation is serialized per view by an async gate with a second
//! freshness check, so a burst of callers after expiry triggers one refresh.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use sqlgate_ir::metadata::MAX_TEXT_CATEGORICAL_VALUES;
use sqlgate_ir::{DetailedSchema, Schema, ValueConstraint};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{CatalogError, CatalogResult};
use crate::pool::ConnectionPool;
use crate::r#trait::DbConnection;

/// Default lifetime of a cached schema
pub const DEFAULT_SCHEMA_TTL: Duration = Duration::from_secs(300);

/// Distinct values fetched per column; one more than the largest enumerable set
pub const DISTINCT_PROBE_LIMIT: usize = MAX_TEXT_CATEGORICAL_VALUES + 1;

struct Cached<T> {
    value: Arc<T>,
    fetched_at: Instant,
}

/// One TTL-cached value plus the gate serializing its recomputation
struct Slot<T> {
    cached: RwLock<Option<Cached<T>>>,
    gate: AsyncMutex<()>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            cached: RwLock::new(None),
            gate: AsyncMutex::new(()),
        }
    }

    fn fresh(&self, ttl: Duration) -> Option<Arc<T>> {
        self.cached
            .read()
            .as_ref()
            .filter(|c| c.fetched_at.elapsed() < ttl)
            .map(|c| c.value.clone())
    }

    fn store(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        *self.cached.write() = Some(Cached {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        value
    }

    fn clear(&self) {
        *self.cached.write() = None;
    }
}

/// TTL-cached schema introspection
pub struct SchemaCatalog {
    pool: ConnectionPool,
    ttl: Duration,
    schema: Slot<Schema>,
    detailed: Slot<DetailedSchema>,
}

impl SchemaCatalog {
    /// Catalog over `pool` with the default TTL
    pub fn new(pool: ConnectionPool) -> Self {
        Self::with_ttl(pool, DEFAULT_SCHEMA_TTL)
    }

    /// Catalog over `pool` with a custom TTL
    pub fn with_ttl(pool: ConnectionPool, ttl: Duration) -> Self {
        Self {
            pool,
            ttl,
            schema: Slot::new(),
            detailed: Slot::new(),
        }
    }

    /// Cache lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Table → columns mapping
    ///
    /// Served from cache unless `refresh` is set, nothing is cached yet, or the
    /// cached value is older than the TTL.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Unavailable` if the database cannot be introspected.
    pub async fn get_schema(&self, refresh: bool) -> CatalogResult<Arc<Schema>> {
        if !refresh && let Some(schema) = self.schema.fresh(self.ttl) {
            return Ok(schema);
        }

        let _gate = self.schema.gate.lock().await;
        if !refresh && let Some(schema) = self.schema.fresh(self.ttl) {
            return Ok(schema);
        }

        let schema = self.load_schema().await.map_err(unavailable)?;
        info!(tables = schema.len(), "Loaded schema");
        Ok(self.schema.store(schema))
    }

    /// Column details, value constraints and foreign keys
    ///
    /// Per-column probe failures leave that column without a constraint, and a
    /// table whose columns cannot be read is skipped.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Unavailable` if no connection can be obtained or
    /// the table list cannot be read.
    pub async fn get_detailed_schema(&self) -> CatalogResult<Arc<DetailedSchema>> {
        if let Some(detailed) = self.detailed.fresh(self.ttl) {
            return Ok(detailed);
        }

        let _gate = self.detailed.gate.lock().await;
        if let Some(detailed) = self.detailed.fresh(self.ttl) {
            return Ok(detailed);
        }

        let detailed = self.load_detailed_schema().await.map_err(unavailable)?;
        info!(
            tables = detailed.tables.len(),
            foreign_keys = detailed.foreign_keys.len(),
            "Loaded detailed schema"
        );
        Ok(self.detailed.store(detailed))
    }

    /// Drop both cached views; the next call recomputes
    pub fn invalidate(&self) {
        self.schema.clear();
        self.detailed.clear();
        debug!("Schema cache invalidated");
    }

    async fn load_schema(&self) -> CatalogResult<Schema> {
        let mut conn = self.pool.acquire().await?;

        let mut schema = Schema::new();
        for table in conn.introspect_tables().await? {
            let columns = conn.introspect_columns(&table).await?;
            schema.insert_table(&table, columns.into_iter().map(|c| c.name));
        }
        Ok(schema)
    }

    async fn load_detailed_schema(&self) -> CatalogResult<DetailedSchema> {
        let mut conn = self.pool.acquire().await?;
        let tables = conn.introspect_tables().await?;

        let mut detailed = DetailedSchema::new();
        for table in &tables {
            let columns = match conn.introspect_columns(table).await {
                Ok(columns) => columns,
                Err(e) => {
                    warn!(table = %table, error = %e, "Skipping table in detailed schema");
                    continue;
                }
            };

            let mut details = Vec::with_capacity(columns.len());
            for column in columns {
                let constraint = match conn
                    .probe_distinct(table, &column.name, DISTINCT_PROBE_LIMIT)
                    .await
                {
                    Ok(values) => ValueConstraint::classify(&column.declared_type, values),
                    Err(e) => {
                        debug!(table = %table, column = %column.name, error = %e, "Distinct probe failed");
                        None
                    }
                };
                details.push(column.with_constraint(constraint));
            }

            match conn.introspect_foreign_keys(table).await {
                Ok(fks) => detailed.foreign_keys.extend(fks),
                Err(e) => {
                    debug!(table = %table, error = %e, "Foreign key introspection failed");
                }
            }

            detailed.tables.insert(table.clone(), details);
        }
        Ok(detailed)
    }
}

/// Fold an introspection failure into `Unavailable`, keeping pool shutdown distinct
fn unavailable(err: CatalogError) -> CatalogError {
    match err {
        CatalogError::Unavailable(_) | CatalogError::PoolClosed => err,
        other => CatalogError::Unavailable(other.to_string()),
    }
}
