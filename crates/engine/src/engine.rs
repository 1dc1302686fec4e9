// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Query engine
//!
//! [`QueryEngine`] ties the layers together. A request flows
//! validate → cache lookup → (miss) acquire → execute → cache store → release.
//!
//! Only [`SanitizedSql`] reaches [`QueryEngine::execute_query`], so every
//! statement sent to the database has passed the validator.

use std::sync::Arc;

use sqlgate_catalog::{
    Backend, CatalogError, ConnectionPool, DbConnection, PoolStats, SchemaCatalog, connect_backend,
};
use sqlgate_ir::{DetailedSchema, Dialect, Row, Schema};
use sqlgate_validator::{SanitizedSql, SqlValidator, ValidationOutcome};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::cache::{CacheStats, QueryCache};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// Rows produced by one query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub rows: Arc<Vec<Row>>,
    /// Whether the rows were served from the result cache
    pub from_cache: bool,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Validated, cached, pooled read-only query execution for one database
pub struct QueryEngine {
    config: EngineConfig,
    db_identifier: String,
    pool: ConnectionPool,
    catalog: SchemaCatalog,
    validator: SqlValidator,
    cache: Option<QueryCache>,
}

impl QueryEngine {
    /// Connect to the database described by `config`
    ///
    /// # Errors
    ///
    /// - `EngineError::Config` if the configuration is invalid
    /// - `EngineError::Catalog` if the backend is not compiled in or the pool
    ///   cannot open its connections
    pub async fn connect(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let backend = connect_backend(config.dialect, &config.connection_string)?;
        Self::with_backend(backend, config).await
    }

    /// Build an engine over an existing backend
    ///
    /// The backend's dialect wins over `config.dialect`, and the connection
    /// string is not checked.
    pub async fn with_backend(backend: Arc<dyn Backend>, config: EngineConfig) -> EngineResult<Self> {
        config.validate_settings()?;

        let dialect = backend.dialect();
        let mut db_identifier = config.db_identifier();
        if db_identifier.is_empty() {
            db_identifier = backend.describe();
        }

        let pool = ConnectionPool::new(backend, config.pool.clone()).await?;
        let catalog = SchemaCatalog::with_ttl(pool.clone(), config.schema_ttl);
        let validator = SqlValidator::with_config(dialect, config.validator);
        let cache = config
            .cache
            .enabled
            .then(|| QueryCache::from_config(&config.cache));

        info!(
            %dialect,
            db = %db_identifier,
            cache = cache.is_some(),
            row_limit = config.validator.row_limit,
            "Query engine ready"
        );

        Ok(Self {
            config,
            db_identifier,
            pool,
            catalog,
            validator,
            cache,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dialect(&self) -> Dialect {
        self.validator.dialect()
    }

    /// Namespace of this database's cached results
    pub fn db_identifier(&self) -> &str {
        &self.db_identifier
    }

    /// Table → columns mapping, cached for the schema TTL
    pub async fn get_schema(&self, refresh: bool) -> EngineResult<Arc<Schema>> {
        Ok(self.catalog.get_schema(refresh).await?)
    }

    /// Column types, keys and value hints, cached for the schema TTL
    pub async fn get_detailed_schema(&self) -> EngineResult<Arc<DetailedSchema>> {
        Ok(self.catalog.get_detailed_schema().await?)
    }

    /// Check `sql` against the current schema
    ///
    /// A rejected query is reported inside the outcome; the error path is
    /// reserved for an unreachable catalog.
    pub async fn validate(&self, sql: &str) -> EngineResult<ValidationOutcome> {
        let schema = self.catalog.get_schema(false).await?;
        Ok(self.validator.check(sql, &schema))
    }

    /// Execute already-sanitized SQL, serving repeats from the cache
    ///
    /// # Errors
    ///
    /// - `EngineError::Catalog` if no connection can be checked out
    /// - `EngineError::Execution` with the database's message if the query fails
    pub async fn execute_query(&self, sql: &SanitizedSql) -> EngineResult<QueryResult> {
        if let Some(cache) = &self.cache
            && let Some(rows) = cache.get(sql.as_str(), &self.db_identifier)
        {
            debug!(rows = rows.len(), "Served from cache");
            return Ok(QueryResult {
                rows,
                from_cache: true,
            });
        }

        let rows = {
            let mut conn = self.pool.acquire().await?;
            conn.fetch_rows(sql.as_str()).await.map_err(|e| {
                warn!(error = %e, "Query failed");
                match e {
                    CatalogError::QueryFailed(message) => EngineError::Execution(message),
                    other => EngineError::Execution(other.to_string()),
                }
            })?
        };
        let rows = Arc::new(rows);

        if let Some(cache) = &self.cache {
            if rows.len() <= self.config.cache.max_cacheable_rows {
                cache.set(sql.as_str(), rows.clone(), &self.db_identifier);
            } else {
                debug!(rows = rows.len(), "Result too large to cache");
            }
        }

        debug!(rows = rows.len(), "Query executed");
        Ok(QueryResult {
            rows,
            from_cache: false,
        })
    }

    /// Validate `sql`, then execute the sanitized form
    pub async fn run(&self, sql: &str) -> EngineResult<QueryResult> {
        let sanitized = self.validate(sql).await?.into_result()?;
        self.execute_query(&sanitized).await
    }

    /// [`run`](Self::run) with the originating question attached to the span
    pub async fn run_for_question(&self, question: &str, sql: &str) -> EngineResult<QueryResult> {
        self.run(sql)
            .instrument(info_span!("query", question = %question))
            .await
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(QueryCache::stats)
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Drop this database's cached results; returns how many were removed
    pub fn invalidate_cache(&self) -> usize {
        self.cache
            .as_ref()
            .map_or(0, |cache| cache.invalidate(Some(&self.db_identifier)))
    }

    /// Drop cached schemas so the next lookup re-introspects
    pub fn invalidate_schema(&self) {
        self.catalog.invalidate();
    }

    /// Close the pool and clear every cache
    pub async fn shutdown(&self) {
        self.pool.close_all().await;
        if let Some(cache) = &self.cache {
            cache.invalidate(None);
        }
        self.catalog.invalidate();
        info!(db = %self.db_identifier, "Query engine shut down");
    }
}
