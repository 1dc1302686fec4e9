// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Connection pool
//!
//! A fixed set of read-only connections, opened eagerly at construction and
//! handed out one caller at a time.
//!
//! ## Checkout rules
//!
//! - A semaphore with one permit per pooled connection bounds checkouts.
//! - `acquire` waits up to `acquire_timeout` for a permit. When the wait times
//!   out the pool logs a warning and opens a **temporary** connection instead of
//!   failing, unless `max_overflow` temporary connections are already open.
//! - Release is tied to [`PooledConnection`]'s `Drop`: pooled connections go back
//!   to the free set, temporary ones are closed.
//! - After [`ConnectionPool::close_all`] every `acquire` fails with
//!   [`CatalogError::PoolClosed`]; connections still checked out are closed when
//!   they are released.
//!
//! The free set is only locked for push/pop, never across a database call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use sqlgate_ir::{ColumnDetail, Dialect, ForeignKey, Row};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::error::{CatalogError, CatalogResult};
use crate::r#trait::{Backend, DbConnection};

/// Default number of pooled connections
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Default wait for a pooled connection before falling back to a temporary one
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool sizing and checkout behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of connections opened at construction
    pub size: usize,

    /// How long `acquire` waits for a pooled connection
    pub acquire_timeout: Duration,

    /// Cap on concurrently open temporary connections (`None` = uncapped)
    pub max_overflow: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_POOL_SIZE,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            max_overflow: None,
        }
    }
}

impl PoolConfig {
    /// Pool of `size` connections with default timeout and no overflow cap
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_max_overflow(mut self, max_overflow: usize) -> Self {
        self.max_overflow = Some(max_overflow);
        self
    }
}

/// Point-in-time pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Configured number of pooled connections
    pub size: usize,
    /// Pooled connections currently in the free set
    pub idle: usize,
    /// Temporary connections currently checked out
    pub temporary_in_use: usize,
    /// Temporary connections opened since construction
    pub temporary_opened: u64,
    /// Whether `close_all` has run
    pub closed: bool,
}

struct PoolInner {
    backend: Arc<dyn Backend>,
    config: PoolConfig,
    idle: Mutex<Vec<Box<dyn DbConnection>>>,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
    temporary_in_use: AtomicUsize,
    temporary_opened: AtomicU64,
}

/// Bounded pool of read-only connections
///
/// Cloning is cheap; clones share the same connections.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Open `config.size` read-only connections through `backend`
    ///
    /// # Errors
    ///
    /// - `CatalogError::ConfigurationError` if `config.size` is zero
    /// - the backend's error if any connection fails to open; connections
    ///   opened before the failure are closed first
    pub async fn new(backend: Arc<dyn Backend>, config: PoolConfig) -> CatalogResult<Self> {
        if config.size == 0 {
            return Err(CatalogError::ConfigurationError(
                "pool size must be at least 1".to_string(),
            ));
        }

        let mut connections: Vec<Box<dyn DbConnection>> = Vec::with_capacity(config.size);
        for _ in 0..config.size {
            match backend.open_readonly_connection().await {
                Ok(conn) => connections.push(conn),
                Err(e) => {
                    for mut conn in connections {
                        let _ = conn.close().await;
                    }
                    return Err(e);
                }
            }
        }

        info!(
            target = %backend.describe(),
            dialect = %backend.dialect(),
            size = config.size,
            "Connection pool initialized"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                permits: Arc::new(Semaphore::new(config.size)),
                idle: Mutex::new(connections),
                backend,
                config,
                closed: AtomicBool::new(false),
                temporary_in_use: AtomicUsize::new(0),
                temporary_opened: AtomicU64::new(0),
            }),
        })
    }

    /// Check out a connection
    ///
    /// Waits up to `acquire_timeout` for a pooled connection, then falls back
    /// to a temporary one.
    ///
    /// # Errors
    ///
    /// - `CatalogError::PoolClosed` after `close_all`
    /// - `CatalogError::PoolExhausted` when the overflow cap is reached
    /// - the backend's error if a temporary connection cannot be opened
    pub async fn acquire(&self) -> CatalogResult<PooledConnection> {
        if self.is_closed() {
            return Err(CatalogError::PoolClosed);
        }

        let wait = tokio::time::timeout(
            self.inner.config.acquire_timeout,
            self.inner.permits.clone().acquire_owned(),
        )
        .await;

        match wait {
            Ok(Ok(permit)) => self.checkout_pooled(permit).await,
            // The semaphore is only closed by `close_all`
            Ok(Err(_)) => Err(CatalogError::PoolClosed),
            Err(_) => self.open_temporary().await,
        }
    }

    async fn checkout_pooled(&self, permit: OwnedSemaphorePermit) -> CatalogResult<PooledConnection> {
        if self.is_closed() {
            return Err(CatalogError::PoolClosed);
        }

        let conn = self.inner.idle.lock().pop();
        let conn = match conn {
            Some(conn) => conn,
            None => {
                // A permit without an idle connection means a connection was lost; reopen it
                debug!("Reopening pooled connection");
                self.inner.backend.open_readonly_connection().await?
            }
        };

        Ok(PooledConnection {
            dialect: conn.dialect(),
            conn: Some(conn),
            permit: Some(permit),
            pool: self.inner.clone(),
        })
    }

    async fn open_temporary(&self) -> CatalogResult<PooledConnection> {
        let inner = &self.inner;
        if self.is_closed() {
            return Err(CatalogError::PoolClosed);
        }

        match inner.config.max_overflow {
            Some(max) => {
                let reserved = inner.temporary_in_use.fetch_update(
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    |n| (n < max).then_some(n + 1),
                );
                if reserved.is_err() {
                    warn!(max_overflow = max, "Connection pool exhausted, rejecting checkout");
                    return Err(CatalogError::PoolExhausted(max));
                }
            }
            None => {
                inner.temporary_in_use.fetch_add(1, Ordering::AcqRel);
            }
        }

        warn!(
            timeout_ms = inner.config.acquire_timeout.as_millis() as u64,
            size = inner.config.size,
            "Connection pool exhausted, opening temporary connection"
        );

        match inner.backend.open_readonly_connection().await {
            Ok(conn) => {
                inner.temporary_opened.fetch_add(1, Ordering::Relaxed);
                Ok(PooledConnection {
                    dialect: conn.dialect(),
                    conn: Some(conn),
                    permit: None,
                    pool: inner.clone(),
                })
            }
            Err(e) => {
                inner.temporary_in_use.fetch_sub(1, Ordering::AcqRel);
                Err(e)
            }
        }
    }

    /// Close every idle connection and refuse further checkouts
    ///
    /// Calling it again is a no-op.
    pub async fn close_all(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.permits.close();

        let drained: Vec<Box<dyn DbConnection>> = self.inner.idle.lock().drain(..).collect();
        let count = drained.len();
        for mut conn in drained {
            if let Err(e) = conn.close().await {
                debug!(error = %e, "Error while closing pooled connection");
            }
        }

        info!(closed = count, "Connection pool closed");
    }

    /// Whether `close_all` has run
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Current counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.inner.config.size,
            idle: self.inner.idle.lock().len(),
            temporary_in_use: self.inner.temporary_in_use.load(Ordering::Acquire),
            temporary_opened: self.inner.temporary_opened.load(Ordering::Relaxed),
            closed: self.is_closed(),
        }
    }

    /// Pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Dialect of the backing database
    pub fn dialect(&self) -> Dialect {
        self.inner.backend.dialect()
    }

    /// The backend connections are opened through
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.inner.backend
    }
}

/// A checked-out connection
///
/// Dropping the guard releases it: pooled connections return to the free set,
/// temporary connections are closed.
pub struct PooledConnection {
    dialect: Dialect,
    conn: Option<Box<dyn DbConnection>>,
    permit: Option<OwnedSemaphorePermit>,
    pool: Arc<PoolInner>,
}

impl PooledConnection {
    /// Whether this is an overflow connection outside the pool
    pub fn is_temporary(&self) -> bool {
        self.permit.is_none()
    }

    fn inner(&mut self) -> CatalogResult<&mut Box<dyn DbConnection>> {
        self.conn
            .as_mut()
            .ok_or_else(|| CatalogError::ConnectionFailed("connection already released".to_string()))
    }
}

#[async_trait]
impl DbConnection for PooledConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn fetch_rows(&mut self, sql: &str) -> CatalogResult<Vec<Row>> {
        self.inner()?.fetch_rows(sql).await
    }

    async fn introspect_tables(&mut self) -> CatalogResult<Vec<String>> {
        self.inner()?.introspect_tables().await
    }

    async fn introspect_columns(&mut self, table: &str) -> CatalogResult<Vec<ColumnDetail>> {
        self.inner()?.introspect_columns(table).await
    }

    async fn introspect_foreign_keys(&mut self, table: &str) -> CatalogResult<Vec<ForeignKey>> {
        self.inner()?.introspect_foreign_keys(table).await
    }

    async fn probe_distinct(
        &mut self,
        table: &str,
        column: &str,
        limit: usize,
    ) -> CatalogResult<Vec<Value>> {
        self.inner()?.probe_distinct(table, column, limit).await
    }

    /// Close the underlying handle now instead of returning it to the pool
    async fn close(&mut self) -> CatalogResult<()> {
        match self.conn.take() {
            Some(mut conn) => {
                let result = conn.close().await;
                if self.permit.is_none() {
                    self.pool.temporary_in_use.fetch_sub(1, Ordering::AcqRel);
                }
                // The permit stays with the guard; the next checkout reopens the slot
                result
            }
            None => Ok(()),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        match self.permit.take() {
            Some(permit) => {
                {
                    let mut idle = self.pool.idle.lock();
                    if self.pool.closed.load(Ordering::Acquire) {
                        debug!("Closing connection released after pool shutdown");
                        drop(conn);
                    } else {
                        idle.push(conn);
                    }
                }
                drop(permit);
            }
            None => {
                self.pool.temporary_in_use.fetch_sub(1, Ordering::AcqRel);
                debug!("Closing temporary connection");
                drop(conn);
            }
        }
    }
}
