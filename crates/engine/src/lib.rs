// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # sqlgate - Query Engine
//!
//! Runs model-generated SQL against a live database without letting it write:
//!
//! 1. the [`SqlValidator`](sqlgate_validator::SqlValidator) admits a single
//!    `SELECT` over known tables and columns and caps its row count
//! 2. the [`QueryCache`] answers repeats of the sanitized text
//! 3. otherwise a read-only connection is checked out of the pool, the query
//!    runs and the rows are cached
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sqlgate_engine::{EngineConfig, QueryEngine};
//!
//! let engine = QueryEngine::connect(EngineConfig::from_env()?).await?;
//!
//! let result = engine.run("SELECT status, COUNT(*) FROM orders GROUP BY status").await?;
//! for row in result.rows.iter() {
//!     println!("{:?}", row);
//! }
//!
//! engine.shutdown().await;
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;

// Re-exports
pub use cache::{CacheStats, QueryCache, cache_key};
pub use config::{CacheConfig, ConfigError, DEFAULT_SQLITE_PATH, EngineConfig};
pub use engine::{QueryEngine, QueryResult};
pub use error::{EngineError, EngineResult};
