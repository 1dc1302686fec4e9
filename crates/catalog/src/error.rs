// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Error types for Catalog operations
//!
//! This module defines the error types used by backends, the connection pool
//! and the schema catalog.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for Catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur during Catalog operations
#[derive(Debug, Error, Clone, Serialize)]
pub enum CatalogError {
    /// Failed to connect to the database
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    /// Schema introspection could not reach the database at all
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    /// Invalid catalog configuration
    #[error("Invalid catalog configuration: {0}")]
    ConfigurationError(String),

    /// The specified feature is not supported by this build
    #[error("Feature not supported: {0}")]
    NotSupported(String),

    /// The connection pool has been shut down
    #[error("Connection pool is closed")]
    PoolClosed,

    /// The pool and its overflow allowance are both used up
    #[error("Connection pool exhausted: {0} temporary connections already open")]
    PoolExhausted(usize),
}

impl CatalogError {
    /// Wrap any error as a query failure with context
    pub fn query(context: &str, err: impl std::fmt::Display) -> Self {
        CatalogError::QueryFailed(format!("{}: {}", context, err))
    }

    /// Wrap any error as a connection failure with context
    pub fn connection(context: &str, err: impl std::fmt::Display) -> Self {
        CatalogError::ConnectionFailed(format!("{}: {}", context, err))
    }
}
