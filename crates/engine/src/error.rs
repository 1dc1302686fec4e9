// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Error types for the query engine

use sqlgate_catalog::CatalogError;
use sqlgate_validator::ValidationError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by [`QueryEngine`](crate::QueryEngine)
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// The SQL was rejected before reaching the database
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Pool or schema catalog failure
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The database rejected an admitted query
    #[error("Query execution error: {0}")]
    Execution(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Whether the query itself was at fault rather than the engine
    pub fn is_rejection(&self) -> bool {
        matches!(self, EngineError::Validation(_) | EngineError::Execution(_))
    }
}
