// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Dialect Support
//!
//! This module defines the database dialects the engine can sit in front of.
//!
//! ## Dialects
//!
//! - **SQLite**: file databases, read-only mode via `PRAGMA query_only`
//! - **PostgreSQL**: server databases, read-only session transactions
//! - **MySQL**: server databases, read-only session transactions
//!
//! Dialect differences that matter to the engine are small: identifier
//! quoting, the default port, and the system catalogs used for introspection.
//! Everything else is handled by the per-backend implementations in the
//! catalog crate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Supported database dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// SQLite 3
    SQLite,
    /// PostgreSQL (12+)
    PostgreSQL,
    /// MySQL (5.7, 8.0)
    MySQL,
}

/// Error returned when a dialect name cannot be recognized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown dialect '{0}', expected one of: sqlite, postgres, mysql")]
pub struct UnknownDialect(pub String);

impl Dialect {
    /// Canonical lower-case name, also used in derived database identifiers
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::SQLite => "sqlite",
            Dialect::PostgreSQL => "postgres",
            Dialect::MySQL => "mysql",
        }
    }

    /// Default network port, `None` for file-based dialects
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Dialect::SQLite => None,
            Dialect::PostgreSQL => Some(5432),
            Dialect::MySQL => Some(3306),
        }
    }

    /// URL schemes accepted for connection strings of this dialect
    pub fn url_schemes(&self) -> &'static [&'static str] {
        match self {
            Dialect::SQLite => &["sqlite:"],
            Dialect::PostgreSQL => &["postgres://", "postgresql://"],
            Dialect::MySQL => &["mysql://", "mariadb://"],
        }
    }

    /// Quote an identifier for interpolation into introspection queries
    ///
    /// Embedded quote characters are doubled, so the result is always a single
    /// identifier token.
    pub fn quote_identifier(&self, ident: &str) -> String {
        match self {
            Dialect::MySQL => format!("`{}`", ident.replace('`', "``")),
            Dialect::SQLite | Dialect::PostgreSQL => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::SQLite),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::PostgreSQL),
            "mysql" | "mariadb" => Ok(Dialect::MySQL),
            other => Err(UnknownDialect(other.to_string())),
        }
    }
}
