// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details
//
//! # Error types for SQL validation
//!
//! Every rejection carries what an upstream layer needs to explain it: the
//! offending keyword, table or column, and the names that would have been valid.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for validation
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Reasons a query is refused
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// Nothing left after trimming whitespace and trailing semicolons
    #[error("Empty query provided")]
    EmptyQuery,

    /// More than one statement in the input
    #[error("Multiple statements not allowed. Only single SELECT queries permitted.")]
    MultipleStatements,

    /// The text could not be tokenized or grouped
    #[error("SQL parsing error: {message}")]
    ParseError { message: String },

    /// The statement does not start with SELECT
    #[error(
        "Only SELECT queries are allowed (found '{found}'). No INSERT, UPDATE, DELETE, DROP, or other destructive operations."
    )]
    NotSelect { found: String },

    /// A denylisted keyword appears anywhere in the text
    #[error("Query contains destructive keyword '{keyword}'. Only read operations are permitted.")]
    DestructiveKeyword { keyword: String },

    /// A referenced table is not in the schema
    #[error(
        "Table '{table}' does not exist in the database schema. Available tables: {}",
        available.join(", ")
    )]
    UnknownTable { table: String, available: Vec<String> },

    /// A referenced column is not in the schema
    #[error("{}", describe_unknown_column(column, table.as_deref(), available))]
    UnknownColumn {
        column: String,
        table: Option<String>,
        available: Vec<String>,
    },
}

impl ValidationError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        ValidationError::ParseError {
            message: message.into(),
        }
    }

    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::EmptyQuery => "empty_query",
            ValidationError::MultipleStatements => "multiple_statements",
            ValidationError::ParseError { .. } => "parse_error",
            ValidationError::NotSelect { .. } => "not_select",
            ValidationError::DestructiveKeyword { .. } => "destructive_keyword",
            ValidationError::UnknownTable { .. } => "unknown_table",
            ValidationError::UnknownColumn { .. } => "unknown_column",
        }
    }
}

fn describe_unknown_column(column: &str, table: Option<&str>, available: &[String]) -> String {
    match table {
        Some(table) => format!(
            "Column '{}' not found in table '{}'. Available columns: {}",
            column,
            table,
            available.join(", ")
        ),
        None => format!(
            "Column '{}' not found in any referenced tables. Available columns: {}",
            column,
            available.join(", ")
        ),
    }
}
