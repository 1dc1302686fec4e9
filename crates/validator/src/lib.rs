// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details
//
//! # sqlgate - SQL Validator
//!
//! This crate decides whether a SQL string may run against a read-only
//! database, and rewrites it so it cannot return more than a fixed number of
//! rows.
//!
//! ## Overview
//!
//! The validator is a lexical gate, not a full parser. It tokenizes with
//! `sqlparser`, groups parentheses, and walks the result to find:
//! - **Statement shape**: one statement, starting with `SELECT`
//! - **Forbidden verbs**: `DROP`, `DELETE`, `UPDATE` and the rest of the denylist
//! - **References**: tables, aliases and columns, checked against a [`Schema`]
//!
//! ```rust
//! use sqlgate_ir::{Dialect, Schema};
//! use sqlgate_validator::{SqlValidator, ValidationError};
//!
//! let schema = Schema::new().with_table("orders", ["id", "amount", "status"]);
//! let validator = SqlValidator::new(Dialect::SQLite);
//!
//! let sql = validator
//!     .validate("SELECT id, amount FROM orders WHERE status = 'paid'", &schema)
//!     .unwrap();
//! assert!(sql.as_str().ends_with("LIMIT 500"));
//!
//! let err = validator.validate("SELECT * FROM invoices", &schema).unwrap_err();
//! assert!(matches!(err, ValidationError::UnknownTable { .. }));
//! ```
//!
//! Statements the reference walker cannot follow pass the reference check
//! unless [`ValidatorConfig::strict_references`] is set.
//!
//! [`Schema`]: sqlgate_ir::Schema

pub mod error;
mod lexer;
mod limit;
mod references;
mod tree;
pub mod validator;

pub use error::{ValidationError, ValidationResult};
pub use validator::{
    DEFAULT_ROW_LIMIT, SanitizedSql, SqlValidator, ValidationOutcome, ValidatorConfig,
};
