// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # sqlgate - Shared Types
//!
//! This crate holds the data model shared by the catalog, validator and
//! engine crates:
//!
//! - [`Dialect`]: the supported database dialects
//! - [`Schema`] / [`DetailedSchema`]: the two schema views produced by the catalog
//! - [`Row`]: the uniform row shape every backend normalizes into

pub mod dialect;
pub mod metadata;
pub mod row;

// Re-export commonly used types
pub use dialect::{Dialect, UnknownDialect};
pub use metadata::{
    ColumnDetail, ColumnRef, DetailedSchema, ForeignKey, Schema, ValueConstraint, is_text_type,
};
pub use row::{Row, row_from_pairs};
