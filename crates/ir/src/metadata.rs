// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Metadata types for database schema information
//!
//! Two views of the same database are produced by the catalog:
//!
//! - [`Schema`]: table → column names, lower-cased. This is the namespace the
//!   validator checks references against.
//! - [`DetailedSchema`]: declared types, primary keys, observed value sets and
//!   foreign keys. Purely advisory; it is rendered into prompts upstream and
//!   never consulted by the validator.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Distinct values at or below which a text column is treated as categorical
pub const MAX_TEXT_CATEGORICAL_VALUES: usize = 20;

/// Distinct values at or below which any column is treated as categorical
pub const MAX_CATEGORICAL_VALUES: usize = 10;

/// Number of sample values kept for non-categorical columns
pub const EXAMPLE_VALUE_COUNT: usize = 3;

/// Simple schema: lower-cased table name → lower-cased column names
///
/// Tables iterate alphabetically; columns keep the order reported by the
/// database catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    tables: BTreeMap<String, Vec<String>>,
}

impl Schema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: add a table with its columns
    ///
    /// Names are lower-cased. Adding a table twice replaces its columns.
    pub fn with_table<I, S>(mut self, table: impl AsRef<str>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.insert_table(table, columns);
        self
    }

    /// Add a table with its columns
    pub fn insert_table<I, S>(&mut self, table: impl AsRef<str>, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let columns = columns
            .into_iter()
            .map(|c| c.as_ref().to_lowercase())
            .collect();
        self.tables.insert(table.as_ref().to_lowercase(), columns);
    }

    /// Whether the (lower-cased) table exists
    pub fn contains_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Columns of a table, if it exists
    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    /// Whether `table` exists and has `column`
    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.columns(table)
            .is_some_and(|cols| cols.iter().any(|c| c == column))
    }

    /// Sorted table names
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Iterate over `(table, columns)` in table order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.tables.iter().map(|(t, c)| (t.as_str(), c.as_slice()))
    }

    /// Number of tables
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether there are no tables
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Reference to a column (used by foreign keys)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Foreign key edge `from -> to`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    pub from: ColumnRef,
    pub to: ColumnRef,
}

impl ForeignKey {
    pub fn new(from: ColumnRef, to: ColumnRef) -> Self {
        Self { from, to }
    }
}

/// Observed values of a column, surfaced to help generate faithful literals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum ValueConstraint {
    /// The complete set of distinct values (low cardinality)
    Enumerated(Vec<Value>),
    /// A few sample values (high cardinality)
    Examples(Vec<Value>),
}

impl ValueConstraint {
    /// Classify the distinct non-null values observed for a column
    ///
    /// `values` may be truncated by the probe; anything longer than
    /// [`MAX_TEXT_CATEGORICAL_VALUES`] is treated as high cardinality.
    pub fn classify(declared_type: &str, values: Vec<Value>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let count = values.len();
        let categorical = count <= MAX_CATEGORICAL_VALUES
            || (count <= MAX_TEXT_CATEGORICAL_VALUES && is_text_type(declared_type));

        if categorical {
            Some(ValueConstraint::Enumerated(values))
        } else {
            Some(ValueConstraint::Examples(
                values.into_iter().take(EXAMPLE_VALUE_COUNT).collect(),
            ))
        }
    }

    /// The values carried by this constraint
    pub fn values(&self) -> &[Value] {
        match self {
            ValueConstraint::Enumerated(v) | ValueConstraint::Examples(v) => v,
        }
    }
}

/// Whether a declared column type stores text
///
/// Matches `TEXT`, `VARCHAR(n)`, `CHAR`, `character varying`, `NVARCHAR`,
/// `tinytext` and the like.
pub fn is_text_type(declared_type: &str) -> bool {
    let upper = declared_type.to_ascii_uppercase();
    upper.contains("CHAR") || upper.contains("TEXT") || upper == "STRING" || upper == "CLOB"
}

/// Detailed description of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDetail {
    pub name: String,
    pub declared_type: String,
    pub is_primary_key: bool,
    pub value_constraint: Option<ValueConstraint>,
}

impl ColumnDetail {
    /// Create a new column description with builder pattern
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            is_primary_key: false,
            value_constraint: None,
        }
    }

    /// Builder method: mark as primary key
    pub fn with_primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    /// Builder method: set the observed value constraint
    pub fn with_constraint(mut self, constraint: Option<ValueConstraint>) -> Self {
        self.value_constraint = constraint;
        self
    }
}

impl fmt::Display for ColumnDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.declared_type)?;
        if self.is_primary_key {
            f.write_str("*PK")?;
        }

        match &self.value_constraint {
            Some(ValueConstraint::Enumerated(values)) => {
                let quote = is_text_type(&self.declared_type);
                let rendered: Vec<String> = values
                    .iter()
                    .map(|v| {
                        let text = display_value(v);
                        if quote { format!("'{}'", text) } else { text }
                    })
                    .collect();
                write!(f, " ∈ [{}]", rendered.join(", "))
            }
            Some(ValueConstraint::Examples(values)) => {
                let rendered: Vec<String> = values.iter().map(display_value).collect();
                write!(f, " (e.g., {})", rendered.join(", "))
            }
            None => Ok(()),
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Detailed schema: per-table column details plus foreign keys
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailedSchema {
    pub tables: BTreeMap<String, Vec<ColumnDetail>>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl DetailedSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column details of a table
    pub fn columns(&self, table: &str) -> Option<&[ColumnDetail]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    /// Look up one column
    pub fn column(&self, table: &str, column: &str) -> Option<&ColumnDetail> {
        self.columns(table)?.iter().find(|c| c.name == column)
    }
}

/// Compact prompt rendering, one line per table then one line per foreign key
impl fmt::Display for DetailedSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (table, columns) in &self.tables {
            let rendered: Vec<String> = columns.iter().map(ToString::to_string).collect();
            writeln!(f, "{}: {}", table, rendered.join(", "))?;
        }
        for fk in &self.foreign_keys {
            writeln!(f, "FK: {} -> {}", fk.from, fk.to)?;
        }
        Ok(())
    }
}
