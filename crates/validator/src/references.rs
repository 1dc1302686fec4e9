// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Table and column reference extraction
//!
//! The walker runs over grouped terms and records, for the whole statement:
//!
//! - physical tables named in `FROM` / `JOIN` positions
//! - aliases bound to those tables, and aliases of derived tables
//! - output aliases from the select list
//! - every remaining identifier as a column use
//!
//! Names live in one flat namespace: correlated subqueries see the aliases of
//! the enclosing query and vice versa. That makes the check more permissive
//! than a scoped resolver, never stricter.

use std::collections::{BTreeSet, HashMap, HashSet};

use sqlgate_ir::Schema;

use crate::error::{ValidationError, ValidationResult};
use crate::tree::Term;

/// Deepest parenthesis nesting the walker follows
const MAX_DEPTH: usize = 64;

/// Implicit row identifiers accepted without being declared
const PSEUDO_COLUMNS: &[&str] = &["rowid", "oid", "_rowid_"];

/// Keywords ending a table position
const CLOSES_TABLE: &[&str] = &[
    "WHERE", "ORDER", "GROUP", "HAVING", "LIMIT", "OFFSET", "UNION", "INTERSECT", "EXCEPT",
    "MINUS", "WINDOW", "FETCH", "QUALIFY",
];

/// Keywords that may end an expression, so a following name is an alias
const ENDS_EXPRESSION: &[&str] = &["END", "NULL", "TRUE", "FALSE"];

/// A construct the walker does not understand
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Unsupported(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnUse {
    pub qualifier: Option<String>,
    pub column: String,
}

impl ColumnUse {
    fn from_parts(parts: &[String]) -> Result<Self, Unsupported> {
        let (qualifier, column) = match parts {
            [column] => (None, column),
            [qualifier, column] => (Some(qualifier), column),
            [_schema, qualifier, column] => (Some(qualifier), column),
            _ => return Err(Unsupported(format!("name with too many parts: {}", parts.join(".")))),
        };
        Ok(Self {
            qualifier: qualifier.cloned(),
            column: column.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// A statement or subquery
    Query,
    /// A parenthesized `FROM` list such as `(a JOIN b ON ...)`
    JoinList,
    /// Function arguments and other parenthesized expressions
    Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    Select,
    Table,
    /// `ON` / `USING`; a comma reopens the table list
    JoinCondition,
    Other,
}

enum Source {
    Table(String),
    Derived,
}

/// Everything a statement refers to
#[derive(Debug, Default)]
pub(crate) struct References {
    pub tables: Vec<String>,
    pub aliases: HashMap<String, String>,
    pub derived: HashSet<String>,
    pub output_aliases: HashSet<String>,
    pub columns: Vec<ColumnUse>,
}

impl References {
    /// Walk a grouped statement
    pub(crate) fn extract(terms: &[Term]) -> Result<Self, Unsupported> {
        let mut refs = References::default();
        refs.walk(terms, Mode::Query, 0)?;
        Ok(refs)
    }

    fn walk(&mut self, terms: &[Term], mode: Mode, depth: usize) -> Result<(), Unsupported> {
        if depth > MAX_DEPTH {
            return Err(Unsupported(format!("nesting deeper than {MAX_DEPTH}")));
        }

        let structural = mode != Mode::Expr;
        let mut clause = if mode == Mode::JoinList { Clause::Table } else { Clause::Other };
        let mut expect_table = mode == Mode::JoinList;
        let mut i = 0;

        while i < terms.len() {
            let prev = i.checked_sub(1).and_then(|p| terms.get(p));
            let next = terms.get(i + 1);

            match &terms[i] {
                Term::Keyword(keyword) => match keyword.as_str() {
                    "SELECT" => {
                        clause = Clause::Select;
                        expect_table = false;
                        i += 1;
                    }
                    // `IS DISTINCT FROM` is a comparison
                    "FROM" if structural && !prev.is_some_and(|p| p.is_keyword("DISTINCT")) => {
                        clause = Clause::Table;
                        expect_table = true;
                        i += 1;
                    }
                    "JOIN" | "STRAIGHT_JOIN" if structural => {
                        clause = Clause::Table;
                        expect_table = true;
                        i += 1;
                    }
                    "ON" | "USING" if structural && clause == Clause::Table => {
                        clause = Clause::JoinCondition;
                        expect_table = false;
                        i += 1;
                    }
                    k if structural && CLOSES_TABLE.contains(&k) => {
                        clause = Clause::Other;
                        expect_table = false;
                        i += 1;
                    }
                    "AS" => match next {
                        Some(Term::Name(parts)) => {
                            if clause == Clause::Select
                                && structural
                                && let [alias] = parts.as_slice()
                            {
                                self.output_aliases.insert(alias.clone());
                            }
                            i += 2;
                        }
                        Some(_) => i += 1,
                        None => return Err(Unsupported("AS without a name".to_string())),
                    },
                    // window names and collations
                    "OVER" | "COLLATE" if matches!(next, Some(Term::Name(_))) => i += 2,
                    _ => i += 1,
                },

                Term::Name(parts) if clause == Clause::Table && structural => {
                    if !expect_table {
                        return Err(Unsupported(format!(
                            "unexpected name '{}' in table list",
                            parts.join(".")
                        )));
                    }
                    expect_table = false;

                    let source = if let Some(Term::Group(args)) = next {
                        // table-valued function
                        self.walk(args, Mode::Expr, depth + 1)?;
                        i += 2;
                        Source::Derived
                    } else {
                        if parts.len() > 3 {
                            return Err(Unsupported(format!(
                                "table name with too many parts: {}",
                                parts.join(".")
                            )));
                        }
                        let table = parts.last().cloned().unwrap_or_default();
                        self.add_table(&table);
                        i += 1;
                        Source::Table(table)
                    };
                    i += self.bind_alias(terms, i, source);
                }

                Term::Name(parts) => {
                    if !is_reference(prev, next, terms.get(i + 2)) {
                        i += 1;
                        continue;
                    }
                    if clause == Clause::Select
                        && structural
                        && let [alias] = parts.as_slice()
                        && is_implicit_alias(prev, next)
                    {
                        self.output_aliases.insert(alias.clone());
                        i += 1;
                        continue;
                    }
                    self.columns.push(ColumnUse::from_parts(parts)?);
                    i += 1;
                }

                Term::QualifiedStar(parts) => {
                    if let Some(qualifier) = parts.last() {
                        self.columns.push(ColumnUse {
                            qualifier: Some(qualifier.clone()),
                            column: "*".to_string(),
                        });
                    }
                    i += 1;
                }

                Term::Group(inner) => {
                    let table_position = clause == Clause::Table && expect_table && structural;
                    let inner_mode = if terms[i].is_subquery() {
                        Mode::Query
                    } else if table_position {
                        Mode::JoinList
                    } else {
                        Mode::Expr
                    };
                    self.walk(inner, inner_mode, depth + 1)?;
                    i += 1;

                    if table_position {
                        expect_table = false;
                        i += self.bind_alias(terms, i, Source::Derived);
                    }
                }

                Term::Comma => {
                    if structural && matches!(clause, Clause::Table | Clause::JoinCondition) {
                        clause = Clause::Table;
                        expect_table = true;
                    }
                    i += 1;
                }

                _ => i += 1,
            }
        }

        Ok(())
    }

    fn add_table(&mut self, table: &str) {
        if !self.tables.iter().any(|t| t == table) {
            self.tables.push(table.to_string());
        }
    }

    /// Bind `orders o` / `orders AS o` / `(...) AS sub(a, b)`, returning the terms consumed
    fn bind_alias(&mut self, terms: &[Term], at: usize, source: Source) -> usize {
        let (alias, mut consumed) = match (terms.get(at), terms.get(at + 1)) {
            (Some(Term::Keyword(k)), Some(Term::Name(parts))) if k == "AS" && parts.len() == 1 => {
                (parts[0].clone(), 2)
            }
            (Some(Term::Name(parts)), _) if parts.len() == 1 => (parts[0].clone(), 1),
            _ => return 0,
        };

        // a column alias list renames the source's columns
        let renamed = matches!(terms.get(at + consumed), Some(Term::Group(_)));
        if renamed {
            consumed += 1;
        }

        match source {
            Source::Table(table) if !renamed => {
                self.aliases.insert(alias, table);
            }
            _ => {
                self.derived.insert(alias);
            }
        }
        consumed
    }
}

/// Whether a name at this position refers to a column
///
/// Function names, cast targets, typed literal prefixes and named window
/// definitions do not.
fn is_reference(prev: Option<&Term>, next: Option<&Term>, after_next: Option<&Term>) -> bool {
    if matches!(prev, Some(Term::Operator(op)) if op == "::") {
        return false;
    }
    match next {
        Some(Term::Group(_)) | Some(Term::Text) => false,
        Some(t) if t.is_keyword("AS") => !matches!(after_next, Some(Term::Group(_))),
        _ => true,
    }
}

/// `SELECT COUNT(*) n, a b FROM ...`
fn is_implicit_alias(prev: Option<&Term>, next: Option<&Term>) -> bool {
    let after_expression = match prev {
        Some(Term::Name(_) | Term::Number(_) | Term::Text | Term::Param | Term::Group(_)) => true,
        Some(Term::Keyword(k)) => ENDS_EXPRESSION.contains(&k.as_str()),
        _ => false,
    };
    let ends_item = match next {
        None | Some(Term::Comma) => true,
        Some(t) => t.is_keyword("FROM"),
    };
    after_expression && ends_item
}

fn is_pseudo_column(column: &str) -> bool {
    PSEUDO_COLUMNS.contains(&column)
}

/// Check extracted references against `schema`
///
/// # Errors
///
/// `UnknownTable` for the first table (or qualifier) missing from the schema,
/// `UnknownColumn` for the first column that no candidate table declares.
pub(crate) fn check(refs: &References, schema: &Schema) -> ValidationResult<()> {
    for table in &refs.tables {
        if !schema.contains_table(table) {
            return Err(ValidationError::UnknownTable {
                table: table.clone(),
                available: schema.table_names(),
            });
        }
    }

    for column in &refs.columns {
        match &column.qualifier {
            Some(qualifier) => check_qualified(refs, schema, qualifier, &column.column)?,
            None => check_bare(refs, schema, &column.column)?,
        }
    }

    Ok(())
}

fn check_qualified(
    refs: &References,
    schema: &Schema,
    qualifier: &str,
    column: &str,
) -> ValidationResult<()> {
    if refs.derived.contains(qualifier) {
        return Ok(());
    }

    let table = refs.aliases.get(qualifier).map_or(qualifier, String::as_str);
    let Some(columns) = schema.columns(table) else {
        return Err(ValidationError::UnknownTable {
            table: qualifier.to_string(),
            available: schema.table_names(),
        });
    };

    if column == "*" || is_pseudo_column(column) || columns.iter().any(|c| c == column) {
        return Ok(());
    }
    Err(ValidationError::UnknownColumn {
        column: column.to_string(),
        table: Some(table.to_string()),
        available: columns.to_vec(),
    })
}

fn check_bare(refs: &References, schema: &Schema, column: &str) -> ValidationResult<()> {
    if refs.output_aliases.contains(column)
        || refs.derived.contains(column)
        || is_pseudo_column(column)
    {
        return Ok(());
    }

    let candidates: Vec<&str> = if refs.tables.is_empty() {
        schema.iter().map(|(table, _)| table).collect()
    } else {
        refs.tables.iter().map(String::as_str).collect()
    };

    let mut available = BTreeSet::new();
    for table in candidates {
        if let Some(columns) = schema.columns(table) {
            if columns.iter().any(|c| c == column) {
                return Ok(());
            }
            available.extend(columns.iter().cloned());
        }
    }

    Err(ValidationError::UnknownColumn {
        column: column.to_string(),
        table: None,
        available: available.into_iter().collect(),
    })
}
