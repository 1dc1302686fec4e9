// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # SQL validator
//!
//! [`SqlValidator::validate`] runs the gates in order and stops at the first
//! failure:
//!
//! 1. normalize (trim, strip trailing `;`), reject empty input
//! 2. reject statement separators
//! 3. tokenize and group parentheses
//! 4. require a leading `SELECT`
//! 5. reject denylisted keywords anywhere in the text
//! 6. check table and column references against the schema
//! 7. clamp or append `LIMIT`

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlgate_ir::{Dialect, Schema};
use sqlparser::tokenizer::Token;
use tracing::debug;

use crate::error::{ValidationError, ValidationResult};
use crate::lexer;
use crate::limit;
use crate::references::{self, References, Unsupported};
use crate::tree;

/// Default row-count ceiling
pub const DEFAULT_ROW_LIMIT: u64 = 500;

static DESTRUCTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(DROP|DELETE|INSERT|UPDATE|ALTER|CREATE|TRUNCATE|REPLACE|MERGE|EXEC|EXECUTE|GRANT|REVOKE|COMMIT|ROLLBACK)\b",
    )
    .expect("destructive keyword pattern is valid")
});

/// Validator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Largest row count a sanitized query may return
    pub row_limit: u64,
    /// Reject statements the reference walker cannot follow instead of passing them
    pub strict_references: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            row_limit: DEFAULT_ROW_LIMIT,
            strict_references: false,
        }
    }
}

impl ValidatorConfig {
    pub fn with_row_limit(mut self, row_limit: u64) -> Self {
        self.row_limit = row_limit;
        self
    }

    pub fn with_strict_references(mut self, strict: bool) -> Self {
        self.strict_references = strict;
        self
    }
}

/// SQL text that passed validation
///
/// Only [`SqlValidator`] can construct one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SanitizedSql(String);

impl SanitizedSql {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for SanitizedSql {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SanitizedSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Flat view of a validation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    is_valid: bool,
    sanitized_sql: Option<SanitizedSql>,
    error: Option<ValidationError>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn sanitized_sql(&self) -> Option<&SanitizedSql> {
        self.sanitized_sql.as_ref()
    }

    pub fn error(&self) -> Option<&ValidationError> {
        self.error.as_ref()
    }

    pub fn into_result(self) -> ValidationResult<SanitizedSql> {
        match (self.sanitized_sql, self.error) {
            (Some(sql), None) => Ok(sql),
            (_, Some(error)) => Err(error),
            (None, None) => Err(ValidationError::EmptyQuery),
        }
    }
}

impl From<ValidationResult<SanitizedSql>> for ValidationOutcome {
    fn from(result: ValidationResult<SanitizedSql>) -> Self {
        match result {
            Ok(sql) => Self {
                is_valid: true,
                sanitized_sql: Some(sql),
                error: None,
            },
            Err(error) => Self {
                is_valid: false,
                sanitized_sql: None,
                error: Some(error),
            },
        }
    }
}

/// Read-only safety gate for one dialect
#[derive(Debug, Clone)]
pub struct SqlValidator {
    dialect: Dialect,
    config: ValidatorConfig,
}

impl SqlValidator {
    pub fn new(dialect: Dialect) -> Self {
        Self::with_config(dialect, ValidatorConfig::default())
    }

    pub fn with_config(dialect: Dialect, config: ValidatorConfig) -> Self {
        Self { dialect, config }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate `sql` against `schema` and return the text safe to execute
    ///
    /// # Errors
    ///
    /// The first failing gate's [`ValidationError`].
    pub fn validate(&self, sql: &str, schema: &Schema) -> ValidationResult<SanitizedSql> {
        let normalized = normalize(sql);
        if normalized.is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        if normalized.contains(';') {
            return Err(ValidationError::MultipleStatements);
        }

        let spanned = lexer::tokenize_spanned(self.dialect, normalized)?;
        let tokens: Vec<Token> = spanned.iter().map(|t| t.token.clone()).collect();
        let terms = tree::group(lexer::lex(&tokens)?)?;

        let first = lexer::first_significant(&tokens);
        if !first.is_some_and(lexer::is_select) {
            return Err(ValidationError::NotSelect {
                found: lexer::describe_token(first),
            });
        }

        if let Some(keyword) = DESTRUCTIVE.find(normalized) {
            return Err(ValidationError::DestructiveKeyword {
                keyword: keyword.as_str().to_ascii_uppercase(),
            });
        }

        match References::extract(&terms) {
            Ok(refs) => references::check(&refs, schema)?,
            Err(Unsupported(reason)) if self.config.strict_references => {
                return Err(ValidationError::parse(format!(
                    "Unsupported construct: {reason}"
                )));
            }
            Err(Unsupported(reason)) => {
                debug!(reason = %reason, "Skipping reference check");
            }
        }

        let sanitized = limit::enforce(normalized, &spanned, &terms, self.config.row_limit)?;
        debug!(dialect = %self.dialect, sql = %sanitized, "Query validated");
        Ok(SanitizedSql(sanitized))
    }

    /// [`validate`](Self::validate) as a flat outcome
    pub fn check(&self, sql: &str, schema: &Schema) -> ValidationOutcome {
        self.validate(sql, schema).into()
    }
}

/// Trim and strip every trailing `;`
fn normalize(sql: &str) -> &str {
    let mut text = sql.trim();
    while let Some(rest) = text.strip_suffix(';') {
        text = rest.trim_end();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders_schema() -> Schema {
        Schema::new().with_table("orders", ["id", "amount", "status"])
    }

    fn validate(sql: &str) -> ValidationResult<SanitizedSql> {
        SqlValidator::new(Dialect::SQLite).validate(sql, &orders_schema())
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  SELECT 1 ;; ; \n"), "SELECT 1");
        assert_eq!(normalize(" ; "), "");
    }

    #[test]
    fn test_valid_select_gets_limit() {
        let sql = validate("SELECT id, amount FROM orders WHERE status = 'paid'").unwrap();
        assert_eq!(
            sql.as_str(),
            "SELECT id, amount FROM orders WHERE status = 'paid' LIMIT 500"
        );
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(validate("   "), Err(ValidationError::EmptyQuery));
        assert_eq!(validate(";;"), Err(ValidationError::EmptyQuery));
    }

    #[test]
    fn test_multiple_statements() {
        assert_eq!(
            validate("SELECT * FROM orders; DROP TABLE orders"),
            Err(ValidationError::MultipleStatements)
        );
    }

    #[test]
    fn test_not_select() {
        let err = validate("DROP TABLE orders").unwrap_err();
        assert_eq!(
            err,
            ValidationError::NotSelect {
                found: "DROP".to_string()
            }
        );
        assert!(err.to_string().contains("DROP"));

        assert!(matches!(
            validate("(SELECT 1)"),
            Err(ValidationError::NotSelect { ref found }) if found == "("
        ));
    }

    #[test]
    fn test_destructive_keyword_inside_select() {
        assert_eq!(
            validate("SELECT * FROM orders WHERE id IN (delete FROM orders)"),
            Err(ValidationError::DestructiveKeyword {
                keyword: "DELETE".to_string()
            })
        );
    }

    #[test]
    fn test_strict_references_rejects_unsupported() {
        let sql = "SELECT a.b.c.d FROM orders";
        assert!(validate(sql).is_ok());

        let strict = SqlValidator::with_config(
            Dialect::SQLite,
            ValidatorConfig::default().with_strict_references(true),
        );
        assert!(matches!(
            strict.validate(sql, &orders_schema()),
            Err(ValidationError::ParseError { .. })
        ));
    }

    #[test]
    fn test_custom_row_limit() {
        let validator =
            SqlValidator::with_config(Dialect::SQLite, ValidatorConfig::default().with_row_limit(50));
        let sql = validator
            .validate("SELECT id FROM orders LIMIT 100", &orders_schema())
            .unwrap();
        assert_eq!(sql.as_str(), "SELECT id FROM orders LIMIT 50");
    }

    #[test]
    fn test_outcome_view() {
        let validator = SqlValidator::new(Dialect::SQLite);

        let ok = validator.check("SELECT id FROM orders", &orders_schema());
        assert!(ok.is_valid());
        assert!(ok.error().is_none());
        assert_eq!(
            ok.sanitized_sql().map(SanitizedSql::as_str),
            Some("SELECT id FROM orders LIMIT 500")
        );

        let bad = validator.check("SELECT nope FROM orders", &orders_schema());
        assert!(!bad.is_valid());
        assert!(bad.sanitized_sql().is_none());
        assert!(matches!(
            bad.into_result(),
            Err(ValidationError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_outcome_serializes() {
        let outcome = SqlValidator::new(Dialect::SQLite).check("DROP TABLE orders", &orders_schema());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["is_valid"], false);
        assert_eq!(json["sanitized_sql"], serde_json::Value::Null);
        assert_eq!(json["error"]["kind"], "not_select");
    }
}
