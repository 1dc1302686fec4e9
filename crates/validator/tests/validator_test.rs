// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Validation scenarios over the retail fixture schema

use sqlgate_ir::{Dialect, Schema};
use sqlgate_test_utils::{SchemaFixtures, SqlFixtures};
use sqlgate_validator::{SqlValidator, ValidationError, ValidatorConfig};

fn validator() -> SqlValidator {
    SqlValidator::new(Dialect::SQLite)
}

fn accept(sql: &str) -> String {
    match validator().validate(sql, &SchemaFixtures::shop()) {
        Ok(sanitized) => sanitized.into_inner(),
        Err(e) => panic!("expected {sql:?} to be accepted, got: {e}"),
    }
}

fn reject(sql: &str) -> ValidationError {
    match validator().validate(sql, &SchemaFixtures::shop()) {
        Ok(sanitized) => panic!("expected {sql:?} to be rejected, got: {sanitized}"),
        Err(e) => e,
    }
}

// ===== Admissible queries =====

#[test]
fn test_fixture_queries_are_accepted() {
    for sql in [
        SqlFixtures::simple_select(),
        SqlFixtures::select_all(),
        SqlFixtures::aliased_join(),
        SqlFixtures::subquery(),
    ] {
        assert!(accept(sql).ends_with("LIMIT 500"), "{sql}");
    }
}

#[test]
fn test_huge_limit_is_clamped() {
    assert_eq!(accept(SqlFixtures::huge_limit()), "SELECT * FROM orders LIMIT 500");
}

#[test]
fn test_comments_cannot_hide_a_row_count() {
    assert_eq!(
        accept("SELECT id FROM orders LIMIT /* c */ 100000"),
        "SELECT id FROM orders LIMIT /* c */ 500"
    );
    assert_eq!(
        accept("SELECT id FROM orders LIMIT/**/100000"),
        "SELECT id FROM orders LIMIT/**/500"
    );
    assert_eq!(
        accept("SELECT id FROM orders LIMIT -- c\n 100000"),
        "SELECT id FROM orders LIMIT -- c\n 500"
    );

    let mysql = SqlValidator::new(Dialect::MySQL)
        .validate(
            "SELECT id FROM orders LIMIT 5 /* c */, 100000",
            &SchemaFixtures::shop(),
        )
        .unwrap();
    assert_eq!(mysql.as_str(), "SELECT id FROM orders LIMIT 5 /* c */, 500");
}

#[test]
fn test_limit_text_inside_literals_is_kept() {
    assert_eq!(
        accept("SELECT id FROM orders WHERE status = 'limit 1000'"),
        "SELECT id FROM orders WHERE status = 'limit 1000' LIMIT 500"
    );
}

#[test]
fn test_orders_scenario() {
    let schema = Schema::new().with_table("orders", ["id", "amount", "status"]);
    let sql = validator()
        .validate("SELECT id, amount FROM orders WHERE status = 'paid'", &schema)
        .unwrap();
    assert!(sql.as_str().contains("LIMIT 500"));
}

#[test]
fn test_case_and_whitespace_insensitive() {
    let sql = accept("  select   C.Name\n\tfrom   Customers   c  ;  ");
    assert_eq!(sql, "select   C.Name\n\tfrom   Customers   c LIMIT 500");
}

#[test]
fn test_extract_and_cast() {
    accept("SELECT EXTRACT(YEAR FROM created_at) AS y, CAST(total AS INTEGER) FROM orders");
    accept("SELECT strftime('%Y', created_at) yr, COUNT(*) n FROM orders GROUP BY yr ORDER BY n DESC");
}

#[test]
fn test_aggregates_case_and_window() {
    accept(
        "SELECT customer_id,
                SUM(CASE WHEN status = 'shipped' THEN total ELSE 0 END) AS shipped_total,
                RANK() OVER (PARTITION BY customer_id ORDER BY total DESC) AS rnk
         FROM orders
         WHERE created_at BETWEEN DATE '2024-01-01' AND DATE '2024-12-31'
         GROUP BY customer_id, total
         HAVING COUNT(*) > 1",
    );
}

#[test]
fn test_correlated_subquery_and_exists() {
    accept(
        "SELECT c.name FROM customers c
         WHERE EXISTS (SELECT 1 FROM orders o WHERE o.customer_id = c.id AND o.status = 'pending')",
    );
}

#[test]
fn test_derived_table() {
    accept(
        "SELECT t.customer_id, t.spent FROM
           (SELECT customer_id, SUM(total) AS spent FROM orders GROUP BY customer_id) AS t
         WHERE t.spent > 100
         ORDER BY spent DESC",
    );
}

#[test]
fn test_union_and_left_join() {
    accept(
        "SELECT name FROM customers
         UNION ALL
         SELECT p.name FROM products p LEFT OUTER JOIN orders o ON o.id = p.id",
    );
}

#[test]
fn test_qualified_star_and_pseudo_column() {
    accept("SELECT o.*, c.name FROM orders o JOIN customers c ON c.id = o.customer_id");
    accept("SELECT rowid, * FROM products");
}

#[test]
fn test_dialect_quoting() {
    let schema = SchemaFixtures::shop();
    SqlValidator::new(Dialect::MySQL)
        .validate("SELECT `name`, `country` FROM `customers` LIMIT 5, 10", &schema)
        .unwrap();
    SqlValidator::new(Dialect::PostgreSQL)
        .validate("SELECT \"total\"::numeric FROM public.orders", &schema)
        .unwrap();
}

// ===== Rejected queries =====

#[test]
fn test_drop_table_is_not_select() {
    let err = reject(SqlFixtures::drop_table());
    assert!(matches!(err, ValidationError::NotSelect { ref found } if found == "DROP"));
    assert!(err.to_string().contains("DROP"));
}

#[test]
fn test_write_statements_are_not_select() {
    for (sql, verb) in [
        ("INSERT INTO orders VALUES (1)", "INSERT"),
        ("update orders SET status = 'x'", "UPDATE"),
        ("  -- sneaky\n DELETE FROM orders", "DELETE"),
        ("WITH x AS (SELECT 1) SELECT * FROM x", "WITH"),
        ("PRAGMA table_info(orders)", "PRAGMA"),
    ] {
        assert!(
            matches!(reject(sql), ValidationError::NotSelect { ref found } if found == verb),
            "{sql}"
        );
    }
}

#[test]
fn test_destructive_keywords_any_case_or_spacing() {
    for (sql, keyword) in [
        (SqlFixtures::select_then_delete(), "DELETE"),
        ("SELECT * FROM orders WHERE 1 = 1 OR dRoP", "DROP"),
        ("SELECT\tid\nFROM orders\nWHERE\tstatus IN (SELECT 1 FROM x UNION TRUNCATE)", "TRUNCATE"),
        ("select id from orders where exists(exec )", "EXEC"),
        ("SELECT GRANT FROM orders", "GRANT"),
    ] {
        assert_eq!(
            reject(sql),
            ValidationError::DestructiveKeyword {
                keyword: keyword.to_string()
            },
            "{sql}"
        );
    }
}

#[test]
fn test_identifiers_containing_keywords_are_fine() {
    let schema = Schema::new().with_table("audit", ["id", "created_at", "updated_by", "dropped"]);
    validator()
        .validate("SELECT created_at, updated_by, dropped FROM audit", &schema)
        .unwrap();
}

#[test]
fn test_stacked_statements() {
    assert_eq!(reject(SqlFixtures::stacked_statements()), ValidationError::MultipleStatements);
    assert_eq!(
        reject("SELECT * FROM orders; DROP TABLE orders"),
        ValidationError::MultipleStatements
    );
}

#[test]
fn test_unknown_table_lists_all_tables() {
    assert_eq!(
        reject(SqlFixtures::unknown_table()),
        ValidationError::UnknownTable {
            table: "invoices".to_string(),
            available: vec![
                "customers".to_string(),
                "orders".to_string(),
                "products".to_string()
            ],
        }
    );
}

#[test]
fn test_unknown_table_in_join_and_subquery() {
    assert!(matches!(
        reject("SELECT * FROM orders o JOIN refunds r ON r.order_id = o.id"),
        ValidationError::UnknownTable { ref table, .. } if table == "refunds"
    ));
    assert!(matches!(
        reject("SELECT id FROM orders WHERE customer_id IN (SELECT id FROM clients)"),
        ValidationError::UnknownTable { ref table, .. } if table == "clients"
    ));
}

#[test]
fn test_unknown_column() {
    let err = reject(SqlFixtures::unknown_column());
    assert_eq!(
        err,
        ValidationError::UnknownColumn {
            column: "discount".to_string(),
            table: Some("orders".to_string()),
            available: ["id", "customer_id", "status", "total", "created_at"]
                .map(String::from)
                .to_vec(),
        }
    );

    assert!(matches!(
        reject("SELECT price FROM customers"),
        ValidationError::UnknownColumn { ref column, table: None, .. } if column == "price"
    ));
}

#[test]
fn test_unbalanced_parentheses() {
    assert!(matches!(
        reject("SELECT COUNT(* FROM orders"),
        ValidationError::ParseError { .. }
    ));
}

#[test]
fn test_non_numeric_limit() {
    assert!(matches!(
        reject("SELECT * FROM orders LIMIT '10'"),
        ValidationError::ParseError { .. }
    ));
}

#[test]
fn test_row_limit_is_configurable() {
    let validator = SqlValidator::with_config(
        Dialect::SQLite,
        ValidatorConfig::default().with_row_limit(25),
    );
    let sql = validator
        .validate("SELECT id FROM orders", &SchemaFixtures::orders_only())
        .unwrap();
    assert_eq!(sql.as_str(), "SELECT id FROM orders LIMIT 25");
}
