// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Integration tests for the connection pool and schema catalog

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use sqlgate_catalog::{
    Backend, CatalogError, ConnectionPool, DbConnection, PoolConfig, SchemaCatalog,
};
use sqlgate_ir::{ValueConstraint, row_from_pairs};
use sqlgate_test_utils::{MockBackend, MockBackendBuilder, init_tracing, shop_backend};

async fn pool_over(backend: &MockBackend, config: PoolConfig) -> ConnectionPool {
    let backend: Arc<dyn Backend> = Arc::new(backend.clone());
    ConnectionPool::new(backend, config).await.unwrap()
}

// ===== Connection pool =====

#[tokio::test]
async fn test_pool_opens_connections_eagerly() {
    let backend = shop_backend();
    let pool = pool_over(&backend, PoolConfig::new(4)).await;

    assert_eq!(backend.connections_opened(), 4);
    let stats = pool.stats();
    assert_eq!(stats.size, 4);
    assert_eq!(stats.idle, 4);
    assert_eq!(stats.temporary_opened, 0);
}

#[tokio::test]
async fn test_pool_rejects_zero_size() {
    let backend: Arc<dyn Backend> = Arc::new(shop_backend());
    let result = ConnectionPool::new(backend, PoolConfig::new(0)).await;
    assert!(matches!(result, Err(CatalogError::ConfigurationError(_))));
}

#[tokio::test]
async fn test_pool_construction_failure_is_fatal() {
    let backend = shop_backend();
    backend.set_refuse_connections(true);
    let shared: Arc<dyn Backend> = Arc::new(backend.clone());

    let result = ConnectionPool::new(shared, PoolConfig::new(2)).await;
    assert!(matches!(result, Err(CatalogError::ConnectionFailed(_))));
}

#[tokio::test(start_paused = true)]
async fn test_pool_size_concurrent_acquires_do_not_block() {
    init_tracing();
    let backend = shop_backend();
    let pool = pool_over(&backend, PoolConfig::new(3)).await;

    let started = tokio::time::Instant::now();
    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    let c = pool.acquire().await.unwrap();

    assert_eq!(started.elapsed(), Duration::ZERO);
    assert!(!a.is_temporary() && !b.is_temporary() && !c.is_temporary());
    assert_eq!(pool.stats().idle, 0);
}

#[tokio::test(start_paused = true)]
async fn test_pool_exhaustion_falls_back_to_temporary_connection() {
    init_tracing();
    let backend = shop_backend();
    let config = PoolConfig::new(2).with_acquire_timeout(Duration::from_secs(5));
    let pool = pool_over(&backend, config).await;

    let _a = pool.acquire().await.unwrap();
    let _b = pool.acquire().await.unwrap();

    let started = tokio::time::Instant::now();
    let mut extra = pool.acquire().await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert!(extra.is_temporary());

    // The temporary connection is fully usable
    let rows = extra.fetch_rows("SELECT * FROM customers").await.unwrap();
    assert_eq!(rows.len(), 3);

    let stats = pool.stats();
    assert_eq!(stats.temporary_in_use, 1);
    assert_eq!(stats.temporary_opened, 1);

    drop(extra);
    assert_eq!(pool.stats().temporary_in_use, 0);
    assert_eq!(backend.connections_opened(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_pool_overflow_cap() {
    let backend = shop_backend();
    let config = PoolConfig::new(1)
        .with_acquire_timeout(Duration::from_millis(100))
        .with_max_overflow(1);
    let pool = pool_over(&backend, config).await;

    let _pooled = pool.acquire().await.unwrap();
    let temporary = pool.acquire().await.unwrap();
    assert!(temporary.is_temporary());

    let rejected = pool.acquire().await;
    assert!(matches!(rejected, Err(CatalogError::PoolExhausted(1))));

    drop(temporary);
    assert!(pool.acquire().await.unwrap().is_temporary());
}

#[tokio::test]
async fn test_release_returns_connection_to_pool() {
    let backend = shop_backend();
    let pool = pool_over(&backend, PoolConfig::new(1)).await;

    {
        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(pool.stats().idle, 0);
        let _ = conn.fetch_rows("SELECT * FROM orders").await.unwrap();
    }
    assert_eq!(pool.stats().idle, 1);

    // Released on the error path too
    {
        let mut conn = pool.acquire().await.unwrap();
        assert!(conn.fetch_rows("SELECT nothing FROM nowhere").await.is_err());
    }
    assert_eq!(pool.stats().idle, 1);
    assert_eq!(backend.connections_opened(), 1);
}

#[tokio::test]
async fn test_waiter_gets_released_connection() {
    let backend = shop_backend();
    let config = PoolConfig::new(1).with_acquire_timeout(Duration::from_secs(30));
    let pool = pool_over(&backend, config).await;

    let held = pool.acquire().await.unwrap();
    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await.map(|c| c.is_temporary()) })
    };

    tokio::task::yield_now().await;
    drop(held);

    let is_temporary = waiter.await.unwrap().unwrap();
    assert!(!is_temporary);
}

#[tokio::test]
async fn test_close_all_is_idempotent() {
    let backend = shop_backend();
    let pool = pool_over(&backend, PoolConfig::new(3)).await;

    let checked_out = pool.acquire().await.unwrap();

    pool.close_all().await;
    pool.close_all().await;

    assert!(pool.is_closed());
    assert_eq!(backend.connections_closed(), 2);
    assert!(matches!(pool.acquire().await, Err(CatalogError::PoolClosed)));

    // Connections released after shutdown are not returned to the free set
    drop(checked_out);
    assert_eq!(pool.stats().idle, 0);
}

// ===== Schema catalog =====

#[tokio::test]
async fn test_get_schema_lists_tables_and_columns() {
    let backend = shop_backend();
    let catalog = SchemaCatalog::new(pool_over(&backend, PoolConfig::new(1)).await);

    let schema = catalog.get_schema(false).await.unwrap();
    assert_eq!(schema.table_names(), vec!["customers", "orders", "products"]);
    assert_eq!(
        schema.columns("orders").unwrap(),
        ["id", "customer_id", "status", "total", "created_at"]
    );
}

#[tokio::test]
async fn test_schema_names_are_lowercased() {
    let backend = MockBackendBuilder::new()
        .with_table("Invoices", &[("ID", "INTEGER"), ("DueDate", "DATE")])
        .build();
    let catalog = SchemaCatalog::new(pool_over(&backend, PoolConfig::new(1)).await);

    let schema = catalog.get_schema(false).await.unwrap();
    assert!(schema.has_column("invoices", "duedate"));
}

#[tokio::test(start_paused = true)]
async fn test_schema_is_cached_until_ttl() {
    let backend = shop_backend();
    let pool = pool_over(&backend, PoolConfig::new(1)).await;
    let catalog = SchemaCatalog::with_ttl(pool, Duration::from_secs(60));

    catalog.get_schema(false).await.unwrap();
    catalog.get_schema(false).await.unwrap();
    assert_eq!(backend.table_listings(), 1);

    tokio::time::advance(Duration::from_secs(61)).await;
    catalog.get_schema(false).await.unwrap();
    assert_eq!(backend.table_listings(), 2);

    catalog.get_schema(true).await.unwrap();
    assert_eq!(backend.table_listings(), 3);

    catalog.invalidate();
    catalog.get_schema(false).await.unwrap();
    assert_eq!(backend.table_listings(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_refresh_runs_once() {
    let backend = MockBackendBuilder::new()
        .with_table("orders", &[("id", "INTEGER")])
        .with_latency(Duration::from_millis(50))
        .build();
    let pool = pool_over(&backend, PoolConfig::new(4)).await;
    let catalog = Arc::new(SchemaCatalog::new(pool));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let catalog = catalog.clone();
            tokio::spawn(async move { catalog.get_schema(false).await })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }

    assert_eq!(backend.table_listings(), 1);
}

#[tokio::test]
async fn test_schema_unavailable() {
    let backend = shop_backend();
    let catalog = SchemaCatalog::new(pool_over(&backend, PoolConfig::new(1)).await);

    backend.set_unavailable(true);
    let result = catalog.get_schema(false).await;
    assert!(matches!(result, Err(CatalogError::Unavailable(_))));

    backend.set_unavailable(false);
    assert!(catalog.get_schema(false).await.is_ok());
}

#[tokio::test]
async fn test_detailed_schema_classifies_values() {
    let backend = shop_backend();
    let catalog = SchemaCatalog::new(pool_over(&backend, PoolConfig::new(1)).await);

    let detailed = catalog.get_detailed_schema().await.unwrap();

    let status = detailed.column("orders", "status").unwrap();
    assert_eq!(
        status.value_constraint,
        Some(ValueConstraint::Enumerated(vec![
            json!("shipped"),
            json!("pending"),
            json!("cancelled"),
        ]))
    );

    let id = detailed.column("customers", "id").unwrap();
    assert!(id.is_primary_key);

    // Empty table: no observed values, no constraint
    let price = detailed.column("products", "price").unwrap();
    assert_eq!(price.value_constraint, None);

    assert_eq!(detailed.foreign_keys.len(), 1);
    let fk = &detailed.foreign_keys[0];
    assert_eq!(fk.from.to_string(), "orders.customer_id");
    assert_eq!(fk.to.to_string(), "customers.id");
}

#[tokio::test]
async fn test_detailed_schema_high_cardinality_uses_examples() {
    let rows = (0..30)
        .map(|i| row_from_pairs([("code", json!(format!("c{:02}", i)))]))
        .collect();
    let backend = MockBackendBuilder::new()
        .with_table("codes", &[("code", "TEXT")])
        .with_rows("codes", rows)
        .build();
    let catalog = SchemaCatalog::new(pool_over(&backend, PoolConfig::new(1)).await);

    let detailed = catalog.get_detailed_schema().await.unwrap();
    let code = detailed.column("codes", "code").unwrap();
    assert_eq!(
        code.value_constraint,
        Some(ValueConstraint::Examples(vec![json!("c00"), json!("c01"), json!("c02")]))
    );
}

#[tokio::test]
async fn test_detailed_schema_degrades_on_partial_failures() {
    init_tracing();
    let backend = MockBackendBuilder::new()
        .with_table("good", &[("id", "INTEGER"), ("kind", "TEXT")])
        .with_rows("good", vec![row_from_pairs([("id", json!(1)), ("kind", json!("a"))])])
        .with_table("broken", &[("id", "INTEGER")])
        .with_failing_columns("broken")
        .with_failing_probe("good", "kind")
        .with_failing_foreign_keys("good")
        .build();
    let catalog = SchemaCatalog::new(pool_over(&backend, PoolConfig::new(1)).await);

    let detailed = catalog.get_detailed_schema().await.unwrap();

    assert!(detailed.columns("broken").is_none());
    assert_eq!(detailed.column("good", "kind").unwrap().value_constraint, None);
    assert!(detailed.column("good", "id").unwrap().value_constraint.is_some());
    assert!(detailed.foreign_keys.is_empty());
}

#[tokio::test]
async fn test_detailed_schema_renders_prompt_format() {
    let backend = shop_backend();
    let catalog = SchemaCatalog::new(pool_over(&backend, PoolConfig::new(1)).await);

    let rendered = catalog.get_detailed_schema().await.unwrap().to_string();
    assert!(rendered.contains("customers: id:INTEGER*PK"));
    assert!(rendered.contains("status:VARCHAR(16) ∈ ['shipped', 'pending', 'cancelled']"));
    assert!(rendered.contains("FK: orders.customer_id -> customers.id"));
}
