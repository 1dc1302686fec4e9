// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Testing utilities for sqlgate
//!
//! This crate provides common testing components including:
//! - An in-memory mock backend with failure injection
//! - YAML-described fixture databases
//! - Sample SQL and schemas
//! - Tracing setup for test output

pub mod fixtures;
pub mod mock_backend;

use std::sync::Once;

use tracing_subscriber::{EnvFilter, FmtSubscriber};

// Re-exports for convenience
pub use fixtures::{
    DatabaseFixture, FixtureError, SHOP_FIXTURE, SchemaFixtures, SqlFixtures, shop_backend,
    shop_fixture,
};
pub use mock_backend::{MockBackend, MockBackendBuilder, MockConnection, MockTable};

static TRACING: Once = Once::new();

/// Install a test-friendly tracing subscriber once per process
///
/// Output is captured by the test harness and filtered by `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
