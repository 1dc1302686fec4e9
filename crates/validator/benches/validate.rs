// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Validator throughput

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use sqlgate_ir::Dialect;
use sqlgate_test_utils::{SchemaFixtures, SqlFixtures};
use sqlgate_validator::SqlValidator;

fn bench_validate(c: &mut Criterion) {
    let schema = SchemaFixtures::shop();
    let validator = SqlValidator::new(Dialect::SQLite);

    let mut group = c.benchmark_group("validate");
    for (name, sql) in [
        ("simple_select", SqlFixtures::simple_select()),
        ("aliased_join", SqlFixtures::aliased_join()),
        ("subquery", SqlFixtures::subquery()),
        ("rejected_unknown_table", SqlFixtures::unknown_table()),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| validator.validate(black_box(sql), black_box(&schema)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_validate);
criterion_main!(benches);
