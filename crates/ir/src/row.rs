// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Uniform row shape returned by every backend

use serde_json::{Map, Value};

/// One result row: column name → value, in select-list order
pub type Row = Map<String, Value>;

/// Build a row from `(column, value)` pairs
pub fn row_from_pairs<I, K>(pairs: I) -> Row
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
