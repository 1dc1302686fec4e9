// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Query result cache
//!
//! Maps `(SQL, database identifier)` to result rows with a TTL and an LRU
//! bound on the number of entries.
//!
//! Keys are the SHA-256 of `"<db>:<normalized sql>"`, where normalization
//! lower-cases the text and collapses whitespace, so `SELECT  1` and
//! `select 1` share an entry.
//!
//! Recency is tracked with a queue of `(key, tick)` pairs. A hit pushes a new
//! pair instead of moving the old one; stale pairs are skipped when the queue
//! is popped for eviction and dropped when the queue grows past twice the
//! entry count.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlgate_ir::Row;
use tokio::time::Instant;
use tracing::debug;

use crate::config::CacheConfig;

/// Cache key for `sql` against database `db`
pub fn cache_key(sql: &str, db: &str) -> String {
    let normalized = sql.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    let mut hasher = Sha256::new();
    hasher.update(db.as_bytes());
    hasher.update(b":");
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Statistics for the cache
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Current number of entries
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped to make room
    pub evictions: u64,
    /// Entries dropped because they outlived the TTL
    pub expirations: u64,
    /// Hit rate percentage, rounded to two decimals
    pub hit_rate: f64,
    pub ttl_seconds: u64,
}

struct CacheEntry {
    rows: Arc<Vec<Row>>,
    db: String,
    created_at: Instant,
    tick: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    recency: VecDeque<(String, u64)>,
    next_tick: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    fn touch(&mut self, key: String, tick: u64) {
        self.recency.push_back((key, tick));
        if self.recency.len() > 2 * self.entries.len() + 16 {
            let entries = &self.entries;
            self.recency
                .retain(|(k, t)| entries.get(k).is_some_and(|e| e.tick == *t));
        }
    }

    /// Remove the least recently used entry
    fn evict_lru(&mut self) -> bool {
        while let Some((key, tick)) = self.recency.pop_front() {
            if self.entries.get(&key).is_some_and(|e| e.tick == tick) {
                self.entries.remove(&key);
                return true;
            }
        }
        false
    }
}

/// Thread-safe TTL + LRU result cache
pub struct QueryCache {
    max_size: usize,
    ttl: Duration,
    state: Mutex<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl QueryCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            max_size,
            ttl,
            state: Mutex::new(CacheState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_size, config.ttl)
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached rows for `sql`, if present and younger than the TTL
    pub fn get(&self, sql: &str, db: &str) -> Option<Arc<Vec<Row>>> {
        let key = cache_key(sql, db);
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let expired = match state.entries.get(&key) {
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Some(entry) => entry.created_at.elapsed() > self.ttl,
        };

        if expired {
            state.entries.remove(&key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let tick = state.tick();
        let entry = state.entries.get_mut(&key)?;
        entry.tick = tick;
        let rows = entry.rows.clone();
        state.touch(key, tick);

        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(rows)
    }

    /// Store `rows` for `sql`, evicting the least recently used entry when full
    pub fn set(&self, sql: &str, rows: Arc<Vec<Row>>, db: &str) {
        if self.max_size == 0 {
            return;
        }

        let key = cache_key(sql, db);
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if !state.entries.contains_key(&key) {
            while state.entries.len() >= self.max_size && state.evict_lru() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        let tick = state.tick();
        state.entries.insert(
            key.clone(),
            CacheEntry {
                rows,
                db: db.to_string(),
                created_at: Instant::now(),
                tick,
            },
        );
        state.touch(key, tick);
    }

    /// Drop every entry, or only those of database `db`; returns the number removed
    pub fn invalidate(&self, db: Option<&str>) -> usize {
        let mut state = self.state.lock();
        let before = state.entries.len();

        match db {
            None => {
                state.entries.clear();
                state.recency.clear();
            }
            Some(db) => state.entries.retain(|_, entry| entry.db != db),
        }

        let removed = before - state.entries.len();
        debug!(db = ?db, removed, "Query cache invalidated");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64 * 10_000.0).round() / 100.0
        };

        CacheStats {
            size: self.len(),
            max_size: self.max_size,
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            hit_rate,
            ttl_seconds: self.ttl.as_secs(),
        }
    }

    /// Zero the counters; entries are kept
    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlgate_ir::row_from_pairs;

    fn rows(n: i64) -> Arc<Vec<Row>> {
        Arc::new((0..n).map(|i| row_from_pairs([("n", json!(i))])).collect())
    }

    #[test]
    fn test_key_normalizes_case_and_whitespace() {
        assert_eq!(
            cache_key("SELECT  *\n FROM orders", "shop.db"),
            cache_key("select * from ORDERS", "shop.db")
        );
        assert_ne!(
            cache_key("SELECT 1", "shop.db"),
            cache_key("SELECT 1", "other.db")
        );
        assert_eq!(cache_key("SELECT 1", "db").len(), 64);
    }

    #[tokio::test]
    async fn test_round_trip() {
        let cache = QueryCache::new(10, Duration::from_secs(60));
        assert!(cache.get("SELECT 1", "db").is_none());

        cache.set("SELECT 1", rows(2), "db");
        let cached = cache.get("select   1", "db").unwrap();
        assert_eq!(cached.len(), 2);
        assert!(cache.get("SELECT 1", "other").is_none());

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 2));
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hit_rate, 33.33);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = QueryCache::new(10, Duration::from_secs(300));
        cache.set("SELECT 1", rows(1), "db");

        tokio::time::advance(Duration::from_secs(300)).await;
        assert!(cache.get("SELECT 1", "db").is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("SELECT 1", "db").is_none());

        let stats = cache.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.size, 0);
    }

    #[tokio::test]
    async fn test_capacity_plus_one_evicts_lru() {
        let cache = QueryCache::new(3, Duration::from_secs(60));
        cache.set("SELECT 1", rows(1), "db");
        cache.set("SELECT 2", rows(1), "db");
        cache.set("SELECT 3", rows(1), "db");

        // touching 1 makes 2 the least recently used
        assert!(cache.get("SELECT 1", "db").is_some());
        cache.set("SELECT 4", rows(1), "db");

        assert_eq!(cache.len(), 3);
        assert!(cache.get("SELECT 2", "db").is_none());
        assert!(cache.get("SELECT 1", "db").is_some());
        assert!(cache.get("SELECT 3", "db").is_some());
        assert!(cache.get("SELECT 4", "db").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_overwrite_does_not_evict() {
        let cache = QueryCache::new(2, Duration::from_secs(60));
        cache.set("SELECT 1", rows(1), "db");
        cache.set("SELECT 2", rows(1), "db");
        cache.set("SELECT 1", rows(5), "db");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("SELECT 1", "db").unwrap().len(), 5);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[tokio::test]
    async fn test_recency_queue_stays_bounded() {
        let cache = QueryCache::new(2, Duration::from_secs(60));
        cache.set("SELECT 1", rows(1), "db");
        for _ in 0..1000 {
            cache.get("SELECT 1", "db");
        }
        assert!(cache.state.lock().recency.len() <= 2 * 1 + 16 + 1);
    }

    #[tokio::test]
    async fn test_invalidate_by_database() {
        let cache = QueryCache::new(10, Duration::from_secs(60));
        cache.set("SELECT 1", rows(1), "a");
        cache.set("SELECT 2", rows(1), "a");
        cache.set("SELECT 1", rows(1), "b");

        assert_eq!(cache.invalidate(Some("a")), 2);
        assert!(cache.get("SELECT 1", "b").is_some());
        assert_eq!(cache.invalidate(None), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_reset_stats_keeps_entries() {
        let cache = QueryCache::new(10, Duration::from_secs(60));
        cache.set("SELECT 1", rows(1), "db");
        cache.get("SELECT 1", "db");
        cache.get("SELECT 2", "db");

        cache.reset_stats();
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.hit_rate), (0, 0, 0.0));
        assert_eq!(stats.size, 1);
        assert_eq!(stats.ttl_seconds, 60);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = QueryCache::new(0, Duration::from_secs(60));
        cache.set("SELECT 1", rows(1), "db");
        assert!(cache.is_empty());
    }
}
