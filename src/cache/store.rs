//! TTL cache with a bounded-entries safety net
//!
//! Expired entries are logically absent: expiry is checked lazily on read
//! and the entry is dropped then. A small LRU bound caps key growth over
//! long process lifetimes. The fallback path may read entries past their
//! TTL through `get_stale`, since stale data beats no data when the call
//! budget is exhausted.

use crate::config::CacheConfig;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;

/// One cached result
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    created_at: DateTime<Utc>,
    ttl_secs: u64,
    /// Monotonic touch counter for LRU eviction
    last_used: u64,
}

impl CacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at < Duration::seconds(self.ttl_secs as i64)
    }
}

/// In-process result cache keyed by request fingerprint
///
/// Not internally synchronized; the orchestrator holds it behind its own
/// mutex, separate from the budget tracker's.
#[derive(Debug)]
pub struct ResultCache {
    config: CacheConfig,
    entries: HashMap<String, CacheEntry>,
    clock: u64,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            clock: 0,
        }
    }

    /// Look up a fresh entry; expired entries are removed and reported as miss
    pub fn get(&mut self, key: &str) -> Option<Value> {
        self.get_at(key, Utc::now())
    }

    /// Clock-injectable variant of [`get`](Self::get)
    pub fn get_at(&mut self, key: &str, now: DateTime<Utc>) -> Option<Value> {
        if !self.config.enabled {
            return None;
        }

        match self.entries.get_mut(key) {
            Some(entry) if entry.is_fresh(now) => {
                self.clock += 1;
                entry.last_used = self.clock;
                Some(entry.value.clone())
            }
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Look up an entry ignoring TTL, for fallback use only
    ///
    /// Returns the value together with its age in seconds so the caller can
    /// label the staleness.
    pub fn get_stale(&self, key: &str) -> Option<(Value, u64)> {
        self.get_stale_at(key, Utc::now())
    }

    /// Clock-injectable variant of [`get_stale`](Self::get_stale)
    pub fn get_stale_at(&self, key: &str, now: DateTime<Utc>) -> Option<(Value, u64)> {
        self.entries.get(key).map(|entry| {
            let age = (now - entry.created_at).num_seconds().max(0) as u64;
            (entry.value.clone(), age)
        })
    }

    /// Store a result under the configured TTL
    pub fn put(&mut self, key: &str, value: Value) {
        let ttl = self.config.ttl_secs;
        self.put_with_ttl(key, value, ttl);
    }

    /// Store a result with an explicit TTL in seconds
    pub fn put_with_ttl(&mut self, key: &str, value: Value, ttl_secs: u64) {
        self.put_with_ttl_at(key, value, ttl_secs, Utc::now());
    }

    /// Clock-injectable variant of [`put_with_ttl`](Self::put_with_ttl)
    pub fn put_with_ttl_at(
        &mut self,
        key: &str,
        value: Value,
        ttl_secs: u64,
        now: DateTime<Utc>,
    ) {
        if !self.config.enabled {
            return;
        }

        self.clock += 1;
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: now,
                ttl_secs,
                last_used: self.clock,
            },
        );

        if self.entries.len() > self.config.max_entries {
            self.evict_lru();
        }
    }

    /// Number of entries currently held, fresh or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_lru(&mut self) {
        if let Some(key) = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_used)
            .map(|(k, _)| k.clone())
        {
            self.entries.remove(&key);
        }
    }
}
