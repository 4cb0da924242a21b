//! Response cache for ranked classification results.
//!
//! Entries are keyed by a request fingerprint (see [`cache_key`]), expire
//! after a per-entry TTL, and are evicted in insertion order once the cache
//! is full. Insertion order rather than recency keeps eviction a single
//! queue pop.
//!
//! Cache operations never fail from the caller's point of view: internal
//! faults are logged and counted, then treated as a miss or a no-op.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::Fault;
use crate::models::ScoredResult;
use crate::terms::normalize_text;

/// Fingerprint of `(company scope, normalised request text)`.
///
/// Requests without a company share the `"general"` scope.
pub fn cache_key(company_id: Option<&str>, raw_text: &str) -> String {
    let scope = company_id.unwrap_or("general");
    let mut hasher = Sha256::new();
    hasher.update(scope.as_bytes());
    hasher.update([0u8]);
    hasher.update(normalize_text(raw_text).as_bytes());
    hex::encode(hasher.finalize())
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub faults: u64,
    pub len: usize,
}

/// Pluggable response cache. Implementations must swallow their own
/// failures.
pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<ScoredResult>>;
    fn set(&self, key: &str, value: Vec<ScoredResult>, ttl: Duration);
    fn delete(&self, key: &str);
    fn stats(&self) -> CacheStats;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<ScoredResult>,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    /// Keys in insertion order, oldest first.
    order: VecDeque<String>,
}

impl Inner {
    fn remove(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
            true
        } else {
            false
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    faults: AtomicU64,
}

/// Bounded in-process cache behind a single mutex.
///
/// The lock is never held across an `.await`.
pub struct InMemoryResponseCache {
    max_size: usize,
    inner: Mutex<Inner>,
    counters: Counters,
}

impl InMemoryResponseCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size: max_size.max(1),
            inner: Mutex::new(Inner::default()),
            counters: Counters::default(),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn fault(&self, op: &str) {
        self.counters.faults.fetch_add(1, Ordering::Relaxed);
        let fault = Fault::CacheFault(format!("{} failed: lock poisoned", op));
        warn!(error = %fault, "response cache degraded");
    }
}

impl ResponseCache for InMemoryResponseCache {
    fn get(&self, key: &str) -> Option<Vec<ScoredResult>> {
        let Ok(mut inner) = self.inner.lock() else {
            self.fault("get");
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let now = Instant::now();
        let expired = match inner.entries.get(key) {
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            inner.remove(key);
            self.counters.expirations.fetch_add(1, Ordering::Relaxed);
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            debug!(key, "cache entry expired");
            return None;
        }

        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        inner.entries.get(key).map(|e| e.value.clone())
    }

    fn set(&self, key: &str, value: Vec<ScoredResult>, ttl: Duration) {
        let Ok(mut inner) = self.inner.lock() else {
            self.fault("set");
            return;
        };

        // Replacement counts as a fresh insertion.
        inner.remove(key);

        if inner.entries.len() >= self.max_size {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(key = %oldest, "cache evicted oldest entry");
            }
        }

        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
        inner.order.push_back(key.to_string());
        self.counters.inserts.fetch_add(1, Ordering::Relaxed);
    }

    fn delete(&self, key: &str) {
        let Ok(mut inner) = self.inner.lock() else {
            self.fault("delete");
            return;
        };
        inner.remove(key);
    }

    fn stats(&self) -> CacheStats {
        let len = match self.inner.lock() {
            Ok(inner) => inner.entries.len(),
            Err(_) => 0,
        };
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            inserts: self.counters.inserts.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            faults: self.counters.faults.load(Ordering::Relaxed),
            len,
        }
    }
}

/// Cache that stores nothing. Used when `[cache] enabled = false`.
pub struct NoCache;

impl ResponseCache for NoCache {
    fn get(&self, _key: &str) -> Option<Vec<ScoredResult>> {
        None
    }

    fn set(&self, _key: &str, _value: Vec<ScoredResult>, _ttl: Duration) {}

    fn delete(&self, _key: &str) {}

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}
