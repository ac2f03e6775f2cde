//! TTL result cache for transport calls
//!
//! Entries are keyed by method name plus canonicalized params and expire
//! lazily: an expired entry is only removed when a `get` touches it. There is
//! no background sweeper, so entries that are never read again stay in memory
//! until `clear()` or process exit. Key space is bounded by the distinct
//! (file, node, tool) triples a process asks for.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::TransportError;
use crate::protocol::RpcResponse;
use crate::transport::{RpcReply, RpcTransport};

/// Cache statistics
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct CacheStats {
    /// Entries currently stored (expired-but-unread entries included)
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    /// hits / (hits + misses), 0.0 before any lookup
    pub hit_rate: f64,
}

/// Storage capability used by `CachedTransport`
pub trait Cache: Send + Sync {
    /// Stored value if present and not expired; expired entries are removed
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, data: Value, ttl: Duration);

    fn clear(&self);

    fn stats(&self) -> CacheStats;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) <= self.ttl
    }
}

/// In-process cache guarded by a mutex
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A panic while holding the lock cannot leave a half-written entry
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries();
        let now = Instant::now();

        let found = match entries.get(key) {
            Some(entry) if entry.is_fresh(now) => Some(entry.data.clone()),
            Some(_) => {
                debug!("Cache entry {} expired, evicting", key);
                entries.remove(key);
                None
            }
            None => None,
        };

        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn set(&self, key: &str, data: Value, ttl: Duration) {
        self.entries().insert(
            key.to_string(),
            CacheEntry {
                data,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    fn clear(&self) {
        self.entries().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            size: self.entries().len(),
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }
}

/// Deterministic key for a call: method plus params with object keys sorted
pub fn cache_key(method: &str, params: &Value) -> String {
    fn canonical(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let mut sorted = serde_json::Map::new();
                for key in keys {
                    sorted.insert(key.clone(), canonical(&map[key]));
                }
                Value::Object(sorted)
            }
            Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
            other => other.clone(),
        }
    }

    format!("{method}:{}", canonical(params))
}

/// Transport decorator that memoizes successful responses
pub struct CachedTransport<T> {
    inner: T,
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl<T: RpcTransport> CachedTransport<T> {
    pub fn new(inner: T, cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: RpcTransport> RpcTransport for CachedTransport<T> {
    async fn call(
        &self,
        method: &str,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<RpcReply, TransportError> {
        let key = cache_key(method, &params);

        if let Some(stored) = self.cache.get(&key) {
            if let Ok(response) = serde_json::from_value::<RpcResponse>(stored) {
                debug!("Cache hit for {}", key);
                return Ok(RpcReply {
                    response,
                    retries: 0,
                    cached: true,
                });
            }
        }

        let reply = self.inner.call(method, params, cancel).await?;
        if !reply.response.is_error() {
            match serde_json::to_value(&reply.response) {
                Ok(stored) => self.cache.set(&key, stored, self.ttl),
                Err(e) => debug!("Not caching {}: {}", key, e),
            }
        }
        Ok(reply)
    }

    async fn test_connection(&self) -> bool {
        self.inner.test_connection().await
    }
}
