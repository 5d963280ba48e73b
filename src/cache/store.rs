//! Key-value store abstraction with TTL
//!
//! The session correlator only needs three operations: write with TTL,
//! take-once, and delete. Keeping them behind a trait lets the checkout
//! contract be exercised against an in-memory store in tests.

use crate::cache::error::{CacheError, CacheResult};
use crate::cache::RedisPool;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[async_trait]
pub trait Cache: Send + Sync {
    /// Store a value under `key`, expiring after `ttl`.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Atomically read and delete. Returns `None` if the key is absent or
    /// expired; a second take of the same key always returns `None`.
    async fn take(&self, key: &str) -> CacheResult<Option<String>>;

    /// Remove a key if present.
    async fn delete(&self, key: &str) -> CacheResult<()>;
}

/// Redis-backed store
#[derive(Clone)]
pub struct RedisCache {
    pool: RedisPool,
}

impl RedisCache {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.pool.get().await?;
        let () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut *conn)
            .await?;
        Ok(())
    }

    async fn take(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.pool.get().await?;
        // GETDEL keeps read-and-invalidate a single round trip, so two
        // concurrent consumers cannot both observe the value.
        let value: Option<String> = redis::cmd("GETDEL")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.pool.get().await?;
        let () = redis::cmd("DEL").arg(key).query_async(&mut *conn).await?;
        Ok(())
    }
}

/// In-process store with the same TTL and take-once semantics. Used by the
/// test suite; also serves single-process deployments without Redis.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::OperationError(e.to_string()))?;
        entries.insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn take(&self, key: &str) -> CacheResult<Option<String>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::OperationError(e.to_string()))?;
        match entries.remove(key) {
            Some((value, expires_at)) if Instant::now() < expires_at => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::OperationError(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}
