//! Redis-backed ephemeral store
//!
//! Holds the short-lived checkout session correlations. Entries are written
//! with a TTL and consumed at most once; nothing here is durable.

pub mod error;
pub mod keys;
pub mod store;

use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use std::time::Duration;
use tracing::{error, info};

use error::CacheError;

/// Redis connection pool type alias
pub type RedisPool = Pool<RedisConnectionManager>;

/// Redis pool configuration
#[derive(Debug, Clone)]
pub struct RedisPoolConfig {
    pub redis_url: String,
    pub max_connections: u32,
    pub connection_timeout: Duration,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 10,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

/// Initialize the Redis connection pool
pub async fn init_redis_pool(config: RedisPoolConfig) -> Result<RedisPool, CacheError> {
    info!(
        "Initializing Redis pool: max_connections={}, redis_url={}",
        config.max_connections, config.redis_url
    );

    let manager = RedisConnectionManager::new(config.redis_url.clone()).map_err(|e| {
        error!("Failed to create Redis connection manager: {}", e);
        CacheError::ConnectionError(e.to_string())
    })?;

    let pool = Pool::builder()
        .max_size(config.max_connections)
        .connection_timeout(config.connection_timeout)
        .build(manager)
        .await
        .map_err(|e| {
            error!("Failed to build Redis connection pool: {}", e);
            CacheError::ConnectionError(e.to_string())
        })?;

    // The session store is load-bearing for checkout, so unlike a read
    // cache we fail fast when Redis is unreachable.
    health_check(&pool).await?;

    info!("Redis pool initialized successfully");
    Ok(pool)
}

/// Health check for the Redis connection pool
pub async fn health_check(pool: &RedisPool) -> Result<(), CacheError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| CacheError::ConnectionError(e.to_string()))?;

    let _: String = redis::cmd("PING")
        .query_async(&mut *conn)
        .await
        .map_err(|e| CacheError::ConnectionError(e.to_string()))?;

    Ok(())
}
