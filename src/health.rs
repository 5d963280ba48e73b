//! Health check module
//! Provides health status for the application and its dependencies

use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info};

use crate::cache::RedisPool;

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone)]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone)]
pub enum ComponentState {
    Up,
    Down,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            status: HealthState::Healthy,
            checks: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthState::Healthy)
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }
}

/// Health checker over the service's two stateful dependencies: the
/// donation/user database and the Redis session store. The payment provider
/// is deliberately not probed; its availability only matters per checkout.
#[derive(Clone)]
pub struct HealthChecker {
    db_pool: sqlx::PgPool,
    redis_pool: RedisPool,
}

impl HealthChecker {
    pub fn new(db_pool: sqlx::PgPool, redis_pool: RedisPool) -> Self {
        Self {
            db_pool,
            redis_pool,
        }
    }

    /// Perform comprehensive health check
    pub async fn check_health(&self) -> HealthStatus {
        let mut health_status = HealthStatus::new();
        let mut overall_healthy = true;

        match timeout(Duration::from_secs(5), check_database_health(&self.db_pool)).await {
            Ok(Ok(response_time)) => {
                health_status.checks.insert(
                    "database".to_string(),
                    ComponentHealth::up(Some(response_time)),
                );
                info!("Database health check: OK ({}ms)", response_time);
            }
            Ok(Err(e)) => {
                overall_healthy = false;
                health_status
                    .checks
                    .insert("database".to_string(), ComponentHealth::down(Some(e)));
                error!("Database health check failed");
            }
            Err(_) => {
                overall_healthy = false;
                health_status.checks.insert(
                    "database".to_string(),
                    ComponentHealth::down(Some("Timeout".to_string())),
                );
                error!("Database health check timed out");
            }
        }

        match timeout(Duration::from_secs(5), check_cache_health(&self.redis_pool)).await {
            Ok(Ok(response_time)) => {
                health_status.checks.insert(
                    "cache".to_string(),
                    ComponentHealth::up(Some(response_time)),
                );
                info!("Cache health check: OK ({}ms)", response_time);
            }
            Ok(Err(e)) => {
                overall_healthy = false;
                health_status
                    .checks
                    .insert("cache".to_string(), ComponentHealth::down(Some(e)));
                error!("Cache health check failed");
            }
            Err(_) => {
                overall_healthy = false;
                health_status.checks.insert(
                    "cache".to_string(),
                    ComponentHealth::down(Some("Timeout".to_string())),
                );
                error!("Cache health check timed out");
            }
        }

        health_status.status = if overall_healthy {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        };

        health_status
    }
}

pub async fn check_database_health(pool: &sqlx::PgPool) -> Result<u128, String> {
    let start = Instant::now();
    crate::database::health_check(pool)
        .await
        .map(|_| start.elapsed().as_millis())
        .map_err(|e| e.to_string())
}

pub async fn check_cache_health(pool: &RedisPool) -> Result<u128, String> {
    let start = Instant::now();
    crate::cache::health_check(pool)
        .await
        .map(|_| start.elapsed().as_millis())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_health_status_is_healthy_and_empty() {
        let health_status = HealthStatus::new();
        assert!(health_status.is_healthy());
        assert!(health_status.checks.is_empty());
        assert!(health_status.timestamp <= chrono::Utc::now());
    }

    #[test]
    fn component_health_states_carry_timing_and_details() {
        let up = ComponentHealth::up(Some(100));
        assert!(matches!(up.status, ComponentState::Up));
        assert_eq!(up.response_time_ms, Some(100));

        let down = ComponentHealth::down(Some("connection refused".to_string()));
        assert!(matches!(down.status, ComponentState::Down));
        assert_eq!(down.details, Some("connection refused".to_string()));
    }
}
