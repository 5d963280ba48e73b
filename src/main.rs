use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use donation_backend::api::donations::{self, DonationsState};
use donation_backend::api::users::{self, UsersState};
use donation_backend::cache::store::RedisCache;
use donation_backend::cache::{init_redis_pool, RedisPoolConfig};
use donation_backend::config::AppConfig;
use donation_backend::database::donation_repository::DonationRepository;
use donation_backend::database::init_pool_from_config;
use donation_backend::database::user_repository::UserRepository;
use donation_backend::gateway::kakao_pay::KakaoPayClient;
use donation_backend::health::{HealthChecker, HealthStatus};
use donation_backend::logging::init_tracing;
use donation_backend::middleware::logging::{request_logging_middleware, UuidRequestId};
use donation_backend::services::{AuthService, CheckoutService, SessionCorrelator};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[derive(Clone)]
struct HealthApiState {
    checker: HealthChecker,
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "donation-backend",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

async fn health(State(state): State<HealthApiState>) -> (StatusCode, Json<HealthStatus>) {
    let status = state.checker.check_health().await;
    let code = if status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

async fn health_ready(State(state): State<HealthApiState>) -> StatusCode {
    if state.checker.check_health().await.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn health_live() -> StatusCode {
    StatusCode::OK
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    config.validate()?;

    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "Starting donation backend service"
    );

    info!("Initializing database connection pool...");
    let db_pool = init_pool_from_config(&config.database).await.map_err(|e| {
        error!("Failed to initialize database pool: {}", e);
        anyhow::anyhow!("database pool initialization failed: {}", e)
    })?;
    info!("Database connection pool initialized");

    info!("Initializing Redis session store...");
    let redis_pool = init_redis_pool(RedisPoolConfig {
        redis_url: config.cache.redis_url.clone(),
        max_connections: config.cache.max_connections,
        connection_timeout: Duration::from_secs(5),
    })
    .await
    .map_err(|e| {
        error!("Failed to initialize Redis pool: {}", e);
        anyhow::anyhow!("redis pool initialization failed: {}", e)
    })?;
    info!("Redis session store initialized");

    let health_checker = HealthChecker::new(db_pool.clone(), redis_pool.clone());

    let gateway = KakaoPayClient::new(config.kakao_pay.clone())
        .map_err(|e| anyhow::anyhow!("payment gateway client initialization failed: {}", e))?;
    let correlator = SessionCorrelator::new(
        Arc::new(RedisCache::new(redis_pool.clone())),
        config.cache.session_ttl,
    );
    let checkout = Arc::new(CheckoutService::new(
        Arc::new(DonationRepository::new(db_pool.clone())),
        Arc::new(gateway),
        correlator,
        config.server.public_base_url.clone(),
    ));
    let auth = Arc::new(AuthService::new(UserRepository::new(db_pool.clone())));

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/ready", get(health_ready))
        .route("/health/live", get(health_live))
        .with_state(HealthApiState {
            checker: health_checker,
        })
        .merge(donations::routes(DonationsState { checkout }))
        .merge(users::routes(UsersState { auth }))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        );

    info!("Routes configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "Donation backend listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
