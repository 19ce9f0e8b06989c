//! Field Service Billing - API Server Binary
//!
//! # Usage
//!
//! ```bash
//! # In-memory store, default settings
//! cargo run --bin billing-api
//!
//! # PostgreSQL with a custom tax rate
//! API_DATABASE_URL=postgres://... API_BILLING__TAX_RATE=0.2 cargo run --bin billing-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_DATABASE_URL` - PostgreSQL connection string; unset runs in memory
//! * `API_DATABASE_MAX_CONNECTIONS` - Pool size (default: 10)
//! * `API_LOG_LEVEL` - Log filter when `RUST_LOG` is unset (default: info)
//! * `API_LOG_JSON` - Emit JSON log lines (default: false)
//! * `API_BILLING__*` - Billing settings: `TAX_RATE`, `CURRENCY`, `TIMEZONE`,
//!   `DEFAULT_PAYMENT_TERMS_DAYS`, `HOLIDAYS`, `BUSINESS_HOURS_START`, ...

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use core_kernel::{Clock, SystemClock};
use domain_billing::MemoryStore;
use infra_db::{create_pool, run_migrations, PostgresBillingAdapter};
use interface_api::{config::ApiConfig, create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("invalid configuration")?;
    init_tracing(&config.log_level, config.log_json);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        timezone = %config.billing.timezone.0.name(),
        currency = %config.billing.currency.code(),
        "Starting field service billing API"
    );

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid server address {}", config.server_addr()))?;
    let state = build_state(config).await?;
    let app = create_router(state);

    tracing::info!(%addr, "Server listening");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Chooses the store: PostgreSQL when a URL is configured, memory otherwise
async fn build_state(config: ApiConfig) -> anyhow::Result<AppState> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match config.database() {
        Some(db_config) => {
            tracing::info!(max_connections = db_config.max_connections, "Connecting to database");
            let pool = create_pool(db_config)
                .await
                .context("database connection failed")?;
            run_migrations(&pool).await.context("migrations failed")?;
            tracing::info!("Database ready");
            let adapter = Arc::new(PostgresBillingAdapter::new(pool));
            Ok(AppState::new(adapter, clock, config))
        }
        None => {
            tracing::warn!("API_DATABASE_URL not set, using the in-memory store");
            Ok(AppState::new(Arc::new(MemoryStore::new()), clock, config))
        }
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// Waits for Ctrl+C or SIGTERM so in-flight requests can finish
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
