//! Travel back-office API server
//!
//! # Usage
//!
//! ```bash
//! API_DATABASE_URL=postgres://... API_WEBHOOK_SECRET=whsec_... cargo run --bin travel-backoffice-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` / `API_PORT` - Bind address (default: 0.0.0.0:8080)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_DATABASE_URL` - PostgreSQL connection string
//! * `API_LOG_LEVEL` - Log level when `RUST_LOG` is unset (default: info)
//! * `API_WEBHOOK_SECRET` / `API_WEBHOOK_TOLERANCE_SECS` - Gateway signature checking
//! * `API_GATEWAY_PROVIDER` / `API_GATEWAY_BASE_URL` / `API_GATEWAY_API_KEY` - Payment gateway
//! * `API_PLATFORM_BASE_URL` / `API_PLATFORM_API_KEY` - Itineraries, email and PDF rendering
//! * `API_MAX_CONCURRENCY_RETRIES` - Attempts on optimistic-concurrency conflicts (default: 3)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use app_services::{Collaborators, FinancialServices, ServiceContext};
use core_kernel::{Clock, SystemClock};
use domain_reconciliation::{HttpGatewayConfig, HttpPaymentGateway, WebhookVerifier};
use domain_sequence::SequenceAllocator;
use infra_db::{
    create_pool, run_migrations, DatabaseConfig, PostgresCounterStore, PostgresFinancialStore,
    PostgresTenantDirectory,
};
use interface_api::collaborators::{PlatformClient, PlatformConfig};
use interface_api::{config::ApiConfig, create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("failed to read API_* configuration")?;
    init_tracing(&config.log_level);
    config.validate().context("invalid configuration")?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        gateway = %config.gateway_provider,
        "Starting travel back-office API server"
    );

    let pool = create_pool(DatabaseConfig::new(config.database_url.clone()))
        .await
        .context("failed to connect to database")?;
    run_migrations(&pool).await.context("failed to apply migrations")?;

    let store = Arc::new(PostgresFinancialStore::new(pool.clone()));
    let tenants = Arc::new(PostgresTenantDirectory::new(pool.clone()));
    let counters = Arc::new(PostgresCounterStore::new(pool));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let gateway = Arc::new(
        HttpPaymentGateway::new(HttpGatewayConfig {
            provider: config.gateway_provider.clone(),
            base_url: config.gateway_base_url.clone(),
            api_key: config.gateway_api_key.clone(),
        })
        .context("failed to build payment gateway client")?,
    );
    let platform = Arc::new(
        PlatformClient::new(PlatformConfig {
            base_url: config.platform_base_url.clone(),
            api_key: config.platform_api_key.clone(),
        })
        .context("failed to build platform client")?,
    );

    let ctx = ServiceContext::new(
        store.clone(),
        tenants.clone(),
        SequenceAllocator::new(tenants, counters),
        clock.clone(),
    )
    .with_max_conflict_retries(config.max_concurrency_retries);
    let services = FinancialServices::new(
        ctx,
        Collaborators {
            itineraries: platform.clone(),
            mailer: platform.clone(),
            renderer: platform.clone(),
            gateway: gateway.clone(),
        },
        WebhookVerifier::new(config.webhook_secret.clone(), config.webhook_tolerance_secs),
    );

    let state = AppState::new(services, config.clone(), clock)
        .with_readiness_check(store)
        .with_readiness_check(gateway)
        .with_readiness_check(platform);
    let app = create_router(state);

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server_addr()))?;
    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Resolves on Ctrl+C or SIGTERM so in-flight requests can finish
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
