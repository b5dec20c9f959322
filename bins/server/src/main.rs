//! Spendgate API Server
//!
//! Main entry point for the Spendgate backend service.

use std::sync::Arc;

use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use spendgate_api::{AppState, create_router};
use spendgate_core::auth::{hash_password, validate_password_policy};
use spendgate_core::identity::{NewUser, normalize_email};
use spendgate_db::migration::Migrator;
use spendgate_db::{MemoryStore, PgStore, Store, UserStore, connect};
use spendgate_shared::config::{BootstrapConfig, LogFormat};
use spendgate_shared::{AppConfig, TokenConfig, TokenService};

const DEFAULT_FILTER: &str = "spendgate=debug,tower_http=debug";
const PLACEHOLDER_SECRET: &str = "change-me-in-production";

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Creates the platform super-admin if no account with that email exists.
async fn bootstrap_super_admin(store: &dyn Store, bootstrap: &BootstrapConfig) -> anyhow::Result<()> {
    let email = normalize_email(&bootstrap.super_admin_email);
    if store.find_user_by_email(&email).await?.is_some() {
        return Ok(());
    }
    validate_password_policy(&bootstrap.super_admin_password)?;
    let hash = hash_password(&bootstrap.super_admin_password)?;
    let user = store
        .create_platform_user(NewUser::super_admin(&email, hash))
        .await?;
    info!(user_id = %user.id, %email, "super-admin created");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_tracing(config.logging.format);

    if config.jwt.secret == PLACEHOLDER_SECRET {
        warn!("jwt.secret is the placeholder value; set SPENDGATE__JWT__SECRET");
    }

    let store: Arc<dyn Store> = if config.database.is_memory() {
        info!("Using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let db = connect(&config.database).await?;
        info!("Connected to database");
        Migrator::up(&db, None).await?;
        info!("Migrations applied");
        Arc::new(PgStore::new(db))
    };

    if let Some(bootstrap) = &config.bootstrap {
        bootstrap_super_admin(store.as_ref(), bootstrap).await?;
    }

    let tokens = TokenService::new(TokenConfig::try_from(&config.jwt)?);
    let state = AppState::new(store, tokens, config.rate_limit.clone());
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
