//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes
//! - The request gates (authentication, tenant isolation, route policy,
//!   rate limit) as middleware
//! - Error responses

pub mod audit;
pub mod error;
pub mod middleware;
pub mod routes;

use axum::Router;
use spendgate_db::Store;
use spendgate_shared::TokenService;
use spendgate_shared::config::RateLimitConfig;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::RateLimiter;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Backing store.
    pub store: Arc<dyn Store>,
    /// Token issuer and verifier.
    pub tokens: Arc<TokenService>,
    /// Per-user request budget.
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Builds the state from its parts.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, tokens: TokenService, rate_limit: RateLimitConfig) -> Self {
        Self {
            store,
            tokens: Arc::new(tokens),
            limiter: Arc::new(RateLimiter::new(rate_limit)),
        }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
