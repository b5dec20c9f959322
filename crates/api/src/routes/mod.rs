//! API route definitions.

use axum::{Json, Router, middleware};
use serde::Serialize;
use spendgate_shared::AppError;

use crate::AppState;
use crate::middleware::{authenticate, isolate, rate_limit};

pub mod analytics;
pub mod auth;
pub mod companies;
pub mod health;
pub mod trade_spends;
pub mod users;

/// The only routes reachable without a token. Everything else under
/// `/api/v1` passes the authentication gate.
pub const PUBLIC_ROUTES: [(&str, &str); 4] = [
    ("GET", "/api/v1/health"),
    ("POST", "/api/v1/auth/login"),
    ("POST", "/api/v1/auth/register"),
    ("POST", "/api/v1/auth/refresh"),
];

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct Success<T> {
    /// Always true.
    pub success: bool,
    /// Payload.
    pub data: T,
}

/// Wraps a payload in the success envelope.
pub fn ok<T: Serialize>(data: T) -> Json<Success<T>> {
    Json(Success {
        success: true,
        data,
    })
}

/// Rejects domains outside lowercase letters, digits, hyphens and dots.
pub(crate) fn check_domain(domain: &str) -> Result<(), AppError> {
    let valid = !domain.is_empty()
        && domain
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(AppError::validation(
            "domain may only contain lowercase letters, digits, hyphens and dots",
        ))
    }
}

/// Creates the API router: the public allow-list plus every protected route.
///
/// Protected routes run authenticate, then the rate limit, then tenant
/// isolation, then each route's own policy.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes(state: AppState) -> Router<AppState> {
    let public_routes = Router::new()
        .merge(health::routes())
        .merge(auth::public_routes());

    let protected_routes = Router::new()
        .merge(auth::protected_routes())
        .merge(users::routes())
        .merge(trade_spends::routes())
        .merge(analytics::routes())
        .nest("/super-admin", companies::routes())
        .layer(middleware::from_fn_with_state(state.clone(), isolate))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(middleware::from_fn_with_state(state, authenticate));

    Router::new().merge(public_routes).merge(protected_routes)
}
