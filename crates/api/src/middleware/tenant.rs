//! Tenant isolation gate.
//!
//! Runs after authentication. The caller's company is loaded fresh from the
//! store on every request; nothing about it is taken from the token.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use spendgate_core::access::{
    AccessError, TenantAccess, TenantContext, VerifiedIdentity, isolate_tenant, tenant_to_load,
};
use spendgate_shared::{AppError, ErrorCode};

use super::auth::request_path;
use crate::AppState;
use crate::audit;
use crate::error::ApiError;

/// Tenant isolation middleware.
///
/// Stores a [`TenantAccess`] in request extensions: a verified tenant for
/// company users, or the platform marker for the super-admin.
pub async fn isolate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let Some(identity) = request.extensions().get::<VerifiedIdentity>().cloned() else {
        return ApiError::from(AppError::new(ErrorCode::MissingToken, "Authentication required"))
            .into_response();
    };

    let access = match load_and_isolate(&state, &identity).await {
        Ok(access) => access,
        Err(GateFailure::Denied(e)) => {
            audit::denied(Some(&identity), &e, &request_path(&request), None);
            return ApiError::from(e).into_response();
        }
        Err(GateFailure::Store(e)) => return e.into_response(),
    };

    request.extensions_mut().insert(access);
    next.run(request).await
}

enum GateFailure {
    Denied(AccessError),
    Store(ApiError),
}

async fn load_and_isolate(
    state: &AppState,
    identity: &VerifiedIdentity,
) -> Result<TenantAccess, GateFailure> {
    let company = match tenant_to_load(identity).map_err(GateFailure::Denied)? {
        Some(company_id) => state
            .store
            .find_company(company_id)
            .await
            .map_err(|e| GateFailure::Store(e.into()))?,
        None => None,
    };
    isolate_tenant(identity, company, Utc::now()).map_err(GateFailure::Denied)
}

/// Extractor for the outcome of the tenant gate.
#[derive(Debug, Clone)]
pub struct Access(pub TenantAccess);

impl<S> FromRequestParts<S> for Access
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantAccess>()
            .cloned()
            .map(Access)
            .ok_or_else(|| AppError::internal("tenant gate did not run").into())
    }
}

/// Extractor for the tenant context of a route that passed its policy.
///
/// Only the route policy middleware inserts a [`TenantContext`], so a handler
/// taking this extractor cannot run unguarded.
#[derive(Debug, Clone)]
pub struct Tenant(pub TenantContext);

impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .map(Tenant)
            .ok_or_else(|| AppError::internal("route policy did not run").into())
    }
}
