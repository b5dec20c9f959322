//! Route policy enforcement.
//!
//! Each tenant route carries its [`RoutePolicy`] as middleware state, so the
//! checks a route needs are declared next to the route, not inside the
//! handler.

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::MethodRouter,
};
use spendgate_core::access::{RoutePolicy, TenantAccess, VerifiedIdentity, require_role};
use spendgate_core::identity::Role;
use spendgate_shared::{AppError, ErrorCode};

use super::auth::request_path;
use crate::AppState;
use crate::audit;
use crate::error::ApiError;

const PLATFORM: &[Role] = &[Role::SuperAdmin];

/// Guards a method router with a route policy.
pub fn guarded(policy: RoutePolicy, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(policy, enforce))
}

fn gates_missing() -> Response {
    ApiError::from(AppError::new(ErrorCode::MissingToken, "Authentication required"))
        .into_response()
}

/// Runs role, module licence and permission checks, then exposes the tenant
/// context to the handler.
pub async fn enforce(
    State(policy): State<RoutePolicy>,
    mut request: Request,
    next: Next,
) -> Response {
    let extensions = request.extensions();
    let (Some(identity), Some(access)) = (
        extensions.get::<VerifiedIdentity>(),
        extensions.get::<TenantAccess>(),
    ) else {
        return gates_missing();
    };

    match policy.authorize(identity, access) {
        Ok(tenant) => {
            let tenant = tenant.clone();
            request.extensions_mut().insert(tenant);
            next.run(request).await
        }
        Err(e) => {
            audit::denied(Some(identity), &e, &request_path(&request), policy.target());
            ApiError::from(e).into_response()
        }
    }
}

/// Restricts a router to the platform super-admin.
pub async fn platform_only(request: Request, next: Next) -> Response {
    let Some(identity) = request.extensions().get::<VerifiedIdentity>() else {
        return gates_missing();
    };
    if let Err(e) = require_role(identity, PLATFORM) {
        audit::denied(Some(identity), &e, &request_path(&request), None);
        return ApiError::from(e).into_response();
    }
    next.run(request).await
}
