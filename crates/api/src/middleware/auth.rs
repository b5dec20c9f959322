//! Authentication gate for protected routes.

use axum::{
    extract::{FromRequestParts, OriginalUri, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use spendgate_core::access::{VerifiedIdentity, verify_session};
use spendgate_shared::{AppError, ErrorCode, TokenKind};
use spendgate_shared::types::UserId;

use crate::AppState;
use crate::audit;
use crate::error::ApiError;

/// Extracts the bearer token from the Authorization header.
pub(crate) fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Request path as the client sent it, before any nesting was stripped.
pub(crate) fn request_path(request: &Request) -> String {
    request
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| request.uri().path().to_string(), |uri| uri.path().to_string())
}

/// Authentication middleware.
///
/// This middleware:
/// 1. Extracts the Bearer token from the Authorization header
/// 2. Verifies signature, expiry and token type before touching storage
/// 3. Loads the live user and checks it against the claims
/// 4. Stores the [`VerifiedIdentity`] in request extensions
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request_path(&request);

    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(extract_bearer_token);
    let Some(token) = token else {
        return ApiError::from(AppError::new(
            ErrorCode::MissingToken,
            "Authorization header with Bearer token is required",
        ))
        .into_response();
    };

    let claims = match state.tokens.validate_kind(token, TokenKind::Access) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, %path, "token rejected");
            return ApiError::from(e).into_response();
        }
    };

    let user = match state.store.find_user(UserId::from_uuid(claims.user_id())).await {
        Ok(user) => user,
        Err(e) => return ApiError::from(e).into_response(),
    };

    match verify_session(&claims, user) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => {
            audit::denied(None, &e, &path, None);
            ApiError::from(e).into_response()
        }
    }
}

/// Extractor for the authenticated caller.
///
/// ```ignore
/// async fn handler(CurrentUser(identity): CurrentUser) -> impl IntoResponse {
///     let user_id = identity.user_id();
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub VerifiedIdentity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<VerifiedIdentity>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::new(ErrorCode::MissingToken, "Authentication required").into())
    }
}
