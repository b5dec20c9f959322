//! HTTP error responses.
//!
//! Every failure leaves the API as
//! `{ "success": false, "message": ..., "code": ... }`, with the caller's own
//! approval limit attached for `APPROVAL_LIMIT_EXCEEDED` and internal detail
//! only in debug builds.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::Serialize;
use spendgate_shared::{AppError, ErrorCode};

/// Wire shape of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    /// Always false.
    pub success: bool,
    /// Human-readable message.
    pub message: &'a str,
    /// Machine-readable code.
    pub code: ErrorCode,
    /// Caller's approval limit, for approval failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<Decimal>,
    /// Internal detail, debug builds only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<&'a str>,
}

/// Handler error. Anything convertible into [`AppError`] converts into this.
#[derive(Debug)]
pub struct ApiError {
    error: AppError,
    retry_after: Option<u64>,
}

impl ApiError {
    /// A `RATE_LIMITED` response with a `Retry-After` header.
    #[must_use]
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self {
            error: AppError::new(ErrorCode::RateLimited, "Too many requests, slow down"),
            retry_after: Some(retry_after_secs),
        }
    }

    /// The wrapped application error.
    #[must_use]
    pub const fn inner(&self) -> &AppError {
        &self.error
    }
}

impl<E: Into<AppError>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self {
            error: err.into(),
            retry_after: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            success: false,
            message: self.error.message(),
            code: self.error.code(),
            limit: self.error.limit(),
            detail: if cfg!(debug_assertions) {
                self.error.detail()
            } else {
                None
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = self.retry_after
            && let Ok(value) = HeaderValue::try_from(secs.to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        response
    }
}

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;
