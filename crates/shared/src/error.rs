//! Application-wide error types.
//!
//! Every failure that reaches a client is an [`AppError`] carrying a stable
//! [`ErrorCode`]. The code decides the HTTP status; the message is for humans.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Machine-readable error codes returned in the `code` field of error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication
    /// No bearer token on a protected route.
    MissingToken,
    /// Token failed signature or structural validation.
    InvalidToken,
    /// Token is past its expiry.
    ExpiredToken,
    /// Token subject no longer resolves to a user.
    UserNotFound,
    /// User is deactivated, suspended or deleted.
    AccountDeactivated,
    /// Token predates the user's last password change.
    CredentialsRotated,
    /// Email/password pair did not match.
    InvalidCredentials,

    // Tenant isolation
    /// Token has no company claim for a tenant-bound role.
    MissingTenantClaim,
    /// Company in the claim does not exist.
    TenantNotFound,
    /// Company is flagged inactive, suspended or deleted.
    TenantInactive,
    /// Company subscription is neither active nor trial.
    SubscriptionInactive,

    // Authorization
    /// Role is not on the route's allow-list.
    InsufficientRole,
    /// User permission set lacks the module action.
    PermissionDenied,
    /// Company has not licensed the module.
    ModuleNotEnabled,
    /// Company licensed the module but not the action.
    ModuleActionDenied,
    /// Target customer/vendor is not assigned to the user.
    EntityNotAssigned,
    /// Amount is above the user's approval limit.
    ApprovalLimitExceeded,
    /// Subscription resource ceiling reached.
    QuotaExceeded,
    /// Per-role request budget exhausted.
    RateLimited,

    // Data
    /// Record does not exist in the caller's tenant.
    NotFound,
    /// Unique constraint violated.
    DuplicateEntry,
    /// Input failed validation.
    ValidationError,
    /// Requested lifecycle transition is not allowed.
    InvalidTransition,

    // Infrastructure
    /// Storage backend failure.
    DatabaseError,
    /// Anything else.
    InternalError,
}

impl ErrorCode {
    /// Returns the HTTP status code for this error code.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::MissingToken
            | Self::InvalidToken
            | Self::ExpiredToken
            | Self::UserNotFound
            | Self::AccountDeactivated
            | Self::CredentialsRotated
            | Self::InvalidCredentials
            | Self::MissingTenantClaim
            | Self::TenantNotFound
            | Self::TenantInactive => 401,
            Self::SubscriptionInactive
            | Self::InsufficientRole
            | Self::PermissionDenied
            | Self::ModuleNotEnabled
            | Self::ModuleActionDenied
            | Self::EntityNotAssigned
            | Self::ApprovalLimitExceeded
            | Self::QuotaExceeded => 403,
            Self::RateLimited => 429,
            Self::NotFound => 404,
            Self::DuplicateEntry | Self::ValidationError => 400,
            Self::InvalidTransition => 409,
            Self::DatabaseError | Self::InternalError => 500,
        }
    }

    /// Returns the wire representation of this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingToken => "MISSING_TOKEN",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::ExpiredToken => "EXPIRED_TOKEN",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::AccountDeactivated => "ACCOUNT_DEACTIVATED",
            Self::CredentialsRotated => "CREDENTIALS_ROTATED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::MissingTenantClaim => "MISSING_TENANT_CLAIM",
            Self::TenantNotFound => "TENANT_NOT_FOUND",
            Self::TenantInactive => "TENANT_INACTIVE",
            Self::SubscriptionInactive => "SUBSCRIPTION_INACTIVE",
            Self::InsufficientRole => "INSUFFICIENT_ROLE",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ModuleNotEnabled => "MODULE_NOT_ENABLED",
            Self::ModuleActionDenied => "MODULE_ACTION_DENIED",
            Self::EntityNotAssigned => "ENTITY_NOT_ASSIGNED",
            Self::ApprovalLimitExceeded => "APPROVAL_LIMIT_EXCEEDED",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::RateLimited => "RATE_LIMITED",
            Self::NotFound => "NOT_FOUND",
            Self::DuplicateEntry => "DUPLICATE_ENTRY",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Returns true for failures that should be recorded in the audit log.
    #[must_use]
    pub const fn is_security_denial(self) -> bool {
        matches!(
            self,
            Self::InsufficientRole
                | Self::PermissionDenied
                | Self::ModuleNotEnabled
                | Self::ModuleActionDenied
                | Self::EntityNotAssigned
                | Self::ApprovalLimitExceeded
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application error: a code, a human message and optional internal detail.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct AppError {
    code: ErrorCode,
    message: String,
    limit: Option<Decimal>,
    detail: Option<String>,
}

impl AppError {
    /// Creates an error with the given code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            limit: None,
            detail: None,
        }
    }

    /// Attaches the caller's own approval limit to the error payload.
    #[must_use]
    pub fn with_limit(mut self, limit: Decimal) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Attaches internal detail, only rendered in debug builds.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Resource not found in the caller's tenant.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, format!("{} not found", what.into()))
    }

    /// Input validation failure.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Unique constraint violation.
    #[must_use]
    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DuplicateEntry, message)
    }

    /// Storage failure; the driver text is kept as detail only.
    #[must_use]
    pub fn database(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, "A database error occurred").with_detail(detail)
    }

    /// Unexpected internal failure.
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, "An internal error occurred").with_detail(detail)
    }

    /// Returns the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.code.status_code()
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the approval limit attached to the error, if any.
    #[must_use]
    pub const fn limit(&self) -> Option<Decimal> {
        self.limit
    }

    /// Returns the internal detail, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let reasons: Vec<String> = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map_or_else(|| e.code.to_string(), ToString::to_string)
                    })
                    .collect();
                format!("{field}: {}", reasons.join(", "))
            })
            .collect();
        fields.sort();
        Self::validation(format!("Validation error: {}", fields.join("; ")))
    }
}
