//! Access decision errors.

use rust_decimal::Decimal;
use spendgate_shared::{AppError, ErrorCode};
use thiserror::Error;

use crate::identity::{ApprovalCategory, Role};
use crate::tenant::{Action, Module, SubscriptionStatus};

use super::policy::EntityRef;

/// Why a request was refused by the authentication, tenant or policy gates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// Token subject no longer resolves.
    #[error("User no longer exists")]
    UserNotFound,

    /// Account is deactivated, suspended or deleted.
    #[error("Account is deactivated")]
    AccountDeactivated,

    /// Token predates the last password change.
    #[error("Password was changed; please log in again")]
    CredentialsRotated,

    /// Token claims contradict the live user record.
    #[error("Invalid or malformed token")]
    ClaimMismatch,

    /// Unknown email or wrong password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Tenant-bound user without a company.
    #[error("Company context is missing")]
    MissingTenantClaim,

    /// Company does not exist.
    #[error("Company not found")]
    TenantNotFound,

    /// Company is not active.
    #[error("Company is not active")]
    TenantInactive,

    /// Subscription does not grant access.
    #[error("Company subscription is {}", .0.as_str())]
    SubscriptionInactive(SubscriptionStatus),

    /// Role is not allowed on the route.
    #[error("Role '{0}' is not allowed to access this resource")]
    InsufficientRole(Role),

    /// Permission set lacks the action.
    #[error("Missing permission: {module}.{action}")]
    PermissionDenied {
        /// Module.
        module: Module,
        /// Action.
        action: Action,
    },

    /// Company has not licensed the module.
    #[error("Module '{0}' is not enabled for this company")]
    ModuleNotEnabled(Module),

    /// Company plan does not include the action.
    #[error("Action '{action}' is not enabled for module '{module}'")]
    ModuleActionDenied {
        /// Module.
        module: Module,
        /// Action.
        action: Action,
    },

    /// Target entity is outside the user's assignments.
    #[error("{0} is not assigned to you")]
    EntityNotAssigned(EntityRef),

    /// Amount exceeds the caller's own limit.
    #[error("Amount {amount} exceeds your {} approval limit of {limit}", .category.as_str())]
    ApprovalLimitExceeded {
        /// Spend category.
        category: ApprovalCategory,
        /// Requested amount.
        amount: Decimal,
        /// The caller's limit.
        limit: Decimal,
    },
}

impl AccessError {
    /// Returns the wire error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UserNotFound => ErrorCode::UserNotFound,
            Self::AccountDeactivated => ErrorCode::AccountDeactivated,
            Self::CredentialsRotated => ErrorCode::CredentialsRotated,
            Self::ClaimMismatch => ErrorCode::InvalidToken,
            Self::InvalidCredentials => ErrorCode::InvalidCredentials,
            Self::MissingTenantClaim => ErrorCode::MissingTenantClaim,
            Self::TenantNotFound => ErrorCode::TenantNotFound,
            Self::TenantInactive => ErrorCode::TenantInactive,
            Self::SubscriptionInactive(_) => ErrorCode::SubscriptionInactive,
            Self::InsufficientRole(_) => ErrorCode::InsufficientRole,
            Self::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            Self::ModuleNotEnabled(_) => ErrorCode::ModuleNotEnabled,
            Self::ModuleActionDenied { .. } => ErrorCode::ModuleActionDenied,
            Self::EntityNotAssigned(_) => ErrorCode::EntityNotAssigned,
            Self::ApprovalLimitExceeded { .. } => ErrorCode::ApprovalLimitExceeded,
        }
    }

    /// Name of the check that failed, for audit records.
    #[must_use]
    pub const fn check(&self) -> &'static str {
        match self {
            Self::UserNotFound
            | Self::AccountDeactivated
            | Self::CredentialsRotated
            | Self::ClaimMismatch
            | Self::InvalidCredentials => "authentication",
            Self::MissingTenantClaim
            | Self::TenantNotFound
            | Self::TenantInactive
            | Self::SubscriptionInactive(_) => "tenant",
            Self::InsufficientRole(_) => "role",
            Self::ModuleNotEnabled(_) | Self::ModuleActionDenied { .. } => "module",
            Self::PermissionDenied { .. } => "permission",
            Self::EntityNotAssigned(_) => "entity_scope",
            Self::ApprovalLimitExceeded { .. } => "approval_limit",
        }
    }
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        let app = AppError::new(err.code(), err.to_string());
        match err {
            AccessError::ApprovalLimitExceeded { limit, .. } => app.with_limit(limit),
            _ => app,
        }
    }
}
