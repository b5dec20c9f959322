//! Tenants: the module catalogue, company records and their lifecycle.

mod company;
mod lifecycle;
mod module;

pub use company::{
    Company, CompanyContact, CompanyUpdate, NewCompany, Plan, QuotaExceeded, Resource,
    ResourceLimits, Subscription, SubscriptionStatus, TRIAL_DAYS,
};
pub use lifecycle::{
    CompanyStatus, LifecycleError, StatusChange, TransitionPlan, UserCascade, plan_transition,
};
pub use module::{
    Action, ActionGrant, AllActions, GrantError, Module, ModuleGrant, default_trial_grants,
    validate_grants,
};

use spendgate_shared::{AppError, ErrorCode};

impl From<GrantError> for AppError {
    fn from(err: GrantError) -> Self {
        AppError::validation(err.to_string())
    }
}

impl From<QuotaExceeded> for AppError {
    fn from(err: QuotaExceeded) -> Self {
        AppError::new(ErrorCode::QuotaExceeded, err.to_string())
    }
}
