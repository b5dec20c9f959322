//! Platform company management, mounted under `/super-admin`.
//!
//! Every route here is restricted to the super-admin. The addressed company
//! always comes from the path, never from the caller's token.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use spendgate_core::access::TenantContext;
use spendgate_core::identity::User;
use spendgate_core::tenant::{
    Company, CompanyContact, CompanyStatus, CompanyUpdate, ModuleGrant, Subscription,
    validate_grants,
};
use spendgate_db::{CompanyStore, StatusChangeOutcome, UserFilter, UserStore, UserTotals};
use spendgate_shared::AppError;
use spendgate_shared::auth::RegisterCompanyRequest;
use spendgate_shared::types::{CompanyId, UserId};
use validator::Validate;

use super::auth::{RegisterResponse, new_company_with_admin};
use super::{Success, ok};
use crate::AppState;
use crate::audit;
use crate::error::ApiResult;
use crate::middleware::{CurrentUser, platform_only};

/// Creates the company management router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/statistics", get(statistics))
        .route("/companies", post(create_company).get(list_companies))
        .route(
            "/companies/{company_id}",
            get(get_company).put(update_company).delete(delete_company),
        )
        .route("/companies/{company_id}/subscription", put(update_subscription))
        .route("/companies/{company_id}/modules", put(replace_modules))
        .route("/companies/{company_id}/status", put(change_status))
        .route("/companies/{company_id}/users", get(list_company_users))
        .route_layer(middleware::from_fn(platform_only))
}

/// Company creation by the platform.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCompanyRequest {
    /// Company and admin details.
    #[serde(flatten)]
    #[validate(nested)]
    pub company: RegisterCompanyRequest,
    /// Subscription to start with instead of a trial.
    pub subscription: Option<Subscription>,
    /// Module grants to start with instead of the trial defaults.
    pub modules: Option<Vec<ModuleGrant>>,
}

/// Contact details as submitted.
#[derive(Debug, Deserialize, Validate)]
pub struct ContactRequest {
    /// Contact email.
    #[validate(email(message = "must be a valid email"))]
    pub email: Option<String>,
    /// Contact phone.
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    /// Postal address.
    #[validate(length(max = 500))]
    pub address: Option<String>,
    /// Industry.
    #[validate(length(max = 100))]
    pub industry: Option<String>,
    /// Country.
    #[validate(length(max = 100))]
    pub country: Option<String>,
}

impl From<ContactRequest> for CompanyContact {
    fn from(r: ContactRequest) -> Self {
        Self {
            email: r.email,
            phone: r.phone,
            address: r.address,
            industry: r.industry,
            country: r.country,
        }
    }
}

/// Company profile edit.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCompanyRequest {
    /// New display name.
    #[validate(length(min = 2, max = 200))]
    pub name: Option<String>,
    /// Replacement contact details.
    #[validate(nested)]
    pub contact: Option<ContactRequest>,
    /// Never accepted; present so an attempt is refused instead of ignored.
    pub code: Option<String>,
    /// Never accepted; present so an attempt is refused instead of ignored.
    pub domain: Option<String>,
}

/// Company counts by lifecycle status and plan.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct CompanyTotals {
    /// Every company, deleted ones included.
    pub total: u64,
    /// By lifecycle status.
    pub by_status: BTreeMap<&'static str, u64>,
    /// By plan tier.
    pub by_plan: BTreeMap<&'static str, u64>,
}

impl CompanyTotals {
    /// Counts `companies`.
    pub fn of(companies: &[Company]) -> Self {
        let mut totals = Self::default();
        for company in companies {
            totals.total += 1;
            *totals.by_status.entry(company.status.as_str()).or_default() += 1;
            *totals
                .by_plan
                .entry(company.subscription.plan.as_str())
                .or_default() += 1;
        }
        totals
    }
}

/// Platform-wide head counts.
#[derive(Debug, Serialize)]
pub struct PlatformStatistics {
    /// Companies.
    pub companies: CompanyTotals,
    /// Tenant users.
    pub users: UserTotals,
}

/// Status change request.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    /// Target status.
    pub status: CompanyStatus,
    /// Mandatory reason.
    #[serde(default)]
    pub reason: String,
}

/// Soft-delete request.
#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    /// Mandatory reason.
    #[serde(default)]
    pub reason: String,
}

/// Outcome of a status change.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// The company after the change.
    pub company: Company,
    /// How many users the cascade touched.
    pub cascaded_users: u64,
}

fn company_not_found() -> AppError {
    AppError::not_found("Company")
}

async fn create_company(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Json(payload): Json<CreateCompanyRequest>,
) -> ApiResult<(StatusCode, Json<Success<RegisterResponse>>)> {
    payload.validate()?;
    let (mut company, admin) = new_company_with_admin(payload.company, Some(identity.user_id()))?;
    if let Some(subscription) = payload.subscription {
        company.subscription = subscription;
    }
    if let Some(modules) = payload.modules {
        validate_grants(&modules)?;
        company.modules = modules;
    }

    let (company, user) = state.store.create_company_with_admin(company, admin).await?;
    tracing::info!(
        target: "spendgate::audit",
        company_id = %company.id,
        code = %company.code,
        actor = %identity.user_id(),
        "company created"
    );
    Ok((StatusCode::CREATED, ok(RegisterResponse { company, user })))
}

async fn list_companies(State(state): State<AppState>) -> ApiResult<Json<Success<Vec<Company>>>> {
    Ok(ok(state.store.list_companies().await?))
}

async fn get_company(
    State(state): State<AppState>,
    Path(company_id): Path<CompanyId>,
) -> ApiResult<Json<Success<Company>>> {
    let company = state
        .store
        .find_company(company_id)
        .await?
        .ok_or_else(company_not_found)?;
    Ok(ok(company))
}

async fn statistics(
    State(state): State<AppState>,
) -> ApiResult<Json<Success<PlatformStatistics>>> {
    let companies = state.store.list_companies().await?;
    let users = state.store.user_totals().await?;
    Ok(ok(PlatformStatistics {
        companies: CompanyTotals::of(&companies),
        users,
    }))
}

async fn update_company(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(company_id): Path<CompanyId>,
    Json(payload): Json<UpdateCompanyRequest>,
) -> ApiResult<Json<Success<Company>>> {
    payload.validate()?;
    if payload.code.is_some() || payload.domain.is_some() {
        return Err(AppError::validation("company code and domain cannot be changed").into());
    }
    let update = CompanyUpdate {
        name: payload.name,
        contact: payload.contact.map(CompanyContact::from),
    };
    let company = state
        .store
        .update_company(company_id, update)
        .await?
        .ok_or_else(company_not_found)?;
    tracing::info!(
        target: "spendgate::audit",
        %company_id,
        name = %company.name,
        actor = %identity.user_id(),
        "company profile updated"
    );
    Ok(ok(company))
}

async fn update_subscription(
    State(state): State<AppState>,
    Path(company_id): Path<CompanyId>,
    Json(subscription): Json<Subscription>,
) -> ApiResult<Json<Success<Company>>> {
    let company = state
        .store
        .update_subscription(company_id, subscription)
        .await?
        .ok_or_else(company_not_found)?;
    tracing::info!(
        target: "spendgate::audit",
        %company_id,
        plan = company.subscription.plan.as_str(),
        status = company.subscription.status.as_str(),
        "subscription updated"
    );
    Ok(ok(company))
}

async fn replace_modules(
    State(state): State<AppState>,
    Path(company_id): Path<CompanyId>,
    Json(modules): Json<Vec<ModuleGrant>>,
) -> ApiResult<Json<Success<Company>>> {
    validate_grants(&modules)?;
    let company = state
        .store
        .replace_modules(company_id, modules)
        .await?
        .ok_or_else(company_not_found)?;
    tracing::info!(
        target: "spendgate::audit",
        %company_id,
        modules = company.modules.len(),
        "module grants replaced"
    );
    Ok(ok(company))
}

async fn apply_status(
    state: &AppState,
    company_id: CompanyId,
    to: CompanyStatus,
    actor: UserId,
    reason: &str,
) -> ApiResult<StatusChangeOutcome> {
    let outcome = state
        .store
        .change_company_status(company_id, to, actor, reason, Utc::now())
        .await?
        .ok_or_else(company_not_found)?;
    if let Some(change) = outcome.company.status_history.last() {
        audit::status_changed(company_id, change, outcome.cascaded_users);
    }
    Ok(outcome)
}

async fn change_status(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(company_id): Path<CompanyId>,
    Json(payload): Json<StatusRequest>,
) -> ApiResult<Json<Success<StatusResponse>>> {
    if payload.status == CompanyStatus::Deleted {
        return Err(AppError::validation("use DELETE to remove a company").into());
    }
    let outcome = apply_status(
        &state,
        company_id,
        payload.status,
        identity.user_id(),
        &payload.reason,
    )
    .await?;
    Ok(ok(StatusResponse {
        company: outcome.company,
        cascaded_users: outcome.cascaded_users,
    }))
}

async fn delete_company(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(company_id): Path<CompanyId>,
    Json(payload): Json<DeleteRequest>,
) -> ApiResult<Json<Success<StatusResponse>>> {
    let outcome = apply_status(
        &state,
        company_id,
        CompanyStatus::Deleted,
        identity.user_id(),
        &payload.reason,
    )
    .await?;
    Ok(ok(StatusResponse {
        company: outcome.company,
        cascaded_users: outcome.cascaded_users,
    }))
}

async fn list_company_users(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(company_id): Path<CompanyId>,
) -> ApiResult<Json<Success<Vec<User>>>> {
    let company = state
        .store
        .find_company(company_id)
        .await?
        .ok_or_else(company_not_found)?;
    let tenant = TenantContext::for_platform(&identity, company)?;
    let users = state
        .store
        .list_users(tenant.scope_query(UserFilter::default()))
        .await?;
    Ok(ok(users))
}
