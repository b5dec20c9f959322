//! Authentication routes for login, register, token refresh, password change
//! and the current identity.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use spendgate_core::access::{
    TenantAccess, VerifiedIdentity, isolate_tenant, tenant_to_load, verify_credentials,
    verify_session,
};
use spendgate_core::auth::{hash_password, validate_password_policy, verify_password};
use spendgate_core::identity::{NewUser, User, normalize_email};
use spendgate_core::tenant::{
    Company, CompanyStatus, ModuleGrant, NewCompany, Plan, SubscriptionStatus,
};
use spendgate_db::{CompanyStore, UserStore};
use spendgate_shared::auth::{
    ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest, RegisterCompanyRequest,
    UpdateProfileRequest,
};
use spendgate_shared::types::{CompanyId, UserId};
use spendgate_shared::{AppError, TokenKind};
use validator::Validate;

use super::{Success, check_domain, ok};
use crate::AppState;
use crate::audit;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{Access, CurrentUser};

/// Employee id given to a self-registered company's first admin.
pub const DEFAULT_ADMIN_EMPLOYEE_ID: &str = "ADMIN-001";

/// Routes reachable without a token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/refresh", post(refresh))
}

/// Routes that need an authenticated caller but no module licence.
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(me).put(update_me))
        .route("/auth/change-password", post(change_password))
}

/// What the caller's company looks like right now.
#[derive(Debug, Serialize)]
pub struct CompanySummary {
    /// Company ID.
    pub id: CompanyId,
    /// Name.
    pub name: String,
    /// Code.
    pub code: String,
    /// Lifecycle status.
    pub status: CompanyStatus,
    /// Plan tier.
    pub plan: Plan,
    /// Subscription status, with expiry applied.
    pub subscription_status: SubscriptionStatus,
    /// Subscription expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Licensed modules.
    pub modules: Vec<ModuleGrant>,
}

impl CompanySummary {
    /// Summarises `company` as of `now`.
    pub fn of(company: &Company, now: DateTime<Utc>) -> Self {
        Self {
            id: company.id,
            name: company.name.clone(),
            code: company.code.clone(),
            status: company.status,
            plan: company.subscription.plan,
            subscription_status: company.subscription.effective_status(now),
            expires_at: company.subscription.expires_at,
            modules: company.modules.clone(),
        }
    }
}

/// Response of `GET /auth/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    /// The live user record.
    pub user: User,
    /// The caller's company. Absent for the super-admin.
    pub company: Option<CompanySummary>,
}

/// Response carrying a freshly issued access token.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Always true.
    pub success: bool,
    /// Access token.
    pub token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Response of `POST /auth/register`.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    /// The new company.
    pub company: Company,
    /// Its first admin.
    pub user: User,
}

fn issue(
    state: &AppState,
    user: &User,
    kind: TokenKind,
    issued_at: DateTime<Utc>,
) -> Result<String, ApiError> {
    Ok(state.tokens.generate_at(
        user.id.into_inner(),
        user.company_id.map(CompanyId::into_inner),
        user.role.as_str(),
        kind,
        issued_at,
    )?)
}

/// Loads the caller's company fresh and runs the tenant checks on it.
async fn tenant_gate(
    state: &AppState,
    identity: &VerifiedIdentity,
    now: DateTime<Utc>,
) -> Result<TenantAccess, ApiError> {
    let company = match tenant_to_load(identity)? {
        Some(company_id) => state.store.find_company(company_id).await?,
        None => None,
    };
    Ok(isolate_tenant(identity, company, now)?)
}

/// POST /auth/login - Authenticate user and return tokens.
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let payload = LoginRequest {
        email: payload.email.trim().to_string(),
        ..payload
    };
    payload.validate()?;
    let email = normalize_email(&payload.email);

    let user = state.store.find_user_by_email(&email).await?;
    let identity = verify_credentials(user, &payload.password).inspect_err(|e| {
        audit::login_failed(&email, e.code().as_str());
    })?;

    let now = Utc::now();
    if let Err(e) = tenant_gate(&state, &identity, now).await {
        audit::login_failed(&email, e.inner().code().as_str());
        return Err(e);
    }

    state.store.record_login(identity.user_id(), now).await?;
    audit::login_succeeded(&identity);

    let mut user = identity.into_user();
    user.last_login_at = Some(now);
    let token = issue(&state, &user, TokenKind::Access, now)?;
    let refresh_token = issue(&state, &user, TokenKind::Refresh, now)?;
    let user = serde_json::to_value(&user).map_err(|e| AppError::internal(e.to_string()))?;

    Ok(Json(LoginResponse {
        success: true,
        token,
        refresh_token,
        expires_in: state.tokens.access_token_expires_in(),
        user,
    }))
}

/// POST /auth/register - Create a trial company and its first admin.
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterCompanyRequest>,
) -> ApiResult<(StatusCode, Json<Success<RegisterResponse>>)> {
    payload.validate()?;
    let (company, admin) = new_company_with_admin(payload, None)?;
    let (company, user) = state.store.create_company_with_admin(company, admin).await?;

    tracing::info!(
        company_id = %company.id,
        code = %company.code,
        admin_id = %user.id,
        "company registered"
    );
    Ok((StatusCode::CREATED, ok(RegisterResponse { company, user })))
}

/// Builds a trial company and its admin from a validated request.
pub(crate) fn new_company_with_admin(
    payload: RegisterCompanyRequest,
    created_by: Option<UserId>,
) -> Result<(NewCompany, NewUser), ApiError> {
    let admin = payload.admin;
    validate_password_policy(&admin.password)?;

    let mut company = NewCompany::trial(&payload.name, &payload.code, &payload.domain, Utc::now());
    check_domain(&company.domain)?;
    company.created_by = created_by;

    let employee_id = admin
        .employee_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ADMIN_EMPLOYEE_ID.to_string());
    // The store replaces the company id with the one it assigns.
    let user = NewUser::company_admin(
        CompanyId::new(),
        employee_id,
        &admin.email,
        hash_password(&admin.password)?,
        admin.first_name,
        admin.last_name,
    );
    Ok((company, user))
}

/// POST /auth/refresh - Exchange a refresh token for a new access token.
async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let claims = state
        .tokens
        .validate_kind(payload.refresh_token.trim(), TokenKind::Refresh)?;
    let user = state
        .store
        .find_user(UserId::from_uuid(claims.user_id()))
        .await?;
    let identity = verify_session(&claims, user)?;

    let now = Utc::now();
    tenant_gate(&state, &identity, now).await?;

    Ok(Json(TokenResponse {
        success: true,
        token: issue(&state, identity.user(), TokenKind::Access, now)?,
        expires_in: state.tokens.access_token_expires_in(),
    }))
}

/// POST /auth/change-password - Rotate the caller's password.
///
/// Every token issued before the change stops working. The returned token is
/// issued at the change instant, so it survives the rotation check.
async fn change_password(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<Json<TokenResponse>> {
    payload.validate()?;
    if !verify_password(&payload.current_password, &identity.user().password_hash)? {
        return Err(AppError::validation("Current password is incorrect").into());
    }
    if payload.current_password == payload.new_password {
        return Err(AppError::validation("New password must differ from the current one").into());
    }
    validate_password_policy(&payload.new_password)?;

    let hash = hash_password(&payload.new_password)?;
    let now = Utc::now();
    state
        .store
        .change_password(identity.user_id(), hash, now)
        .await?;
    tracing::info!(
        target: "spendgate::audit",
        user_id = %identity.user_id(),
        "password changed"
    );

    Ok(Json(TokenResponse {
        success: true,
        token: issue(&state, identity.user(), TokenKind::Access, now)?,
        expires_in: state.tokens.access_token_expires_in(),
    }))
}

/// GET /auth/me - The live user and company.
async fn me(
    CurrentUser(identity): CurrentUser,
    Access(access): Access,
) -> Json<Success<MeResponse>> {
    let company = access
        .tenant()
        .map(|tenant| CompanySummary::of(tenant.company(), Utc::now()));
    ok(MeResponse {
        user: identity.into_user(),
        company,
    })
}

/// PUT /auth/me - Rename the caller. Role, permissions and every other
/// field go through user administration instead.
async fn update_me(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<Json<Success<User>>> {
    payload.validate()?;
    let current = identity.user();
    let first_name = payload
        .first_name
        .map_or_else(|| current.first_name.clone(), |n| n.trim().to_string());
    let last_name = payload
        .last_name
        .map_or_else(|| current.last_name.clone(), |n| n.trim().to_string());

    let user = state
        .store
        .rename_user(identity.user_id(), first_name, last_name)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(ok(user))
}
