//! Tenant user administration (module `users`).

use axum::{
    Json, Router,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Deserialize;
use spendgate_core::access::{
    Grant, RoutePolicy, TenantContext, VerifiedIdentity, require_authority_over,
    require_delegable,
};
use spendgate_core::auth::{hash_password, validate_password_policy};
use spendgate_core::identity::{
    ApprovalLimits, AssignedEntities, Department, NewUser, Permission, Role, User, UserUpdate,
};
use spendgate_core::tenant::{Action, Module};
use spendgate_db::{UserFilter, UserStore};
use spendgate_shared::AppError;
use spendgate_shared::types::UserId;
use validator::Validate;

use super::{Success, ok};
use crate::AppState;
use crate::audit;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{CurrentUser, Tenant, guarded};

const USER_ADMINS: &[Role] = &[Role::Admin, Role::Board, Role::Director];

const READ: RoutePolicy = RoutePolicy::tenant().module(Module::Users, Action::Read);
const CREATE: RoutePolicy = RoutePolicy::tenant()
    .roles(USER_ADMINS)
    .module(Module::Users, Action::Create);
const UPDATE: RoutePolicy = RoutePolicy::tenant()
    .roles(USER_ADMINS)
    .module(Module::Users, Action::Update);

/// Creates the user administration router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users",
            guarded(READ, get(list_users)).merge(guarded(CREATE, post(create_user))),
        )
        .route(
            "/users/{user_id}",
            guarded(READ, get(get_user)).merge(guarded(UPDATE, put(update_user))),
        )
        .route("/users/{user_id}/activate", guarded(UPDATE, put(activate_user)))
        .route("/users/{user_id}/deactivate", guarded(UPDATE, put(deactivate_user)))
}

/// New tenant user.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    /// Employee identifier, unique within the company.
    #[validate(length(min = 1, max = 50))]
    pub employee_id: String,
    /// Email, unique across the platform.
    #[validate(email(message = "must be a valid email"))]
    pub email: String,
    /// Initial password.
    pub password: String,
    /// First name.
    #[validate(length(min = 2, max = 50))]
    pub first_name: String,
    /// Last name.
    #[validate(length(min = 2, max = 50))]
    pub last_name: String,
    /// Role.
    pub role: Role,
    /// Department.
    pub department: Department,
    /// Permission set.
    #[serde(default)]
    pub permissions: Vec<Permission>,
    /// Approval ceilings.
    #[serde(default)]
    pub approval_limits: ApprovalLimits,
    /// Assigned entities.
    #[serde(default)]
    pub assigned: AssignedEntities,
}

/// Checks the authorization data the caller is about to store on a user.
fn check_grants(
    identity: &VerifiedIdentity,
    path: &str,
    target: Option<UserId>,
    grant: &Grant<'_>,
) -> Result<(), ApiError> {
    if grant.role == Some(Role::SuperAdmin) {
        return Err(AppError::validation("role 'super_admin' cannot be assigned").into());
    }
    for permission in grant.permissions.unwrap_or_default() {
        if let Some(action) = permission
            .actions
            .iter()
            .find(|a| !permission.module.supports(**a))
        {
            return Err(AppError::validation(format!(
                "action '{action}' is not valid for module '{}'",
                permission.module
            ))
            .into());
        }
    }
    if grant.approval_limits.is_some_and(ApprovalLimits::has_negative) {
        return Err(AppError::validation("approval limits cannot be negative").into());
    }
    audit::enforce(identity, path, None, require_delegable(identity, target, grant))
}

/// Loads a user of the caller's company the caller may administer.
async fn load_administered(
    state: &AppState,
    identity: &VerifiedIdentity,
    tenant: &TenantContext,
    path: &str,
    user_id: UserId,
) -> Result<User, ApiError> {
    let target = state.store.get_user(tenant.scope_query(user_id)).await?;
    let target = tenant.ensure_owned(target, "User")?;
    audit::enforce(identity, path, None, require_authority_over(identity, &target))?;
    Ok(target)
}

fn user_not_found() -> AppError {
    AppError::not_found("User")
}

async fn list_users(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Query(filter): Query<UserFilter>,
) -> ApiResult<Json<Success<Vec<User>>>> {
    Ok(ok(state.store.list_users(tenant.scope_query(filter)).await?))
}

async fn get_user(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<Success<User>>> {
    let user = state
        .store
        .get_user(tenant.scope_query(user_id))
        .await?;
    Ok(ok(tenant.ensure_owned(user, "User")?))
}

async fn create_user(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Tenant(tenant): Tenant,
    OriginalUri(uri): OriginalUri,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<Success<User>>)> {
    payload.validate()?;
    check_grants(
        &identity,
        uri.path(),
        None,
        &Grant {
            role: Some(payload.role),
            permissions: Some(&payload.permissions),
            approval_limits: Some(&payload.approval_limits),
            assigned: true,
        },
    )?;
    validate_password_policy(&payload.password)?;

    let new = NewUser {
        company_id: None,
        employee_id: payload.employee_id,
        email: payload.email,
        password_hash: hash_password(&payload.password)?,
        first_name: payload.first_name,
        last_name: payload.last_name,
        role: payload.role,
        department: payload.department,
        permissions: payload.permissions,
        approval_limits: payload.approval_limits,
        assigned: payload.assigned,
    };
    let user = state.store.create_user(tenant.stamp_tenant(new)).await?;
    tracing::info!(
        company_id = %tenant.company_id(),
        user_id = %user.id,
        role = user.role.as_str(),
        created_by = %identity.user_id(),
        "user created"
    );
    Ok((StatusCode::CREATED, ok(user)))
}

async fn update_user(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Tenant(tenant): Tenant,
    Path(user_id): Path<UserId>,
    OriginalUri(uri): OriginalUri,
    Json(update): Json<UserUpdate>,
) -> ApiResult<Json<Success<User>>> {
    load_administered(&state, &identity, &tenant, uri.path(), user_id).await?;
    check_grants(
        &identity,
        uri.path(),
        Some(user_id),
        &Grant {
            role: update.role,
            permissions: update.permissions.as_deref(),
            approval_limits: update.approval_limits.as_ref(),
            assigned: update.assigned.is_some(),
        },
    )?;
    if user_id == identity.user_id() && update.role.is_some_and(|r| r != identity.role()) {
        return Err(AppError::validation("you cannot change your own role").into());
    }

    let user = state
        .store
        .update_user(tenant.scope_query(user_id), update)
        .await?
        .ok_or_else(user_not_found)?;
    Ok(ok(user))
}

async fn set_active(
    state: &AppState,
    identity: &VerifiedIdentity,
    tenant: &TenantContext,
    path: &str,
    user_id: UserId,
    active: bool,
) -> ApiResult<Json<Success<User>>> {
    if !active && user_id == identity.user_id() {
        return Err(AppError::validation("you cannot deactivate your own account").into());
    }
    load_administered(state, identity, tenant, path, user_id).await?;
    let user = state
        .store
        .set_user_active(tenant.scope_query(user_id), active)
        .await?
        .ok_or_else(user_not_found)?;
    tracing::info!(
        target: "spendgate::audit",
        company_id = %tenant.company_id(),
        %user_id,
        active,
        actor = %identity.user_id(),
        "user activation changed"
    );
    Ok(ok(user))
}

async fn activate_user(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Tenant(tenant): Tenant,
    Path(user_id): Path<UserId>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<Success<User>>> {
    set_active(&state, &identity, &tenant, uri.path(), user_id, true).await
}

async fn deactivate_user(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Tenant(tenant): Tenant,
    Path(user_id): Path<UserId>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<Success<User>>> {
    set_active(&state, &identity, &tenant, uri.path(), user_id, false).await
}
