//! Trade spend routes (module `trade_spend`).
//!
//! The request-level checks run in the route policy. The record-level ones,
//! entity scope and approval limit, need the record and run in the handler.

use axum::{
    Json, Router,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use spendgate_core::access::RoutePolicy;
use spendgate_core::identity::Role;
use spendgate_core::spend::{NewTradeSpend, TradeSpend, TradeSpendFilter};
use spendgate_core::tenant::{Action, Module};
use spendgate_db::TradeSpendStore;
use spendgate_shared::AppError;
use spendgate_shared::types::TradeSpendId;

use super::{Success, ok};
use crate::AppState;
use crate::audit;
use crate::error::ApiResult;
use crate::middleware::{CurrentUser, Tenant, guarded};

const APPROVERS: &[Role] = &[
    Role::Admin,
    Role::Board,
    Role::Director,
    Role::Manager,
    Role::Kam,
];

const READ: RoutePolicy = RoutePolicy::tenant().module(Module::TradeSpend, Action::Read);
const CREATE: RoutePolicy = RoutePolicy::tenant().module(Module::TradeSpend, Action::Create);
const APPROVE: RoutePolicy = RoutePolicy::tenant()
    .roles(APPROVERS)
    .module(Module::TradeSpend, Action::Approve);

/// Creates the trade spend router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/trade-spends",
            guarded(READ, get(list_trade_spends)).merge(guarded(CREATE, post(create_trade_spend))),
        )
        .route("/trade-spends/{spend_id}", guarded(READ, get(get_trade_spend)))
        .route(
            "/trade-spends/{spend_id}/approve",
            guarded(APPROVE, post(approve_trade_spend)),
        )
}

fn spend_not_found() -> AppError {
    AppError::not_found("Trade spend")
}

async fn list_trade_spends(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Tenant(tenant): Tenant,
    Query(filter): Query<TradeSpendFilter>,
) -> ApiResult<Json<Success<Vec<TradeSpend>>>> {
    let filter = filter.visible_to(&identity);
    Ok(ok(state
        .store
        .list_trade_spends(tenant.scope_query(filter))
        .await?))
}

async fn get_trade_spend(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Tenant(tenant): Tenant,
    Path(spend_id): Path<TradeSpendId>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<Success<TradeSpend>>> {
    let spend = state
        .store
        .get_trade_spend(tenant.scope_query(spend_id))
        .await?;
    let spend = tenant.ensure_owned(spend, "Trade spend")?;
    audit::enforce(
        &identity,
        uri.path(),
        READ.target(),
        READ.authorize_record(&identity, &spend.entities(), None),
    )?;
    Ok(ok(spend))
}

async fn create_trade_spend(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Tenant(tenant): Tenant,
    OriginalUri(uri): OriginalUri,
    Json(payload): Json<NewTradeSpend>,
) -> ApiResult<(StatusCode, Json<Success<TradeSpend>>)> {
    payload.validate()?;
    audit::enforce(
        &identity,
        uri.path(),
        CREATE.target(),
        CREATE.authorize_record(&identity, &payload.entities(), None),
    )?;

    let spend = state
        .store
        .create_trade_spend(tenant.stamp_tenant(payload), identity.user_id())
        .await?;
    tracing::info!(
        company_id = %tenant.company_id(),
        spend_id = %spend.id,
        amount = %spend.amount,
        category = spend.category.as_str(),
        "trade spend created"
    );
    Ok((StatusCode::CREATED, ok(spend)))
}

async fn approve_trade_spend(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Tenant(tenant): Tenant,
    Path(spend_id): Path<TradeSpendId>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<Success<TradeSpend>>> {
    let spend = state
        .store
        .get_trade_spend(tenant.scope_query(spend_id))
        .await?;
    let spend = tenant.ensure_owned(spend, "Trade spend")?;
    audit::enforce(
        &identity,
        uri.path(),
        APPROVE.target(),
        APPROVE.authorize_record(
            &identity,
            &spend.entities(),
            Some((spend.category, spend.amount)),
        ),
    )?;

    let approved = state
        .store
        .approve_trade_spend(tenant.scope_query(spend_id), identity.user_id(), Utc::now())
        .await?
        .ok_or_else(spend_not_found)?;
    tracing::info!(
        target: "spendgate::audit",
        company_id = %tenant.company_id(),
        spend_id = %approved.id,
        approver = %identity.user_id(),
        amount = %approved.amount,
        "trade spend approved"
    );
    Ok(ok(approved))
}
