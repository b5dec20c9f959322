//! Analytics over tenant data (module `analytics`).

use std::collections::BTreeMap;

use axum::{Json, Router, extract::State, routing::get};
use rust_decimal::Decimal;
use serde::Serialize;
use spendgate_core::access::RoutePolicy;
use spendgate_core::spend::{TradeSpend, TradeSpendFilter};
use spendgate_core::tenant::{Action, Module};
use spendgate_db::TradeSpendStore;
use spendgate_shared::AppError;

use super::{Success, ok};
use crate::AppState;
use crate::error::ApiResult;
use crate::middleware::{CurrentUser, Tenant, guarded};

const READ: RoutePolicy = RoutePolicy::tenant().module(Module::Analytics, Action::Read);

/// Creates the analytics router.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/analytics/trade-spend-summary",
        guarded(READ, get(trade_spend_summary)),
    )
}

/// Count and total for one bucket.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bucket {
    /// Records in the bucket.
    pub count: u64,
    /// Sum of their amounts.
    pub total: Decimal,
}

impl Bucket {
    fn add(&mut self, amount: Decimal) -> Result<(), AppError> {
        self.total = self
            .total
            .checked_add(amount)
            .ok_or_else(|| AppError::internal("trade spend total overflowed"))?;
        self.count += 1;
        Ok(())
    }
}

/// Trade spend totals over the records visible to the caller.
#[derive(Debug, Default, Serialize)]
pub struct SpendSummary {
    /// Everything.
    pub overall: Bucket,
    /// By approval status.
    pub by_status: BTreeMap<&'static str, Bucket>,
    /// By category.
    pub by_category: BTreeMap<&'static str, Bucket>,
}

impl SpendSummary {
    /// Aggregates `spends`.
    ///
    /// # Errors
    ///
    /// Returns an internal error if a total leaves the decimal range.
    pub fn of(spends: &[TradeSpend]) -> Result<Self, AppError> {
        let mut summary = Self::default();
        for spend in spends {
            summary.overall.add(spend.amount)?;
            summary
                .by_status
                .entry(spend.status.as_str())
                .or_default()
                .add(spend.amount)?;
            summary
                .by_category
                .entry(spend.category.as_str())
                .or_default()
                .add(spend.amount)?;
        }
        Ok(summary)
    }
}

async fn trade_spend_summary(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Tenant(tenant): Tenant,
) -> ApiResult<Json<Success<SpendSummary>>> {
    let filter = TradeSpendFilter::default().visible_to(&identity);
    let spends = state
        .store
        .list_trade_spends(tenant.scope_query(filter))
        .await?;
    Ok(ok(SpendSummary::of(&spends)?))
}
