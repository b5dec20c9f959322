//! Security audit events.
//!
//! Everything here logs on the `spendgate::audit` target so operators can
//! route it separately from request logs.

use spendgate_core::access::{AccessError, VerifiedIdentity};
use spendgate_core::tenant::{Action, Module, StatusChange};
use spendgate_shared::types::CompanyId;
use tracing::field::display;

use crate::error::ApiError;

/// Records a refused request. Only the first failing check is recorded.
pub fn denied(
    identity: Option<&VerifiedIdentity>,
    err: &AccessError,
    path: &str,
    target: Option<(Module, Action)>,
) {
    let (module, action) = target.map_or(("-", "-"), |(m, a)| (m.as_str(), a.as_str()));
    tracing::warn!(
        target: "spendgate::audit",
        user_id = identity.map(|i| display(i.user_id())),
        role = identity.map(|i| i.role().as_str()),
        company_id = identity.and_then(VerifiedIdentity::company_id).map(display),
        check = err.check(),
        code = %err.code(),
        module,
        action,
        path,
        "access denied"
    );
}

/// Runs a record-level decision, auditing a refusal.
pub fn enforce<T>(
    identity: &VerifiedIdentity,
    path: &str,
    target: Option<(Module, Action)>,
    decision: Result<T, AccessError>,
) -> Result<T, ApiError> {
    decision.map_err(|err| {
        denied(Some(identity), &err, path, target);
        err.into()
    })
}

/// Records a company lifecycle transition.
pub fn status_changed(company_id: CompanyId, change: &StatusChange, cascaded_users: u64) {
    tracing::info!(
        target: "spendgate::audit",
        %company_id,
        actor = %change.actor,
        from = change.from.as_str(),
        to = change.to.as_str(),
        reason = %change.reason,
        cascaded_users,
        "company status changed"
    );
}

/// Records a successful login.
pub fn login_succeeded(identity: &VerifiedIdentity) {
    tracing::info!(
        target: "spendgate::audit",
        user_id = %identity.user_id(),
        role = identity.role().as_str(),
        company_id = identity.company_id().map(display),
        "login succeeded"
    );
}

/// Records a failed login. The email is the only caller-supplied field logged.
pub fn login_failed(email: &str, reason: &str) {
    tracing::info!(target: "spendgate::audit", email, reason, "login failed");
}
