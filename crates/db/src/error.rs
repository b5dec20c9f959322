//! Storage errors.

use sea_orm::{DbErr, SqlErr};
use spendgate_core::spend::SpendError;
use spendgate_core::tenant::{LifecycleError, QuotaExceeded};
use spendgate_shared::AppError;
use thiserror::Error;

/// Errors returned by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness rule was violated.
    #[error("{0}")]
    Duplicate(String),

    /// A stored row could not be mapped back into a domain record.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// A company lifecycle rule refused the change.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// A subscription quota refused the insert.
    #[error(transparent)]
    Quota(#[from] QuotaExceeded),

    /// A trade spend rule refused the change.
    #[error(transparent)]
    Spend(#[from] SpendError),

    /// Backend failure.
    #[error("database error: {0}")]
    Database(DbErr),
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                Self::Duplicate(duplicate_message(&detail))
            }
            _ => Self::Database(err),
        }
    }
}

/// Maps a constraint name in the driver message to a client-facing message.
fn duplicate_message(detail: &str) -> String {
    const KNOWN: [(&str, &str); 6] = [
        ("uq_users_email", "Email is already registered"),
        ("uq_users_company_employee", "Employee ID already exists in this company"),
        ("uq_companies_name", "Company name is already taken"),
        ("uq_companies_code", "Company code is already taken"),
        ("uq_companies_domain", "Company domain is already taken"),
        ("trade_spends_pkey", "Trade spend already exists"),
    ];
    KNOWN
        .iter()
        .find(|(constraint, _)| detail.contains(constraint))
        .map_or_else(|| "Duplicate entry".to_string(), |(_, msg)| (*msg).to_string())
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(message) => AppError::duplicate(message),
            StoreError::Lifecycle(e) => e.into(),
            StoreError::Spend(e) => e.into(),
            StoreError::Quota(e) => e.into(),
            StoreError::Corrupt(detail) => {
                tracing::error!(%detail, "corrupt record in store");
                AppError::database(detail)
            }
            StoreError::Database(e) => {
                tracing::error!(error = %e, "database error");
                AppError::database(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spendgate_shared::ErrorCode;

    #[test]
    fn test_duplicate_maps_to_400() {
        let err = AppError::from(StoreError::Duplicate("Email is already registered".into()));
        assert_eq!(err.code(), ErrorCode::DuplicateEntry);
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_duplicate_message_from_constraint() {
        assert_eq!(
            duplicate_message(
                "duplicate key value violates unique constraint \"uq_companies_domain\""
            ),
            "Company domain is already taken"
        );
        assert_eq!(duplicate_message("something else"), "Duplicate entry");
    }

    #[test]
    fn test_quota_maps_to_403() {
        let err = AppError::from(StoreError::from(QuotaExceeded {
            resource: spendgate_core::tenant::Resource::Users,
            max: 5,
        }));
        assert_eq!(err.code(), ErrorCode::QuotaExceeded);
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_database_error_is_opaque() {
        let err = AppError::from(StoreError::Database(DbErr::Custom("boom".into())));
        assert_eq!(err.code(), ErrorCode::DatabaseError);
        assert_eq!(err.message(), "A database error occurred");
    }
}
