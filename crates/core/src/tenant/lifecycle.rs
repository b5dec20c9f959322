//! Company lifecycle state machine.
//!
//! ```text
//! active <-> suspended -> deleted
//! active <-> inactive  -> deleted
//! active ------------------> deleted
//! ```
//!
//! Deleted is terminal. Entering suspended or deleted cascades to every user
//! of the company; leaving suspended restores the users it suspended. The
//! store applies a [`TransitionPlan`] and its cascade as one atomic write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spendgate_shared::types::UserId;
use spendgate_shared::{AppError, ErrorCode};
use thiserror::Error;

use super::company::{Company, SubscriptionStatus};
use crate::identity::UserStatus;

/// Company lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    /// Operating normally.
    Active,
    /// Switched off without affecting users.
    Inactive,
    /// Suspended by the platform; users are suspended with it.
    Suspended,
    /// Soft-deleted. Terminal.
    Deleted,
}

impl CompanyStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
            Self::Deleted => "deleted",
        }
    }

    /// Parse a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "suspended" => Some(Self::Suspended),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Only active companies let their users in.
    #[must_use]
    pub const fn admits_users(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Checks if transition to the target status is allowed.
    #[must_use]
    pub const fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (*self, target),
            (Self::Active, Self::Suspended | Self::Inactive | Self::Deleted)
                | (Self::Suspended | Self::Inactive, Self::Active | Self::Deleted)
        )
    }
}

impl std::fmt::Display for CompanyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the append-only status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Previous status.
    pub from: CompanyStatus,
    /// New status.
    pub to: CompanyStatus,
    /// Who made the change.
    pub actor: UserId,
    /// Why.
    pub reason: String,
    /// When.
    pub at: DateTime<Utc>,
}

/// Status update applied to a company's users alongside a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserCascade {
    /// Only users currently in one of these statuses are touched.
    pub from: &'static [UserStatus],
    /// The status they move to.
    pub to: UserStatus,
}

impl UserCascade {
    /// True if a user with `status` is affected.
    #[must_use]
    pub fn applies_to(&self, status: UserStatus) -> bool {
        self.from.contains(&status)
    }
}

/// Lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// Transition not allowed from the current status.
    #[error("cannot change company status from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: CompanyStatus,
        /// Requested status.
        to: CompanyStatus,
    },
    /// Subscription status change not allowed from the current status.
    #[error("cannot change subscription status from {from} to {to}")]
    InvalidSubscriptionTransition {
        /// Current status.
        from: SubscriptionStatus,
        /// Requested status.
        to: SubscriptionStatus,
    },
    /// Status changes require a reason.
    #[error("a reason is required to change company status")]
    MissingReason,
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::InvalidTransition { .. }
            | LifecycleError::InvalidSubscriptionTransition { .. } => {
                AppError::new(ErrorCode::InvalidTransition, err.to_string())
            }
            LifecycleError::MissingReason => AppError::validation(err.to_string()),
        }
    }
}

/// A validated status transition, ready to be applied atomically by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    /// The history entry to append.
    pub change: StatusChange,
    /// User cascade, if the transition has one.
    pub cascade: Option<UserCascade>,
}

const FROM_ACTIVE: &[UserStatus] = &[UserStatus::Active];
const FROM_SUSPENDED: &[UserStatus] = &[UserStatus::Suspended];
const FROM_LIVE: &[UserStatus] = &[UserStatus::Active, UserStatus::Suspended];

/// Validates a status change and works out its user cascade.
///
/// # Errors
///
/// Returns `LifecycleError::MissingReason` for a blank reason and
/// `LifecycleError::InvalidTransition` for a disallowed edge.
pub fn plan_transition(
    company: &Company,
    to: CompanyStatus,
    actor: UserId,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<TransitionPlan, LifecycleError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(LifecycleError::MissingReason);
    }
    let from = company.status;
    if !from.can_transition_to(to) {
        return Err(LifecycleError::InvalidTransition { from, to });
    }

    let cascade = match (from, to) {
        (_, CompanyStatus::Suspended) => Some(UserCascade {
            from: FROM_ACTIVE,
            to: UserStatus::Suspended,
        }),
        (_, CompanyStatus::Deleted) => Some(UserCascade {
            from: FROM_LIVE,
            to: UserStatus::Deleted,
        }),
        (CompanyStatus::Suspended, CompanyStatus::Active) => Some(UserCascade {
            from: FROM_SUSPENDED,
            to: UserStatus::Active,
        }),
        _ => None,
    };

    Ok(TransitionPlan {
        change: StatusChange {
            from,
            to,
            actor,
            reason: reason.to_string(),
            at: now,
        },
        cascade,
    })
}

impl TransitionPlan {
    /// Applies the company side of the plan. The user cascade is the store's job.
    pub fn apply_to(&self, company: &mut Company) {
        company.status = self.change.to;
        company.updated_at = self.change.at;
        company.status_history.push(self.change.clone());
    }
}
