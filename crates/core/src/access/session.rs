//! Authentication decisions over an already verified token.
//!
//! Signature and expiry are checked by the token service before any lookup.
//! What remains is comparing the claims with the live user record.

use spendgate_shared::types::{CompanyId, UserId};
use spendgate_shared::{AppResult, Claims};

use super::error::AccessError;
use crate::auth::verify_password;
use crate::identity::{ApprovalLimits, AssignedEntities, Department, Role, User};

/// The authenticated caller, built from the live user record.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    user: User,
}

impl VerifiedIdentity {
    /// The live user record.
    #[must_use]
    pub const fn user(&self) -> &User {
        &self.user
    }

    /// Consumes the identity and returns the user.
    #[must_use]
    pub fn into_user(self) -> User {
        self.user
    }

    /// User ID.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user.id
    }

    /// Current role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.user.role
    }

    /// Owning company.
    #[must_use]
    pub const fn company_id(&self) -> Option<CompanyId> {
        self.user.company_id
    }

    /// Department.
    #[must_use]
    pub const fn department(&self) -> Department {
        self.user.department
    }

    /// Approval ceilings.
    #[must_use]
    pub const fn approval_limits(&self) -> &ApprovalLimits {
        &self.user.approval_limits
    }

    /// Assigned entities.
    #[must_use]
    pub const fn assigned(&self) -> &AssignedEntities {
        &self.user.assigned
    }
}

/// Checks the live user against the claims of a verified token.
///
/// `user` is the record loaded by `claims.sub`, or `None` if it is gone.
///
/// # Errors
///
/// - `UserNotFound` if the user no longer exists
/// - `AccountDeactivated` if the flag is off or the status is suspended/deleted
/// - `CredentialsRotated` if the token predates the last password change
/// - `ClaimMismatch` if the token's company differs from the user's
pub fn verify_session(
    claims: &Claims,
    user: Option<User>,
) -> Result<VerifiedIdentity, AccessError> {
    let user = user.ok_or(AccessError::UserNotFound)?;
    if user.id.into_inner() != claims.user_id() {
        return Err(AccessError::UserNotFound);
    }
    if !user.is_account_active() {
        return Err(AccessError::AccountDeactivated);
    }
    if user.token_predates_password_change(claims.iat) {
        return Err(AccessError::CredentialsRotated);
    }
    if user.company_id.map(CompanyId::into_inner) != claims.company_id() {
        return Err(AccessError::ClaimMismatch);
    }
    Ok(VerifiedIdentity { user })
}

/// Checks a login attempt.
///
/// Unknown email and wrong password produce the same error.
///
/// # Errors
///
/// Returns `INVALID_CREDENTIALS` or `ACCOUNT_DEACTIVATED`, or an internal
/// error if the stored hash is unreadable.
pub fn verify_credentials(user: Option<User>, password: &str) -> AppResult<VerifiedIdentity> {
    let user = user.ok_or(AccessError::InvalidCredentials)?;
    if !verify_password(password, &user.password_hash)? {
        return Err(AccessError::InvalidCredentials.into());
    }
    if !user.is_account_active() {
        return Err(AccessError::AccountDeactivated.into());
    }
    Ok(VerifiedIdentity { user })
}

#[cfg(test)]
pub(crate) fn identity_for(user: User) -> VerifiedIdentity {
    VerifiedIdentity { user }
}
