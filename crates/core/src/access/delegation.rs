//! Limits on what one user may do to another through user administration.
//!
//! Company admins are unrestricted. Everyone else may only touch users who
//! do not outrank them, and may only hand out roles, permissions and approval
//! limits they hold themselves. Nobody but an admin edits their own
//! authorization data.

use spendgate_shared::types::UserId;

use super::error::AccessError;
use super::session::VerifiedIdentity;
use crate::identity::{ApprovalCategory, ApprovalLimits, Permission, Role, User};
use crate::tenant::{Action, Module};

/// Authorization data a create or update would store on a user.
#[derive(Debug, Clone, Copy, Default)]
pub struct Grant<'a> {
    /// New role.
    pub role: Option<Role>,
    /// Replacement permission set.
    pub permissions: Option<&'a [Permission]>,
    /// Replacement approval limits.
    pub approval_limits: Option<&'a ApprovalLimits>,
    /// True if assigned entities are replaced.
    pub assigned: bool,
}

impl Grant<'_> {
    /// True if the grant changes what the user may do, not just who they are.
    #[must_use]
    pub const fn changes_access(&self) -> bool {
        self.permissions.is_some() || self.approval_limits.is_some() || self.assigned
    }
}

/// The caller may administer `target` as it is now.
///
/// # Errors
///
/// Returns `InsufficientRole` if the target is an admin or outranks the
/// caller, unless the caller is an admin.
pub fn require_authority_over(actor: &VerifiedIdentity, target: &User) -> Result<(), AccessError> {
    let role = actor.role();
    if role.bypasses_permissions() || !target.role.outranks(role) {
        Ok(())
    } else {
        Err(AccessError::InsufficientRole(role))
    }
}

/// The caller may hand out `grant` to `target` (`None` for a new user).
///
/// # Errors
///
/// - `InsufficientRole` for a role that outranks the caller
/// - `PermissionDenied` for a self-edit of authorization data, or a
///   permission the caller does not hold
/// - `ApprovalLimitExceeded` for a limit above the caller's own, carrying
///   the caller's limit
pub fn require_delegable(
    actor: &VerifiedIdentity,
    target: Option<UserId>,
    grant: &Grant<'_>,
) -> Result<(), AccessError> {
    let role = actor.role();
    if role.bypasses_permissions() {
        return Ok(());
    }
    if grant.role.is_some_and(|r| r.outranks(role)) {
        return Err(AccessError::InsufficientRole(role));
    }
    if target == Some(actor.user_id()) && grant.changes_access() {
        return Err(AccessError::PermissionDenied {
            module: Module::Users,
            action: Action::Update,
        });
    }

    for permission in grant.permissions.unwrap_or_default() {
        if let Some(&action) = permission
            .actions
            .iter()
            .find(|a| !actor.user().has_permission(permission.module, **a))
        {
            return Err(AccessError::PermissionDenied {
                module: permission.module,
                action,
            });
        }
    }

    if let Some(limits) = grant.approval_limits
        && !role.has_unlimited_approval()
    {
        let own = actor.approval_limits();
        for category in ApprovalCategory::ALL {
            let amount = limits.limit_for(category);
            let limit = own.limit_for(category);
            if amount > limit {
                return Err(AccessError::ApprovalLimitExceeded {
                    category,
                    amount,
                    limit,
                });
            }
        }
    }
    Ok(())
}
