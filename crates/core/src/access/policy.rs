//! The authorization policy engine.
//!
//! Each check is a pure function over the live identity and, where needed,
//! the verified company. [`super::RoutePolicy`] composes them in a fixed order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spendgate_shared::types::{CustomerId, ProductId, VendorId};

use super::error::AccessError;
use super::session::VerifiedIdentity;
use crate::identity::{ApprovalCategory, Role};
use crate::tenant::{Action, Company, Module};

/// A customer, product or vendor a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    /// A customer.
    Customer(CustomerId),
    /// A product.
    Product(ProductId),
    /// A vendor.
    Vendor(VendorId),
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer(id) => write!(f, "Customer {id}"),
            Self::Product(id) => write!(f, "Product {id}"),
            Self::Vendor(id) => write!(f, "Vendor {id}"),
        }
    }
}

/// Role allow-list.
///
/// # Errors
///
/// Returns `InsufficientRole` if the caller's role is not listed.
pub fn require_role(identity: &VerifiedIdentity, allowed: &[Role]) -> Result<(), AccessError> {
    let role = identity.role();
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(AccessError::InsufficientRole(role))
    }
}

/// Fine-grained permission lookup. Admins pass.
///
/// # Errors
///
/// Returns `PermissionDenied` if the permission set lacks the action.
pub fn require_permission(
    identity: &VerifiedIdentity,
    module: Module,
    action: Action,
) -> Result<(), AccessError> {
    if identity.user().has_permission(module, action) {
        Ok(())
    } else {
        Err(AccessError::PermissionDenied { module, action })
    }
}

/// Company module licence. Admins pass.
///
/// # Errors
///
/// Returns `ModuleNotEnabled` if the module is absent or switched off and
/// `ModuleActionDenied` if the grant does not cover the action.
pub fn require_module_enabled(
    identity: &VerifiedIdentity,
    company: &Company,
    module: Module,
    action: Action,
) -> Result<(), AccessError> {
    if identity.role().bypasses_permissions() {
        return Ok(());
    }
    match company.grant_for(module) {
        Some(grant) if grant.enabled => {
            if grant.actions.allows(action) {
                Ok(())
            } else {
                Err(AccessError::ModuleActionDenied { module, action })
            }
        }
        _ => Err(AccessError::ModuleNotEnabled(module)),
    }
}

/// Approval ceiling for an amount. Admins and board members pass.
///
/// The boundary is inclusive: an amount equal to the limit is allowed.
///
/// # Errors
///
/// Returns `ApprovalLimitExceeded` carrying the caller's own limit.
pub fn require_approval_limit(
    identity: &VerifiedIdentity,
    category: ApprovalCategory,
    amount: Decimal,
) -> Result<(), AccessError> {
    if identity.role().has_unlimited_approval() {
        return Ok(());
    }
    let limit = identity.approval_limits().limit_for(category);
    if amount <= limit {
        Ok(())
    } else {
        Err(AccessError::ApprovalLimitExceeded {
            category,
            amount,
            limit,
        })
    }
}

/// Entity assignment. Admins, board members and directors pass.
///
/// # Errors
///
/// Returns `EntityNotAssigned` if the target is not in the caller's list.
pub fn require_entity_scope(
    identity: &VerifiedIdentity,
    target: EntityRef,
) -> Result<(), AccessError> {
    if identity.role().sees_all_entities() {
        return Ok(());
    }
    let assigned = identity.assigned();
    let ok = match target {
        EntityRef::Customer(id) => assigned.customers.contains(&id),
        EntityRef::Product(id) => assigned.products.contains(&id),
        EntityRef::Vendor(id) => assigned.vendors.contains(&id),
    };
    if ok {
        Ok(())
    } else {
        Err(AccessError::EntityNotAssigned(target))
    }
}
