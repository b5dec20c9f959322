//! Request access decisions.
//!
//! A request passes through three gates, each a pure function here:
//!
//! 1. [`verify_session`] - token claims against the live user record
//! 2. [`isolate_tenant`] - the caller's company, loaded fresh, must be usable
//! 3. [`RoutePolicy`] - role, module licence, permission, entity scope and
//!    approval limit, in that order
//!
//! The web layer performs the I/O (token decoding, store lookups) and feeds
//! the results in.

mod delegation;
mod error;
mod policy;
mod route;
mod session;
mod tenancy;

#[cfg(test)]
mod policy_props;

pub use delegation::{Grant, require_authority_over, require_delegable};
pub use error::AccessError;
pub use policy::{
    EntityRef, require_approval_limit, require_entity_scope, require_module_enabled,
    require_permission, require_role,
};
pub use route::RoutePolicy;
pub use session::{VerifiedIdentity, verify_credentials, verify_session};
pub use tenancy::{
    Scoped, Stamped, TenantAccess, TenantContext, TenantOwned, TenantStamp,
    check_company_usable, isolate_tenant, tenant_to_load,
};
