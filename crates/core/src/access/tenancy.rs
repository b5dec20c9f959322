//! Tenant isolation.
//!
//! A [`TenantContext`] is the only way to obtain a [`Scoped`] query or a
//! [`Stamped`] document, and stores only accept those for tenant data. A
//! handler that never went through the tenant gate therefore has nothing it
//! can pass to a tenant-scoped store method.

use chrono::{DateTime, Utc};
use spendgate_shared::AppError;
use spendgate_shared::types::CompanyId;

use super::error::AccessError;
use super::session::VerifiedIdentity;
use crate::identity::{NewUser, User};
use crate::tenant::Company;

/// Records that belong to a tenant.
pub trait TenantOwned {
    /// The owning company, `None` for platform-level records.
    fn owner(&self) -> Option<CompanyId>;
}

impl TenantOwned for User {
    fn owner(&self) -> Option<CompanyId> {
        self.company_id
    }
}

/// Documents that get the tenant id injected before creation.
pub trait TenantStamp {
    /// Sets the owning company.
    fn set_owner(&mut self, company_id: CompanyId);
}

impl TenantStamp for NewUser {
    fn set_owner(&mut self, company_id: CompanyId) {
        self.company_id = Some(company_id);
    }
}

/// A query filter bound to one company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scoped<F> {
    company_id: CompanyId,
    filter: F,
}

impl<F> Scoped<F> {
    /// The tenant constraint.
    #[must_use]
    pub const fn company_id(&self) -> CompanyId {
        self.company_id
    }

    /// The caller's filter.
    #[must_use]
    pub const fn filter(&self) -> &F {
        &self.filter
    }

    /// Splits into the tenant constraint and the filter.
    #[must_use]
    pub fn into_parts(self) -> (CompanyId, F) {
        (self.company_id, self.filter)
    }
}

/// A new document with the tenant id already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamped<D> {
    company_id: CompanyId,
    doc: D,
}

impl<D> Stamped<D> {
    /// The owning company.
    #[must_use]
    pub const fn company_id(&self) -> CompanyId {
        self.company_id
    }

    /// The document.
    #[must_use]
    pub const fn doc(&self) -> &D {
        &self.doc
    }

    /// Returns the stamped document.
    #[must_use]
    pub fn into_inner(self) -> D {
        self.doc
    }
}

/// The verified tenant of a request.
#[derive(Debug, Clone)]
pub struct TenantContext {
    company: Company,
}

impl TenantContext {
    /// The freshly loaded company.
    #[must_use]
    pub const fn company(&self) -> &Company {
        &self.company
    }

    /// Company ID.
    #[must_use]
    pub const fn company_id(&self) -> CompanyId {
        self.company.id
    }

    /// Binds a filter to this tenant.
    #[must_use]
    pub const fn scope_query<F>(&self, filter: F) -> Scoped<F> {
        Scoped {
            company_id: self.company.id,
            filter,
        }
    }

    /// Injects this tenant's id into a new document.
    #[must_use]
    pub fn stamp_tenant<D: TenantStamp>(&self, mut doc: D) -> Stamped<D> {
        doc.set_owner(self.company.id);
        Stamped {
            company_id: self.company.id,
            doc,
        }
    }

    /// Filters out records of other tenants.
    #[must_use]
    pub fn owned<T: TenantOwned>(&self, record: Option<T>) -> Option<T> {
        record.filter(|r| r.owner() == Some(self.company.id))
    }

    /// Like [`Self::owned`], but a missing or foreign record is `NOT_FOUND`.
    ///
    /// Foreign records are never reported as forbidden so their existence
    /// does not leak.
    pub fn ensure_owned<T: TenantOwned>(
        &self,
        record: Option<T>,
        what: &str,
    ) -> Result<T, AppError> {
        self.owned(record).ok_or_else(|| AppError::not_found(what))
    }

    /// Context for a super-admin acting on an explicitly addressed company.
    ///
    /// Skips the status and subscription checks, so platform operators can
    /// manage suspended or lapsed tenants.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientRole` unless the caller is the super-admin.
    pub fn for_platform(
        identity: &VerifiedIdentity,
        company: Company,
    ) -> Result<Self, AccessError> {
        if !identity.role().is_super_admin() {
            return Err(AccessError::InsufficientRole(identity.role()));
        }
        Ok(Self { company })
    }
}

/// Outcome of the tenant gate.
#[derive(Debug, Clone)]
pub enum TenantAccess {
    /// A tenant-bound user with a verified company.
    Tenant(TenantContext),
    /// The super-admin, who is never put behind a tenant filter.
    Platform,
}

impl TenantAccess {
    /// The tenant context, if any.
    #[must_use]
    pub const fn tenant(&self) -> Option<&TenantContext> {
        match self {
            Self::Tenant(ctx) => Some(ctx),
            Self::Platform => None,
        }
    }
}

/// Company the gate has to load for `identity`, or `None` for the super-admin.
///
/// # Errors
///
/// Returns `MissingTenantClaim` for a tenant-bound user without a company.
pub fn tenant_to_load(identity: &VerifiedIdentity) -> Result<Option<CompanyId>, AccessError> {
    if identity.role().is_super_admin() {
        return Ok(None);
    }
    identity
        .company_id()
        .map(Some)
        .ok_or(AccessError::MissingTenantClaim)
}

/// Runs the tenant gate over a freshly loaded company.
///
/// # Errors
///
/// - `MissingTenantClaim` if a tenant-bound user has no company
/// - `TenantNotFound` if the company is gone
/// - `TenantInactive` if the company is not active
/// - `SubscriptionInactive` unless the subscription is active or trial as of `now`
pub fn isolate_tenant(
    identity: &VerifiedIdentity,
    company: Option<Company>,
    now: DateTime<Utc>,
) -> Result<TenantAccess, AccessError> {
    let Some(company_id) = tenant_to_load(identity)? else {
        return Ok(TenantAccess::Platform);
    };
    let company = company
        .filter(|c| c.id == company_id)
        .ok_or(AccessError::TenantNotFound)?;
    check_company_usable(&company, now)?;
    Ok(TenantAccess::Tenant(TenantContext { company }))
}

/// Status and subscription checks shared by the tenant gate and login.
///
/// # Errors
///
/// Returns `TenantInactive` or `SubscriptionInactive`.
pub fn check_company_usable(company: &Company, now: DateTime<Utc>) -> Result<(), AccessError> {
    if !company.is_active() {
        return Err(AccessError::TenantInactive);
    }
    let status = company.subscription.effective_status(now);
    if !status.grants_access() {
        return Err(AccessError::SubscriptionInactive(status));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn context_for(company: Company) -> TenantContext {
    TenantContext { company }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::session::identity_for;
    use crate::identity::Role;
    use crate::tenant::{CompanyStatus, NewCompany, SubscriptionStatus};
    use chrono::Duration;
    use spendgate_shared::ErrorCode;
    use spendgate_shared::types::UserId;

    fn company() -> Company {
        let now = Utc::now();
        NewCompany::trial("Acme", "ACME", "acme.test", now).into_company(CompanyId::new(), now)
    }

    fn member_of(company: &Company, role: Role) -> VerifiedIdentity {
        let mut new = NewUser::company_admin(
            company.id,
            "E-1",
            "user@acme.test",
            String::new(),
            "A",
            "B",
        );
        new.role = role;
        identity_for(new.into_user(UserId::new(), Utc::now()))
    }

    fn tenant(access: TenantAccess) -> TenantContext {
        match access {
            TenantAccess::Tenant(ctx) => ctx,
            TenantAccess::Platform => panic!("expected tenant access"),
        }
    }

    #[test]
    fn test_trial_company_passes() {
        let c = company();
        let who = member_of(&c, Role::Kam);
        let ctx = tenant(isolate_tenant(&who, Some(c.clone()), Utc::now()).unwrap());
        assert_eq!(ctx.company_id(), c.id);
    }

    #[test]
    fn test_super_admin_bypasses() {
        let who = identity_for(
            NewUser::super_admin("root@platform.test", String::new())
                .into_user(UserId::new(), Utc::now()),
        );
        assert!(matches!(
            isolate_tenant(&who, None, Utc::now()).unwrap(),
            TenantAccess::Platform
        ));
    }

    #[test]
    fn test_missing_claim() {
        let c = company();
        let mut user = member_of(&c, Role::Kam).into_user();
        user.company_id = None;
        let who = identity_for(user);
        assert_eq!(
            isolate_tenant(&who, Some(c), Utc::now()).unwrap_err(),
            AccessError::MissingTenantClaim
        );
    }

    #[test]
    fn test_missing_or_other_company_not_found() {
        let c = company();
        let who = member_of(&c, Role::Kam);
        assert_eq!(
            isolate_tenant(&who, None, Utc::now()).unwrap_err(),
            AccessError::TenantNotFound
        );
        assert_eq!(
            isolate_tenant(&who, Some(company()), Utc::now()).unwrap_err(),
            AccessError::TenantNotFound
        );
    }

    #[test]
    fn test_suspended_company_inactive() {
        let mut c = company();
        c.status = CompanyStatus::Suspended;
        let who = member_of(&c, Role::Admin);
        assert_eq!(
            isolate_tenant(&who, Some(c), Utc::now()).unwrap_err(),
            AccessError::TenantInactive
        );
    }

    #[test]
    fn test_cancelled_subscription() {
        let mut c = company();
        c.subscription.status = SubscriptionStatus::Cancelled;
        let who = member_of(&c, Role::Admin);
        let err = isolate_tenant(&who, Some(c), Utc::now()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SubscriptionInactive);
    }

    #[test]
    fn test_lapsed_trial_is_expired() {
        let c = company();
        let who = member_of(&c, Role::Admin);
        let later = Utc::now() + Duration::days(31);
        assert_eq!(
            isolate_tenant(&who, Some(c), later).unwrap_err(),
            AccessError::SubscriptionInactive(SubscriptionStatus::Expired)
        );
    }

    #[test]
    fn test_scope_and_stamp_use_tenant_id() {
        let c = company();
        let ctx = context_for(c.clone());

        let scoped = ctx.scope_query("filter");
        assert_eq!(scoped.company_id(), c.id);
        assert_eq!(*scoped.filter(), "filter");

        let doc = NewUser::company_admin(
            CompanyId::new(),
            "E-2",
            "x@y.test",
            String::new(),
            "X",
            "Y",
        );
        let stamped = ctx.stamp_tenant(doc);
        assert_eq!(stamped.company_id(), c.id);
        assert_eq!(stamped.into_inner().company_id, Some(c.id));
    }

    #[test]
    fn test_foreign_record_is_not_found() {
        let mine = company();
        let theirs = company();
        let ctx = context_for(mine.clone());
        let foreign = member_of(&theirs, Role::Kam).into_user();
        let own = member_of(&mine, Role::Kam).into_user();

        assert!(ctx.owned(Some(own)).is_some());
        let err = ctx.ensure_owned(Some(foreign), "User").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_platform_context_requires_super_admin() {
        let c = company();
        let who = member_of(&c, Role::Admin);
        assert_eq!(
            TenantContext::for_platform(&who, c).unwrap_err(),
            AccessError::InsufficientRole(Role::Admin)
        );
    }
}
