//! Route policies as data.
//!
//! A route declares which checks it needs; evaluation always runs them in the
//! order role, module licence, permission, entity scope, approval limit and
//! stops at the first failure.

use rust_decimal::Decimal;

use super::error::AccessError;
use super::policy::{
    EntityRef, require_approval_limit, require_entity_scope, require_module_enabled,
    require_permission, require_role,
};
use super::session::VerifiedIdentity;
use super::tenancy::{TenantAccess, TenantContext};
use crate::identity::{ApprovalCategory, Role};
use crate::tenant::{Action, Module};

/// The checks one route requires before its handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePolicy {
    roles: &'static [Role],
    module: Option<(Module, Action)>,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::tenant()
    }
}

impl RoutePolicy {
    /// Any tenant role, no module requirement.
    #[must_use]
    pub const fn tenant() -> Self {
        Self {
            roles: &Role::TENANT_ROLES,
            module: None,
        }
    }

    /// Restricts the role allow-list.
    #[must_use]
    pub const fn roles(mut self, roles: &'static [Role]) -> Self {
        self.roles = roles;
        self
    }

    /// Requires the module licence and the matching permission.
    #[must_use]
    pub const fn module(mut self, module: Module, action: Action) -> Self {
        self.module = Some((module, action));
        self
    }

    /// The module and action this route is tagged with.
    #[must_use]
    pub const fn target(&self) -> Option<(Module, Action)> {
        self.module
    }

    /// Runs the request-level checks: role, module licence, permission.
    ///
    /// Returns the tenant context the handler must use.
    ///
    /// # Errors
    ///
    /// Returns the first failing check. The super-admin has no tenant context
    /// and is refused as `InsufficientRole` on tenant routes.
    pub fn authorize<'a>(
        &self,
        identity: &VerifiedIdentity,
        access: &'a TenantAccess,
    ) -> Result<&'a TenantContext, AccessError> {
        require_role(identity, self.roles)?;
        let tenant = access
            .tenant()
            .ok_or(AccessError::InsufficientRole(identity.role()))?;
        if let Some((module, action)) = self.module {
            require_module_enabled(identity, tenant.company(), module, action)?;
            require_permission(identity, module, action)?;
        }
        Ok(tenant)
    }

    /// Runs the record-level checks: entity scope for each target, then the
    /// approval limit if the action commits an amount.
    ///
    /// # Errors
    ///
    /// Returns the first failing check.
    pub fn authorize_record(
        &self,
        identity: &VerifiedIdentity,
        entities: &[EntityRef],
        approval: Option<(ApprovalCategory, Decimal)>,
    ) -> Result<(), AccessError> {
        for entity in entities {
            require_entity_scope(identity, *entity)?;
        }
        if let Some((category, amount)) = approval {
            require_approval_limit(identity, category, amount)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::session::identity_for;
    use crate::access::tenancy::context_for;
    use crate::identity::{ApprovalLimits, NewUser, Permission, User};
    use crate::tenant::{Company, ModuleGrant, NewCompany};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use spendgate_shared::types::{CompanyId, CustomerId, UserId};

    const APPROVE: RoutePolicy = RoutePolicy::tenant()
        .roles(&[Role::Admin, Role::Board, Role::Director, Role::Manager, Role::Kam])
        .module(Module::TradeSpend, Action::Approve);

    fn company(modules: Vec<ModuleGrant>) -> Company {
        let now = Utc::now();
        let mut c =
            NewCompany::trial("Acme", "ACME", "acme.test", now).into_company(CompanyId::new(), now);
        c.modules = modules;
        c
    }

    fn user(role: Role, company: &Company) -> User {
        let mut new = NewUser::company_admin(
            company.id,
            "E-1",
            "u@acme.test",
            String::new(),
            "U",
            "Ser",
        );
        new.role = role;
        new.into_user(UserId::new(), Utc::now())
    }

    #[test]
    fn test_role_checked_before_module() {
        let c = company(vec![]);
        let access = TenantAccess::Tenant(context_for(c.clone()));
        let analyst = identity_for(user(Role::Analyst, &c));

        assert_eq!(
            APPROVE.authorize(&analyst, &access).unwrap_err(),
            AccessError::InsufficientRole(Role::Analyst)
        );
    }

    #[test]
    fn test_module_checked_before_permission() {
        let c = company(vec![ModuleGrant::only(Module::TradeSpend, &[Action::Read])]);
        let access = TenantAccess::Tenant(context_for(c.clone()));
        let kam = identity_for(user(Role::Kam, &c));

        assert_eq!(
            APPROVE.authorize(&kam, &access).unwrap_err().check(),
            "module"
        );
    }

    #[test]
    fn test_permission_after_module() {
        let c = company(vec![ModuleGrant::full(Module::TradeSpend)]);
        let access = TenantAccess::Tenant(context_for(c.clone()));
        let kam = identity_for(user(Role::Kam, &c));

        assert_eq!(
            APPROVE.authorize(&kam, &access).unwrap_err().check(),
            "permission"
        );

        let mut permitted = user(Role::Kam, &c);
        permitted.permissions = vec![Permission::new(Module::TradeSpend, &[Action::Approve])];
        let ctx = APPROVE.authorize(&identity_for(permitted), &access).unwrap();
        assert_eq!(ctx.company_id(), c.id);
    }

    #[test]
    fn test_super_admin_refused_on_tenant_route() {
        let who = identity_for(
            NewUser::super_admin("root@platform.test", String::new())
                .into_user(UserId::new(), Utc::now()),
        );
        let policy = RoutePolicy::tenant().roles(&[Role::SuperAdmin, Role::Admin]);
        assert_eq!(
            policy.authorize(&who, &TenantAccess::Platform).unwrap_err(),
            AccessError::InsufficientRole(Role::SuperAdmin)
        );
    }

    #[test]
    fn test_entity_checked_before_approval() {
        let c = company(vec![]);
        let mut u = user(Role::Kam, &c);
        u.approval_limits = ApprovalLimits {
            cash_coop: dec!(10),
            ..ApprovalLimits::default()
        };
        let kam = identity_for(u);
        let foreign = CustomerId::new();

        let err = APPROVE
            .authorize_record(
                &kam,
                &[EntityRef::Customer(foreign)],
                Some((ApprovalCategory::CashCoop, dec!(100))),
            )
            .unwrap_err();
        assert_eq!(err.check(), "entity_scope");
    }
}
