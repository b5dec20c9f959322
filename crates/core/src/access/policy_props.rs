//! Property-based tests for the policy engine and tenant scoping.

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use spendgate_shared::types::{CompanyId, CustomerId, UserId, VendorId};
use uuid::Uuid;

use crate::access::policy::{
    EntityRef, require_approval_limit, require_entity_scope, require_module_enabled,
    require_permission,
};
use crate::access::session::identity_for;
use crate::access::tenancy::context_for;
use crate::access::{AccessError, TenantOwned};
use crate::identity::{ApprovalCategory, ApprovalLimits, NewUser, Permission, Role, User};
use crate::tenant::{Action, Company, Module, ModuleGrant, NewCompany};

/// Strategy for generating non-negative Decimal amounts with two decimals.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000_000i64).prop_map(|n| Decimal::new(n, 2))
}

fn arb_module() -> impl Strategy<Value = Module> {
    prop::sample::select(Module::ALL.to_vec())
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::Read),
        Just(Action::Create),
        Just(Action::Update),
        Just(Action::Delete),
        Just(Action::Approve),
        Just(Action::Export),
    ]
}

fn arb_category() -> impl Strategy<Value = ApprovalCategory> {
    prop_oneof![
        Just(ApprovalCategory::Marketing),
        Just(ApprovalCategory::CashCoop),
        Just(ApprovalCategory::TradingTerms),
        Just(ApprovalCategory::Promotions),
    ]
}

/// A tenant role without any of the bypasses.
fn arb_field_role() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Manager),
        Just(Role::Kam),
        Just(Role::SalesRep),
        Just(Role::SalesAdmin),
        Just(Role::Analyst),
    ]
}

fn arb_grants() -> impl Strategy<Value = Vec<ModuleGrant>> {
    prop::collection::vec(
        (arb_module(), any::<bool>(), prop::collection::vec(arb_action(), 0..4)),
        0..6,
    )
    .prop_map(|raw| {
        raw.into_iter()
            .map(|(module, enabled, actions)| ModuleGrant {
                enabled,
                ..ModuleGrant::only(module, &actions)
            })
            .collect()
    })
}

fn company(modules: Vec<ModuleGrant>) -> Company {
    let now = Utc::now();
    let mut c =
        NewCompany::trial("Acme", "ACME", "acme.test", now).into_company(CompanyId::new(), now);
    c.modules = modules;
    c
}

fn user(role: Role, company_id: CompanyId) -> User {
    let mut new =
        NewUser::company_admin(company_id, "E-1", "u@acme.test", String::new(), "U", "Ser");
    new.role = role;
    new.into_user(UserId::new(), Utc::now())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Admins pass every bypassable check whatever their data says.
    #[test]
    fn prop_admin_bypass(
        grants in arb_grants(),
        module in arb_module(),
        action in arb_action(),
        category in arb_category(),
        amount in arb_amount(),
        customer in any::<u128>(),
        vendor in any::<u128>(),
    ) {
        let c = company(grants);
        let admin = identity_for(user(Role::Admin, c.id));

        prop_assert!(require_permission(&admin, module, action).is_ok());
        prop_assert!(require_module_enabled(&admin, &c, module, action).is_ok());
        prop_assert!(require_approval_limit(&admin, category, amount).is_ok());
        let customer = CustomerId::from_uuid(Uuid::from_u128(customer));
        let vendor = VendorId::from_uuid(Uuid::from_u128(vendor));
        prop_assert!(require_entity_scope(&admin, EntityRef::Customer(customer)).is_ok());
        prop_assert!(require_entity_scope(&admin, EntityRef::Vendor(vendor)).is_ok());
    }

    /// For non-bypass roles the approval check is exactly `amount <= limit`.
    #[test]
    fn prop_approval_limit_is_inclusive_upper_bound(
        role in arb_field_role(),
        category in arb_category(),
        limit in arb_amount(),
        amount in arb_amount(),
    ) {
        let mut u = user(role, CompanyId::new());
        u.approval_limits = ApprovalLimits {
            marketing: limit,
            cash_coop: limit,
            trading_terms: limit,
            promotions: limit,
        };
        let who = identity_for(u);

        let result = require_approval_limit(&who, category, amount);
        if amount <= limit {
            prop_assert!(result.is_ok());
        } else {
            prop_assert_eq!(
                result,
                Err(AccessError::ApprovalLimitExceeded { category, amount, limit })
            );
        }
    }

    /// A module absent from the company's grants is refused to non-admins even
    /// when their own permission set allows it.
    #[test]
    fn prop_module_gating_independent_of_permissions(
        role in arb_field_role(),
        module in arb_module(),
        action in arb_action(),
        grants in arb_grants(),
    ) {
        let grants: Vec<ModuleGrant> =
            grants.into_iter().filter(|g| g.module != module).collect();
        let c = company(grants);
        let mut u = user(role, c.id);
        u.permissions = vec![Permission::new(module, &[action])];
        let who = identity_for(u);

        prop_assert!(require_permission(&who, module, action).is_ok());
        prop_assert_eq!(
            require_module_enabled(&who, &c, module, action),
            Err(AccessError::ModuleNotEnabled(module))
        );
    }

    /// `owned` only ever yields records of the context's own company.
    #[test]
    fn prop_owned_never_yields_foreign_records(
        owners in prop::collection::vec(any::<bool>(), 1..20),
    ) {
        let mine = company(vec![]);
        let other = CompanyId::new();
        let ctx = context_for(mine.clone());

        for is_mine in owners {
            let record = user(Role::Kam, if is_mine { mine.id } else { other });
            let seen = ctx.owned(Some(record));
            prop_assert_eq!(seen.is_some(), is_mine);
            if let Some(r) = seen {
                prop_assert_eq!(r.owner(), Some(mine.id));
            }
        }
    }

    /// Scoped queries always carry the context's company.
    #[test]
    fn prop_scope_query_binds_company(filter in any::<u64>()) {
        let c = company(vec![]);
        let ctx = context_for(c.clone());
        let scoped = ctx.scope_query(filter);
        prop_assert_eq!(scoped.company_id(), c.id);
        prop_assert_eq!(*scoped.filter(), filter);
    }
}
