//! In-memory store.
//!
//! Used by tests and by the server when `database.url` is `memory://`. A
//! single lock guards all tables, so a company status change and its user
//! cascade are observed together or not at all.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use spendgate_core::access::{Scoped, Stamped};
use spendgate_core::identity::{NewUser, User, UserUpdate};
use spendgate_core::spend::{NewTradeSpend, TradeSpend, TradeSpendFilter};
use spendgate_core::tenant::{
    Company, CompanyStatus, CompanyUpdate, ModuleGrant, NewCompany, Resource, Subscription,
    plan_transition,
};
use spendgate_shared::types::{CompanyId, TradeSpendId, UserId};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::{
    CompanyStore, StatusChangeOutcome, StoreResult, TradeSpendStore, UserFilter, UserStore,
    UserTotals,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    companies: HashMap<CompanyId, Company>,
    trade_spends: HashMap<TradeSpendId, TradeSpend>,
}

impl Tables {
    fn check_user_unique(&self, user: &User) -> StoreResult<()> {
        for other in self.users.values().filter(|u| u.id != user.id) {
            if other.email == user.email {
                return Err(StoreError::Duplicate("Email is already registered".into()));
            }
            if other.company_id.is_some()
                && other.company_id == user.company_id
                && other.employee_id == user.employee_id
            {
                return Err(StoreError::Duplicate(
                    "Employee ID already exists in this company".into(),
                ));
            }
        }
        Ok(())
    }

    fn check_company_unique(&self, company: &Company) -> StoreResult<()> {
        for other in self.companies.values().filter(|c| c.id != company.id) {
            if other.name.eq_ignore_ascii_case(&company.name) {
                return Err(StoreError::Duplicate("Company name is already taken".into()));
            }
            if other.code == company.code {
                return Err(StoreError::Duplicate("Company code is already taken".into()));
            }
            if other.domain == company.domain {
                return Err(StoreError::Duplicate("Company domain is already taken".into()));
            }
        }
        Ok(())
    }

    fn scoped_user_mut(&mut self, scope: &Scoped<UserId>) -> Option<&mut User> {
        let company_id = scope.company_id();
        self.users
            .get_mut(scope.filter())
            .filter(|u| u.company_id == Some(company_id))
    }
}

/// A store kept entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_platform_user(&self, new: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let user = new.into_user(UserId::new(), Utc::now());
        tables.check_user_unique(&user)?;
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(user) = self.tables.write().await.users.get_mut(&id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn change_password(
        &self,
        id: UserId,
        password_hash: String,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        if let Some(user) = self.tables.write().await.users.get_mut(&id) {
            user.password_hash = password_hash;
            user.password_changed_at = Some(at);
            user.updated_at = at;
        }
        Ok(())
    }

    async fn rename_user(
        &self,
        id: UserId,
        first_name: String,
        last_name: String,
    ) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.get_mut(&id).map(|user| {
            user.first_name = first_name;
            user.last_name = last_name;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn user_totals(&self) -> StoreResult<UserTotals> {
        let tables = self.tables.read().await;
        let tenant_users = tables.users.values().filter(|u| u.company_id.is_some());
        let mut totals = UserTotals::default();
        for user in tenant_users {
            totals.total += 1;
            if user.is_account_active() {
                totals.active += 1;
            }
        }
        Ok(totals)
    }

    async fn list_users(&self, scope: Scoped<UserFilter>) -> StoreResult<Vec<User>> {
        let (company_id, filter) = scope.into_parts();
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| u.company_id == Some(company_id) && filter.matches(u))
            .cloned()
            .collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn count_users(&self, scope: Scoped<()>) -> StoreResult<u64> {
        let company_id = scope.company_id();
        let tables = self.tables.read().await;
        let count = tables
            .users
            .values()
            .filter(|u| u.company_id == Some(company_id))
            .count();
        Ok(count as u64)
    }

    async fn get_user(&self, scope: Scoped<UserId>) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .get(scope.filter())
            .filter(|u| u.company_id == Some(scope.company_id()))
            .cloned())
    }

    async fn create_user(&self, new: Stamped<NewUser>) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let company_id = new.company_id();
        let mut user = new.into_inner().into_user(UserId::new(), Utc::now());
        user.company_id = Some(company_id);
        tables.check_user_unique(&user)?;
        if let Some(company) = tables.companies.get(&company_id) {
            let current = tables
                .users
                .values()
                .filter(|u| u.company_id == Some(company_id))
                .count();
            company
                .subscription
                .limits
                .check(Resource::Users, current as u64)?;
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(
        &self,
        scope: Scoped<UserId>,
        update: UserUpdate,
    ) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(tables.scoped_user_mut(&scope).map(|user| {
            update.apply(user, Utc::now());
            user.clone()
        }))
    }

    async fn set_user_active(
        &self,
        scope: Scoped<UserId>,
        active: bool,
    ) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(tables.scoped_user_mut(&scope).map(|user| {
            user.is_active = active;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }
}

#[async_trait]
impl CompanyStore for MemoryStore {
    async fn find_company(&self, id: CompanyId) -> StoreResult<Option<Company>> {
        Ok(self.tables.read().await.companies.get(&id).cloned())
    }

    async fn list_companies(&self) -> StoreResult<Vec<Company>> {
        let tables = self.tables.read().await;
        let mut companies: Vec<Company> = tables.companies.values().cloned().collect();
        companies.sort_by_key(|c| c.created_at);
        Ok(companies)
    }

    async fn create_company_with_admin(
        &self,
        company: NewCompany,
        admin: NewUser,
    ) -> StoreResult<(Company, User)> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let company = company.into_company(CompanyId::new(), now);
        tables.check_company_unique(&company)?;

        let mut admin = admin.into_user(UserId::new(), now);
        admin.company_id = Some(company.id);
        tables.check_user_unique(&admin)?;

        tables.companies.insert(company.id, company.clone());
        tables.users.insert(admin.id, admin.clone());
        Ok((company, admin))
    }

    async fn update_company(
        &self,
        id: CompanyId,
        update: CompanyUpdate,
    ) -> StoreResult<Option<Company>> {
        let mut tables = self.tables.write().await;
        let Some(mut company) = tables.companies.get(&id).cloned() else {
            return Ok(None);
        };
        update.apply(&mut company, Utc::now());
        tables.check_company_unique(&company)?;
        tables.companies.insert(id, company.clone());
        Ok(Some(company))
    }

    async fn update_subscription(
        &self,
        id: CompanyId,
        subscription: Subscription,
    ) -> StoreResult<Option<Company>> {
        let mut tables = self.tables.write().await;
        let Some(company) = tables.companies.get_mut(&id) else {
            return Ok(None);
        };
        company.subscription.change_to(subscription)?;
        company.updated_at = Utc::now();
        Ok(Some(company.clone()))
    }

    async fn replace_modules(
        &self,
        id: CompanyId,
        modules: Vec<ModuleGrant>,
    ) -> StoreResult<Option<Company>> {
        let mut tables = self.tables.write().await;
        Ok(tables.companies.get_mut(&id).map(|company| {
            company.modules = modules;
            company.updated_at = Utc::now();
            company.clone()
        }))
    }

    async fn change_company_status(
        &self,
        id: CompanyId,
        to: CompanyStatus,
        actor: UserId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<StatusChangeOutcome>> {
        let mut tables = self.tables.write().await;
        let Some(company) = tables.companies.get_mut(&id) else {
            return Ok(None);
        };
        let plan = plan_transition(company, to, actor, reason, now)?;
        plan.apply_to(company);
        let company = company.clone();

        let mut cascaded_users = 0;
        if let Some(cascade) = plan.cascade {
            for user in tables
                .users
                .values_mut()
                .filter(|u| u.company_id == Some(id) && cascade.applies_to(u.status))
            {
                user.status = cascade.to;
                user.updated_at = now;
                cascaded_users += 1;
            }
        }

        Ok(Some(StatusChangeOutcome {
            company,
            cascaded_users,
        }))
    }
}

#[async_trait]
impl TradeSpendStore for MemoryStore {
    async fn list_trade_spends(
        &self,
        scope: Scoped<TradeSpendFilter>,
    ) -> StoreResult<Vec<TradeSpend>> {
        let (company_id, filter) = scope.into_parts();
        let tables = self.tables.read().await;
        let mut spends: Vec<TradeSpend> = tables
            .trade_spends
            .values()
            .filter(|s| s.company_id == company_id && filter.matches(s))
            .cloned()
            .collect();
        spends.sort_by_key(|s| std::cmp::Reverse(s.created_at));
        Ok(spends)
    }

    async fn get_trade_spend(
        &self,
        scope: Scoped<TradeSpendId>,
    ) -> StoreResult<Option<TradeSpend>> {
        let tables = self.tables.read().await;
        Ok(tables
            .trade_spends
            .get(scope.filter())
            .filter(|s| s.company_id == scope.company_id())
            .cloned())
    }

    async fn create_trade_spend(
        &self,
        new: Stamped<NewTradeSpend>,
        created_by: UserId,
    ) -> StoreResult<TradeSpend> {
        let company_id = new.company_id();
        let spend =
            new.into_inner()
                .into_spend(TradeSpendId::new(), company_id, created_by, Utc::now());
        self.tables
            .write()
            .await
            .trade_spends
            .insert(spend.id, spend.clone());
        Ok(spend)
    }

    async fn approve_trade_spend(
        &self,
        scope: Scoped<TradeSpendId>,
        approver: UserId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<TradeSpend>> {
        let mut tables = self.tables.write().await;
        let Some(spend) = tables
            .trade_spends
            .get_mut(scope.filter())
            .filter(|s| s.company_id == scope.company_id())
        else {
            return Ok(None);
        };
        spend.approve(approver, now)?;
        Ok(Some(spend.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use spendgate_core::access::{TenantAccess, TenantContext, isolate_tenant, verify_session};
    use spendgate_core::identity::{ApprovalCategory, Role, UserStatus};
    use spendgate_core::tenant::{LifecycleError, SubscriptionStatus};
    use spendgate_shared::types::CustomerId;
    use spendgate_shared::{Claims, TokenKind};

    async fn seed(store: &MemoryStore, code: &str) -> (Company, User) {
        let now = Utc::now();
        let company = NewCompany::trial(code, code, &format!("{code}.test"), now);
        let admin = NewUser::company_admin(
            CompanyId::new(),
            "ADMIN-001",
            &format!("admin@{code}.test"),
            String::new(),
            "Ad",
            "Min",
        );
        store.create_company_with_admin(company, admin).await.unwrap()
    }

    fn tenant_of(user: &User, company: &Company) -> TenantContext {
        let now = Utc::now();
        let claims = Claims::new(
            user.id.into_inner(),
            user.company_id.map(CompanyId::into_inner),
            user.role.as_str(),
            TokenKind::Access,
            now,
            now + Duration::hours(1),
        );
        let identity = verify_session(&claims, Some(user.clone())).unwrap();
        match isolate_tenant(&identity, Some(company.clone()), now).unwrap() {
            TenantAccess::Tenant(ctx) => ctx,
            TenantAccess::Platform => panic!("expected tenant"),
        }
    }

    #[tokio::test]
    async fn test_admin_is_linked_to_new_company() {
        let store = MemoryStore::new();
        let (company, admin) = seed(&store, "acme").await;
        assert_eq!(admin.company_id, Some(company.id));
        assert_eq!(admin.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_duplicate_domain_and_email_rejected() {
        let store = MemoryStore::new();
        seed(&store, "acme").await;

        let now = Utc::now();
        let clash = NewCompany::trial("Other", "OTHER", "acme.test", now);
        let admin = NewUser::company_admin(
            CompanyId::new(),
            "A-1",
            "new@other.test",
            String::new(),
            "N",
            "Ew",
        );
        let err = store
            .create_company_with_admin(clash, admin)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        let clash = NewCompany::trial("Other", "OTHER", "other.test", now);
        let admin = NewUser::company_admin(
            CompanyId::new(),
            "A-1",
            "ADMIN@acme.test",
            String::new(),
            "N",
            "Ew",
        );
        let err = store
            .create_company_with_admin(clash, admin)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(store.list_companies().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_scoped_reads_never_cross_tenants() {
        let store = MemoryStore::new();
        let (acme, acme_admin) = seed(&store, "acme").await;
        let (globex, globex_admin) = seed(&store, "globex").await;
        let acme_ctx = tenant_of(&acme_admin, &acme);
        let globex_ctx = tenant_of(&globex_admin, &globex);

        assert!(
            store
                .get_user(acme_ctx.scope_query(globex_admin.id))
                .await
                .unwrap()
                .is_none()
        );
        let listed = store
            .list_users(acme_ctx.scope_query(UserFilter::default()))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, acme_admin.id);

        let draft = NewTradeSpend {
            company_id: None,
            customer_id: CustomerId::new(),
            vendor_id: None,
            category: ApprovalCategory::Marketing,
            amount: dec!(100),
            description: String::new(),
        };
        let spend = store
            .create_trade_spend(globex_ctx.stamp_tenant(draft), globex_admin.id)
            .await
            .unwrap();
        assert_eq!(spend.company_id, globex.id);

        assert!(
            store
                .get_trade_spend(acme_ctx.scope_query(spend.id))
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .approve_trade_spend(acme_ctx.scope_query(spend.id), acme_admin.id, Utc::now())
                .await
                .unwrap()
                .is_none()
        );
        let untouched = store
            .get_trade_spend(globex_ctx.scope_query(spend.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(untouched.approved_by, None);
    }

    #[tokio::test]
    async fn test_suspension_cascades_and_reactivation_restores() {
        let store = MemoryStore::new();
        let (acme, admin) = seed(&store, "acme").await;
        let (globex, outsider) = seed(&store, "globex").await;
        let ctx = tenant_of(&admin, &acme);

        let mut kam = NewUser::company_admin(
            CompanyId::new(),
            "K-1",
            "kam@acme.test",
            String::new(),
            "K",
            "Am",
        );
        kam.role = Role::Kam;
        let kam = store.create_user(ctx.stamp_tenant(kam)).await.unwrap();

        let outcome = store
            .change_company_status(
                acme.id,
                CompanyStatus::Suspended,
                UserId::new(),
                "billing",
                Utc::now(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.cascaded_users, 2);
        assert_eq!(outcome.company.status, CompanyStatus::Suspended);
        assert_eq!(outcome.company.status_history.len(), 1);

        let kam_now = store.find_user(kam.id).await.unwrap().unwrap();
        assert_eq!(kam_now.status, UserStatus::Suspended);
        let outsider_now = store.find_user(outsider.id).await.unwrap().unwrap();
        assert_eq!(outsider_now.status, UserStatus::Active);
        assert_eq!(
            store.find_company(globex.id).await.unwrap().unwrap().status,
            CompanyStatus::Active
        );

        let outcome = store
            .change_company_status(
                acme.id,
                CompanyStatus::Active,
                UserId::new(),
                "paid",
                Utc::now(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.cascaded_users, 2);
        let kam_now = store.find_user(kam.id).await.unwrap().unwrap();
        assert_eq!(kam_now.status, UserStatus::Active);
    }

    #[tokio::test]
    async fn test_invalid_transition_changes_nothing() {
        let store = MemoryStore::new();
        let (acme, admin) = seed(&store, "acme").await;

        let err = store
            .change_company_status(
                acme.id,
                CompanyStatus::Active,
                UserId::new(),
                "noop",
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Lifecycle(_)));

        let company = store.find_company(acme.id).await.unwrap().unwrap();
        assert!(company.status_history.is_empty());
        let admin_now = store.find_user(admin.id).await.unwrap().unwrap();
        assert_eq!(admin_now.status, UserStatus::Active);
    }

    fn analyst(n: usize) -> NewUser {
        let mut new = NewUser::company_admin(
            CompanyId::new(),
            &format!("A-{n}"),
            &format!("analyst{n}@acme.test"),
            String::new(),
            "An",
            "Alyst",
        );
        new.role = Role::Analyst;
        new
    }

    #[tokio::test]
    async fn test_user_quota_holds_under_concurrent_creates() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let (acme, admin) = seed(&store, "acme").await;
        let mut subscription = acme.subscription.clone();
        subscription.limits.max_users = Some(3);
        let acme = store
            .update_subscription(acme.id, subscription)
            .await
            .unwrap()
            .unwrap();
        let ctx = tenant_of(&admin, &acme);

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                let new = ctx.stamp_tenant(analyst(n));
                tokio::spawn(async move { store.create_user(new).await })
            })
            .collect();
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => {}
                Err(StoreError::Quota(e)) => {
                    assert_eq!(e.max, 3);
                    refused += 1;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(refused, 6);
        assert_eq!(store.count_users(ctx.scope_query(())).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_subscription_status_follows_transitions() {
        let store = MemoryStore::new();
        let (acme, _) = seed(&store, "acme").await;

        let mut cancelled = acme.subscription.clone();
        cancelled.status = SubscriptionStatus::Cancelled;
        store
            .update_subscription(acme.id, cancelled.clone())
            .await
            .unwrap()
            .unwrap();

        let mut suspended = cancelled.clone();
        suspended.status = SubscriptionStatus::Suspended;
        let err = store
            .update_subscription(acme.id, suspended)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Lifecycle(LifecycleError::InvalidSubscriptionTransition { .. })
        ));
        let company = store.find_company(acme.id).await.unwrap().unwrap();
        assert_eq!(company.subscription, cancelled);

        assert!(
            store
                .update_subscription(CompanyId::new(), cancelled)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_password_change_moves_rotation_boundary() {
        let store = MemoryStore::new();
        let (_, admin) = seed(&store, "acme").await;
        let at = Utc::now();
        store
            .change_password(admin.id, "new-hash".into(), at)
            .await
            .unwrap();
        let user = store.find_user(admin.id).await.unwrap().unwrap();
        assert_eq!(user.password_changed_at, Some(at));
        assert!(user.token_predates_password_change(at.timestamp() - 1));
    }
}
