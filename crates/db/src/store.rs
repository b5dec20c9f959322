//! Store traits.
//!
//! Tenant data is only reachable through [`Scoped`] filters and [`Stamped`]
//! documents, which can only be minted by a verified `TenantContext`. The
//! unscoped lookups here serve authentication and platform administration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use spendgate_core::access::{Scoped, Stamped};
use spendgate_core::identity::{NewUser, Role, User, UserUpdate};
use spendgate_core::spend::{NewTradeSpend, TradeSpend, TradeSpendFilter};
use spendgate_core::tenant::{
    Company, CompanyStatus, CompanyUpdate, ModuleGrant, NewCompany, Subscription,
};
use spendgate_shared::types::{CompanyId, TradeSpendId, UserId};

use crate::error::StoreError;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Filter for listing a company's users.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct UserFilter {
    /// Only this role.
    pub role: Option<Role>,
    /// Only active or only inactive users.
    pub is_active: Option<bool>,
}

impl UserFilter {
    /// True if `user` passes the filter. The tenant constraint is separate.
    #[must_use]
    pub fn matches(&self, user: &User) -> bool {
        self.role.is_none_or(|r| r == user.role)
            && self.is_active.is_none_or(|a| a == user.is_active)
    }
}

/// Outcome of a company status change.
#[derive(Debug, Clone)]
pub struct StatusChangeOutcome {
    /// The company after the change.
    pub company: Company,
    /// Users whose status was cascaded.
    pub cascaded_users: u64,
}

/// Head counts of tenant users across the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct UserTotals {
    /// Every tenant user, whatever their status.
    pub total: u64,
    /// Tenant users who can currently log in.
    pub active: u64,
}

/// User records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Loads a user by id. Used by the authentication gate.
    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Loads a user by normalised email. Used by login.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Creates a platform-level user such as the bootstrap super-admin.
    async fn create_platform_user(&self, new: NewUser) -> StoreResult<User>;

    /// Records a successful login.
    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> StoreResult<()>;

    /// Replaces the password hash and moves the rotation boundary to `at`.
    async fn change_password(
        &self,
        id: UserId,
        password_hash: String,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Replaces a user's own display name.
    async fn rename_user(
        &self,
        id: UserId,
        first_name: String,
        last_name: String,
    ) -> StoreResult<Option<User>>;

    /// Counts tenant users across every company.
    async fn user_totals(&self) -> StoreResult<UserTotals>;

    /// Lists a company's users.
    async fn list_users(&self, scope: Scoped<UserFilter>) -> StoreResult<Vec<User>>;

    /// Counts a company's users.
    async fn count_users(&self, scope: Scoped<()>) -> StoreResult<u64>;

    /// Loads one of a company's users.
    async fn get_user(&self, scope: Scoped<UserId>) -> StoreResult<Option<User>>;

    /// Creates a user inside a company.
    async fn create_user(&self, new: Stamped<NewUser>) -> StoreResult<User>;

    /// Applies an admin update to one of a company's users.
    async fn update_user(
        &self,
        scope: Scoped<UserId>,
        update: UserUpdate,
    ) -> StoreResult<Option<User>>;

    /// Sets the activation flag of one of a company's users.
    async fn set_user_active(
        &self,
        scope: Scoped<UserId>,
        active: bool,
    ) -> StoreResult<Option<User>>;
}

/// Company records.
#[async_trait]
pub trait CompanyStore: Send + Sync {
    /// Loads a company by id, always from the backing store.
    async fn find_company(&self, id: CompanyId) -> StoreResult<Option<Company>>;

    /// Lists all companies.
    async fn list_companies(&self) -> StoreResult<Vec<Company>>;

    /// Creates a company and its first admin in one operation.
    async fn create_company_with_admin(
        &self,
        company: NewCompany,
        admin: NewUser,
    ) -> StoreResult<(Company, User)>;

    /// Applies a platform profile edit.
    async fn update_company(
        &self,
        id: CompanyId,
        update: CompanyUpdate,
    ) -> StoreResult<Option<Company>>;

    /// Replaces a company's subscription.
    async fn update_subscription(
        &self,
        id: CompanyId,
        subscription: Subscription,
    ) -> StoreResult<Option<Company>>;

    /// Replaces a company's module grants. Grants must already be validated.
    async fn replace_modules(
        &self,
        id: CompanyId,
        modules: Vec<ModuleGrant>,
    ) -> StoreResult<Option<Company>>;

    /// Changes a company's status, appends the history entry and cascades to
    /// its users, all in one atomic operation.
    async fn change_company_status(
        &self,
        id: CompanyId,
        to: CompanyStatus,
        actor: UserId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<StatusChangeOutcome>>;
}

/// Trade spend records.
#[async_trait]
pub trait TradeSpendStore: Send + Sync {
    /// Lists a company's trade spends.
    async fn list_trade_spends(
        &self,
        scope: Scoped<TradeSpendFilter>,
    ) -> StoreResult<Vec<TradeSpend>>;

    /// Loads one of a company's trade spends.
    async fn get_trade_spend(&self, scope: Scoped<TradeSpendId>)
    -> StoreResult<Option<TradeSpend>>;

    /// Creates a trade spend.
    async fn create_trade_spend(
        &self,
        new: Stamped<NewTradeSpend>,
        created_by: UserId,
    ) -> StoreResult<TradeSpend>;

    /// Approves one of a company's pending trade spends.
    async fn approve_trade_spend(
        &self,
        scope: Scoped<TradeSpendId>,
        approver: UserId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<TradeSpend>>;
}

/// Everything the application needs from storage.
pub trait Store: UserStore + CompanyStore + TradeSpendStore {}

impl<T: UserStore + CompanyStore + TradeSpendStore> Store for T {}
