//! User records and the per-user authorization data they carry.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spendgate_shared::types::{CompanyId, CustomerId, ProductId, UserId, VendorId};

use super::role::{Department, Role};
use crate::tenant::{Action, Module};

/// Normalises an email for storage and lookup.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A user's lifecycle status, driven by the company lifecycle cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// Normal.
    Active,
    /// Blocked because the company was suspended.
    Suspended,
    /// Blocked because the company was deleted.
    Deleted,
}

impl UserStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Deleted => "deleted",
        }
    }

    /// Parse a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "suspended" => Some(Self::Suspended),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// One entry of a user's permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// The module.
    pub module: Module,
    /// Actions allowed on the module.
    pub actions: Vec<Action>,
}

impl Permission {
    /// Builds a permission entry.
    #[must_use]
    pub fn new(module: Module, actions: &[Action]) -> Self {
        Self {
            module,
            actions: actions.to_vec(),
        }
    }
}

/// Spend category an approval limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalCategory {
    /// Marketing spend.
    Marketing,
    /// Cash co-op spend.
    CashCoop,
    /// Trading terms.
    TradingTerms,
    /// Promotions.
    Promotions,
}

impl ApprovalCategory {
    /// Every category.
    pub const ALL: [Self; 4] = [
        Self::Marketing,
        Self::CashCoop,
        Self::TradingTerms,
        Self::Promotions,
    ];

    /// Returns the string representation of the category.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Marketing => "marketing",
            Self::CashCoop => "cash_coop",
            Self::TradingTerms => "trading_terms",
            Self::Promotions => "promotions",
        }
    }

    /// Parse a category from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "marketing" => Some(Self::Marketing),
            "cash_coop" => Some(Self::CashCoop),
            "trading_terms" => Some(Self::TradingTerms),
            "promotions" => Some(Self::Promotions),
            _ => None,
        }
    }
}

/// Per-category approval ceilings. Zero means the user cannot approve anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApprovalLimits {
    /// Marketing ceiling.
    #[serde(default)]
    pub marketing: Decimal,
    /// Cash co-op ceiling.
    #[serde(default)]
    pub cash_coop: Decimal,
    /// Trading terms ceiling.
    #[serde(default)]
    pub trading_terms: Decimal,
    /// Promotions ceiling.
    #[serde(default)]
    pub promotions: Decimal,
}

impl ApprovalLimits {
    /// Returns the ceiling for a category.
    #[must_use]
    pub const fn limit_for(&self, category: ApprovalCategory) -> Decimal {
        match category {
            ApprovalCategory::Marketing => self.marketing,
            ApprovalCategory::CashCoop => self.cash_coop,
            ApprovalCategory::TradingTerms => self.trading_terms,
            ApprovalCategory::Promotions => self.promotions,
        }
    }

    /// Returns true if any ceiling is negative.
    #[must_use]
    pub fn has_negative(&self) -> bool {
        [
            self.marketing,
            self.cash_coop,
            self.trading_terms,
            self.promotions,
        ]
        .iter()
        .any(Decimal::is_sign_negative)
    }
}

/// Entities a field user is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssignedEntities {
    /// Assigned customers.
    #[serde(default)]
    pub customers: Vec<CustomerId>,
    /// Assigned products.
    #[serde(default)]
    pub products: Vec<ProductId>,
    /// Assigned vendors.
    #[serde(default)]
    pub vendors: Vec<VendorId>,
}

/// A stored user.
///
/// `password_hash` is never serialized, so a `User` can be returned to
/// clients as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// User ID.
    pub id: UserId,
    /// Owning company. `None` only for the super-admin.
    pub company_id: Option<CompanyId>,
    /// Employee identifier, unique within the company.
    pub employee_id: String,
    /// Lowercased email, globally unique.
    pub email: String,
    /// Argon2id PHC string.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Role.
    pub role: Role,
    /// Department.
    pub department: Department,
    /// Fine-grained permissions, ignored for admins.
    pub permissions: Vec<Permission>,
    /// Approval ceilings.
    pub approval_limits: ApprovalLimits,
    /// Assigned customers, products and vendors.
    pub assigned: AssignedEntities,
    /// Activation flag toggled by company admins.
    pub is_active: bool,
    /// Lifecycle status toggled by the company cascade.
    pub status: UserStatus,
    /// Last password change.
    pub password_changed_at: Option<DateTime<Utc>>,
    /// Last successful login.
    pub last_login_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Display name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// True if both the activation flag and the lifecycle status allow sign-in.
    #[must_use]
    pub fn is_account_active(&self) -> bool {
        self.is_active && self.status == UserStatus::Active
    }

    /// Looks up `action` on `module` in the permission set.
    ///
    /// Admins always pass. Only the first entry for a module is consulted.
    #[must_use]
    pub fn has_permission(&self, module: Module, action: Action) -> bool {
        if self.role.bypasses_permissions() {
            return true;
        }
        self.permissions
            .iter()
            .find(|p| p.module == module)
            .is_some_and(|p| p.actions.contains(&action))
    }

    /// True if a token issued at `iat` (seconds) predates the last password change.
    ///
    /// Both sides are compared at second granularity. A user who never changed
    /// their password has no rotation boundary.
    #[must_use]
    pub fn token_predates_password_change(&self, iat: i64) -> bool {
        self.password_changed_at
            .is_some_and(|changed| iat < changed.timestamp())
    }
}

/// Input for creating a user. Timestamps and the id are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Owning company.
    pub company_id: Option<CompanyId>,
    /// Employee identifier.
    pub employee_id: String,
    /// Email, normalised on conversion.
    pub email: String,
    /// Already hashed password.
    pub password_hash: String,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Role.
    pub role: Role,
    /// Department.
    pub department: Department,
    /// Permission set.
    pub permissions: Vec<Permission>,
    /// Approval ceilings.
    pub approval_limits: ApprovalLimits,
    /// Assigned entities.
    pub assigned: AssignedEntities,
}

impl NewUser {
    /// A company administrator with an empty permission set.
    #[must_use]
    pub fn company_admin(
        company_id: CompanyId,
        employee_id: impl Into<String>,
        email: &str,
        password_hash: String,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            company_id: Some(company_id),
            employee_id: employee_id.into(),
            email: normalize_email(email),
            password_hash,
            first_name: first_name.into(),
            last_name: last_name.into(),
            role: Role::Admin,
            department: Department::Admin,
            permissions: Vec::new(),
            approval_limits: ApprovalLimits::default(),
            assigned: AssignedEntities::default(),
        }
    }

    /// The platform super-admin.
    #[must_use]
    pub fn super_admin(email: &str, password_hash: String) -> Self {
        Self {
            company_id: None,
            employee_id: "SUPER-ADMIN".to_string(),
            email: normalize_email(email),
            password_hash,
            first_name: "Platform".to_string(),
            last_name: "Administrator".to_string(),
            role: Role::SuperAdmin,
            department: Department::Admin,
            permissions: Vec::new(),
            approval_limits: ApprovalLimits::default(),
            assigned: AssignedEntities::default(),
        }
    }

    /// Materialises the record.
    #[must_use]
    pub fn into_user(self, id: UserId, now: DateTime<Utc>) -> User {
        User {
            id,
            company_id: self.company_id,
            employee_id: self.employee_id.trim().to_string(),
            email: normalize_email(&self.email),
            password_hash: self.password_hash,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            role: self.role,
            department: self.department,
            permissions: self.permissions,
            approval_limits: self.approval_limits,
            assigned: self.assigned,
            is_active: true,
            status: UserStatus::Active,
            password_changed_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update applied by a company admin. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Role. Cannot be set to `super_admin`.
    pub role: Option<Role>,
    /// Department.
    pub department: Option<Department>,
    /// Replacement permission set.
    pub permissions: Option<Vec<Permission>>,
    /// Replacement approval limits.
    pub approval_limits: Option<ApprovalLimits>,
    /// Replacement assigned entities.
    pub assigned: Option<AssignedEntities>,
}

impl UserUpdate {
    /// Applies the update in place.
    pub fn apply(self, user: &mut User, now: DateTime<Utc>) {
        if let Some(first_name) = self.first_name {
            user.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = self.last_name {
            user.last_name = last_name.trim().to_string();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(department) = self.department {
            user.department = department;
        }
        if let Some(permissions) = self.permissions {
            user.permissions = permissions;
        }
        if let Some(limits) = self.approval_limits {
            user.approval_limits = limits;
        }
        if let Some(assigned) = self.assigned {
            user.assigned = assigned;
        }
        user.updated_at = now;
    }
}
