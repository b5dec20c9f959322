//! Company (tenant) records, subscriptions and resource quotas.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use spendgate_shared::types::{CompanyId, UserId};

use super::lifecycle::{CompanyStatus, LifecycleError, StatusChange};
use super::module::{Action, Module, ModuleGrant, default_trial_grants};

/// Length of the self-registration trial.
pub const TRIAL_DAYS: i64 = 30;

/// Subscription plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// Free trial.
    Trial,
    /// Basic.
    Basic,
    /// Professional.
    Professional,
    /// Enterprise.
    Enterprise,
}

impl Plan {
    /// Returns the string representation of the plan.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Basic => "basic",
            Self::Professional => "professional",
            Self::Enterprise => "enterprise",
        }
    }

    /// Parse a plan from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "trial" => Some(Self::Trial),
            "basic" => Some(Self::Basic),
            "professional" => Some(Self::Professional),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }
}

/// Subscription status. Independent of [`CompanyStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Paid and current.
    Active,
    /// Trial period.
    Trial,
    /// Suspended for billing reasons.
    Suspended,
    /// Cancelled by the customer.
    Cancelled,
    /// Lapsed.
    Expired,
}

impl SubscriptionStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trial => "trial",
            Self::Suspended => "suspended",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Parse a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "trial" => Some(Self::Trial),
            "suspended" => Some(Self::Suspended),
            "cancelled" => Some(Self::Cancelled),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Only active and trial subscriptions grant access.
    #[must_use]
    pub const fn grants_access(&self) -> bool {
        matches!(self, Self::Active | Self::Trial)
    }

    /// Checks if a subscription may move to `target`. Keeping the current
    /// status is allowed; nothing re-enters a trial.
    #[must_use]
    pub const fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (*self, target),
            (Self::Trial, Self::Trial | Self::Active | Self::Expired | Self::Cancelled)
                | (
                    Self::Active,
                    Self::Active | Self::Suspended | Self::Expired | Self::Cancelled
                )
                | (Self::Suspended, Self::Suspended | Self::Active | Self::Cancelled)
                | (Self::Expired, Self::Expired | Self::Active | Self::Cancelled)
                | (Self::Cancelled, Self::Cancelled | Self::Active)
        )
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A quota-limited resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Users.
    Users,
    /// Customers.
    Customers,
    /// Products.
    Products,
    /// Budgets.
    Budgets,
}

impl Resource {
    /// Returns the string representation of the resource.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Customers => "customers",
            Self::Products => "products",
            Self::Budgets => "budgets",
        }
    }
}

/// Resource ceilings. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum users.
    pub max_users: Option<u32>,
    /// Maximum customers.
    pub max_customers: Option<u32>,
    /// Maximum products.
    pub max_products: Option<u32>,
    /// Maximum budgets.
    pub max_budgets: Option<u32>,
}

/// Outcome of a failed quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("subscription allows at most {max} {}", resource.as_str())]
pub struct QuotaExceeded {
    /// The resource.
    pub resource: Resource,
    /// The ceiling.
    pub max: u32,
}

impl ResourceLimits {
    /// Ceilings for a fresh trial.
    #[must_use]
    pub const fn trial() -> Self {
        Self {
            max_users: Some(5),
            max_customers: Some(100),
            max_products: Some(500),
            max_budgets: Some(10),
        }
    }

    /// Returns the ceiling for a resource.
    #[must_use]
    pub const fn limit_for(&self, resource: Resource) -> Option<u32> {
        match resource {
            Resource::Users => self.max_users,
            Resource::Customers => self.max_customers,
            Resource::Products => self.max_products,
            Resource::Budgets => self.max_budgets,
        }
    }

    /// Checks whether one more `resource` may be created when `current` exist.
    ///
    /// # Errors
    ///
    /// Returns `QuotaExceeded` when `current` has reached the ceiling.
    pub fn check(&self, resource: Resource, current: u64) -> Result<(), QuotaExceeded> {
        match self.limit_for(resource) {
            Some(max) if current >= u64::from(max) => Err(QuotaExceeded { resource, max }),
            _ => Ok(()),
        }
    }
}

/// A company's subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Plan tier.
    pub plan: Plan,
    /// Stored status.
    pub status: SubscriptionStatus,
    /// Resource ceilings.
    pub limits: ResourceLimits,
    /// Expiry, if the plan is time-limited.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Subscription {
    /// A trial starting at `now`.
    #[must_use]
    pub fn trial(now: DateTime<Utc>) -> Self {
        Self {
            plan: Plan::Trial,
            status: SubscriptionStatus::Trial,
            limits: ResourceLimits::trial(),
            expires_at: Some(now + Duration::days(TRIAL_DAYS)),
        }
    }

    /// Status as of `now`: an access-granting status past its expiry counts as expired.
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>) -> SubscriptionStatus {
        match self.expires_at {
            Some(expires) if self.status.grants_access() && expires <= now => {
                SubscriptionStatus::Expired
            }
            _ => self.status,
        }
    }

    /// Replaces the subscription with `next`.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::InvalidSubscriptionTransition` if the stored
    /// status may not move to the new one.
    pub fn change_to(&mut self, next: Self) -> Result<(), LifecycleError> {
        if !self.status.can_transition_to(next.status) {
            return Err(LifecycleError::InvalidSubscriptionTransition {
                from: self.status,
                to: next.status,
            });
        }
        *self = next;
        Ok(())
    }
}

/// A tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Company ID.
    pub id: CompanyId,
    /// Unique display name.
    pub name: String,
    /// Unique short code.
    pub code: String,
    /// Unique lowercase domain.
    pub domain: String,
    /// Lifecycle status.
    pub status: CompanyStatus,
    /// Subscription.
    pub subscription: Subscription,
    /// Licensed modules.
    pub modules: Vec<ModuleGrant>,
    /// Contact details.
    #[serde(default)]
    pub contact: CompanyContact,
    /// Append-only lifecycle log.
    pub status_history: Vec<StatusChange>,
    /// Who created the company. `None` for self-registration.
    pub created_by: Option<UserId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Company {
    /// True if the lifecycle status lets users in.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.status.admits_users()
    }

    /// Looks up the grant for a module.
    #[must_use]
    pub fn grant_for(&self, module: Module) -> Option<&ModuleGrant> {
        self.modules.iter().find(|g| g.module == module)
    }

    /// True if the module is enabled and the grant covers the action.
    #[must_use]
    pub fn allows(&self, module: Module, action: Action) -> bool {
        self.grant_for(module)
            .is_some_and(|g| g.enabled && g.actions.allows(action))
    }
}

/// Free-form company contact details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyContact {
    /// Contact email.
    pub email: Option<String>,
    /// Contact phone.
    pub phone: Option<String>,
    /// Postal address.
    pub address: Option<String>,
    /// Industry.
    pub industry: Option<String>,
    /// Country.
    pub country: Option<String>,
}

impl CompanyContact {
    /// Trims every field and drops the blank ones.
    #[must_use]
    pub fn normalized(self) -> Self {
        fn clean(field: Option<String>) -> Option<String> {
            field
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            email: clean(self.email).map(|e| e.to_lowercase()),
            phone: clean(self.phone),
            address: clean(self.address),
            industry: clean(self.industry),
            country: clean(self.country),
        }
    }
}

/// Platform edit of a company's profile. Code and domain are fixed at
/// creation and have no field here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyUpdate {
    /// New display name.
    pub name: Option<String>,
    /// Replacement contact details.
    pub contact: Option<CompanyContact>,
}

impl CompanyUpdate {
    /// Applies the update.
    pub fn apply(self, company: &mut Company, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            company.name = name.trim().to_string();
        }
        if let Some(contact) = self.contact {
            company.contact = contact.normalized();
        }
        company.updated_at = now;
    }
}

/// Input for creating a company.
#[derive(Debug, Clone)]
pub struct NewCompany {
    /// Display name.
    pub name: String,
    /// Short code, stored uppercase.
    pub code: String,
    /// Domain, stored lowercase.
    pub domain: String,
    /// Initial subscription.
    pub subscription: Subscription,
    /// Initial module grants.
    pub modules: Vec<ModuleGrant>,
    /// Creating super-admin, if any.
    pub created_by: Option<UserId>,
}

impl NewCompany {
    /// A self-registered company on a fresh trial.
    #[must_use]
    pub fn trial(name: &str, code: &str, domain: &str, now: DateTime<Utc>) -> Self {
        Self {
            name: name.trim().to_string(),
            code: code.trim().to_uppercase(),
            domain: domain.trim().to_lowercase(),
            subscription: Subscription::trial(now),
            modules: default_trial_grants(),
            created_by: None,
        }
    }

    /// Materialises the record.
    #[must_use]
    pub fn into_company(self, id: CompanyId, now: DateTime<Utc>) -> Company {
        Company {
            id,
            name: self.name.trim().to_string(),
            code: self.code.trim().to_uppercase(),
            domain: self.domain.trim().to_lowercase(),
            status: CompanyStatus::Active,
            subscription: self.subscription,
            modules: self.modules,
            contact: CompanyContact::default(),
            status_history: Vec::new(),
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::module::ActionGrant;
    use rstest::rstest;

    fn company(now: DateTime<Utc>) -> Company {
        NewCompany::trial(" Acme Foods ", "acme", "Acme.Example.com", now)
            .into_company(CompanyId::new(), now)
    }

    #[test]
    fn test_new_company_normalises_identity() {
        let c = company(Utc::now());
        assert_eq!(c.name, "Acme Foods");
        assert_eq!(c.code, "ACME");
        assert_eq!(c.domain, "acme.example.com");
        assert_eq!(c.status, CompanyStatus::Active);
        assert_eq!(c.subscription.status, SubscriptionStatus::Trial);
    }

    #[test]
    fn test_trial_expiry_is_effective_immediately() {
        let now = Utc::now();
        let c = company(now);
        assert_eq!(
            c.subscription.effective_status(now),
            SubscriptionStatus::Trial
        );
        assert_eq!(
            c.subscription
                .effective_status(now + Duration::days(TRIAL_DAYS)),
            SubscriptionStatus::Expired
        );
    }

    #[test]
    fn test_expiry_does_not_mask_cancelled() {
        let now = Utc::now();
        let sub = Subscription {
            status: SubscriptionStatus::Cancelled,
            expires_at: Some(now - Duration::days(1)),
            ..Subscription::trial(now)
        };
        assert_eq!(sub.effective_status(now), SubscriptionStatus::Cancelled);
    }

    #[test]
    fn test_allows_checks_enabled_and_actions() {
        let mut c = company(Utc::now());
        assert!(c.allows(Module::Reports, Action::Read));
        assert!(!c.allows(Module::Reports, Action::Export));
        assert!(!c.allows(Module::Analytics, Action::Read));

        c.modules = vec![ModuleGrant {
            module: Module::Budgets,
            enabled: false,
            actions: ActionGrant::all(),
        }];
        assert!(!c.allows(Module::Budgets, Action::Read));
    }

    #[rstest]
    #[case(SubscriptionStatus::Trial, SubscriptionStatus::Active, true)]
    #[case(SubscriptionStatus::Trial, SubscriptionStatus::Cancelled, true)]
    #[case(SubscriptionStatus::Active, SubscriptionStatus::Suspended, true)]
    #[case(SubscriptionStatus::Active, SubscriptionStatus::Active, true)]
    #[case(SubscriptionStatus::Suspended, SubscriptionStatus::Active, true)]
    #[case(SubscriptionStatus::Expired, SubscriptionStatus::Active, true)]
    #[case(SubscriptionStatus::Cancelled, SubscriptionStatus::Active, true)]
    #[case(SubscriptionStatus::Active, SubscriptionStatus::Trial, false)]
    #[case(SubscriptionStatus::Cancelled, SubscriptionStatus::Trial, false)]
    #[case(SubscriptionStatus::Trial, SubscriptionStatus::Suspended, false)]
    #[case(SubscriptionStatus::Cancelled, SubscriptionStatus::Suspended, false)]
    #[case(SubscriptionStatus::Expired, SubscriptionStatus::Suspended, false)]
    #[case(SubscriptionStatus::Suspended, SubscriptionStatus::Expired, false)]
    fn test_subscription_transitions(
        #[case] from: SubscriptionStatus,
        #[case] to: SubscriptionStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_change_to_keeps_subscription_on_refusal() {
        let now = Utc::now();
        let mut sub = Subscription {
            status: SubscriptionStatus::Cancelled,
            ..Subscription::trial(now)
        };
        let err = sub.change_to(Subscription::trial(now)).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidSubscriptionTransition {
                from: SubscriptionStatus::Cancelled,
                to: SubscriptionStatus::Trial
            }
        );
        assert_eq!(sub.status, SubscriptionStatus::Cancelled);

        let renewed = Subscription {
            plan: Plan::Professional,
            status: SubscriptionStatus::Active,
            ..Subscription::trial(now)
        };
        sub.change_to(renewed.clone()).unwrap();
        assert_eq!(sub, renewed);
    }

    #[test]
    fn test_profile_update_keeps_identity() {
        let now = Utc::now();
        let mut c = company(now);
        CompanyUpdate {
            name: Some("  Acme Holdings ".into()),
            contact: Some(CompanyContact {
                email: Some(" Ops@Acme.Test ".into()),
                phone: Some("   ".into()),
                ..CompanyContact::default()
            }),
        }
        .apply(&mut c, now);
        assert_eq!(c.name, "Acme Holdings");
        assert_eq!(c.code, "ACME");
        assert_eq!(c.contact.email.as_deref(), Some("ops@acme.test"));
        assert_eq!(c.contact.phone, None);
    }

    #[test]
    fn test_quota_check() {
        let limits = ResourceLimits::trial();
        assert!(limits.check(Resource::Users, 4).is_ok());
        assert_eq!(
            limits.check(Resource::Users, 5),
            Err(QuotaExceeded {
                resource: Resource::Users,
                max: 5
            })
        );
        assert!(ResourceLimits::default().check(Resource::Users, 10_000).is_ok());
    }
}
