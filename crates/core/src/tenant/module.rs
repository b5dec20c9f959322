//! The closed catalogue of modules and actions.
//!
//! Module grants are validated when a company's configuration is written, so
//! the policy engine never has to interpret free-form documents at request time.

use serde::{Deserialize, Serialize};

/// A licensable feature area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    /// Landing dashboard.
    Dashboard,
    /// Budgets.
    Budgets,
    /// Promotions.
    Promotions,
    /// Trade spend records.
    TradeSpend,
    /// Activity calendar.
    Activities,
    /// Customer master data.
    Customers,
    /// Product master data.
    Products,
    /// Vendor master data.
    Vendors,
    /// Analytics.
    Analytics,
    /// Reports.
    Reports,
    /// Company user administration.
    Users,
    /// Company settings.
    Settings,
}

impl Module {
    /// Every module in the catalogue.
    pub const ALL: [Self; 12] = [
        Self::Dashboard,
        Self::Budgets,
        Self::Promotions,
        Self::TradeSpend,
        Self::Activities,
        Self::Customers,
        Self::Products,
        Self::Vendors,
        Self::Analytics,
        Self::Reports,
        Self::Users,
        Self::Settings,
    ];

    /// Returns the string representation of the module.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Budgets => "budgets",
            Self::Promotions => "promotions",
            Self::TradeSpend => "trade_spend",
            Self::Activities => "activities",
            Self::Customers => "customers",
            Self::Products => "products",
            Self::Vendors => "vendors",
            Self::Analytics => "analytics",
            Self::Reports => "reports",
            Self::Users => "users",
            Self::Settings => "settings",
        }
    }

    /// Parse a module from a string.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }

    /// Whether `action` is meaningful for this module.
    #[must_use]
    pub const fn supports(&self, action: Action) -> bool {
        match action {
            Action::Read | Action::Create | Action::Update | Action::Delete => true,
            Action::Approve => matches!(
                self,
                Self::Budgets | Self::Promotions | Self::TradeSpend | Self::Activities
            ),
            Action::Export => matches!(
                self,
                Self::Analytics | Self::Reports | Self::Budgets | Self::TradeSpend
            ),
        }
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation on a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Read.
    Read,
    /// Create.
    Create,
    /// Update.
    Update,
    /// Delete.
    Delete,
    /// Approve a financial commitment.
    Approve,
    /// Export data.
    Export,
}

impl Action {
    /// Returns the string representation of the action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Approve => "approve",
            Self::Export => "export",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions a company grant allows: an explicit list or the `all` wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionGrant {
    /// The literal string `"all"`.
    All(AllActions),
    /// An explicit list.
    Only(Vec<Action>),
}

/// Marker for the `"all"` wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllActions {
    /// Every action the module supports.
    All,
}

impl ActionGrant {
    /// Wildcard grant.
    #[must_use]
    pub const fn all() -> Self {
        Self::All(AllActions::All)
    }

    /// Returns true if the grant covers `action`.
    #[must_use]
    pub fn allows(&self, action: Action) -> bool {
        match self {
            Self::All(_) => true,
            Self::Only(actions) => actions.contains(&action),
        }
    }
}

/// A company's licence for one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleGrant {
    /// The module.
    pub module: Module,
    /// Whether the module is switched on.
    pub enabled: bool,
    /// Which actions the plan permits.
    pub actions: ActionGrant,
}

impl ModuleGrant {
    /// An enabled grant with the wildcard.
    #[must_use]
    pub const fn full(module: Module) -> Self {
        Self {
            module,
            enabled: true,
            actions: ActionGrant::all(),
        }
    }

    /// An enabled grant with an explicit list.
    #[must_use]
    pub fn only(module: Module, actions: &[Action]) -> Self {
        Self {
            module,
            enabled: true,
            actions: ActionGrant::Only(actions.to_vec()),
        }
    }
}

/// A grant list that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrantError {
    /// The same module appears twice.
    #[error("module '{0}' is listed more than once")]
    DuplicateModule(Module),
    /// An action the module does not support.
    #[error("action '{action}' is not valid for module '{module}'")]
    UnsupportedAction {
        /// The module.
        module: Module,
        /// The rejected action.
        action: Action,
    },
}

/// Validates a company's module grants before they are stored.
///
/// # Errors
///
/// Returns the first duplicate module or unsupported action.
pub fn validate_grants(grants: &[ModuleGrant]) -> Result<(), GrantError> {
    let mut seen = std::collections::BTreeSet::new();
    for grant in grants {
        if !seen.insert(grant.module) {
            return Err(GrantError::DuplicateModule(grant.module));
        }
        if let ActionGrant::Only(actions) = &grant.actions
            && let Some(bad) = actions.iter().find(|a| !grant.module.supports(**a))
        {
            return Err(GrantError::UnsupportedAction {
                module: grant.module,
                action: *bad,
            });
        }
    }
    Ok(())
}

/// Grants given to a newly registered trial company.
#[must_use]
pub fn default_trial_grants() -> Vec<ModuleGrant> {
    vec![
        ModuleGrant::full(Module::Dashboard),
        ModuleGrant::full(Module::Budgets),
        ModuleGrant::full(Module::Promotions),
        ModuleGrant::full(Module::TradeSpend),
        ModuleGrant::full(Module::Customers),
        ModuleGrant::full(Module::Products),
        ModuleGrant::full(Module::Vendors),
        ModuleGrant::full(Module::Users),
        ModuleGrant::only(Module::Reports, &[Action::Read]),
    ]
}
