//! Roles and departments.

use serde::{Deserialize, Serialize};

/// A user's role.
///
/// Every role except [`Role::SuperAdmin`] belongs to exactly one company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform operator. Not tied to any company.
    SuperAdmin,
    /// Company administrator. Bypasses permission, module, scope and limit checks.
    Admin,
    /// Board member. Unlimited approvals, all entities.
    Board,
    /// Director. All entities.
    Director,
    /// Manager.
    Manager,
    /// Key account manager. Field role scoped to assigned entities.
    Kam,
    /// Sales representative. Field role scoped to assigned entities.
    SalesRep,
    /// Sales administration.
    SalesAdmin,
    /// Analyst.
    Analyst,
}

impl Role {
    /// All tenant-bound roles.
    pub const TENANT_ROLES: [Self; 8] = [
        Self::Admin,
        Self::Board,
        Self::Director,
        Self::Manager,
        Self::Kam,
        Self::SalesRep,
        Self::SalesAdmin,
        Self::Analyst,
    ];

    /// Parse a role from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "super_admin" => Some(Self::SuperAdmin),
            "admin" => Some(Self::Admin),
            "board" => Some(Self::Board),
            "director" => Some(Self::Director),
            "manager" => Some(Self::Manager),
            "kam" => Some(Self::Kam),
            "sales_rep" => Some(Self::SalesRep),
            "sales_admin" => Some(Self::SalesAdmin),
            "analyst" => Some(Self::Analyst),
            _ => None,
        }
    }

    /// Returns the string representation of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Board => "board",
            Self::Director => "director",
            Self::Manager => "manager",
            Self::Kam => "kam",
            Self::SalesRep => "sales_rep",
            Self::SalesAdmin => "sales_admin",
            Self::Analyst => "analyst",
        }
    }

    /// True for the platform super-admin.
    #[must_use]
    pub const fn is_super_admin(&self) -> bool {
        matches!(self, Self::SuperAdmin)
    }

    /// Roles that skip the permission-set and module-enablement checks.
    #[must_use]
    pub const fn bypasses_permissions(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Roles with unlimited approval authority.
    #[must_use]
    pub const fn has_unlimited_approval(&self) -> bool {
        matches!(self, Self::Admin | Self::Board)
    }

    /// Seniority used when one user administers another. Higher outranks lower.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::SuperAdmin => 8,
            Self::Admin => 7,
            Self::Board => 6,
            Self::Director => 5,
            Self::Manager => 4,
            Self::Kam | Self::SalesAdmin => 3,
            Self::Analyst => 2,
            Self::SalesRep => 1,
        }
    }

    /// True if `self` is strictly more senior than `other`.
    #[must_use]
    pub const fn outranks(&self, other: Self) -> bool {
        self.rank() > other.rank()
    }

    /// Roles that see every customer/vendor/product in their company.
    #[must_use]
    pub const fn sees_all_entities(&self) -> bool {
        matches!(self, Self::Admin | Self::Board | Self::Director)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Organisational department. Used for grouping only, never for access decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    /// Sales.
    Sales,
    /// Marketing.
    Marketing,
    /// Finance.
    Finance,
    /// Operations.
    Operations,
    /// Administration.
    Admin,
}

impl Department {
    /// Parse a department from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sales" => Some(Self::Sales),
            "marketing" => Some(Self::Marketing),
            "finance" => Some(Self::Finance),
            "operations" => Some(Self::Operations),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Returns the string representation of the department.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Marketing => "marketing",
            Self::Finance => "finance",
            Self::Operations => "operations",
            Self::Admin => "admin",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_round_trip() {
        for role in Role::TENANT_ROLES {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("SUPER_ADMIN"), Some(Role::SuperAdmin));
        assert_eq!(Role::parse("owner"), None);
    }

    #[test]
    fn test_seniority() {
        assert!(Role::Admin.outranks(Role::Board));
        assert!(Role::Director.outranks(Role::Manager));
        assert!(!Role::Kam.outranks(Role::SalesAdmin));
        assert!(!Role::SalesAdmin.outranks(Role::Kam));
        assert!(!Role::Director.outranks(Role::Director));
        assert!(Role::SuperAdmin.outranks(Role::Admin));
    }

    #[test]
    fn test_role_serde_matches_as_str() {
        let json = serde_json::to_string(&Role::SalesRep).unwrap();
        assert_eq!(json, "\"sales_rep\"");
    }

    #[test]
    fn test_bypass_sets() {
        assert!(Role::Admin.bypasses_permissions());
        assert!(!Role::Board.bypasses_permissions());
        assert!(!Role::SuperAdmin.bypasses_permissions());

        assert!(Role::Board.has_unlimited_approval());
        assert!(!Role::Director.has_unlimited_approval());

        assert!(Role::Director.sees_all_entities());
        assert!(!Role::Manager.sees_all_entities());
        assert!(!Role::Kam.sees_all_entities());
    }

    #[test]
    fn test_department_parse() {
        assert_eq!(Department::parse("Finance"), Some(Department::Finance));
        assert_eq!(Department::parse("legal"), None);
    }
}
