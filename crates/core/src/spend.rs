//! Trade spend records, the tenant-scoped business data the gates protect.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spendgate_shared::types::{CompanyId, CustomerId, TradeSpendId, UserId, VendorId};
use spendgate_shared::{AppError, ErrorCode};
use thiserror::Error;

use crate::access::{EntityRef, TenantOwned, TenantStamp, VerifiedIdentity};
use crate::identity::ApprovalCategory;

/// Approval status of a trade spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendStatus {
    /// Awaiting approval.
    Pending,
    /// Approved.
    Approved,
    /// Rejected.
    Rejected,
}

impl SpendStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parse a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Largest storable amount, `9_999_999_999_999_999.99`.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA763_FFFF, 0x0DE0_B6B3, 0, false, 2);

/// Decimal places an amount may carry.
pub const AMOUNT_SCALE: u32 = 2;

/// Trade spend errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpendError {
    /// Amount must be positive.
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    /// Amount above [`MAX_AMOUNT`].
    #[error("amount cannot exceed {MAX_AMOUNT}")]
    AmountTooLarge,
    /// Amount with sub-cent precision.
    #[error("amount cannot have more than {AMOUNT_SCALE} decimal places")]
    TooPrecise,
    /// Only pending records can be approved.
    #[error("trade spend is {} and cannot be approved", .0.as_str())]
    NotPending(SpendStatus),
}

impl From<SpendError> for AppError {
    fn from(err: SpendError) -> Self {
        match err {
            SpendError::NonPositiveAmount
            | SpendError::AmountTooLarge
            | SpendError::TooPrecise => AppError::validation(err.to_string()),
            SpendError::NotPending(_) => {
                AppError::new(ErrorCode::InvalidTransition, err.to_string())
            }
        }
    }
}

/// A stored trade spend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSpend {
    /// ID.
    pub id: TradeSpendId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Customer the spend is for.
    pub customer_id: CustomerId,
    /// Vendor funding the spend, if any.
    pub vendor_id: Option<VendorId>,
    /// Spend category, which selects the approval limit.
    pub category: ApprovalCategory,
    /// Amount.
    pub amount: Decimal,
    /// Free text.
    pub description: String,
    /// Approval status.
    pub status: SpendStatus,
    /// Creator.
    pub created_by: UserId,
    /// Approver.
    pub approved_by: Option<UserId>,
    /// Approval time.
    pub approved_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl TradeSpend {
    /// The customer and vendor this record touches.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityRef> {
        let mut refs = vec![EntityRef::Customer(self.customer_id)];
        refs.extend(self.vendor_id.map(EntityRef::Vendor));
        refs
    }

    /// Marks a pending record approved.
    ///
    /// # Errors
    ///
    /// Returns `SpendError::NotPending` for any other status.
    pub fn approve(&mut self, approver: UserId, now: DateTime<Utc>) -> Result<(), SpendError> {
        if self.status != SpendStatus::Pending {
            return Err(SpendError::NotPending(self.status));
        }
        self.status = SpendStatus::Approved;
        self.approved_by = Some(approver);
        self.approved_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

impl TenantOwned for TradeSpend {
    fn owner(&self) -> Option<CompanyId> {
        Some(self.company_id)
    }
}

/// Input for creating a trade spend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewTradeSpend {
    /// Set by the tenant stamp, never by the client.
    #[serde(skip)]
    pub company_id: Option<CompanyId>,
    /// Customer.
    pub customer_id: CustomerId,
    /// Vendor.
    pub vendor_id: Option<VendorId>,
    /// Category.
    pub category: ApprovalCategory,
    /// Amount.
    pub amount: Decimal,
    /// Free text.
    #[serde(default)]
    pub description: String,
}

impl NewTradeSpend {
    /// Validates the input.
    ///
    /// # Errors
    ///
    /// - `SpendError::NonPositiveAmount` for zero or negative amounts
    /// - `SpendError::AmountTooLarge` above [`MAX_AMOUNT`]
    /// - `SpendError::TooPrecise` for fractions of a cent, which are
    ///   rejected rather than rounded
    pub fn validate(&self) -> Result<(), SpendError> {
        if self.amount <= Decimal::ZERO {
            return Err(SpendError::NonPositiveAmount);
        }
        if self.amount > MAX_AMOUNT {
            return Err(SpendError::AmountTooLarge);
        }
        if self.amount.normalize().scale() > AMOUNT_SCALE {
            return Err(SpendError::TooPrecise);
        }
        Ok(())
    }

    /// The customer and vendor this input touches.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityRef> {
        let mut refs = vec![EntityRef::Customer(self.customer_id)];
        refs.extend(self.vendor_id.map(EntityRef::Vendor));
        refs
    }

    /// Materialises the record in `company_id`.
    #[must_use]
    pub fn into_spend(
        self,
        id: TradeSpendId,
        company_id: CompanyId,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> TradeSpend {
        TradeSpend {
            id,
            company_id,
            customer_id: self.customer_id,
            vendor_id: self.vendor_id,
            category: self.category,
            amount: self.amount,
            description: self.description.trim().to_string(),
            status: SpendStatus::Pending,
            created_by,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl TenantStamp for NewTradeSpend {
    fn set_owner(&mut self, company_id: CompanyId) {
        self.company_id = Some(company_id);
    }
}

/// List filter for trade spends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TradeSpendFilter {
    /// Only this status.
    pub status: Option<SpendStatus>,
    /// Only this customer.
    pub customer_id: Option<CustomerId>,
    /// Only these customers. Set from the caller's assignments, never from input.
    #[serde(skip)]
    pub customers_in: Option<Vec<CustomerId>>,
}

impl TradeSpendFilter {
    /// Narrows the filter to what `identity` may see.
    #[must_use]
    pub fn visible_to(mut self, identity: &VerifiedIdentity) -> Self {
        if !identity.role().sees_all_entities() {
            self.customers_in = Some(identity.assigned().customers.clone());
        }
        self
    }

    /// True if `spend` passes the filter. The tenant constraint is separate.
    #[must_use]
    pub fn matches(&self, spend: &TradeSpend) -> bool {
        self.status.is_none_or(|s| s == spend.status)
            && self.customer_id.is_none_or(|c| c == spend.customer_id)
            && self
                .customers_in
                .as_ref()
                .is_none_or(|ids| ids.contains(&spend.customer_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::verify_session;
    use crate::identity::{NewUser, Role};
    use rust_decimal_macros::dec;
    use spendgate_shared::{Claims, TokenKind};

    fn draft(amount: Decimal) -> NewTradeSpend {
        NewTradeSpend {
            company_id: None,
            customer_id: CustomerId::new(),
            vendor_id: Some(VendorId::new()),
            category: ApprovalCategory::CashCoop,
            amount,
            description: " Q3 co-op ".to_string(),
        }
    }

    fn identity(role: Role, customers: Vec<CustomerId>) -> VerifiedIdentity {
        let mut new = NewUser::company_admin(
            CompanyId::new(),
            "E-1",
            "rep@acme.test",
            String::new(),
            "R",
            "Ep",
        );
        new.role = role;
        new.assigned.customers = customers;
        let user = new.into_user(UserId::new(), Utc::now());
        let claims = Claims::new(
            user.id.into_inner(),
            user.company_id.map(CompanyId::into_inner),
            role.as_str(),
            TokenKind::Access,
            Utc::now(),
            Utc::now() + chrono::Duration::days(1),
        );
        verify_session(&claims, Some(user)).unwrap()
    }

    #[test]
    fn test_amount_must_be_positive() {
        assert!(draft(dec!(1)).validate().is_ok());
        assert_eq!(
            draft(dec!(0)).validate(),
            Err(SpendError::NonPositiveAmount)
        );
    }

    #[test]
    fn test_amount_fits_the_ledger_column() {
        assert_eq!(MAX_AMOUNT, dec!(9999999999999999.99));
        assert!(draft(MAX_AMOUNT).validate().is_ok());
        assert_eq!(
            draft(dec!(10000000000000000)).validate(),
            Err(SpendError::AmountTooLarge)
        );
        assert_eq!(
            draft(dec!(50000000000000000000000000000)).validate(),
            Err(SpendError::AmountTooLarge)
        );

        assert!(draft(dec!(19.99)).validate().is_ok());
        assert!(draft(dec!(1.500)).validate().is_ok());
        let err = draft(dec!(0.001)).validate().unwrap_err();
        assert_eq!(err, SpendError::TooPrecise);
        assert_eq!(AppError::from(err).code(), ErrorCode::ValidationError);
    }

    #[test]
    fn test_approve_only_pending() {
        let now = Utc::now();
        let mut spend = draft(dec!(100)).into_spend(
            TradeSpendId::new(),
            CompanyId::new(),
            UserId::new(),
            now,
        );
        assert_eq!(spend.description, "Q3 co-op");

        let approver = UserId::new();
        spend.approve(approver, now).unwrap();
        assert_eq!(spend.status, SpendStatus::Approved);
        assert_eq!(spend.approved_by, Some(approver));

        let err = spend.approve(approver, now).unwrap_err();
        assert_eq!(err, SpendError::NotPending(SpendStatus::Approved));
        assert_eq!(AppError::from(err).code(), ErrorCode::InvalidTransition);
    }

    #[test]
    fn test_entities_include_vendor() {
        let d = draft(dec!(5));
        let refs = d.entities();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0], EntityRef::Customer(d.customer_id));
    }

    #[test]
    fn test_filter_visible_to_field_role() {
        let c1 = CustomerId::new();
        let now = Utc::now();
        let company = CompanyId::new();
        let mut mine = draft(dec!(1)).into_spend(TradeSpendId::new(), company, UserId::new(), now);
        mine.customer_id = c1;
        let theirs = draft(dec!(1)).into_spend(TradeSpendId::new(), company, UserId::new(), now);

        let rep = identity(Role::SalesRep, vec![c1]);
        let rep_filter = TradeSpendFilter::default().visible_to(&rep);
        assert!(rep_filter.matches(&mine));
        assert!(!rep_filter.matches(&theirs));

        let director = identity(Role::Director, vec![]);
        let director_filter = TradeSpendFilter::default().visible_to(&director);
        assert!(director_filter.matches(&theirs));
    }

    #[test]
    fn test_client_cannot_set_company() {
        let json = serde_json::json!({
            "company_id": CompanyId::new(),
            "customer_id": CustomerId::new(),
            "category": "marketing",
            "amount": "10.50"
        });
        let parsed: NewTradeSpend = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.company_id, None);
        assert_eq!(parsed.amount, dec!(10.50));
    }
}
