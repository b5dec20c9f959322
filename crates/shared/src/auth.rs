//! Authentication wire types: token claims and auth request/response payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Distinguishes access tokens from refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived token presented on every request.
    Access,
    /// Long-lived token exchanged for a new access token.
    Refresh,
}

/// JWT claims carried by every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: Uuid,
    /// Owning company. `None` only for the platform super-admin.
    pub company: Option<Uuid>,
    /// User's role at issue time. Informational; gates use the live record.
    pub role: String,
    /// Access or refresh.
    pub typ: TokenKind,
    /// Issued at timestamp (seconds).
    pub iat: i64,
    /// Expiration timestamp (seconds).
    pub exp: i64,
}

impl Claims {
    /// Creates new claims for a user.
    #[must_use]
    pub fn new(
        user_id: Uuid,
        company_id: Option<Uuid>,
        role: &str,
        typ: TokenKind,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sub: user_id,
            company: company_id,
            role: role.to_string(),
            typ,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    /// Returns the user ID from claims.
    #[must_use]
    pub const fn user_id(&self) -> Uuid {
        self.sub
    }

    /// Returns the company ID from claims.
    #[must_use]
    pub const fn company_id(&self) -> Option<Uuid> {
        self.company
    }
}

/// Login request payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    /// User email.
    #[validate(email(message = "must be a valid email"))]
    pub email: String,
    /// User password.
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

/// Refresh token request.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    /// The refresh token.
    pub refresh_token: String,
}

/// Change password request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    /// The current password.
    #[validate(length(min = 1, message = "is required"))]
    pub current_password: String,
    /// The new password; must satisfy the password policy.
    pub new_password: String,
}

/// Self-service profile edit. Only the display name can change here.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    /// New first name.
    #[validate(length(min = 2, max = 50))]
    pub first_name: Option<String>,
    /// New last name.
    #[validate(length(min = 2, max = 50))]
    pub last_name: Option<String>,
}

/// Admin user created together with a company.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdminUserRequest {
    /// First name.
    #[validate(length(min = 2, max = 50))]
    pub first_name: String,
    /// Last name.
    #[validate(length(min = 2, max = 50))]
    pub last_name: String,
    /// Email.
    #[validate(email(message = "must be a valid email"))]
    pub email: String,
    /// Initial password; must satisfy the password policy.
    pub password: String,
    /// Employee identifier, defaults to `ADMIN-001`.
    pub employee_id: Option<String>,
}

/// Company self-registration (and super-admin company creation) payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterCompanyRequest {
    /// Company display name.
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    /// Short unique company code.
    #[validate(length(min = 2, max = 20))]
    pub code: String,
    /// Unique domain (lowercase letters, digits, hyphens, dots).
    #[validate(length(min = 2, max = 100))]
    pub domain: String,
    /// First company administrator.
    #[validate(nested)]
    pub admin: AdminUserRequest,
}

/// Login response payload.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    /// Always true on this path.
    pub success: bool,
    /// Access token.
    pub token: String,
    /// Refresh token.
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// The authenticated user.
    pub user: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn claims_new_sets_correct_fields() {
        let user_id = Uuid::new_v4();
        let company_id = Uuid::new_v4();
        let now = Utc::now();
        let expires_at = now + Duration::hours(1);

        let claims = Claims::new(
            user_id,
            Some(company_id),
            "kam",
            TokenKind::Access,
            now,
            expires_at,
        );

        assert_eq!(claims.user_id(), user_id);
        assert_eq!(claims.company_id(), Some(company_id));
        assert_eq!(claims.role, "kam");
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp, expires_at.timestamp());
    }

    #[test]
    fn claims_round_trip_without_company() {
        let now = Utc::now();
        let claims = Claims::new(
            Uuid::new_v4(),
            None,
            "super_admin",
            TokenKind::Refresh,
            now,
            now + Duration::days(1),
        );
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json["company"].is_null());
        assert_eq!(json["typ"], "refresh");

        let back: Claims = serde_json::from_value(json).unwrap();
        assert_eq!(back, claims);
    }

    #[test]
    fn register_request_validates_nested_admin() {
        let req = RegisterCompanyRequest {
            name: "Acme Foods".to_string(),
            code: "ACME".to_string(),
            domain: "acme.example".to_string(),
            admin: AdminUserRequest {
                first_name: "A".to_string(),
                last_name: "Admin".to_string(),
                email: "not-an-email".to_string(),
                password: "Secret1!x".to_string(),
                employee_id: None,
            },
        };
        assert!(req.validate().is_err());
    }
}
