//! JWT token issuing and verification.
//!
//! The signing secret is loaded once at startup and held by [`TokenService`];
//! rotating it invalidates every outstanding token.

use chrono::{DateTime, Duration, Utc};
use config::ConfigError;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{Claims, TokenKind};
use crate::config::JwtConfig;
use crate::error::{AppError, ErrorCode};

/// Token lifetimes and signing secret.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Secret key for signing tokens.
    pub secret: String,
    /// Access token lifetime.
    pub access_token_ttl: Duration,
    /// Refresh token lifetime.
    pub refresh_token_ttl: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: "change-me-in-production".to_string(),
            access_token_ttl: Duration::days(7),
            refresh_token_ttl: Duration::days(30),
        }
    }
}

impl TryFrom<&JwtConfig> for TokenConfig {
    type Error = ConfigError;

    fn try_from(cfg: &JwtConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            secret: cfg.secret.clone(),
            access_token_ttl: lifetime("access_token_expiry_secs", cfg.access_token_expiry_secs)?,
            refresh_token_ttl: lifetime(
                "refresh_token_expiry_secs",
                cfg.refresh_token_expiry_secs,
            )?,
        })
    }
}

/// Converts a configured lifetime, refusing values chrono cannot represent.
fn lifetime(key: &str, secs: u64) -> Result<Duration, ConfigError> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| ConfigError::Message(format!("jwt.{key} is out of range: {secs}")))
}

/// Errors that can occur during token operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Token encoding failed.
    #[error("failed to encode token: {0}")]
    Encoding(String),

    /// Token has expired.
    #[error("token has expired")]
    Expired,

    /// Signature, structure or claims are invalid.
    #[error("invalid token")]
    Invalid,

    /// A refresh token was presented where an access token was expected, or vice versa.
    #[error("wrong token type")]
    WrongKind,
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::new(ErrorCode::ExpiredToken, "Token has expired"),
            TokenError::Invalid | TokenError::WrongKind => {
                AppError::new(ErrorCode::InvalidToken, "Invalid or malformed token")
            }
            TokenError::Encoding(detail) => AppError::internal(detail),
        }
    }
}

/// Issues and verifies signed session tokens.
#[derive(Clone)]
pub struct TokenService {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_token_ttl", &self.config.access_token_ttl)
            .field("refresh_token_ttl", &self.config.refresh_token_ttl)
            .field("secret", &"[hidden]")
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Creates a new token service with the given configuration.
    #[must_use]
    pub fn new(config: TokenConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            config,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// Issues an access token for a user.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if token generation fails.
    pub fn generate_access_token(
        &self,
        user_id: Uuid,
        company_id: Option<Uuid>,
        role: &str,
    ) -> Result<String, TokenError> {
        self.generate_at(user_id, company_id, role, TokenKind::Access, Utc::now())
    }

    /// Issues a refresh token for a user.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if token generation fails.
    pub fn generate_refresh_token(
        &self,
        user_id: Uuid,
        company_id: Option<Uuid>,
        role: &str,
    ) -> Result<String, TokenError> {
        self.generate_at(user_id, company_id, role, TokenKind::Refresh, Utc::now())
    }

    /// Issues a token with an explicit issue time.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if token generation fails.
    pub fn generate_at(
        &self,
        user_id: Uuid,
        company_id: Option<Uuid>,
        role: &str,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let ttl = match kind {
            TokenKind::Access => self.config.access_token_ttl,
            TokenKind::Refresh => self.config.refresh_token_ttl,
        };
        let claims = Claims::new(user_id, company_id, role, kind, issued_at, issued_at + ttl);

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verifies the signature and expiry of a token and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` if the token has expired.
    /// Returns `TokenError::Invalid` if the token is malformed or the signature is wrong.
    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }

    /// Verifies a token and requires it to be of the given kind.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::WrongKind` when the token type does not match,
    /// otherwise the errors of [`Self::validate_token`].
    pub fn validate_kind(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let claims = self.validate_token(token)?;
        if claims.typ != kind {
            return Err(TokenError::WrongKind);
        }
        Ok(claims)
    }

    /// Returns the access token lifetime in seconds.
    #[must_use]
    pub fn access_token_expires_in(&self) -> i64 {
        self.config.access_token_ttl.num_seconds()
    }
}
