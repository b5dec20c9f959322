//! Application configuration management.

use std::collections::HashMap;

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtConfig,
    /// Per-role coarse rate limits.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Optional platform super-admin created at startup.
    #[serde(default)]
    pub bootstrap: Option<BootstrapConfig>,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL. `memory://` selects the in-process store.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

impl DatabaseConfig {
    /// Returns true when the in-memory store was requested.
    #[must_use]
    pub fn is_memory(&self) -> bool {
        self.url.starts_with("memory://")
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// JWT configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// Secret key for signing tokens.
    pub secret: String,
    /// Access token expiration in seconds.
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
    /// Refresh token expiration in seconds.
    #[serde(default = "default_refresh_token_expiry")]
    pub refresh_token_expiry_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    604_800 // 7 days
}

fn default_refresh_token_expiry() -> u64 {
    2_592_000 // 30 days
}

/// Requests per minute allowed for each role.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Enables the limiter.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-role budgets keyed by role name.
    #[serde(default = "default_role_limits")]
    pub per_minute: HashMap<String, u32>,
    /// Budget for roles missing from `per_minute`.
    #[serde(default = "default_fallback_limit")]
    pub fallback_per_minute: u32,
}

impl RateLimitConfig {
    /// Returns the per-minute budget for a role name.
    #[must_use]
    pub fn limit_for(&self, role: &str) -> u32 {
        self.per_minute
            .get(role)
            .copied()
            .unwrap_or(self.fallback_per_minute)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_minute: default_role_limits(),
            fallback_per_minute: default_fallback_limit(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_fallback_limit() -> u32 {
    50
}

fn default_role_limits() -> HashMap<String, u32> {
    [
        ("super_admin", 1000),
        ("admin", 1000),
        ("board", 500),
        ("director", 500),
        ("manager", 300),
        ("kam", 200),
        ("sales_rep", 100),
        ("sales_admin", 150),
        ("analyst", 200),
    ]
    .into_iter()
    .map(|(role, limit)| (role.to_string(), limit))
    .collect()
}

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Super-admin account ensured at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    /// Super-admin email.
    pub super_admin_email: String,
    /// Super-admin initial password.
    pub super_admin_password: String,
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("SPENDGATE").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_defaults_per_role() {
        let limits = RateLimitConfig::default();
        assert_eq!(limits.limit_for("admin"), 1000);
        assert_eq!(limits.limit_for("sales_rep"), 100);
        assert_eq!(limits.limit_for("unknown"), 50);
    }

    #[test]
    fn test_memory_url_detection() {
        let db = DatabaseConfig {
            url: "memory://".to_string(),
            max_connections: 1,
            min_connections: 1,
        };
        assert!(db.is_memory());

        let pg = DatabaseConfig {
            url: "postgres://localhost/spendgate".to_string(),
            ..db
        };
        assert!(!pg.is_memory());
    }

    #[test]
    fn test_config_from_toml_source() {
        let raw = r#"
            [database]
            url = "memory://"

            [jwt]
            secret = "s3cret"

            [logging]
            format = "json"
        "#;
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.jwt.access_token_expiry_secs, 604_800);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.bootstrap.is_none());
        assert!(config.rate_limit.enabled);
    }
}
