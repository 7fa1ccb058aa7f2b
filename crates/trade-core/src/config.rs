//! Configuration management for the trade hub.
//!
//! Sources, lowest priority first: built-in defaults, an optional TOML file
//! (`config/default.toml` or the path in `TRADE_HUB_CONFIG`), variables
//! prefixed `TRADE_HUB__` (e.g. `TRADE_HUB__JWT__ISSUER`), and finally the
//! conventional flat variables such as `DATABASE_URL` and `JWT_SECRET`.

use serde::Deserialize;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::{CoreError, Result};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const MIN_SECRET_LEN: usize = 32;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub database: DatabaseConfig,
    pub jwt: JwtSettings,
    pub password: PasswordSettings,
    pub super_admin: SuperAdminSettings,
    pub rfq: RfqSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Upper bound for a single request, storage calls included.
    pub request_timeout_secs: u64,
    /// Enable CORS for all origins (development only).
    pub cors_permissive: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            request_timeout_secs: 10,
            cors_permissive: true,
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| CoreError::config(format!("invalid listen address: {}", e)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub idle_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/global_trade_hub".to_string(),
            max_connections: 25,
            min_connections: 0,
            idle_timeout_secs: 300,
            acquire_timeout_secs: 5,
            run_migrations: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: "global-trade-hub".to_string(),
            access_ttl_secs: 15 * 60,
            refresh_ttl_secs: 30 * 24 * 60 * 60,
        }
    }
}

/// Argon2 work factor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PasswordSettings {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        // argon2 crate defaults (OWASP baseline for Argon2id)
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Credentials of the directory-less administrator. Both fields unset
/// disables the bypass.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SuperAdminSettings {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: String,
}

impl Default for SuperAdminSettings {
    fn default() -> Self {
        Self {
            email: None,
            password: None,
            full_name: "Master Administrator".to_string(),
        }
    }
}

impl SuperAdminSettings {
    pub fn is_enabled(&self) -> bool {
        self.email.is_some() && self.password.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RfqSettings {
    pub default_expiry_days: i64,
}

impl Default for RfqSettings {
    fn default() -> Self {
        Self {
            default_expiry_days: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file location and the environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = env::var("TRADE_HUB_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(PathBuf::from(path))
    }

    /// Load configuration from a specific file (which may be absent) and the environment.
    pub fn load_from(path: PathBuf) -> Result<Self> {
        let port = env::var("PORT").or_else(|_| env::var("API_PORT")).ok();

        let builder = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("TRADE_HUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", env::var("API_HOST").ok())?
            .set_override_option("server.port", port)?
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .set_override_option("jwt.secret", env::var("JWT_SECRET").ok())?
            .set_override_option("jwt.issuer", env::var("JWT_ISSUER").ok())?
            .set_override_option("super_admin.email", env::var("SUPER_ADMIN_EMAIL").ok())?
            .set_override_option("super_admin.password", env::var("SUPER_ADMIN_PASSWORD").ok())?;

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the server cannot run safely with.
    pub fn validate(&self) -> Result<()> {
        if self.jwt.secret.is_empty() {
            return Err(CoreError::config("JWT_SECRET is required"));
        }
        if self.jwt.secret.len() < MIN_SECRET_LEN {
            tracing::warn!(
                length = self.jwt.secret.len(),
                "JWT secret is shorter than {} bytes",
                MIN_SECRET_LEN
            );
        }
        if self.jwt.access_ttl_secs <= 0 || self.jwt.refresh_ttl_secs <= 0 {
            return Err(CoreError::config("token TTLs must be positive"));
        }
        if self.jwt.issuer.trim().is_empty() {
            return Err(CoreError::config("JWT issuer must not be empty"));
        }
        if self.super_admin.email.is_some() != self.super_admin.password.is_some() {
            return Err(CoreError::config(
                "super admin email and password must be configured together",
            ));
        }
        if self.rfq.default_expiry_days <= 0 {
            return Err(CoreError::config("rfq.default_expiry_days must be positive"));
        }
        if self.database.max_connections == 0 {
            return Err(CoreError::config("database.max_connections must be at least 1"));
        }
        Ok(())
    }

    /// Configuration for tests (no file, no environment).
    pub fn test_config() -> Self {
        Self {
            jwt: JwtSettings {
                secret: "test-secret-key-with-at-least-32-bytes!".to_string(),
                ..Default::default()
            },
            password: PasswordSettings {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            super_admin: SuperAdminSettings {
                email: Some("root@trade-hub.test".to_string()),
                password: Some("root-password-123".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.jwt.access_ttl_secs, 900);
        assert_eq!(config.jwt.refresh_ttl_secs, 2_592_000);
        assert_eq!(config.database.max_connections, 25);
        assert_eq!(config.rfq.default_expiry_days, 30);
        assert!(!config.super_admin.is_enabled());
    }

    #[test]
    fn test_missing_secret_rejected() {
        let config = AppConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_test_config_is_valid() {
        let config = AppConfig::test_config();
        assert!(config.validate().is_ok());
        assert!(config.super_admin.is_enabled());
    }

    #[test]
    fn test_half_configured_super_admin_rejected() {
        let mut config = AppConfig::test_config();
        config.super_admin.password = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_ttl_rejected() {
        let mut config = AppConfig::test_config();
        config.jwt.access_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_socket_addr() {
        let server = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 9000,
            ..Default::default()
        };
        assert_eq!(server.socket_addr().unwrap().port(), 9000);
    }
}
