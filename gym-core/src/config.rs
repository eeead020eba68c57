//! Configuration management
//!
//! `GymConfig` is built once at start-up and handed by reference to every
//! store constructor. Sources are layered: built-in defaults, an optional TOML
//! file, then `GYM__SECTION__KEY` environment variables. `JWT_SECRET` is
//! honoured as a fallback for the signing secret.

use crate::error::{ErrorContext, GymError, GymResult};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Minimum accepted length of the token signing secret, in bytes
pub const MIN_SECRET_LEN: usize = 16;

/// Longest accepted token lifetime, in hours (ten years)
pub const MAX_TOKEN_TTL_HOURS: u64 = 87_600;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GymConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite URL, e.g. `sqlite:data/gym.db` or `sqlite::memory:`
    pub url: String,
    /// Pool size for file-backed databases
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:data/gym.db".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    /// Whether the URL points at a private in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

/// Credential and policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared HS256 signing secret
    pub jwt_secret: String,
    /// Lifetime of issued tokens, in hours
    pub token_ttl_hours: u64,
    /// Upper bound for every credential/policy storage call, in milliseconds
    pub storage_timeout_ms: u64,
    /// Subject granted the `admin` role at start-up
    pub bootstrap_admin: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: 24,
            storage_timeout_ms: 5_000,
            bootstrap_admin: None,
        }
    }
}

impl GymConfig {
    /// Load configuration from defaults, an optional TOML file and the
    /// environment
    pub fn load(path: Option<&Path>) -> GymResult<Self> {
        let defaults = config::Config::try_from(&GymConfig::default()).map_err(config_failure)?;

        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("GYM")
                .separator("__")
                .try_parsing(true),
        );

        let mut loaded: GymConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_failure)?;

        if loaded.auth.jwt_secret.is_empty() {
            if let Ok(secret) = std::env::var("JWT_SECRET") {
                loaded.auth.jwt_secret = secret;
            }
        }

        loaded.validate()?;
        Ok(loaded)
    }

    /// Configuration suitable for tests: in-memory database and a fixed secret
    pub fn for_testing() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            auth: AuthConfig {
                jwt_secret: "gym-test-secret-0123456789".to_string(),
                ..AuthConfig::default()
            },
            ..Self::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> GymResult<()> {
        if self.auth.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(GymError::Config {
                message: format!(
                    "JWT secret must be at least {} bytes (set JWT_SECRET or GYM__AUTH__JWT_SECRET)",
                    MIN_SECRET_LEN
                ),
                source: None,
                context: ErrorContext::new("config").with_operation("validate"),
            });
        }

        if self.auth.token_ttl_hours == 0 {
            return Err(crate::config_error!("token_ttl_hours must be positive", "config"));
        }

        if self.auth.token_ttl_hours > MAX_TOKEN_TTL_HOURS {
            return Err(crate::config_error!(
                format!("token_ttl_hours must not exceed {}", MAX_TOKEN_TTL_HOURS),
                "config"
            ));
        }

        if self.auth.storage_timeout_ms == 0 {
            return Err(crate::config_error!("storage_timeout_ms must be positive", "config"));
        }

        if matches!(&self.auth.bootstrap_admin, Some(subject) if subject.trim().is_empty()) {
            return Err(crate::validation_error!(
                "bootstrap_admin must not be blank",
                "bootstrap_admin",
                "config"
            ));
        }

        if self.database.url.is_empty() {
            return Err(crate::config_error!("database url must be set", "config"));
        }

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn config_failure(e: config::ConfigError) -> GymError {
    GymError::Config {
        message: format!("Failed to load configuration: {}", e),
        source: Some(Box::new(e)),
        context: ErrorContext::new("config").with_operation("load"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_requires_secret() {
        let config = GymConfig::default();
        assert!(matches!(config.validate(), Err(GymError::Config { .. })));
    }

    #[test]
    fn test_testing_config_is_valid() {
        let config = GymConfig::for_testing();
        assert!(config.validate().is_ok());
        assert!(config.database.is_in_memory());
        assert_eq!(config.auth.token_ttl_hours, 24);
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = GymConfig::for_testing();
        config.auth.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_token_ttl_is_bounded() {
        let mut config = GymConfig::for_testing();
        config.auth.token_ttl_hours = MAX_TOKEN_TTL_HOURS;
        assert!(config.validate().is_ok());

        config.auth.token_ttl_hours = MAX_TOKEN_TTL_HOURS + 1;
        assert!(matches!(config.validate(), Err(GymError::Config { .. })));

        config.auth.token_ttl_hours = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_storage_timeout_rejected() {
        let mut config = GymConfig::for_testing();
        config.auth.storage_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090

[database]
url = "sqlite::memory:"

[auth]
jwt_secret = "file-provided-secret-abcdef"
storage_timeout_ms = 250
"#
        )
        .unwrap();

        let config = GymConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.auth.storage_timeout_ms, 250);
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert_eq!(config.address(), "127.0.0.1:9090");
    }
}
