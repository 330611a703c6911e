//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value for {name}: {value:?}")]
    InvalidValue { name: String, value: String },

    #[error("Invalid connection string for database {database:?}: {reason}")]
    InvalidDatabaseUrl { database: String, reason: String },

    #[error("Database {database:?} is configured by both {first} and {second}")]
    DuplicateDatabase {
        database: String,
        first: String,
        second: String,
    },
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0),
            port: 3000,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3001".to_string()],
        }
    }
}

/// Reconcile loop and execution settings
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub interval: Duration,
    pub execution_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            execution_timeout: Duration::from_secs(300),
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub reconciler: ReconcilerConfig,
    /// Database registry: target database name to connection URI
    pub databases: HashMap<String, String>,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();
        Self::from_vars(std::env::vars())
    }

    /// Builds settings from `(name, value)` pairs.
    ///
    /// `DATABASE_<NAME>_URL` registers database `<name>` (lowercased);
    /// a plain `DATABASE_URL` registers `default`. Two variables naming the
    /// same database are rejected.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();

        let server = ServerConfig {
            host: parse_or(&vars, "HOST", ServerConfig::default().host)?,
            port: parse_or(&vars, "PORT", ServerConfig::default().port)?,
        };

        let cors = CorsConfig {
            allowed_origins: vars
                .get("ALLOWED_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_else(|| CorsConfig::default().allowed_origins),
        };

        let defaults = ReconcilerConfig::default();
        let reconciler = ReconcilerConfig {
            interval: Duration::from_secs(parse_or(&vars, "RECONCILE_INTERVAL_SECS", defaults.interval.as_secs())?),
            execution_timeout: Duration::from_secs(parse_or(
                &vars,
                "EXECUTION_TIMEOUT_SECS",
                defaults.execution_timeout.as_secs(),
            )?),
        };
        if reconciler.interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "RECONCILE_INTERVAL_SECS".to_string(),
                value: "0".to_string(),
            });
        }

        let mut databases = HashMap::new();
        let mut sources: HashMap<String, &str> = HashMap::new();
        for (name, value) in &vars {
            let database = if name == "DATABASE_URL" {
                "default".to_string()
            } else if let Some(database) = name
                .strip_prefix("DATABASE_")
                .and_then(|rest| rest.strip_suffix("_URL"))
                .filter(|database| !database.is_empty())
            {
                database.to_lowercase()
            } else {
                continue;
            };

            Self::check_database_url(&database, value)?;
            if let Some(previous) = sources.insert(database.clone(), name.as_str()) {
                let (first, second) = if previous < name.as_str() {
                    (previous, name.as_str())
                } else {
                    (name.as_str(), previous)
                };
                return Err(ConfigError::DuplicateDatabase {
                    database,
                    first: first.to_string(),
                    second: second.to_string(),
                });
            }
            databases.insert(database, value.clone());
        }

        Ok(Self {
            server,
            cors,
            reconciler,
            databases,
        })
    }

    /// Validate a connection string (postgresql://...)
    fn check_database_url(database: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidDatabaseUrl {
            database: database.to_string(),
            reason: reason.to_string(),
        };

        let parsed = url::Url::parse(value).map_err(|_| invalid("expected postgresql://..."))?;
        if !matches!(parsed.scheme(), "postgres" | "postgresql") {
            return Err(invalid("expected postgresql://..."));
        }
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(invalid("missing host"));
        }
        if parsed.path().trim_start_matches('/').is_empty() {
            return Err(invalid("missing database name"));
        }
        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(vars: &HashMap<String, String>, name: &str, default: T) -> Result<T, ConfigError> {
    match vars.get(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.clone(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_default_server_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_defaults_from_empty_environment() {
        let settings = Settings::from_vars(Vec::new()).unwrap();
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.reconciler.interval, Duration::from_secs(10));
        assert_eq!(settings.reconciler.execution_timeout, Duration::from_secs(300));
        assert!(settings.databases.is_empty());
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_vars(vars(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("ALLOWED_ORIGINS", "http://a.test, http://b.test"),
            ("RECONCILE_INTERVAL_SECS", "2"),
            ("EXECUTION_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(settings.server.host, Ipv4Addr::new(127, 0, 0, 1));
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.cors.allowed_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(settings.reconciler.interval, Duration::from_secs(2));
        assert_eq!(settings.reconciler.execution_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_database_registry() {
        let settings = Settings::from_vars(vars(&[
            ("DATABASE_URL", "postgres://u:p@localhost/app"),
            ("DATABASE_ANALYTICS_URL", "postgresql://u:p@warehouse:5433/analytics"),
            ("DATABASE_POOL_SIZE", "5"),
        ]))
        .unwrap();
        assert_eq!(settings.databases.len(), 2);
        assert_eq!(settings.databases["default"], "postgres://u:p@localhost/app");
        assert_eq!(settings.databases["analytics"], "postgresql://u:p@warehouse:5433/analytics");
    }

    #[test]
    fn test_conflicting_database_names() {
        let err = Settings::from_vars(vars(&[
            ("DATABASE_URL", "postgres://u:p@localhost/app"),
            ("DATABASE_DEFAULT_URL", "postgres://u:p@elsewhere/app"),
        ]))
        .unwrap_err();
        assert!(matches!(
            &err,
            ConfigError::DuplicateDatabase { database, first, second }
                if database == "default" && first == "DATABASE_DEFAULT_URL" && second == "DATABASE_URL"
        ));

        assert!(matches!(
            Settings::from_vars(vars(&[
                ("DATABASE_APP_URL", "postgres://u:p@localhost/app"),
                ("DATABASE_App_URL", "postgres://u:p@localhost/app"),
            ])),
            Err(ConfigError::DuplicateDatabase { .. })
        ));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Settings::from_vars(vars(&[("PORT", "http")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(Settings::from_vars(vars(&[("RECONCILE_INTERVAL_SECS", "0")])).is_err());
        assert!(matches!(
            Settings::from_vars(vars(&[("DATABASE_APP_URL", "mysql://u:p@host/app")])),
            Err(ConfigError::InvalidDatabaseUrl { .. })
        ));
        assert!(Settings::from_vars(vars(&[("DATABASE_APP_URL", "postgres://u:p@host/")])).is_err());
    }
}
