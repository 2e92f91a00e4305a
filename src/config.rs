use std::{env, fmt::Display, net::SocketAddr, str::FromStr};

use thiserror::Error;

use crate::constants::{
    DEFAULT_BIND_ADDRESS, DEFAULT_LOG_LEVEL, DEFAULT_MAX_CONNECTIONS,
    DEFAULT_SESSION_LIFETIME_HOURS,
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Environment variable {0} is required")]
    Missing(&'static str),

    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_address: SocketAddr,
    pub max_connections: u32,
    pub session_lifetime_hours: i64,
    pub log_level: String,
    /// Keys that were not set, with the default used. Logged once logging is up.
    pub defaults: Vec<(&'static str, String)>,
}

impl Config {
    /// Reads the process environment. Load `.env` first to have it included.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut defaults = Vec::new();

        let session_lifetime_hours: i64 = try_load(
            &lookup,
            &mut defaults,
            "SESSION_LIFETIME_HOURS",
            &DEFAULT_SESSION_LIFETIME_HOURS.to_string(),
        )?;
        if session_lifetime_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "SESSION_LIFETIME_HOURS",
                reason: "must be positive".to_string(),
            });
        }

        let jwt_secret = required(&lookup, "JWT_SECRET")?;
        if jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "JWT_SECRET",
                reason: "must not be empty".to_string(),
            });
        }

        let database_url = required(&lookup, "DATABASE_URL")?;
        let bind_address = try_load(&lookup, &mut defaults, "BIND_ADDRESS", DEFAULT_BIND_ADDRESS)?;
        let max_connections = try_load(
            &lookup,
            &mut defaults,
            "DATABASE_MAX_CONNECTIONS",
            &DEFAULT_MAX_CONNECTIONS.to_string(),
        )?;
        let log_level = try_load(&lookup, &mut defaults, "RUST_LOG", DEFAULT_LOG_LEVEL)?;

        Ok(Self {
            database_url,
            jwt_secret,
            bind_address,
            max_connections,
            session_lifetime_hours,
            log_level,
            defaults,
        })
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<String, ConfigError> {
    lookup(key).ok_or(ConfigError::Missing(key))
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    defaults: &mut Vec<(&'static str, String)>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            defaults.push((key, default.to_string()));
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/recipes"),
            ("JWT_SECRET", "s3cret"),
        ])
        .unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:8000".parse().unwrap());
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.session_lifetime_hours, 24);
        assert_eq!(config.log_level, "info");

        let defaulted: Vec<&str> = config.defaults.iter().map(|(key, _)| *key).collect();
        assert_eq!(
            defaulted,
            vec![
                "SESSION_LIFETIME_HOURS",
                "BIND_ADDRESS",
                "DATABASE_MAX_CONNECTIONS",
                "RUST_LOG"
            ]
        );
    }

    #[test]
    fn set_values_are_not_reported_as_defaults() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/recipes"),
            ("JWT_SECRET", "s3cret"),
            ("BIND_ADDRESS", "127.0.0.1:9000"),
            ("RUST_LOG", "debug"),
        ])
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert!(config.defaults.iter().all(|(key, _)| *key != "BIND_ADDRESS"));
        assert!(config.defaults.iter().all(|(key, _)| *key != "RUST_LOG"));
        assert!(config.defaults.contains(&("DATABASE_MAX_CONNECTIONS", "5".to_string())));
    }

    #[test]
    fn required_values_are_reported() {
        assert_eq!(
            load(&[("JWT_SECRET", "s3cret")]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
        assert_eq!(
            load(&[("DATABASE_URL", "postgres://localhost/recipes")]).unwrap_err(),
            ConfigError::Missing("JWT_SECRET")
        );
    }

    #[test]
    fn invalid_values_are_reported() {
        let error = load(&[
            ("DATABASE_URL", "postgres://localhost/recipes"),
            ("JWT_SECRET", "s3cret"),
            ("BIND_ADDRESS", "not an address"),
        ])
        .unwrap_err();
        assert!(matches!(error, ConfigError::Invalid { key: "BIND_ADDRESS", .. }));

        let error = load(&[
            ("DATABASE_URL", "postgres://localhost/recipes"),
            ("JWT_SECRET", "s3cret"),
            ("SESSION_LIFETIME_HOURS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(error, ConfigError::Invalid { key: "SESSION_LIFETIME_HOURS", .. }));
    }
}
