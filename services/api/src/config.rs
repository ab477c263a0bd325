//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// How a session's lifetime is counted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPolicy {
    /// Every successfully authenticated request restarts the session's lifetime.
    Refresh,
    /// The session expires a fixed time after login.
    Fixed,
}

impl FromStr for SessionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "refresh" | "sliding" => Ok(SessionPolicy::Refresh),
            "fixed" | "absolute" => Ok(SessionPolicy::Fixed),
            other => Err(format!("'{}' is not one of refresh, fixed", other)),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub log_level: Level,
    pub accrual_address: String,
    pub accrual_frequency: Duration,
    pub accrual_request_timeout: Duration,
    pub auth_cache_timeout: Duration,
    pub auth_cache_housekeeper_time: Duration,
    pub session_policy: SessionPolicy,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address_str =
            lookup("RUN_ADDRESS").unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("RUN_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URI")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URI".to_string()))?;

        let max_connections_str =
            lookup("DATABASE_MAX_CONNECTIONS").unwrap_or_else(|| "10".to_string());
        let database_max_connections = max_connections_str
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "DATABASE_MAX_CONNECTIONS".to_string(),
                    format!("'{}' is not a positive integer", max_connections_str),
                )
            })?;

        let log_level_str = lookup("GOPHERMART_LOGLEVEL")
            .or_else(|| lookup("RUST_LOG"))
            .unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "GOPHERMART_LOGLEVEL".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Accrual System Settings ---
        let accrual_address = normalize_base_url(
            &lookup("ACCRUAL_SYSTEM_ADDRESS")
                .unwrap_or_else(|| "http://127.0.0.1:8081".to_string()),
        );
        let accrual_frequency = duration_var(&lookup, "ACCRUAL_FREQUENCY", "1s")?;
        let accrual_request_timeout = duration_var(&lookup, "ACCRUAL_REQUEST_TIMEOUT", "5s")?;

        // --- Session Cache Settings ---
        let auth_cache_timeout = duration_var(&lookup, "AUTH_CACHE_TIMEOUT", "300s")?;
        let auth_cache_housekeeper_time =
            duration_var(&lookup, "AUTH_CACHE_HOUSEKEEPER_TIME", "1h")?;
        let session_policy = lookup("SESSION_POLICY")
            .unwrap_or_else(|| "refresh".to_string())
            .parse::<SessionPolicy>()
            .map_err(|e| ConfigError::InvalidValue("SESSION_POLICY".to_string(), e))?;

        Ok(Self {
            bind_address,
            database_url,
            database_max_connections,
            log_level,
            accrual_address,
            accrual_frequency,
            accrual_request_timeout,
            auth_cache_timeout,
            auth_cache_housekeeper_time,
            session_policy,
        })
    }
}

/// Parses a human-readable duration such as `300s`, `1h` or `50us` and rejects zero.
fn duration_var<F>(lookup: &F, key: &str, default: &str) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    let duration = humantime::parse_duration(raw.trim())
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))?;
    if duration.is_zero() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "duration must be positive".to_string(),
        ));
    }
    Ok(duration)
}

/// The accrual address is often given as bare `host:port`.
fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_is_set() {
        let config = load(&[("DATABASE_URI", "postgres://localhost/gophermart")]).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.accrual_address, "http://127.0.0.1:8081");
        assert_eq!(config.accrual_frequency, Duration::from_secs(1));
        assert_eq!(config.auth_cache_timeout, Duration::from_secs(300));
        assert_eq!(config.auth_cache_housekeeper_time, Duration::from_secs(3600));
        assert_eq!(config.session_policy, SessionPolicy::Refresh);
        assert_eq!(config.database_max_connections, 10);
    }

    #[test]
    fn database_uri_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(v)) if v == "DATABASE_URI"));
    }

    #[test]
    fn durations_use_human_units() {
        let config = load(&[
            ("DATABASE_URI", "postgres://db"),
            ("ACCRUAL_FREQUENCY", "50us"),
            ("AUTH_CACHE_TIMEOUT", "5m"),
        ])
        .unwrap();
        assert_eq!(config.accrual_frequency, Duration::from_micros(50));
        assert_eq!(config.auth_cache_timeout, Duration::from_secs(300));
    }

    #[test]
    fn zero_and_garbage_durations_are_rejected() {
        assert!(matches!(
            load(&[("DATABASE_URI", "postgres://db"), ("ACCRUAL_FREQUENCY", "0s")]),
            Err(ConfigError::InvalidValue(key, _)) if key == "ACCRUAL_FREQUENCY"
        ));
        assert!(matches!(
            load(&[("DATABASE_URI", "postgres://db"), ("AUTH_CACHE_TIMEOUT", "soon")]),
            Err(ConfigError::InvalidValue(key, _)) if key == "AUTH_CACHE_TIMEOUT"
        ));
    }

    #[test]
    fn bare_accrual_host_gets_a_scheme() {
        let config = load(&[
            ("DATABASE_URI", "postgres://db"),
            ("ACCRUAL_SYSTEM_ADDRESS", "accrual:8081/"),
            ("SESSION_POLICY", "fixed"),
        ])
        .unwrap();
        assert_eq!(config.accrual_address, "http://accrual:8081");
        assert_eq!(config.session_policy, SessionPolicy::Fixed);
    }
}
