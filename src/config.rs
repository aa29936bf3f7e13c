use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Startup configuration problems. Any of these stops the process before it
/// binds a listener.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub query_timeout: Duration,
    /// Encrypt the connection but skip certificate verification (hosted
    /// Postgres with self-signed certs).
    pub relaxed_tls: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub db: DbConfig,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            get(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let database_url = required("DATABASE_URL")?;
        let secret = required("JWT_SECRET")?;

        let port = parse_or(&get, "PORT", 4000u16)?;
        let max_connections = parse_or(&get, "DB_MAX_CONNECTIONS", 10u32)?;
        let query_timeout_secs = parse_or(&get, "DB_QUERY_TIMEOUT_SECS", 5u64)?;

        let production = get("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        let relaxed_tls = parse_or(&get, "DB_SSL_RELAXED", production)?;

        Ok(Self {
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db: DbConfig {
                url: database_url,
                max_connections,
                query_timeout: Duration::from_secs(query_timeout_secs),
                relaxed_tls,
            },
            jwt: JwtConfig { secret },
        })
    }
}

fn parse_or<F, T>(get: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
