use std::{net::SocketAddr, time::Duration};
use thiserror::Error;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings, read from the environment (and `.env`) at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Time between two batch sweeps
    pub reconcile_interval: Duration,
    /// Apply pending migrations before serving
    pub run_migrations: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let bind_addr = parse(
            &lookup,
            "BIND_ADDR",
            SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            |v| v.parse().ok(),
        )?;

        let interval_secs = parse(
            &lookup,
            "RECONCILE_INTERVAL_SECS",
            DEFAULT_RECONCILE_INTERVAL_SECS,
            |v| v.parse().ok().filter(|secs| *secs > 0),
        )?;

        let run_migrations = parse(&lookup, "RUN_MIGRATIONS", true, |v| {
            match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Some(true),
                "0" | "false" | "no" => Some(false),
                _ => None,
            }
        })?;

        Ok(Self {
            database_url,
            bind_addr,
            reconcile_interval: Duration::from_secs(interval_secs),
            run_migrations,
        })
    }
}

/// Reads an optional variable, falling back to `default` when it is unset
fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
    convert: impl Fn(&str) -> Option<T>,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => convert(value.trim()).ok_or(ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
