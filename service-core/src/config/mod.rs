use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;
use std::fmt::Display;
use std::str::FromStr;

/// Settings shared by every service: the HTTP listen port.
///
/// Read from an optional `configuration` file and `APP__*` variables,
/// e.g. `APP__PORT=9000`.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8000
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

/// Read an environment variable, falling back to `default` when unset.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
/// A value that is set but does not parse is a configuration error.
pub fn env_parse<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    let Ok(raw) = std::env::var(key) else {
        return Ok(default);
    };

    raw.trim().parse::<T>().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!(
            "{} has an invalid value '{}': {}",
            key,
            raw,
            e
        ))
    })
}
