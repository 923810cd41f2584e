use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub frontend_origin: String,
    pub session_idle: Duration,
    pub proxy_key: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let session_idle_secs: u64 = try_load("SESSION_IDLE_SECS", "1800")?;

        let proxy_key = read_secret("PROXY_KEY");
        if proxy_key.is_none() {
            warn!("PROXY_KEY not configured, trusting x-user-id without proxy verification");
        }

        Ok(Self {
            port: try_load("RUST_PORT", "8080")?,
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1:6379")?,
            frontend_origin: try_load("FRONTEND_ORIGIN", "http://localhost:3000")?,
            session_idle: Duration::from_secs(session_idle_secs),
            proxy_key,
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok()
}

pub fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }
        })
}

/// Docker secret first, environment variable as fallback.
fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            info!("Secret {secret_name} not readable from file: {e}");
        })
        .ok()
        .or_else(|| var(secret_name))
        .filter(|secret| !secret.is_empty())
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        port: 0,
        redis_url: String::new(),
        frontend_origin: "http://localhost:3000".to_string(),
        session_idle: Duration::from_secs(60),
        proxy_key: None,
    }
}
