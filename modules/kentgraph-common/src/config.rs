use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::KentGraphError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Dgraph
    pub dgraph_url: String,
    pub dgraph_access_token: Option<String>,
    pub dgraph_api_key: Option<String>,
    pub dgraph_timeout_secs: u64,
    pub apply_schema: bool,

    // Web server
    pub api_host: String,
    pub api_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, KentGraphError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, KentGraphError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            dgraph_url: get("DGRAPH_URL").unwrap_or_else(|| "http://localhost:8080".to_string()),
            dgraph_access_token: get("DGRAPH_ACCESS_TOKEN"),
            dgraph_api_key: get("DGRAPH_API_KEY"),
            dgraph_timeout_secs: positive(get("DGRAPH_TIMEOUT_SECS"), "DGRAPH_TIMEOUT_SECS", 30)?,
            apply_schema: parsed(get("DGRAPH_APPLY_SCHEMA"), "DGRAPH_APPLY_SCHEMA", false)?,
            api_host: get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            api_port: parsed(get("API_PORT"), "API_PORT", 4000)?,
        })
    }

    pub fn dgraph_timeout(&self) -> Duration {
        Duration::from_secs(self.dgraph_timeout_secs)
    }

    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

fn parsed<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T, KentGraphError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| KentGraphError::Config(format!("{key} has invalid value {value:?}"))),
    }
}

/// Like `parsed`, but zero is rejected.
fn positive(raw: Option<String>, key: &str, default: u64) -> Result<u64, KentGraphError> {
    match parsed(raw, key, default)? {
        0 => Err(KentGraphError::Config(format!("{key} must be greater than zero"))),
        n => Ok(n),
    }
}
