use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::notifications::gateway::client::{DEFAULT_API_BASE, DEFAULT_TIMEOUT};
use crate::notifications::types::CompanyId;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_DATABASE_PATH: &str = "merchant-companion.db";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a whole number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must be at least {min}, got {value}")]
    TooSmall { name: &'static str, value: u64, min: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_base_url: String,
    pub http_timeout: Duration,
    pub poll_interval: Duration,
    pub database_path: PathBuf,
    pub company_id: Option<CompanyId>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let http_timeout_secs = parse_number(&lookup, "MERCHANT_HTTP_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_TIMEOUT.as_secs());
        let poll_interval_secs = parse_number(&lookup, "MERCHANT_POLL_INTERVAL_SECS")?
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);

        if poll_interval_secs < 1 {
            return Err(ConfigError::TooSmall {
                name: "MERCHANT_POLL_INTERVAL_SECS",
                value: poll_interval_secs,
                min: 1,
            });
        }

        Ok(Self {
            api_base_url: lookup("MERCHANT_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            http_timeout: Duration::from_secs(http_timeout_secs),
            poll_interval: Duration::from_secs(poll_interval_secs),
            database_path: lookup("MERCHANT_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            company_id: parse_number(&lookup, "MERCHANT_COMPANY_ID")?,
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
    }
}
