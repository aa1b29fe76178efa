use std::env;
use std::time::Duration;

use crate::cache::DEFAULT_TTL;
use crate::services::api_client::{RetryPolicy, DEFAULT_RETRIES, DEFAULT_RETRY_BASE_DELAY};

pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 30;
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub poll_interval_seconds: u64,
    pub cache_ttl: Duration,
    pub retry: RetryPolicy,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECONDS,
            cache_ttl: DEFAULT_TTL,
            retry: RetryPolicy {
                retries: DEFAULT_RETRIES,
                base_delay: DEFAULT_RETRY_BASE_DELAY,
            },
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl Config {
    /// Read configuration from the process environment. Every variable is
    /// optional; a variable that is set but not a valid number is an error.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let poll_interval_seconds = parse_or(
            &lookup,
            "POLL_INTERVAL_SECONDS",
            defaults.poll_interval_seconds,
        )?;
        let cache_ttl_ms = parse_or(
            &lookup,
            "CACHE_TTL_MS",
            defaults.cache_ttl.as_millis() as u64,
        )?;
        let retries = parse_or(&lookup, "FETCH_RETRIES", defaults.retry.retries)?;
        let retry_base_delay_ms = parse_or(
            &lookup,
            "RETRY_BASE_DELAY_MS",
            defaults.retry.base_delay.as_millis() as u64,
        )?;
        let http_timeout_seconds = parse_or(
            &lookup,
            "HTTP_TIMEOUT_SECONDS",
            defaults.http_timeout.as_secs(),
        )?;

        if http_timeout_seconds == 0 {
            return Err("HTTP_TIMEOUT_SECONDS must be greater than zero".to_string());
        }

        Ok(Self {
            poll_interval_seconds,
            cache_ttl: Duration::from_millis(cache_ttl_ms),
            retry: RetryPolicy {
                retries,
                base_delay: Duration::from_millis(retry_base_delay_ms),
            },
            http_timeout: Duration::from_secs(http_timeout_seconds),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, String>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{} must be a valid number", key)),
    }
}
