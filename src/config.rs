//! Runtime configuration, read from environment variables.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `RECONCILE_MAX_ATTEMPTS` | 2 | attempts per reconciliation run, including the first |
//! | `RECONCILE_BACKOFF_MS` | 2000 | fixed delay between attempts |
//! | `RECONCILE_SWEEP_MS` | 0 | periodic sweep interval, 0 disables it |

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::reconcile::RetryPolicy;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a non-negative integer, got '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("{0} must be at least 1")]
    Zero(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub retry: RetryPolicy,
    pub sweep_interval: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key/value source; unset keys keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(attempts) = parse_u64(&lookup, "RECONCILE_MAX_ATTEMPTS")? {
            if attempts == 0 {
                return Err(ConfigError::Zero("RECONCILE_MAX_ATTEMPTS"));
            }
            config.retry.max_attempts =
                u32::try_from(attempts).map_err(|_| ConfigError::Invalid {
                    key: "RECONCILE_MAX_ATTEMPTS",
                    value: attempts.to_string(),
                })?;
        }
        if let Some(ms) = parse_u64(&lookup, "RECONCILE_BACKOFF_MS")? {
            config.retry.backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_u64(&lookup, "RECONCILE_SWEEP_MS")? {
            config.sweep_interval = (ms > 0).then(|| Duration::from_millis(ms));
        }

        Ok(config)
    }
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
