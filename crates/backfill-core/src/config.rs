//! Runtime configuration.
//!
//! Loaded from `BACKFILL_*` environment variables. `CONCURRENT_WORKERS` is
//! still honoured for the worker count when `BACKFILL_CONCURRENCY` is unset.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::RetryPolicy;

const PREFIX: &str = "BACKFILL_";
const LEGACY_CONCURRENCY: &str = "CONCURRENT_WORKERS";

pub const MAX_PAGE_SIZE: u32 = 1_000;
pub const MAX_CONCURRENCY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Items requested per page. Fixed for the whole run.
    pub page_size: u32,
    /// Workers per task-kind queue.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_level: String,
    /// `json`, `pretty` or `compact`.
    pub log_format: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            concurrency: 1,
            retry: RetryPolicy::default(),
            log_level: "info".to_string(),
            log_format: "json".to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
    #[error("page size must be between 1 and 1000, got {value}")]
    InvalidPageSize { value: u32 },
    #[error("concurrency must be between 1 and 64, got {value}")]
    InvalidConcurrency { value: usize },
    #[error("retry base delay ({base_ms}ms) cannot be greater than max delay ({max_ms}ms)")]
    InvalidRetryBounds { base_ms: u64, max_ms: u64 },
    #[error("retry multiplier must be at least 1.0, got {value}")]
    InvalidRetryMultiplier { value: f64 },
    #[error("retry max attempts must be at least 1, got {value}")]
    InvalidRetryAttempts { value: u32 },
    #[error("retry jitter factor must be between 0.0 and 1.0, got {value}")]
    InvalidRetryJitter { value: f64 },
    #[error("unknown log format '{value}'; expected json, pretty or compact")]
    InvalidLogFormat { value: String },
}

impl SyncConfig {
    /// Load from the process environment and validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Load from explicit key/value pairs (same names as the environment).
    pub fn from_vars(
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConfigError> {
        let mut legacy_concurrency = None;
        let mut layered: HashMap<String, String> = HashMap::new();
        for (key, value) in vars {
            if value.is_empty() {
                continue;
            }
            if key == LEGACY_CONCURRENCY {
                legacy_concurrency = Some(value);
            } else if let Some(stripped) = key.strip_prefix(PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let defaults = Self::default();
        let concurrency = match layered.remove("CONCURRENCY") {
            Some(value) => parse("CONCURRENCY", value)?,
            None => match legacy_concurrency {
                Some(value) => parse_key(LEGACY_CONCURRENCY, value)?,
                None => defaults.concurrency,
            },
        };
        let retry = RetryPolicy {
            base_delay_ms: take(&mut layered, "RETRY_BASE_DELAY_MS", defaults.retry.base_delay_ms)?,
            multiplier: take(&mut layered, "RETRY_MULTIPLIER", defaults.retry.multiplier)?,
            max_delay_ms: take(&mut layered, "RETRY_MAX_DELAY_MS", defaults.retry.max_delay_ms)?,
            max_attempts: take(&mut layered, "RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
            max_rate_limit_waits: take(
                &mut layered,
                "RETRY_MAX_RATE_LIMIT_WAITS",
                defaults.retry.max_rate_limit_waits,
            )?,
            jitter_factor: take(&mut layered, "RETRY_JITTER_FACTOR", defaults.retry.jitter_factor)?,
        };

        let config = Self {
            page_size: take(&mut layered, "PAGE_SIZE", defaults.page_size)?,
            concurrency,
            retry,
            log_level: layered.remove("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: layered.remove("LOG_FORMAT").unwrap_or(defaults.log_format),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidPageSize {
                value: self.page_size,
            });
        }
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::InvalidConcurrency {
                value: self.concurrency,
            });
        }
        let retry = &self.retry;
        if retry.base_delay_ms > retry.max_delay_ms {
            return Err(ConfigError::InvalidRetryBounds {
                base_ms: retry.base_delay_ms,
                max_ms: retry.max_delay_ms,
            });
        }
        if !(retry.multiplier >= 1.0) {
            return Err(ConfigError::InvalidRetryMultiplier {
                value: retry.multiplier,
            });
        }
        if retry.max_attempts == 0 {
            return Err(ConfigError::InvalidRetryAttempts {
                value: retry.max_attempts,
            });
        }
        if !(0.0..=1.0).contains(&retry.jitter_factor) {
            return Err(ConfigError::InvalidRetryJitter {
                value: retry.jitter_factor,
            });
        }
        if !matches!(self.log_format.as_str(), "json" | "pretty" | "compact") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }
        Ok(())
    }
}

fn take<T: FromStr>(
    layered: &mut HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match layered.remove(key) {
        Some(value) => parse(key, value),
        None => Ok(default),
    }
}

fn parse<T: FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    parse_key(&format!("{PREFIX}{key}"), value)
}

fn parse_key<T: FromStr>(full_key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: full_key.to_string(),
        value,
    })
}
