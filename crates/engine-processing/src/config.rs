use crate::{
    error::ConfigError,
    retry::{DEFAULT_FATAL_CODE_PREFIXES, FatalCodes},
};
use engine_core::retry::RetryPolicy;
use std::{collections::HashMap, str::FromStr, time::Duration};

pub const ENV_MAX_ATTEMPTS: &str = "UPLINK_MAX_ATTEMPTS";
pub const ENV_BASE_DELAY_MS: &str = "UPLINK_BASE_DELAY_MS";
pub const ENV_MAX_DELAY_MS: &str = "UPLINK_MAX_DELAY_MS";
pub const ENV_POLL_INTERVAL_MS: &str = "UPLINK_POLL_INTERVAL_MS";
pub const ENV_FATAL_CODES: &str = "UPLINK_FATAL_CODES";

/// Configuration for the upload loop.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadConfig {
    /// Attempts per transaction before the scheduler gives up on it for now
    pub max_attempts: usize,

    /// First backoff delay after a retryable failure
    pub base_delay: Duration,

    /// Upper bound for the backoff delay
    pub max_delay: Duration,

    /// How long a watching scheduler sleeps when the queue is empty
    pub poll_interval: Duration,

    /// Error code prefixes classified as fatal
    pub fatal_code_prefixes: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            fatal_code_prefixes: DEFAULT_FATAL_CODE_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl UploadConfig {
    /// Reads overrides from environment-style variables; unset keys keep defaults.
    pub fn from_env(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = parse_var::<usize>(vars, ENV_MAX_ATTEMPTS)? {
            config.max_attempts = v;
        }
        if let Some(v) = parse_var::<u64>(vars, ENV_BASE_DELAY_MS)? {
            config.base_delay = Duration::from_millis(v);
        }
        if let Some(v) = parse_var::<u64>(vars, ENV_MAX_DELAY_MS)? {
            config.max_delay = Duration::from_millis(v);
        }
        if let Some(v) = parse_var::<u64>(vars, ENV_POLL_INTERVAL_MS)? {
            config.poll_interval = Duration::from_millis(v);
        }
        if let Some(codes) = vars.get(ENV_FATAL_CODES) {
            config.fatal_code_prefixes = codes
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(config)
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.base_delay, self.max_delay)
    }

    pub fn classifier(&self) -> FatalCodes {
        FatalCodes::new(self.fatal_code_prefixes.iter().cloned())
    }
}

fn parse_var<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match vars.get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
            }),
        None => Ok(None),
    }
}
