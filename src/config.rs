use crate::error::{BillingError, Result};
use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix of the environment variables that override file settings, e.g.
/// `BILLRUN_POOL_SIZE=4` or `BILLRUN_RETRY__MAX_ATTEMPTS=5`.
pub const ENV_PREFIX: &str = "BILLRUN";

/// Tunables for one billing engine instance.
///
/// Every field has a default, so a config file only needs to name what it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// Number of workers charging invoices in parallel.
    pub pool_size: usize,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Permits granted per refresh period, shared by all workers.
    pub limit_for_period: u32,
    pub refresh_period_ms: u64,
    /// Longest a worker waits for a permit before giving up.
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            pool_size: 10,
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit_for_period: 10,
            refresh_period_ms: 1_000,
            timeout_ms: 5_000,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 1_000,
        }
    }
}

impl RateLimitConfig {
    pub fn refresh_period(&self) -> Duration {
        Duration::from_millis(self.refresh_period_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl RetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl BillingConfig {
    /// Loads the configuration from defaults, an optional JSON file and the
    /// `BILLRUN_*` environment, in increasing order of precedence.
    ///
    /// # Arguments
    ///
    /// * `path` - Optional JSON file. A missing file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_from(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Json));
        }
        let config: BillingConfig = builder
            .add_source(
                env.prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(BillingError::ConfigError(
                "pool_size must be at least 1".to_string(),
            ));
        }
        if self.rate_limit.limit_for_period == 0 {
            return Err(BillingError::ConfigError(
                "rate_limit.limit_for_period must be at least 1".to_string(),
            ));
        }
        if self.rate_limit.refresh_period_ms == 0 {
            return Err(BillingError::ConfigError(
                "rate_limit.refresh_period_ms must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(BillingError::ConfigError(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
