use crate::error::{LedgerError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Sizing of the worker pool that runs storage transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Tasks that may wait for a worker before submissions are rejected.
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(LedgerError::ConfigError(
                "workers must be greater than zero".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(LedgerError::ConfigError(
                "queue_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub dispatch: DispatchConfig,
    /// How long a transaction waits for an account row lock.
    pub lock_timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

impl LedgerConfig {
    /// Loads a JSON configuration file. Missing fields take their defaults.
    ///
    /// The result is not validated, so command-line overrides can still be
    /// applied; call [`LedgerConfig::validate`] before use.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| LedgerError::ConfigError(format!("invalid config file: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        self.dispatch.validate()?;
        if self.lock_timeout_ms == 0 {
            return Err(LedgerError::ConfigError(
                "lock_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
