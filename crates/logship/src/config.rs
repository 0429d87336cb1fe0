// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ConfigError;
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10;
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MIN_SLEEP: Duration = Duration::from_millis(10);
pub const DEFAULT_IDLE_SLEEP: Duration = Duration::from_millis(10);
pub const DEFAULT_MAX_BUFFERED: usize = 10_000;

/// Configuration for the egress pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Sink endpoint receiving batches (e.g. "https://intake.example.com/logs")
    pub sink_url: String,
    /// Static headers attached to every request (auth tokens and the like)
    pub headers: BTreeMap<String, String>,
    /// Throttle floor between sends; caps the send rate, never delays a
    /// drain-time flush
    pub send_interval: Duration,
    /// Hard cap on payloads per batch
    pub max_batch_size: usize,
    /// How long `shutdown` waits for the worker to finish draining
    pub shutdown_timeout: Duration,
    /// Minimum sleep after a send, even when the send overran the interval
    pub min_sleep: Duration,
    /// Sleep between polls while the buffer is empty
    pub idle_sleep: Duration,
    /// Dispatcher buffer bound; the oldest payload is evicted beyond this
    pub max_buffered: usize,
}

impl Config {
    /// Configuration with the default schedule for the given sink.
    pub fn new(sink_url: impl Into<String>) -> Self {
        Self {
            sink_url: sink_url.into(),
            headers: BTreeMap::new(),
            send_interval: DEFAULT_SEND_INTERVAL,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            min_sleep: DEFAULT_MIN_SLEEP,
            idle_sleep: DEFAULT_IDLE_SLEEP,
            max_buffered: DEFAULT_MAX_BUFFERED,
        }
    }

    /// Create configuration from environment variables. `LOGSHIP_SINK_URL`
    /// is required; everything else falls back to the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let sink_url = env::var("LOGSHIP_SINK_URL")
            .map_err(|_| ConfigError::Invalid("LOGSHIP_SINK_URL is not set".to_string()))?;

        let config = Self {
            send_interval: env_duration_ms("LOGSHIP_SEND_INTERVAL_MS", DEFAULT_SEND_INTERVAL)?,
            max_batch_size: env_usize("LOGSHIP_MAX_BATCH_SIZE", DEFAULT_MAX_BATCH_SIZE)?,
            shutdown_timeout: env_duration_ms(
                "LOGSHIP_SHUTDOWN_TIMEOUT_MS",
                DEFAULT_SHUTDOWN_TIMEOUT,
            )?,
            max_buffered: env_usize("LOGSHIP_MAX_BUFFERED", DEFAULT_MAX_BUFFERED)?,
            ..Self::new(sink_url)
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.sink_url.trim();
        if url.is_empty() {
            return Err(ConfigError::InvalidSinkUrl {
                url: self.sink_url.clone(),
                reason: "URL is empty".to_string(),
            });
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::InvalidSinkUrl {
                url: self.sink_url.clone(),
                reason: "scheme must be http or https".to_string(),
            });
        }

        if self.max_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "max_batch_size must be at least 1".to_string(),
            ));
        }
        if self.send_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "send_interval must be greater than zero".to_string(),
            ));
        }
        if self.max_buffered < self.max_batch_size {
            return Err(ConfigError::Invalid(format!(
                "max_buffered ({}) must be at least max_batch_size ({})",
                self.max_buffered, self.max_batch_size
            )));
        }

        Ok(())
    }
}

fn env_duration_ms(name: &str, default: Duration) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse::<u64>().map(Duration::from_millis).map_err(|_| {
            ConfigError::Invalid(format!(
                "{name} must be an integer millisecond value, got '{raw}'"
            ))
        }),
        Err(_) => Ok(default),
    }
}

fn env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse::<usize>().map_err(|_| {
            ConfigError::Invalid(format!("{name} must be a non-negative integer, got '{raw}'"))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Env vars are process-wide state; tests that touch them must not
    /// overlap.
    fn env_lock() -> MutexGuard<'static, ()> {
        match ENV_LOCK.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::new("https://intake.example.com/logs");
        assert!(config.validate().is_ok());
        assert_eq!(config.send_interval, Duration::from_secs(1));
        assert_eq!(config.max_batch_size, 10);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.min_sleep, Duration::from_millis(10));
    }

    #[test]
    fn test_validate_empty_sink_url() {
        let config = Config::new("");
        assert!(config.validate().is_err());

        let config = Config::new("   ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_scheme() {
        let config = Config::new("udp://sink:9000");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_batch_size() {
        let config = Config {
            max_batch_size: 0,
            ..Config::new("https://sink.example.com")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_interval() {
        let config = Config {
            send_interval: Duration::ZERO,
            ..Config::new("https://sink.example.com")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_buffer_smaller_than_batch() {
        let config = Config {
            max_buffered: 5,
            ..Config::new("https://sink.example.com")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env() {
        let _guard = env_lock();
        env::set_var("LOGSHIP_SINK_URL", "https://sink.example.com/logs");
        env::set_var("LOGSHIP_SEND_INTERVAL_MS", "250");
        env::set_var("LOGSHIP_MAX_BATCH_SIZE", "32");

        let config = Config::from_env().expect("config should parse");
        assert_eq!(config.sink_url, "https://sink.example.com/logs");
        assert_eq!(config.send_interval, Duration::from_millis(250));
        assert_eq!(config.max_batch_size, 32);
        assert_eq!(config.max_buffered, DEFAULT_MAX_BUFFERED);

        env::remove_var("LOGSHIP_SINK_URL");
        env::remove_var("LOGSHIP_SEND_INTERVAL_MS");
        env::remove_var("LOGSHIP_MAX_BATCH_SIZE");
    }

    #[test]
    fn test_from_env_rejects_malformed_interval() {
        let _guard = env_lock();
        env::set_var("LOGSHIP_SINK_URL", "https://sink.example.com/logs");
        env::set_var("LOGSHIP_SEND_INTERVAL_MS", "soon");

        assert!(Config::from_env().is_err());

        env::remove_var("LOGSHIP_SINK_URL");
        env::remove_var("LOGSHIP_SEND_INTERVAL_MS");
    }
}
