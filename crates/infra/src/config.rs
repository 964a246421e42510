//! Environment-driven configuration.
//!
//! Every setting has a default; a variable that is present but unparsable is
//! an error rather than a silent fallback.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::bootstrap::BootstrapPolicy;
use crate::worker::DEFAULT_TICK;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(key: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Read `key` through `lookup`, parse it, or fall back to `default`.
///
/// `lookup` is `std::env::var(..).ok()` in production and a map in tests.
pub fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(key, raw, e.to_string())),
        None => {
            debug!(key, "config variable not set; using default");
            Ok(default)
        }
    }
}

pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Client-side settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the relay (`GROUPCART_RELAY_URL`).
    pub relay_url: String,
    pub bootstrap: BootstrapPolicy,
    /// Inbound worker poll interval (`GROUPCART_WORKER_TICK_MS`).
    pub worker_tick: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: "http://127.0.0.1:8080".to_string(),
            bootstrap: BootstrapPolicy::default(),
            worker_tick: DEFAULT_TICK,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let timeout_ms = parse_or(
            &lookup,
            "GROUPCART_BOOTSTRAP_TIMEOUT_MS",
            defaults.bootstrap.timeout.as_millis() as u64,
        )?;
        if timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "GROUPCART_BOOTSTRAP_TIMEOUT_MS",
                "0",
                "must be positive",
            ));
        }

        let attempts = parse_or(
            &lookup,
            "GROUPCART_BOOTSTRAP_ATTEMPTS",
            defaults.bootstrap.attempts,
        )?;
        if attempts == 0 {
            return Err(ConfigError::invalid(
                "GROUPCART_BOOTSTRAP_ATTEMPTS",
                "0",
                "at least one attempt is required",
            ));
        }

        let backoff_ms = parse_or(
            &lookup,
            "GROUPCART_BOOTSTRAP_BACKOFF_MS",
            defaults.bootstrap.backoff.as_millis() as u64,
        )?;

        let worker_tick_ms = parse_or(
            &lookup,
            "GROUPCART_WORKER_TICK_MS",
            defaults.worker_tick.as_millis() as u64,
        )?;
        if worker_tick_ms == 0 {
            return Err(ConfigError::invalid(
                "GROUPCART_WORKER_TICK_MS",
                "0",
                "must be positive",
            ));
        }

        let relay_url: String = parse_or(&lookup, "GROUPCART_RELAY_URL", defaults.relay_url)?;
        if !(relay_url.starts_with("http://") || relay_url.starts_with("https://")) {
            return Err(ConfigError::invalid(
                "GROUPCART_RELAY_URL",
                relay_url,
                "expected an http(s) URL",
            ));
        }

        Ok(Self {
            relay_url: relay_url.trim_end_matches('/').to_string(),
            bootstrap: BootstrapPolicy {
                timeout: Duration::from_millis(timeout_ms),
                attempts,
                backoff: Duration::from_millis(backoff_ms),
            },
            worker_tick: Duration::from_millis(worker_tick_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, ClientConfig::default());
        assert_eq!(cfg.bootstrap.attempts, 4);
        assert_eq!(cfg.bootstrap.timeout, Duration::from_millis(2000));
    }

    #[test]
    fn values_are_read_and_url_is_normalised() {
        let cfg = ClientConfig::from_lookup(lookup(&[
            ("GROUPCART_BOOTSTRAP_TIMEOUT_MS", "500"),
            ("GROUPCART_BOOTSTRAP_ATTEMPTS", "2"),
            ("GROUPCART_BOOTSTRAP_BACKOFF_MS", "10"),
            ("GROUPCART_RELAY_URL", "https://relay.example/"),
            ("GROUPCART_WORKER_TICK_MS", "20"),
        ]))
        .unwrap();

        assert_eq!(cfg.relay_url, "https://relay.example");
        assert_eq!(cfg.bootstrap.timeout, Duration::from_millis(500));
        assert_eq!(cfg.bootstrap.attempts, 2);
        assert_eq!(cfg.bootstrap.backoff, Duration::from_millis(10));
        assert_eq!(cfg.worker_tick, Duration::from_millis(20));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[("GROUPCART_BOOTSTRAP_ATTEMPTS", "lots")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "GROUPCART_BOOTSTRAP_ATTEMPTS", .. }
        ));

        assert!(ClientConfig::from_lookup(lookup(&[("GROUPCART_BOOTSTRAP_ATTEMPTS", "0")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("GROUPCART_RELAY_URL", "ftp://x")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("GROUPCART_WORKER_TICK_MS", "0")])).is_err());
    }
}
