// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::{Result, StrataError};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Restrict the controllers to a single namespace (all namespaces when unset)
    pub watch_namespace: Option<String>,
    /// Requeue delay after a cycle found nothing to do
    pub resync_interval: Duration,
    /// Requeue delay after a cycle applied a step
    pub action_requeue: Duration,
    /// Requeue delay while a dependency is not ready
    pub dependency_poll: Duration,
    pub error_backoff_base: Duration,
    pub error_backoff_max: Duration,
    /// Interval of the coordination client pool sweep
    pub client_sweep_interval: Duration,
    pub connect_timeout: Duration,
    /// Image repository used when a cluster does not override it
    pub image_repository: String,
    pub default_version: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            watch_namespace: None,
            resync_interval: Duration::from_secs(300),
            action_requeue: Duration::from_secs(1),
            dependency_poll: Duration::from_secs(5),
            error_backoff_base: Duration::from_secs(5),
            error_backoff_max: Duration::from_secs(300),
            client_sweep_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_millis(2000),
            image_repository: "strata/strata".to_string(),
            default_version: "latest".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let secs = |key: &str, default: Duration| -> Result<Duration> {
            parse_or(&lookup, key, default.as_secs()).map(Duration::from_secs)
        };

        Ok(Config {
            watch_namespace: lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty()),
            resync_interval: secs("RESYNC_INTERVAL_SECS", defaults.resync_interval)?,
            action_requeue: secs("ACTION_REQUEUE_SECS", defaults.action_requeue)?,
            dependency_poll: secs("DEPENDENCY_POLL_SECS", defaults.dependency_poll)?,
            error_backoff_base: secs("ERROR_BACKOFF_BASE_SECS", defaults.error_backoff_base)?,
            error_backoff_max: secs("ERROR_BACKOFF_MAX_SECS", defaults.error_backoff_max)?,
            client_sweep_interval: secs(
                "CLIENT_SWEEP_INTERVAL_SECS",
                defaults.client_sweep_interval,
            )?,
            connect_timeout: parse_or(
                &lookup,
                "COORDINATION_CONNECT_TIMEOUT_MS",
                defaults.connect_timeout.as_millis() as u64,
            )
            .map(Duration::from_millis)?,
            image_repository: lookup("IMAGE_REPOSITORY").unwrap_or(defaults.image_repository),
            default_version: lookup("DEFAULT_VERSION").unwrap_or(defaults.default_version),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            StrataError::ConfigError(format!("{} has invalid value '{}'", key, raw))
        }),
    }
}
