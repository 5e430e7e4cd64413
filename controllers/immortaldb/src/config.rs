//! Controller configuration.
//!
//! Read once at startup from environment variables. Every setting has a
//! default except that malformed values abort startup.

use crate::error::ControllerError;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_CONCURRENCY: u16 = 3;
const DEFAULT_DEBOUNCE_SECS: u64 = 1;
const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;
const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;
const DEFAULT_PROBE_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_POSTGRES_PASSWORD: &str = "12345";

/// Runtime settings for the controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Namespace to watch; `None` watches all namespaces
    pub namespace: Option<String>,
    /// Maximum number of concurrent reconciliation passes
    pub concurrency: u16,
    /// Quiet period after an event before a pass starts
    pub debounce: Duration,
    /// First requeue delay after a failed pass
    pub backoff_min: Duration,
    /// Upper bound on the requeue delay
    pub backoff_max: Duration,
    /// Bind address of the probes/metrics server
    pub probe_addr: SocketAddr,
    /// `POSTGRES_PASSWORD` value declared on the database container
    pub postgres_password: String,
}

impl ControllerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());
        let concurrency = parse_or(&lookup, "RECONCILE_CONCURRENCY", DEFAULT_CONCURRENCY)?;
        let debounce = parse_or(&lookup, "RECONCILE_DEBOUNCE_SECS", DEFAULT_DEBOUNCE_SECS)?;
        let backoff_min = parse_or(&lookup, "BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS)?;
        let backoff_max = parse_or(&lookup, "BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS)?;
        let probe_addr = match lookup("PROBE_ADDR") {
            Some(raw) => parse_value("PROBE_ADDR", &raw)?,
            None => parse_value("PROBE_ADDR", DEFAULT_PROBE_ADDR)?,
        };
        let postgres_password = lookup("POSTGRES_PASSWORD")
            .unwrap_or_else(|| DEFAULT_POSTGRES_PASSWORD.to_string());

        if concurrency == 0 {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_CONCURRENCY must be at least 1".to_string(),
            ));
        }
        if backoff_min == 0 || backoff_min > backoff_max {
            return Err(ControllerError::InvalidConfig(format!(
                "BACKOFF_MIN_SECS ({backoff_min}) must be positive and not exceed BACKOFF_MAX_SECS ({backoff_max})"
            )));
        }

        Ok(Self {
            namespace,
            concurrency,
            debounce: Duration::from_secs(debounce),
            backoff_min: Duration::from_secs(backoff_min),
            backoff_max: Duration::from_secs(backoff_max),
            probe_addr,
            postgres_password,
        })
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ControllerError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ControllerError::InvalidConfig(format!("{key}={raw:?}: {e}")))
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ControllerError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}
