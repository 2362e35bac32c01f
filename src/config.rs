//! Runtime configuration parsed from environment variables.
//!
//! Every value has a default so the CLI works with an empty environment.
//! Parsing goes through a lookup function so tests can feed values without
//! touching the process environment.

use std::path::PathBuf;

use crate::queue::DEFAULT_QUEUE_KEY;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_QUEUE_DIR: &str = ".lytspot";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_INBOX_CAPACITY: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}' ({reason})")]
    Invalid { var: &'static str, value: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LytspotConfig {
    /// Backend base URL the transport talks to.
    pub api_base_url: String,
    /// Directory holding the file-backed queue store.
    pub queue_dir: PathBuf,
    /// Storage key of the queue blob.
    pub queue_key: String,
    /// Port `serve` binds on.
    pub port: u16,
    pub probe_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Submissions the backend inbox retains before evicting the oldest.
    pub inbox_capacity: usize,
}

impl Default for LytspotConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            queue_dir: PathBuf::from(DEFAULT_QUEUE_DIR),
            queue_key: DEFAULT_QUEUE_KEY.to_owned(),
            port: DEFAULT_PORT,
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
        }
    }
}

impl LytspotConfig {
    /// Build typed config from the process environment.
    ///
    /// Optional:
    /// - `LYTSPOT_API_BASE_URL`: default `http://127.0.0.1:3000`
    /// - `LYTSPOT_QUEUE_DIR`: default `.lytspot`
    /// - `LYTSPOT_QUEUE_KEY`: default `lytspot:message-queue`
    /// - `PORT`: default 3000
    /// - `LYTSPOT_PROBE_INTERVAL_SECS`: default 300
    /// - `LYTSPOT_REQUEST_TIMEOUT_SECS`: default 15
    /// - `LYTSPOT_CONNECT_TIMEOUT_SECS`: default 5
    /// - `LYTSPOT_INBOX_CAPACITY`: default 500
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build typed config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a value is present but malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let api_base_url = match get("LYTSPOT_API_BASE_URL") {
            Some(url) => parse_base_url(&url)?,
            None => defaults.api_base_url,
        };

        Ok(Self {
            api_base_url,
            queue_dir: get("LYTSPOT_QUEUE_DIR").map_or(defaults.queue_dir, PathBuf::from),
            queue_key: get("LYTSPOT_QUEUE_KEY").unwrap_or(defaults.queue_key),
            port: parse_or("PORT", get("PORT"), defaults.port)?,
            probe_interval_secs: parse_positive(
                "LYTSPOT_PROBE_INTERVAL_SECS",
                get("LYTSPOT_PROBE_INTERVAL_SECS"),
                defaults.probe_interval_secs,
            )?,
            request_timeout_secs: parse_positive(
                "LYTSPOT_REQUEST_TIMEOUT_SECS",
                get("LYTSPOT_REQUEST_TIMEOUT_SECS"),
                defaults.request_timeout_secs,
            )?,
            connect_timeout_secs: parse_positive(
                "LYTSPOT_CONNECT_TIMEOUT_SECS",
                get("LYTSPOT_CONNECT_TIMEOUT_SECS"),
                defaults.connect_timeout_secs,
            )?,
            inbox_capacity: parse_or("LYTSPOT_INBOX_CAPACITY", get("LYTSPOT_INBOX_CAPACITY"), defaults.inbox_capacity)?
                .max(1),
        })
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => match value.parse::<T>() {
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(ConfigError::Invalid { var, reason: e.to_string(), value }),
        },
    }
}

fn parse_positive(var: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match parse_or(var, raw, default)? {
        0 => Err(ConfigError::Invalid { var, value: "0".into(), reason: "must be greater than zero".into() }),
        n => Ok(n),
    }
}

/// Accept `http://` and `https://` URLs; strip trailing slashes.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] for anything else.
pub fn parse_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let has_host = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .is_some_and(|rest| !rest.is_empty());
    if !has_host {
        return Err(ConfigError::Invalid {
            var: "LYTSPOT_API_BASE_URL",
            value: raw.to_owned(),
            reason: "expected an http:// or https:// URL".into(),
        });
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
