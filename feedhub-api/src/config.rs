//! Server configuration
//!
//! Every setting comes from an environment variable and falls back to a
//! default when unset. Set but unparseable values are errors.

use feedhub_pyth::HERMES_API_BASE;
use feedhub_services::{IngestionConfig, SessionConfig, DEFAULT_MAX_LEN};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_SERVER_PORT: u16 = 3001;
const DEFAULT_STATUS_INTERVAL_SECS: u64 = 5;

/// Longest accepted period or deadline
const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for the whole server
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port the HTTP server binds on all interfaces
    pub server_port: u16,
    /// Base URL of the Hermes API
    pub pyth_api_host: String,
    /// Records retained per topic
    pub topic_log_max_len: usize,
    /// Period of the status job
    pub status_interval: Duration,
    pub ingestion: IngestionConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Reads:
    /// - SERVER_PORT
    /// - PYTH_API_HOST
    /// - FEED_IDS: comma separated Pyth feed ids
    /// - TOPIC_LOG_MAX_LEN
    /// - PRICE_POLL_INTERVAL_MS
    /// - STATUS_INTERVAL_SECS
    /// - WS_WRITE_WAIT_SECS, WS_PONG_WAIT_SECS
    /// - WS_MAX_MESSAGE_SIZE, WS_OUTBOUND_CAPACITY
    /// - BROADCAST_PRICE_UPDATES
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup` instead of the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ingestion_defaults = IngestionConfig::default();
        let session_defaults = SessionConfig::default();

        let feed_ids = match lookup("FEED_IDS") {
            Some(raw) => parse_feed_ids(&raw)?,
            None => ingestion_defaults.feed_ids,
        };

        let ingestion = IngestionConfig {
            feed_ids,
            poll_interval: parse_millis(
                &lookup,
                "PRICE_POLL_INTERVAL_MS",
                ingestion_defaults.poll_interval,
            )?,
            broadcast_updates: parse_var(
                &lookup,
                "BROADCAST_PRICE_UPDATES",
                ingestion_defaults.broadcast_updates,
            )?,
        };

        let pong_wait = parse_secs(&lookup, "WS_PONG_WAIT_SECS", session_defaults.pong_wait)?;
        let session = SessionConfig {
            write_wait: parse_secs(&lookup, "WS_WRITE_WAIT_SECS", session_defaults.write_wait)?,
            max_message_size: parse_nonzero(
                &lookup,
                "WS_MAX_MESSAGE_SIZE",
                session_defaults.max_message_size,
            )?,
            outbound_capacity: parse_nonzero(
                &lookup,
                "WS_OUTBOUND_CAPACITY",
                session_defaults.outbound_capacity,
            )?,
            ..session_defaults
        }
        .with_pong_wait(pong_wait);

        Ok(Self {
            server_port: parse_var(&lookup, "SERVER_PORT", DEFAULT_SERVER_PORT)?,
            pyth_api_host: lookup("PYTH_API_HOST").unwrap_or_else(|| HERMES_API_BASE.to_string()),
            topic_log_max_len: parse_nonzero(&lookup, "TOPIC_LOG_MAX_LEN", DEFAULT_MAX_LEN)?,
            status_interval: parse_secs(
                &lookup,
                "STATUS_INTERVAL_SECS",
                Duration::from_secs(DEFAULT_STATUS_INTERVAL_SECS),
            )?,
            ingestion,
            session,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_SERVER_PORT,
            pyth_api_host: HERMES_API_BASE.to_string(),
            topic_log_max_len: DEFAULT_MAX_LEN,
            status_interval: Duration::from_secs(DEFAULT_STATUS_INTERVAL_SECS),
            ingestion: IngestionConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

fn parse_var<F, T>(lookup: &F, field: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(field) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw.clone(),
            error: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_nonzero<F, T>(lookup: &F, field: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Default + PartialEq,
    T::Err: Display,
{
    let value = parse_var(lookup, field, default)?;
    if value == T::default() {
        return Err(ConfigError::Zero(field.to_string()));
    }
    Ok(value)
}

fn parse_secs<F>(lookup: &F, field: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = parse_nonzero(lookup, field, default.as_secs())?;
    bounded_period(field, secs, Duration::from_secs(secs))
}

fn parse_millis<F>(lookup: &F, field: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    let ms = parse_nonzero(lookup, field, default_ms)?;
    bounded_period(field, ms, Duration::from_millis(ms))
}

/// Periods feed `Instant` arithmetic and tokio intervals, which panic on overflow
fn bounded_period(field: &str, raw: u64, period: Duration) -> Result<Duration, ConfigError> {
    if period > MAX_PERIOD {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
            error: format!("must be at most {}s", MAX_PERIOD.as_secs()),
        });
    }
    Ok(period)
}

/// Split a comma separated id list; a `0x` prefix is dropped to match the
/// ids Hermes reports
fn parse_feed_ids(raw: &str) -> Result<Vec<String>, ConfigError> {
    let ids: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| id.strip_prefix("0x").unwrap_or(id).to_lowercase())
        .collect();

    if ids.is_empty() {
        return Err(ConfigError::EmptyFeedList);
    }
    Ok(ids)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {field}: {error}")]
    InvalidValue {
        field: String,
        value: String,
        error: String,
    },

    #[error("{0} must be greater than zero")]
    Zero(String),

    #[error("FEED_IDS cannot be empty")]
    EmptyFeedList,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server_port, 3001);
        assert_eq!(config.pyth_api_host, "https://hermes.pyth.network");
        assert_eq!(config.topic_log_max_len, 1000);
        assert_eq!(config.status_interval, Duration::from_secs(5));
        assert_eq!(config.ingestion.feed_ids.len(), 2);
        assert_eq!(config.ingestion.poll_interval, Duration::from_secs(1));
        assert!(config.ingestion.broadcast_updates);
        assert_eq!(config.session.write_wait, Duration::from_secs(10));
        assert_eq!(config.session.pong_wait, Duration::from_secs(60));
        assert_eq!(config.session.ping_period, Duration::from_secs(54));
        assert_eq!(config.session.max_message_size, 512);
        assert_eq!(config.session.outbound_capacity, 512);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("SERVER_PORT", "8080"),
            ("FEED_IDS", " 0xABC, def ,,"),
            ("TOPIC_LOG_MAX_LEN", "10"),
            ("PRICE_POLL_INTERVAL_MS", "250"),
            ("WS_PONG_WAIT_SECS", "20"),
            ("BROADCAST_PRICE_UPDATES", "false"),
        ])
        .unwrap();

        assert_eq!(config.server_port, 8080);
        assert_eq!(config.ingestion.feed_ids, vec!["abc", "def"]);
        assert_eq!(config.topic_log_max_len, 10);
        assert_eq!(config.ingestion.poll_interval, Duration::from_millis(250));
        assert_eq!(config.session.ping_period, Duration::from_secs(18));
        assert!(!config.ingestion.broadcast_updates);
    }

    #[test]
    fn test_invalid_values() {
        let err = load(&[("SERVER_PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "SERVER_PORT"));

        let err = load(&[("WS_OUTBOUND_CAPACITY", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Zero(ref field) if field == "WS_OUTBOUND_CAPACITY"));

        let err = load(&[("FEED_IDS", " , ")]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyFeedList));
    }

    #[test]
    fn test_periods_are_bounded() {
        for field in [
            "WS_PONG_WAIT_SECS",
            "WS_WRITE_WAIT_SECS",
            "STATUS_INTERVAL_SECS",
            "PRICE_POLL_INTERVAL_MS",
        ] {
            let err = load(&[(field, "18446744073709551615")]).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { field: ref f, .. } if f == field),
                "{field} accepted an unbounded period"
            );
        }

        let config = load(&[("WS_PONG_WAIT_SECS", "86400")]).unwrap();
        assert_eq!(config.session.pong_wait, Duration::from_secs(86_400));
        assert!(load(&[("WS_PONG_WAIT_SECS", "86401")]).is_err());
    }
}
