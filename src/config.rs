//! Hub configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Unset or unparseable numeric values
//! fall back to their defaults.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;

/// Default socket address for the HTTP server.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:9999";

/// Per-session pump settings.
///
/// Shared by every session; copied into each pump at spawn time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Deadline for a single outbound frame (data, ping or close).
    pub write_wait: Duration,

    /// How long the read pump waits for any inbound frame, pongs included,
    /// before declaring the peer dead.
    pub pong_wait: Duration,

    /// Maximum accepted size of an inbound frame, in bytes.
    pub max_message_size: usize,

    /// Capacity of each session's outbound queue.
    pub outbound_capacity: usize,

    /// Lifetime dropped-message count at which a slow subscriber is
    /// evicted. `0` disables eviction.
    pub slow_subscriber_drop_limit: u64,
}

impl SessionConfig {
    /// Interval between pings: 90% of [`Self::pong_wait`], so a healthy
    /// peer always answers before the read deadline expires.
    #[must_use]
    pub fn ping_period(&self) -> Duration {
        self.pong_wait.saturating_mul(9) / 10
    }

    /// Checks that every timing and capacity setting is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Zero`] naming the first setting that is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.write_wait.is_zero() {
            return Err(ConfigError::Zero("WRITE_WAIT_SECS"));
        }
        if self.ping_period().is_zero() {
            return Err(ConfigError::Zero("PONG_WAIT_SECS"));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::Zero("MAX_MESSAGE_SIZE"));
        }
        if self.outbound_capacity == 0 {
            return Err(ConfigError::Zero("OUTBOUND_CAPACITY"));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            write_wait: Duration::from_secs(10),
            pong_wait: Duration::from_secs(10),
            max_message_size: 512,
            outbound_capacity: 100,
            slow_subscriber_drop_limit: 100,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Top-level hub configuration.
///
/// Loaded once at startup via [`HubConfig::from_env`].
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:9999`).
    pub listen_addr: SocketAddr,

    /// Request timeout for the plain HTTP routes (not the WebSocket).
    pub http_timeout: Duration,

    /// Log output format.
    pub log_format: LogFormat,

    /// Settings applied to every session.
    pub session: SessionConfig,
}

impl HubConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `LISTEN_ADDR` is set but cannot be
    /// parsed, or if a timing or capacity setting is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`HubConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_addr = lookup("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = raw_addr
            .parse::<SocketAddr>()
            .map_err(|source| ConfigError::InvalidListenAddr {
                value: raw_addr.clone(),
                source,
            })?;

        let defaults = SessionConfig::default();
        let session = SessionConfig {
            write_wait: Duration::from_secs(parse_or(
                &lookup,
                "WRITE_WAIT_SECS",
                defaults.write_wait.as_secs(),
            )),
            pong_wait: Duration::from_secs(parse_or(
                &lookup,
                "PONG_WAIT_SECS",
                defaults.pong_wait.as_secs(),
            )),
            max_message_size: parse_or(&lookup, "MAX_MESSAGE_SIZE", defaults.max_message_size),
            outbound_capacity: parse_or(&lookup, "OUTBOUND_CAPACITY", defaults.outbound_capacity),
            slow_subscriber_drop_limit: parse_or(
                &lookup,
                "SLOW_SUBSCRIBER_DROP_LIMIT",
                defaults.slow_subscriber_drop_limit,
            ),
        };
        session.validate()?;

        let http_timeout = Duration::from_secs(parse_or(&lookup, "HTTP_TIMEOUT_SECS", 10));

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            listen_addr,
            http_timeout,
            log_format,
            session,
        })
    }
}

/// Parses `key` as `T`, returning `default` on missing or invalid values.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
