//! Hub error types.
//!
//! Errors are split by how far they travel:
//!
//! | Type               | Scope                         | Recovery                          |
//! |--------------------|-------------------------------|-----------------------------------|
//! | [`EnvelopeError`]  | one inbound frame             | sender gets a notice, session lives |
//! | [`ConnectionError`]| one session                   | session is torn down              |
//! | [`ConfigError`]    | process startup               | process exits                     |
//!
//! A publish to a topic nobody subscribes to is not an error at all.

use std::time::Duration;

/// Failure of a single session's connection.
///
/// Every variant is fatal to the affected session and to nothing else.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The peer closed the stream or the stream ended.
    #[error("peer closed the connection")]
    Closed,

    /// An inbound frame exceeded the configured maximum size.
    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// Size of the offending frame in bytes.
        size: usize,
        /// Configured maximum in bytes.
        limit: usize,
    },

    /// A read or write did not complete within its deadline.
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    /// Error reported by the WebSocket transport.
    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),

    /// Raw I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectionError {
    /// Returns `true` when the peer went away in an orderly fashion.
    #[must_use]
    pub const fn is_graceful(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Failure to decode an inbound envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The frame is not a JSON object of the expected shape.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Invalid process configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `LISTEN_ADDR` could not be parsed as a socket address.
    #[error("invalid listen address {value:?}: {source}")]
    InvalidListenAddr {
        /// The rejected value.
        value: String,
        /// Parser error.
        source: std::net::AddrParseError,
    },

    /// A setting that must be strictly positive was zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}
