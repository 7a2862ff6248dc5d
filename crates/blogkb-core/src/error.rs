//! Error types and handling for blogkb-core operations.
//!
//! Errors are layered the same way the content pipeline is:
//!
//! - [`FetchError`]: the resilient fetcher gave up (timeout, connection failure,
//!   HTTP status, or an open circuit breaker)
//! - [`ParseError`]: the document is structurally unrecognizable
//! - [`QueryError`]: the caller passed an unusable query or range
//! - [`Error`]: the crate-wide error that wraps all of the above
//!
//! The cache forwards fetch and parse errors unchanged. [`Error::Unavailable`] is only
//! produced by the query layer when no corpus was ever built and therefore nothing
//! (not even stale content) can be served.
//!
//! ```rust
//! use blogkb_core::{Error, FetchError};
//!
//! let err = Error::from(FetchError::HttpStatus(503));
//! assert!(err.is_recoverable());
//! assert_eq!(err.category(), "fetch");
//! ```

use std::time::Duration;

use thiserror::Error;

/// Failure of a fetch attempt after the retry policy and circuit breaker were applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request did not complete within the per-attempt timeout.
    #[error("request timed out")]
    Timeout,

    /// The connection could not be established or broke mid-response.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The server answered with a non-success status code.
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// The circuit breaker is open; no request was attempted.
    #[error("circuit breaker open, retry in {}s", .retry_after.as_secs())]
    CircuitOpen {
        /// Time remaining until the breaker lets a probe request through.
        retry_after: Duration,
    },
}

impl FetchError {
    /// Whether another attempt inside the same retry loop could succeed.
    ///
    /// Timeouts, connection failures, `429 Too Many Requests` and `5xx` responses are
    /// transient. Other `4xx` statuses fail immediately, and an open circuit is never
    /// retried by the fetcher itself.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::ConnectionFailed(_) => true,
            Self::HttpStatus(code) => *code == 429 || *code >= 500,
            Self::CircuitOpen { .. } => false,
        }
    }
}

/// The raw document could not be decomposed into sections.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct ParseError {
    /// Human-readable explanation of what was missing.
    pub reason: String,
}

impl ParseError {
    /// Create a parse error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Invalid arguments to a query operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The query string was empty or whitespace only.
    #[error("query must not be empty")]
    EmptyQuery,

    /// A day range was negative.
    #[error("invalid range: days must be non-negative (got {0})")]
    InvalidRange(i64),
}

/// The main error type for blogkb-core operations.
///
/// The type is `Clone` because a single coalesced refresh hands its outcome to every
/// caller that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Fetching the source document failed.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The fetched document could not be parsed.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// A query operation received invalid arguments.
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// No content has ever been loaded and the attempt to load it failed.
    #[error("Content unavailable: {0}")]
    Unavailable(Box<Error>),

    /// Configuration is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl Error {
    /// Check if the error might be recoverable by trying again later.
    ///
    /// Transient fetch failures are recoverable, and so is an open circuit breaker once
    /// its reset timeout elapses. Parse, query and configuration errors are permanent.
    /// [`Error::Unavailable`] defers to the error it wraps.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(FetchError::CircuitOpen { .. }) => true,
            Self::Fetch(e) => e.is_transient(),
            Self::Unavailable(inner) => inner.is_recoverable(),
            Self::Parse(_) | Self::Query(_) | Self::Config(_) => false,
        }
    }

    /// Get the error category as a string identifier for logging and exit codes.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Fetch(FetchError::Timeout) => "timeout",
            Self::Fetch(_) => "fetch",
            Self::Parse(_) => "parse",
            Self::Query(_) => "query",
            Self::Unavailable(_) => "unavailable",
            Self::Config(_) => "config",
        }
    }

    /// Wrap this error as "content unavailable", unless it already is.
    #[must_use]
    pub fn into_unavailable(self) -> Self {
        match self {
            Self::Unavailable(_) => self,
            other => Self::Unavailable(Box::new(other)),
        }
    }
}

/// Convenience type alias for [`std::result::Result`] with our [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
