//! Error types for the client module.
//!
//! This module defines the unified failure taxonomy every request path
//! reports through. Callers branch on whether a failure was a timeout
//! (maybe retry later), a bad status (inspect the code), or a hard
//! transport fault.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while executing a managed request.
#[derive(Debug, Error)]
pub enum HttpError {
    /// A required argument was missing or malformed (e.g. empty URL).
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong with the call.
        message: String,
    },

    /// The caller cancelled the request. Not a failure of the system.
    #[error("request to {url} was cancelled")]
    Cancelled {
        /// The URL whose request was cancelled.
        url: String,
    },

    /// The request timed out, or the circuit breaker rejected it because
    /// the host timed out recently.
    #[error("request to {url} timed out")]
    TimedOut {
        /// The URL that timed out.
        url: String,
        /// True when this is the breaker short-circuit rather than a newly
        /// observed timeout. Short-circuits must not extend the ban.
        circuit_open: bool,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} requesting {url}")]
    RequestFailed {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The canonical reason phrase, when one exists.
        reason: Option<String>,
    },

    /// Lower-level network failure (DNS, connect, TLS, protocol).
    #[error("transport error requesting {url}: {source}")]
    Transport {
        /// The URL that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// File system error while materializing a streamed response.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Unclassified transport failure, carried unaltered so novel failure
    /// modes are not masked.
    #[error("unclassified error requesting {url}: {source}")]
    Unknown {
        /// The URL that failed.
        url: String,
        /// The unclassified source error.
        #[source]
        source: reqwest::Error,
    },
}

impl HttpError {
    /// Creates an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a caller-cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Creates a timeout error for a newly observed timeout.
    pub fn timed_out(url: impl Into<String>) -> Self {
        Self::TimedOut {
            url: url.into(),
            circuit_open: false,
        }
    }

    /// Creates a timeout error for the circuit-breaker short-circuit.
    pub fn circuit_open(url: impl Into<String>) -> Self {
        Self::TimedOut {
            url: url.into(),
            circuit_open: true,
        }
    }

    /// Creates a non-2xx status error.
    pub fn request_failed(url: impl Into<String>, status: u16, reason: Option<String>) -> Self {
        Self::RequestFailed {
            url: url.into(),
            status,
            reason,
        }
    }

    /// Creates a transport error from a reqwest error.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an unclassified error.
    pub fn unknown(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Unknown {
            url: url.into(),
            source,
        }
    }

    /// Returns true when the failure was a timeout, whether newly observed
    /// or a circuit-breaker short-circuit. Callers use this flag to decide
    /// whether retrying later makes sense.
    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

// Note on From trait implementations:
// We intentionally do NOT implement `From<reqwest::Error>` or
// `From<std::io::Error>` because our variants require context (url, path)
// that the source errors don't provide. The helper constructors are the
// correct pattern here as they let callers attach that context. Transport
// failure classification additionally must go through
// `classify::classify_transport` so all request paths map errors
// identically.
