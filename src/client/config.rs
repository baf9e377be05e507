//! Configuration for the HTTP client manager.

use std::path::PathBuf;
use std::time::Duration;

use super::constants::{BAN_WINDOW_SECS, CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS};

/// Configuration for an [`HttpClientManager`](super::HttpClientManager).
///
/// The defaults match production behavior: 20 second per-attempt request
/// timeout and a 30 second ban window. Tests shorten both to keep wall
/// clock time down.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use hostgate::ClientConfig;
///
/// let config = ClientConfig {
///     request_timeout: Duration::from_secs(5),
///     ..ClientConfig::default()
/// };
/// assert_eq!(config.ban_window, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// User-Agent sent when a request does not override it.
    pub user_agent: String,

    /// Directory where streamed downloads place their temp files.
    pub temp_dir: PathBuf,

    /// TCP connect timeout.
    pub connect_timeout: Duration,

    /// Per-attempt timeout covering connect plus response headers.
    pub request_timeout: Duration,

    /// How long a host stays banned after an observed timeout.
    pub ban_window: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            temp_dir: std::env::temp_dir(),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            ban_window: Duration::from_secs(BAN_WINDOW_SECS),
        }
    }
}

/// Default User-Agent identifying this library and its version.
#[must_use]
pub fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_production_values() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(20));
        assert_eq!(config.ban_window, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_default_user_agent_contains_name_and_version() {
        let ua = default_user_agent();
        assert!(ua.contains("hostgate"), "Expected crate name in: {ua}");
        assert!(
            ua.contains(env!("CARGO_PKG_VERSION")),
            "Expected version in: {ua}"
        );
    }
}
