//! Per-host circuit breaker state.
//!
//! This module provides the [`HostStateRegistry`], a keyed store of
//! per-(host, compression) circuit-breaker state. When any request path
//! observes a timeout, the host's key is recorded; subsequent requests to
//! that key within the ban window fail immediately without touching the
//! network or consuming a resource-pool slot.
//!
//! # Overview
//!
//! State is tracked per [`HostKey`], so the same host reached with and
//! without compression is banned independently. Entries are created on
//! first access and never evicted; the key space is bounded by the number
//! of distinct hosts the application talks to, which is small in practice.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use hostgate::{HostKey, HostStateRegistry};
//!
//! let registry = HostStateRegistry::new();
//! let key = HostKey::from_url("https://cdn.example.com/image.jpg", true);
//!
//! assert!(!registry.is_banned(&key, Duration::from_secs(30)));
//! registry.record_timeout(&key);
//! assert!(registry.is_banned(&key, Duration::from_secs(30)));
//! ```

use std::sync::{Arc, Mutex};

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Identity under which circuit-breaker state is tracked.
///
/// Composite of the request URL's authority and the compression mode the
/// request was issued with. Two requests to the same host with different
/// compression settings use independent breaker slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostKey {
    host: String,
    decompress: bool,
}

impl HostKey {
    /// Derives the key for a request URL and compression mode.
    #[must_use]
    pub fn from_url(url: &str, decompress: bool) -> Self {
        Self {
            host: host_for_url(url),
            decompress,
        }
    }

    /// The host (authority) component of the key.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// State tracked for each host key.
#[derive(Debug, Default)]
pub struct HostState {
    /// When the last timeout was observed for this key.
    /// `None` means no timeout has ever been observed.
    last_timeout: Mutex<Option<Instant>>,
}

impl HostState {
    fn record_timeout(&self) {
        let mut guard = self
            .last_timeout
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(Instant::now());
    }

    fn banned_within(&self, window: Duration) -> bool {
        let guard = self
            .last_timeout
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.is_some_and(|last| last.elapsed() < window)
    }
}

/// Keyed store of per-host circuit-breaker state.
///
/// Designed to be owned by the client manager and touched concurrently by
/// every in-flight request. Uses `DashMap` for lock-free access to entries;
/// per-entry updates are atomic, and no cross-key ordering is needed.
///
/// Lifetime is the process lifetime; there is no eviction. A host's ban is
/// purely time-windowed: `last_timeout` is read-and-compared, never
/// cleared.
#[derive(Debug, Default)]
pub struct HostStateRegistry {
    hosts: DashMap<HostKey, Arc<HostState>>,
}

impl HostStateRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the state for a key, creating a zero-value entry on first
    /// access. Idempotent and thread-safe.
    ///
    /// The `Arc` is cloned out of the map entry so the shard lock is
    /// released before the caller does anything further with the state.
    #[must_use]
    pub fn get_or_create(&self, key: &HostKey) -> Arc<HostState> {
        self.hosts
            .entry(key.clone())
            .or_insert_with(|| Arc::new(HostState::default()))
            .clone()
    }

    /// Records an observed timeout for a key, opening the circuit for the
    /// ban window.
    pub fn record_timeout(&self, key: &HostKey) {
        let state = self.get_or_create(key);
        state.record_timeout();
        warn!(host = %key.host, decompress = key.decompress, "timeout recorded, host banned for the window");
    }

    /// Returns true iff a timeout was observed for this key less than
    /// `window` ago.
    #[must_use]
    pub fn is_banned(&self, key: &HostKey, window: Duration) -> bool {
        let Some(state) = self.hosts.get(key).map(|entry| Arc::clone(entry.value())) else {
            return false;
        };
        let banned = state.banned_within(window);
        if banned {
            debug!(host = %key.host, "host is within ban window");
        }
        banned
    }
}

/// Extracts the authority from a URL: the substring between `://` and the
/// next `/`, lowercased. A URL without a scheme separator is treated as
/// starting at the authority.
///
/// Ports are kept, so `host:8080` and `host:9090` ban independently.
///
/// # Examples
///
/// ```
/// use hostgate::client::host_for_url;
///
/// assert_eq!(host_for_url("https://example.com/path"), "example.com");
/// assert_eq!(host_for_url("http://Example.COM/Path"), "example.com");
/// assert_eq!(host_for_url("https://localhost:8080/x"), "localhost:8080");
/// assert_eq!(host_for_url("example.com/x"), "example.com");
/// ```
#[must_use]
pub fn host_for_url(url: &str) -> String {
    let after_scheme = url
        .split_once("://")
        .map_or(url, |(_scheme, rest)| rest);
    let authority = after_scheme
        .split('/')
        .next()
        .unwrap_or(after_scheme);
    authority.to_lowercase()
}
