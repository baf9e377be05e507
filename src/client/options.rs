//! Per-call request options.
//!
//! [`RequestOptions`] is the immutable-per-call value describing one
//! managed request: target URL, headers, compression preference, an
//! optional resource pool bounding concurrent in-flight requests for a
//! logical group, an optional progress sink, and a cancellation token.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tokio::sync::Semaphore;
//! use hostgate::RequestOptions;
//!
//! let pool = Arc::new(Semaphore::new(4));
//! let options = RequestOptions::new("https://api.example.com/items")
//!     .accept("application/json")
//!     .user_agent("my-app/2.0")
//!     .header("X-Request-Id", "abc123")
//!     .resource_pool(pool);
//! assert_eq!(options.url(), "https://api.example.com/items");
//! ```

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Receives fractional download progress (0–100).
///
/// For a streamed download the sink is called at least with 0 at start and
/// 100 at completion; when the total length is known it also receives a
/// non-decreasing sequence of intermediate values proportional to bytes
/// copied. Implemented for any `Fn(f64) + Send + Sync` closure.
pub trait ProgressSink: Send + Sync {
    /// Reports progress as a percentage in `0.0..=100.0`.
    fn report(&self, percent: f64);
}

impl<F> ProgressSink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn report(&self, percent: f64) {
        self(percent);
    }
}

/// Options for a single managed request.
///
/// Built once per call and handed to the
/// [`HttpClientManager`](super::HttpClientManager) facade methods. All
/// fields except the URL are optional; compression defaults to enabled.
#[derive(Clone)]
pub struct RequestOptions {
    url: String,
    accept: Option<String>,
    user_agent: Option<String>,
    headers: Vec<(String, String)>,
    decompress: bool,
    resource_pool: Option<Arc<Semaphore>>,
    progress: Option<Arc<dyn ProgressSink>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("url", &self.url)
            .field("accept", &self.accept)
            .field("user_agent", &self.user_agent)
            .field("headers", &self.headers)
            .field("decompress", &self.decompress)
            .field("has_resource_pool", &self.resource_pool.is_some())
            .field("has_progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

impl RequestOptions {
    /// Creates options for a request to `url` with defaults: compression
    /// enabled, no pool, no progress sink, a fresh (never-cancelled)
    /// cancellation token.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            accept: None,
            user_agent: None,
            headers: Vec::new(),
            decompress: true,
            resource_pool: None,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the Accept header.
    #[must_use]
    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Overrides the User-Agent for this call only.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Adds an arbitrary request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the compression preference. When enabled (the default) the
    /// request advertises and transparently decodes a content encoding;
    /// when disabled it advertises none.
    #[must_use]
    pub fn decompress(mut self, decompress: bool) -> Self {
        self.decompress = decompress;
        self
    }

    /// Supplies a caller-owned counting semaphore bounding concurrent
    /// in-flight requests for this logical group. The manager acquires one
    /// slot before sending and releases it on every exit path.
    #[must_use]
    pub fn resource_pool(mut self, pool: Arc<Semaphore>) -> Self {
        self.resource_pool = Some(pool);
        self
    }

    /// Supplies a progress sink for streamed downloads.
    #[must_use]
    pub fn progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Supplies the cancellation token observed at every suspension point.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn accept_header(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    pub(crate) fn user_agent_override(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub(crate) fn extra_headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub(crate) fn wants_decompression(&self) -> bool {
        self.decompress
    }

    pub(crate) fn pool(&self) -> Option<&Arc<Semaphore>> {
        self.resource_pool.as_ref()
    }

    pub(crate) fn progress_sink(&self) -> Option<&Arc<dyn ProgressSink>> {
        self.progress.as_ref()
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Encodes form fields as `application/x-www-form-urlencoded` body bytes:
/// `key=value` pairs joined with `&`, keys and values percent-encoded
/// UTF-8, in the order given.
///
/// # Examples
///
/// ```
/// use hostgate::encode_form;
///
/// assert_eq!(encode_form(&[("a", "1"), ("b", "2")]), "a=1&b=2");
/// assert_eq!(encode_form(&[("q", "a b")]), "q=a%20b");
/// ```
#[must_use]
pub fn encode_form(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}
