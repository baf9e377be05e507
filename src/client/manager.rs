//! The client manager: request executor and public facade.
//!
//! [`HttpClientManager`] owns the transport clients and the per-host
//! circuit-breaker registry, and runs every request through the same
//! admission pipeline:
//!
//! ```text
//! Init -> BanCheck -> Admitted -> Sending -> Receiving -> Done | Failed
//! ```
//!
//! A resource-pool slot, when one was supplied, is held as an RAII permit
//! for the whole in-flight request (headers and body) and released on
//! every exit path. A timeout observed anywhere opens the circuit for the
//! request's host key before the error reaches the caller.

use std::path::PathBuf;
use std::sync::Arc;

use rand::Rng;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::classify::classify_transport;
use super::config::ClientConfig;
use super::constants::TEMP_NAME_LEN;
use super::error::HttpError;
use super::host_state::{HostKey, HostStateRegistry};
use super::materialize::{self, HttpResponse, TempFileResponse};
use super::options::{ProgressSink, RequestOptions, encode_form};

/// Managed outbound HTTP client.
///
/// Designed to be created once and shared (it is cheap to wrap in an
/// `Arc`); the two underlying transports are pooled and reused across
/// calls. One transport advertises and transparently decodes a content
/// encoding, the other advertises none; a request's compression
/// preference selects between them, and the circuit breaker tracks the
/// two modes under independent host keys.
///
/// # Example
///
/// ```no_run
/// use hostgate::{ClientConfig, HttpClientManager, RequestOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = HttpClientManager::new(ClientConfig::default());
/// let saved = manager
///     .get_temp_file(RequestOptions::new("https://cdn.example.com/poster.jpg"))
///     .await?;
/// println!("saved to {}", saved.path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct HttpClientManager {
    config: ClientConfig,
    decoding_client: Client,
    identity_client: Client,
    hosts: HostStateRegistry,
}

impl Default for HttpClientManager {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl HttpClientManager {
    /// Creates a manager with the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(config: ClientConfig) -> Self {
        let decoding_client = build_transport(&config, true)
            .expect("failed to build decoding HTTP client with static configuration");
        let identity_client = build_transport(&config, false)
            .expect("failed to build identity HTTP client with static configuration");
        Self {
            config,
            decoding_client,
            identity_client,
            hosts: HostStateRegistry::new(),
        }
    }

    /// Issues a GET request and buffers the response body into memory.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] when the URL is empty, the caller cancelled,
    /// the host's circuit is open, the request timed out, the server
    /// answered non-2xx, or the transport failed.
    #[instrument(skip(self, options), fields(url = %options.url()))]
    pub async fn get(&self, options: RequestOptions) -> Result<HttpResponse, HttpError> {
        let result = self.get_inner(&options).await;
        self.finish(&options, result)
    }

    /// Issues a POST with URL-encoded form fields and buffers the
    /// response body into memory.
    ///
    /// Fields are encoded in the order given as `key=value` pairs joined
    /// with `&`, with content type `application/x-www-form-urlencoded`.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`get`](Self::get).
    #[instrument(skip(self, options, fields), fields(url = %options.url()))]
    pub async fn post_form(
        &self,
        options: RequestOptions,
        fields: &[(&str, &str)],
    ) -> Result<HttpResponse, HttpError> {
        let body = encode_form(fields);
        let result = self.post_inner(&options, body).await;
        self.finish(&options, result)
    }

    /// Issues a GET request and streams the response body to a freshly
    /// named temp file, reporting progress to the options' sink.
    ///
    /// The returned file is owned by the caller. On any failure during
    /// streaming the partial file is deleted before the error propagates.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`get`](Self::get), plus
    /// [`HttpError::Io`] when writing the temp file fails.
    #[instrument(skip(self, options), fields(url = %options.url()))]
    pub async fn get_temp_file(
        &self,
        options: RequestOptions,
    ) -> Result<TempFileResponse, HttpError> {
        let result = self.get_temp_file_inner(&options).await;
        self.finish(&options, result)
    }

    /// Read access to the circuit-breaker registry, mainly for
    /// diagnostics.
    #[must_use]
    pub fn hosts(&self) -> &HostStateRegistry {
        &self.hosts
    }

    async fn get_inner(&self, options: &RequestOptions) -> Result<HttpResponse, HttpError> {
        let (response, _permit) = self.execute(Method::GET, None, options).await?;
        materialize::buffer_response(options.url(), response, options.cancel_token()).await
    }

    async fn post_inner(
        &self,
        options: &RequestOptions,
        body: String,
    ) -> Result<HttpResponse, HttpError> {
        let (response, _permit) = self.execute(Method::POST, Some(body), options).await?;
        materialize::buffer_response(options.url(), response, options.cancel_token()).await
    }

    async fn get_temp_file_inner(
        &self,
        options: &RequestOptions,
    ) -> Result<TempFileResponse, HttpError> {
        let (response, _permit) = self.execute(Method::GET, None, options).await?;
        let dest = self.fresh_temp_path();
        materialize::stream_to_temp_file(
            options.url(),
            response,
            &dest,
            options.progress_sink().map(|sink| &**sink as &dyn ProgressSink),
            options.cancel_token(),
        )
        .await
    }

    /// Runs the admission pipeline and returns the successful response
    /// together with the pool permit (if any), so the caller keeps the
    /// slot for the body phase. Dropping the permit on any path releases
    /// the slot.
    async fn execute(
        &self,
        method: Method,
        form_body: Option<String>,
        options: &RequestOptions,
    ) -> Result<(reqwest::Response, Option<OwnedSemaphorePermit>), HttpError> {
        let url = options.url();
        if url.trim().is_empty() {
            return Err(HttpError::invalid_argument("url must not be empty"));
        }
        let cancel = options.cancel_token();
        if cancel.is_cancelled() {
            return Err(HttpError::cancelled(url));
        }

        // Ban check before pool admission: a known-bad host must not
        // consume a pool slot.
        let key = HostKey::from_url(url, options.wants_decompression());
        if self.hosts.is_banned(&key, self.config.ban_window) {
            debug!(host = %key.host(), "circuit open, rejecting without network attempt");
            return Err(HttpError::circuit_open(url));
        }

        let permit = match options.pool() {
            Some(pool) => Some(acquire_slot(pool, cancel, url).await?),
            None => None,
        };

        // Time may have passed while queued on the pool; the host may
        // have been banned in the meantime.
        if self.hosts.is_banned(&key, self.config.ban_window) {
            debug!(host = %key.host(), "host banned while queued, releasing slot");
            return Err(HttpError::circuit_open(url));
        }

        let request = self.build_request(method, form_body, options);

        if cancel.is_cancelled() {
            return Err(HttpError::cancelled(url));
        }

        let response = tokio::select! {
            () = cancel.cancelled() => return Err(HttpError::cancelled(url)),
            outcome = tokio::time::timeout(self.config.request_timeout, request.send()) => {
                match outcome {
                    Err(_elapsed) => {
                        warn!(
                            url,
                            timeout_secs = self.config.request_timeout.as_secs(),
                            "per-attempt deadline elapsed"
                        );
                        return Err(HttpError::timed_out(url));
                    }
                    Ok(Err(source)) => return Err(classify_transport(url, source)),
                    Ok(Ok(response)) => response,
                }
            }
        };

        if cancel.is_cancelled() {
            return Err(HttpError::cancelled(url));
        }

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::request_failed(
                url,
                status.as_u16(),
                status.canonical_reason().map(str::to_string),
            ));
        }

        Ok((response, permit))
    }

    /// Records a newly observed timeout for the request's host key before
    /// the error reaches the caller. Circuit-breaker short-circuits are
    /// not newly observed timeouts and must not extend the ban.
    fn finish<T>(
        &self,
        options: &RequestOptions,
        result: Result<T, HttpError>,
    ) -> Result<T, HttpError> {
        if let Err(HttpError::TimedOut {
            circuit_open: false,
            ..
        }) = &result
        {
            let key = HostKey::from_url(options.url(), options.wants_decompression());
            self.hosts.record_timeout(&key);
        }
        result
    }

    fn build_request(
        &self,
        method: Method,
        form_body: Option<String>,
        options: &RequestOptions,
    ) -> RequestBuilder {
        let client = if options.wants_decompression() {
            &self.decoding_client
        } else {
            &self.identity_client
        };
        let mut request = client.request(method, options.url());
        if let Some(accept) = options.accept_header() {
            request = request.header(ACCEPT, accept);
        }
        if let Some(user_agent) = options.user_agent_override() {
            request = request.header(USER_AGENT, user_agent);
        }
        for (name, value) in options.extra_headers() {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = form_body {
            request = request
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(body);
        }
        request
    }

    fn fresh_temp_path(&self) -> PathBuf {
        let suffix: String = rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(TEMP_NAME_LEN)
            .map(char::from)
            .collect();
        self.config.temp_dir.join(format!("hostgate-{suffix}.tmp"))
    }
}

/// Acquires one slot from the caller's pool, racing against cancellation
/// so an abort while queued never consumes a slot.
async fn acquire_slot(
    pool: &Arc<Semaphore>,
    cancel: &CancellationToken,
    url: &str,
) -> Result<OwnedSemaphorePermit, HttpError> {
    tokio::select! {
        () = cancel.cancelled() => Err(HttpError::cancelled(url)),
        permit = Arc::clone(pool).acquire_owned() => {
            permit.map_err(|_| HttpError::invalid_argument("resource pool is closed"))
        }
    }
}

fn build_transport(config: &ClientConfig, decompress: bool) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .gzip(decompress)
        .user_agent(config.user_agent.clone())
        .build()
}
