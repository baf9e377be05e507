//! Centralized transport-failure classification.
//!
//! Every request path (send phase, buffered body read, streamed body read)
//! maps transport errors through [`classify_transport`]. Keeping this in
//! one place guarantees identical classification everywhere; the circuit
//! breaker depends on a timeout looking the same no matter which phase
//! observed it.

use tracing::debug;

use super::error::HttpError;

/// Maps a transport-level failure into the [`HttpError`] taxonomy.
///
/// - Timeouts (including a transport-level abort the client library can
///   only report as a timeout) become [`HttpError::TimedOut`], so the
///   circuit breaker engages.
/// - Connection, request construction, body, and decode failures become
///   [`HttpError::Transport`] wrapping the cause.
/// - Anything else becomes [`HttpError::Unknown`] with the source carried
///   unaltered, so novel failure modes are not masked.
///
/// Caller-initiated cancellation never reaches this function; the executor
/// detects it on the cancellation token and reports
/// [`HttpError::Cancelled`] directly.
pub(crate) fn classify_transport(url: &str, source: reqwest::Error) -> HttpError {
    if source.is_timeout() {
        debug!(url, "transport reported timeout");
        return HttpError::timed_out(url);
    }
    if source.is_connect()
        || source.is_request()
        || source.is_body()
        || source.is_decode()
        || source.is_builder()
    {
        return HttpError::transport(url, source);
    }
    debug!(url, error = %source, "unclassified transport failure");
    HttpError::unknown(url, source)
}
