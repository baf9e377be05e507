//! Response materialization: buffered bodies and streamed temp files.
//!
//! Two modes, per the orchestration contract:
//!
//! - **Buffered**: the whole body is copied into memory and returned with
//!   status and content type. Used by plain GET/POST.
//! - **Streamed-to-temp-file**: the body is copied to a caller-owned temp
//!   file through a buffered writer, reporting fractional progress when
//!   the total length is known. On any failure during streaming the
//!   partially written file is deleted before the error propagates.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::classify::classify_transport;
use super::error::HttpError;
use super::options::ProgressSink;

/// Result of a buffered request: the whole body in memory.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status of the response (always 2xx; non-2xx fails the call).
    pub status: StatusCode,
    /// Content-Type header value, when present.
    pub content_type: Option<String>,
    /// The response body.
    pub body: Bytes,
}

/// Result of a streamed download.
///
/// The temp file is owned by the caller after return; the manager's
/// cleanup responsibility ends once the download completed and the file
/// was flushed and closed.
#[derive(Debug, Clone)]
pub struct TempFileResponse {
    /// Path of the fully written temp file.
    pub path: PathBuf,
    /// HTTP status of the response.
    pub status: StatusCode,
    /// Content-Type header value, when present.
    pub content_type: Option<String>,
    /// Declared content length, when the server sent one.
    pub content_length: Option<u64>,
}

/// Extracts the Content-Type header as a string.
pub(crate) fn content_type_of(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Reads the declared Content-Length header. The header, not the body
/// size hint, is what progress fractions are computed against; it is
/// absent for chunked responses and stripped when the transport
/// decompresses.
fn declared_content_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
}

/// Buffers the entire response body into memory, honoring cancellation.
pub(crate) async fn buffer_response(
    url: &str,
    response: reqwest::Response,
    cancel: &CancellationToken,
) -> Result<HttpResponse, HttpError> {
    let status = response.status();
    let content_type = content_type_of(&response);

    let body = tokio::select! {
        () = cancel.cancelled() => return Err(HttpError::cancelled(url)),
        result = response.bytes() => result.map_err(|e| classify_transport(url, e))?,
    };

    debug!(url, bytes = body.len(), "buffered response body");
    Ok(HttpResponse {
        status,
        content_type,
        body,
    })
}

/// Streams the response body to `dest`, reporting progress and deleting
/// the partial file on any failure.
pub(crate) async fn stream_to_temp_file(
    url: &str,
    response: reqwest::Response,
    dest: &Path,
    progress: Option<&dyn ProgressSink>,
    cancel: &CancellationToken,
) -> Result<TempFileResponse, HttpError> {
    let status = response.status();
    let content_type = content_type_of(&response);
    let content_length = declared_content_length(&response);

    let mut tracker = ProgressTracker::new(progress, content_length);
    tracker.start();

    let copy_result = copy_body(url, response, dest, &mut tracker, cancel).await;
    if let Err(error) = copy_result {
        // Cleanup is unconditional and best-effort; a failed delete must
        // not mask the original error.
        debug!(path = %dest.display(), "removing partial temp file after error");
        let _ = tokio::fs::remove_file(dest).await;
        return Err(error);
    }

    tracker.finish();
    info!(url, path = %dest.display(), "download complete");

    Ok(TempFileResponse {
        path: dest.to_path_buf(),
        status,
        content_type,
        content_length,
    })
}

/// Copies the body stream into the destination file. Extracted so the
/// caller can clean up the partial file on error.
async fn copy_body(
    url: &str,
    response: reqwest::Response,
    dest: &Path,
    tracker: &mut ProgressTracker<'_>,
    cancel: &CancellationToken,
) -> Result<(), HttpError> {
    let file = File::create(dest)
        .await
        .map_err(|e| HttpError::io(dest, e))?;
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();

    loop {
        let chunk = tokio::select! {
            () = cancel.cancelled() => return Err(HttpError::cancelled(url)),
            next = stream.next() => match next {
                Some(result) => result.map_err(|e| classify_transport(url, e))?,
                None => break,
            },
        };

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| HttpError::io(dest, e))?;
        tracker.advance(chunk.len() as u64);
    }

    writer.flush().await.map_err(|e| HttpError::io(dest, e))?;
    Ok(())
}

/// Converts bytes copied into progress percentages.
///
/// Reports 0 at start and 100 at completion. Intermediate values are only
/// reported when the total length is known, and are non-decreasing and
/// proportional to bytes copied.
struct ProgressTracker<'a> {
    sink: Option<&'a dyn ProgressSink>,
    total: Option<u64>,
    copied: u64,
    last: f64,
}

impl<'a> ProgressTracker<'a> {
    fn new(sink: Option<&'a dyn ProgressSink>, total: Option<u64>) -> Self {
        Self {
            sink,
            // A zero-length total cannot produce a meaningful fraction.
            total: total.filter(|&t| t > 0),
            copied: 0,
            last: 0.0,
        }
    }

    fn start(&mut self) {
        if let Some(sink) = self.sink {
            sink.report(0.0);
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn advance(&mut self, bytes: u64) {
        self.copied = self.copied.saturating_add(bytes);
        let (Some(sink), Some(total)) = (self.sink, self.total) else {
            return;
        };
        let percent = ((self.copied as f64 / total as f64) * 100.0).min(100.0);
        if percent > self.last {
            self.last = percent;
            sink.report(percent);
        }
    }

    fn finish(&mut self) {
        if let Some(sink) = self.sink {
            if self.last < 100.0 {
                self.last = 100.0;
                sink.report(100.0);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};

    use futures_util::stream;
    use tempfile::TempDir;

    /// Progress sink collecting every reported value.
    #[derive(Default)]
    struct Recorder {
        values: Mutex<Vec<f64>>,
    }

    impl ProgressSink for Recorder {
        fn report(&self, percent: f64) {
            self.values.lock().unwrap().push(percent);
        }
    }

    impl Recorder {
        fn values(&self) -> Vec<f64> {
            self.values.lock().unwrap().clone()
        }
    }

    fn response_with_body(
        content_length: Option<u64>,
        body: reqwest::Body,
    ) -> reqwest::Response {
        let mut builder = http::Response::builder().status(200);
        if let Some(length) = content_length {
            builder = builder.header("content-length", length);
        }
        reqwest::Response::from(builder.body(body).unwrap())
    }

    // ==================== ProgressTracker Tests ====================

    #[test]
    fn test_progress_known_length_reports_proportional_sequence() {
        let recorder = Recorder::default();
        let mut tracker = ProgressTracker::new(Some(&recorder), Some(100));

        tracker.start();
        tracker.advance(25);
        tracker.advance(25);
        tracker.advance(50);
        tracker.finish();

        assert_eq!(recorder.values(), vec![0.0, 25.0, 50.0, 100.0]);
    }

    #[test]
    fn test_progress_unknown_length_reports_only_endpoints() {
        let recorder = Recorder::default();
        let mut tracker = ProgressTracker::new(Some(&recorder), None);

        tracker.start();
        tracker.advance(1024);
        tracker.advance(2048);
        tracker.finish();

        assert_eq!(recorder.values(), vec![0.0, 100.0]);
    }

    #[test]
    fn test_progress_never_exceeds_100_when_server_lies_about_length() {
        let recorder = Recorder::default();
        let mut tracker = ProgressTracker::new(Some(&recorder), Some(10));

        tracker.start();
        tracker.advance(10);
        tracker.advance(10);
        tracker.finish();

        let values = recorder.values();
        assert!(values.iter().all(|&v| (0.0..=100.0).contains(&v)));
        assert_eq!(*values.last().unwrap(), 100.0);
    }

    #[test]
    fn test_progress_is_non_decreasing() {
        let recorder = Recorder::default();
        let mut tracker = ProgressTracker::new(Some(&recorder), Some(1000));

        tracker.start();
        for _ in 0..10 {
            tracker.advance(73);
        }
        tracker.finish();

        let values = recorder.values();
        assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(values[0], 0.0);
        assert_eq!(*values.last().unwrap(), 100.0);
    }

    #[test]
    fn test_progress_zero_length_total_skips_intermediates() {
        let recorder = Recorder::default();
        let mut tracker = ProgressTracker::new(Some(&recorder), Some(0));

        tracker.start();
        tracker.advance(5);
        tracker.finish();

        assert_eq!(recorder.values(), vec![0.0, 100.0]);
    }

    #[test]
    fn test_progress_without_sink_is_silent() {
        let mut tracker = ProgressTracker::new(None, Some(100));
        tracker.start();
        tracker.advance(100);
        tracker.finish();
        // Nothing to observe; just must not panic.
    }

    // ==================== Materialization Tests ====================

    #[tokio::test]
    async fn test_buffer_response_returns_body_and_metadata() {
        let response = reqwest::Response::from(
            http::Response::builder()
                .status(200)
                .header("content-type", "text/plain")
                .body(reqwest::Body::from("hello"))
                .unwrap(),
        );

        let cancel = CancellationToken::new();
        let result = buffer_response("http://example.test/x", response, &cancel)
            .await
            .unwrap();

        assert_eq!(result.status.as_u16(), 200);
        assert_eq!(result.content_type.as_deref(), Some("text/plain"));
        assert_eq!(&result.body[..], b"hello");
    }

    #[tokio::test]
    async fn test_buffer_response_cancelled_returns_cancelled() {
        // A body that never completes; cancellation must win the race.
        let body = reqwest::Body::wrap_stream(stream::pending::<Result<Bytes, Infallible>>());
        let response = reqwest::Response::from(
            http::Response::builder().status(200).body(body).unwrap(),
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = buffer_response("http://example.test/x", response, &cancel).await;
        assert!(matches!(result, Err(HttpError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_stream_to_temp_file_writes_body_and_reports_progress() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("download.tmp");

        let chunks: Vec<Result<Bytes, Infallible>> = vec![
            Ok(Bytes::from_static(b"0123456789")),
            Ok(Bytes::from_static(b"0123456789")),
        ];
        let response = response_with_body(
            Some(20),
            reqwest::Body::wrap_stream(stream::iter(chunks)),
        );

        let recorder = Recorder::default();
        let cancel = CancellationToken::new();
        let result = stream_to_temp_file(
            "http://example.test/file",
            response,
            &dest,
            Some(&recorder),
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(result.path, dest);
        assert_eq!(result.content_length, Some(20));
        assert_eq!(std::fs::read(&dest).unwrap(), b"01234567890123456789");

        let values = recorder.values();
        assert_eq!(values[0], 0.0);
        assert_eq!(*values.last().unwrap(), 100.0);
        assert!(values.contains(&50.0), "Expected 50.0 in: {values:?}");
        assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[tokio::test]
    async fn test_stream_to_temp_file_unknown_length_reports_endpoints_only() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("download.tmp");

        let chunks: Vec<Result<Bytes, Infallible>> =
            vec![Ok(Bytes::from_static(b"abc")), Ok(Bytes::from_static(b"def"))];
        let response =
            response_with_body(None, reqwest::Body::wrap_stream(stream::iter(chunks)));

        let recorder = Recorder::default();
        let cancel = CancellationToken::new();
        stream_to_temp_file(
            "http://example.test/file",
            response,
            &dest,
            Some(&recorder),
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(recorder.values(), vec![0.0, 100.0]);
        assert_eq!(std::fs::read(&dest).unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn test_stream_failure_deletes_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("download.tmp");

        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"partial data")),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "peer reset",
            )),
        ];
        let response =
            response_with_body(None, reqwest::Body::wrap_stream(stream::iter(chunks)));

        let cancel = CancellationToken::new();
        let result = stream_to_temp_file(
            "http://example.test/file",
            response,
            &dest,
            None,
            &cancel,
        )
        .await;

        assert!(result.is_err(), "stream error must fail the download");
        assert!(
            !dest.exists(),
            "partial temp file must be deleted after a stream failure"
        );
    }

    #[tokio::test]
    async fn test_cancellation_mid_stream_deletes_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("download.tmp");

        // One chunk, then a body that never ends. The progress sink
        // cancels the token as soon as the first chunk lands, so the next
        // loop iteration observes the cancellation.
        let first = stream::iter(vec![Ok::<Bytes, Infallible>(Bytes::from_static(
            b"0123456789",
        ))]);
        let body = reqwest::Body::wrap_stream(first.chain(stream::pending()));
        let response = response_with_body(Some(100), body);

        let cancel = CancellationToken::new();
        let cancel_on_progress = cancel.clone();
        let sink = move |percent: f64| {
            if percent > 0.0 {
                cancel_on_progress.cancel();
            }
        };

        let result = stream_to_temp_file(
            "http://example.test/file",
            response,
            &dest,
            Some(&sink),
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(HttpError::Cancelled { .. })));
        assert!(
            !dest.exists(),
            "partial temp file must not exist after cancellation"
        );
    }
}
