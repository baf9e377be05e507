//! Request orchestration for outbound HTTP.
//!
//! This module provides the [`HttpClientManager`], a facade over an opaque
//! HTTP transport that adds per-host circuit breaking, caller-supplied
//! concurrency pools, unified failure classification, and response
//! materialization (buffered or streamed to a temp file with progress).
//!
//! # Overview
//!
//! Every request runs the same admission pipeline: validate, consult the
//! per-(host, compression) circuit breaker, acquire a resource-pool slot if
//! one was supplied, re-check the breaker, then send with a fixed
//! per-attempt timeout. Failures from any path funnel through a single
//! classifier so that a timeout observed anywhere opens the breaker for
//! that host.
//!
//! # Example
//!
//! ```no_run
//! use hostgate::{ClientConfig, HttpClientManager, RequestOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = HttpClientManager::new(ClientConfig::default());
//! let response = manager
//!     .get(RequestOptions::new("https://example.com/api/items"))
//!     .await?;
//! println!("{} bytes", response.body.len());
//! # Ok(())
//! # }
//! ```

mod classify;
mod config;
mod constants;
mod error;
mod host_state;
mod manager;
mod materialize;
mod options;

pub use config::ClientConfig;
pub use constants::{BAN_WINDOW_SECS, REQUEST_TIMEOUT_SECS};
pub use error::HttpError;
pub use host_state::{HostKey, HostStateRegistry, host_for_url};
pub use manager::HttpClientManager;
pub use materialize::{HttpResponse, TempFileResponse};
pub use options::{ProgressSink, RequestOptions, encode_form};

// No module-local Result aliases; signatures spell out `Result<T, HttpError>`.
