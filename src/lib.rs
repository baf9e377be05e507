//! Hostgate Core Library
//!
//! This library provides a managed outbound-HTTP layer for applications
//! that perform many concurrent downloads and API calls against external
//! hosts of varying reliability. It issues GET/POST requests, streams
//! large bodies to disk with progress reporting, bounds per-destination
//! concurrency via caller-supplied resource pools, and short-circuits
//! requests to hosts that have recently timed out.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`client`] - Request orchestration: host circuit breaker, request
//!   executor, response materialization, and the public facade
//!
//! The transport itself (connection pooling, DNS, TLS) is delegated to
//! `reqwest`; this layer only decides when and how to use it.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use client::{
    ClientConfig, HostKey, HostStateRegistry, HttpClientManager, HttpError, HttpResponse,
    ProgressSink, RequestOptions, TempFileResponse, encode_form,
};
