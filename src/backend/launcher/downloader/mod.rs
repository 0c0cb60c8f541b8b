//! Artifact fetching.
//!
//! A [`Fetcher`] moves one URL onto one local path. The HTTP implementation
//! retries with exponential backoff and never leaves a partial file at the
//! destination.

/// HTTP downloader implementation.
pub mod main;
/// Retry policy and backoff loop.
pub mod retry;

pub use main::{Fetcher, HttpDownloader, fetch_json, read_json};
pub use retry::{Retried, RetryPolicy, with_retry};
