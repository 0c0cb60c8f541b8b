//! HTTP downloader with retries and file verification.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use sha1::{Digest, Sha1};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::retry::{RetryPolicy, with_retry};
use crate::backend::utils::file_utils::{
    ensure_parent_directory, partial_path, remove_file_if_exists,
};
use crate::utils::error::{AttemptError, FetchError};

const USER_AGENT: &str = concat!("CatClient/", env!("CARGO_PKG_VERSION"));

/// Puts the resource at `url` onto disk at `destination`.
///
/// Implementations either leave a complete file at `destination` or leave it
/// untouched. When `expected_sha1` is given the written bytes must hash to it.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        expected_sha1: Option<&str>,
    ) -> Result<(), FetchError>;
}

/// [`Fetcher`] over HTTP(S).
pub struct HttpDownloader {
    client: Client,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl HttpDownloader {
    /// Creates a new HTTP downloader with configured timeouts.
    pub fn new(policy: RetryPolicy, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            policy,
            cancel: CancellationToken::new(),
        })
    }

    /// Shares `cancel` with the caller; cancelling it stops pending retries.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// One attempt: stream into `<destination>.part`, verify, rename.
    async fn download_once(
        &self,
        url: &str,
        destination: &Path,
        expected_sha1: Option<&str>,
    ) -> Result<(), AttemptError> {
        ensure_parent_directory(destination).await?;
        let partial = partial_path(destination);

        let result = match self.stream_to(url, &partial, expected_sha1).await {
            Ok(()) => tokio::fs::rename(&partial, destination)
                .await
                .map_err(AttemptError::from),
            Err(e) => Err(e),
        };
        if result.is_err()
            && let Err(cleanup) = remove_file_if_exists(&partial).await
        {
            warn!("Could not remove {partial:?}: {cleanup}");
        }
        result
    }

    async fn stream_to(
        &self,
        url: &str,
        partial: &Path,
        expected_sha1: Option<&str>,
    ) -> Result<(), AttemptError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status));
        }

        let mut file = File::create(partial).await?;
        let mut stream = response.bytes_stream();
        let mut hasher = expected_sha1.map(|_| Sha1::new());

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            if let Some(hasher) = hasher.as_mut() {
                hasher.update(&chunk);
            }
        }

        file.flush().await?;
        drop(file);

        if let (Some(expected), Some(hasher)) = (expected_sha1, hasher) {
            let actual = hex::encode(hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(AttemptError::HashMismatch {
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Fetcher for HttpDownloader {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        expected_sha1: Option<&str>,
    ) -> Result<(), FetchError> {
        debug!("Downloading {url} to {destination:?}");
        let outcome = with_retry(&self.policy, &self.cancel, url, move |_| {
            self.download_once(url, destination, expected_sha1)
        })
        .await?;

        if !outcome.delays.is_empty() {
            debug!(
                "Downloaded {url} after {} retr(ies)",
                outcome.delays.len()
            );
        }
        Ok(())
    }
}

/// Fetches a JSON document to `destination` and parses it.
///
/// Generic over the caller's error so resolver and installer can keep their
/// own error types.
pub async fn fetch_json<T, E>(
    fetcher: &dyn Fetcher,
    url: &str,
    destination: &Path,
    expected_sha1: Option<&str>,
) -> Result<T, E>
where
    T: DeserializeOwned,
    E: From<FetchError> + From<std::io::Error> + From<serde_json::Error>,
{
    fetcher.fetch(url, destination, expected_sha1).await?;
    read_json(destination).await
}

/// Reads and parses a JSON file.
pub async fn read_json<T, E>(path: &Path) -> Result<T, E>
where
    T: DeserializeOwned,
    E: From<std::io::Error> + From<serde_json::Error>,
{
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
