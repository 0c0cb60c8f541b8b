//! Test doubles shared by the launcher tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::StatusCode;

use super::downloader::Fetcher;
use crate::backend::utils::file_utils::sha1_hex;
use crate::utils::error::{AttemptError, FetchError};

/// Serves canned bodies by URL and counts every fetch.
#[derive(Default)]
pub struct MemoryFetcher {
    bodies: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
    fetched: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_string(), body.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        expected_sha1: Option<&str>,
    ) -> Result<(), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.fetched.lock().unwrap().push(url.to_string());

        let exhausted = |cause| FetchError::Exhausted {
            url: url.to_string(),
            attempts: 1,
            last_cause: cause,
        };

        let body = self
            .bodies
            .get(url)
            .ok_or_else(|| exhausted(AttemptError::Status(StatusCode::NOT_FOUND)))?;

        if let Some(expected) = expected_sha1 {
            let actual = sha1_hex(body);
            if actual != expected {
                return Err(exhausted(AttemptError::HashMismatch {
                    expected: expected.to_string(),
                    actual,
                }));
            }
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| exhausted(e.into()))?;
        }
        tokio::fs::write(destination, body)
            .await
            .map_err(|e| exhausted(e.into()))
    }
}
