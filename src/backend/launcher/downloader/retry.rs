//! Retry logic with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::utils::error::{AttemptError, FetchError};

/// How many times a download is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero behaves like one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Wait after the given failed attempt (1-based): `base * 2^(attempt-1)`, capped.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        self.base_delay
            .saturating_mul(2_u32.pow(exponent))
            .min(self.max_delay)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Successful result of [`with_retry`] together with the waits it took.
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    pub delays: Vec<Duration>,
}

/// Execute an operation with retry logic and exponential backoff.
///
/// `operation` receives the 1-based attempt number. Cancellation is observed
/// before every retry and while sleeping; an attempt already in flight is
/// allowed to finish.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    url: &str,
    mut operation: F,
) -> Result<Retried<T>, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let max_attempts = policy.attempts();
    let mut delays = Vec::new();
    let mut attempt = 1;

    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled { url: url.to_string() });
        }

        let cause = match operation(attempt).await {
            Ok(value) => return Ok(Retried { value, delays }),
            Err(cause) => cause,
        };

        if attempt >= max_attempts {
            warn!("Giving up on {url} after {attempt} attempt(s): {cause}");
            return Err(FetchError::Exhausted {
                url: url.to_string(),
                attempts: attempt,
                last_cause: cause,
            });
        }

        let delay = policy.delay_after(attempt);
        debug!(
            "Attempt {attempt}/{max_attempts} for {url} failed ({cause}), retrying in {delay:?}"
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(FetchError::Cancelled { url: url.to_string() });
            }
            _ = tokio::time::sleep(delay) => {}
        }

        delays.push(delay);
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        }
    }

    fn unavailable() -> AttemptError {
        AttemptError::Status(StatusCode::SERVICE_UNAVAILABLE)
    }

    #[test]
    fn backoff_doubles_and_is_capped() {
        let policy = policy(10);
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        assert_eq!(policy.delay_after(5), Duration::from_secs(1));
        assert_eq!(policy.delay_after(60), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn third_attempt_succeeds_after_two_backoffs() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("client.jar");
        let calls = AtomicU32::new(0);

        let outcome = with_retry(&policy(3), &CancellationToken::new(), "https://x/a", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            let target = target.clone();
            async move {
                if attempt < 3 {
                    return Err(unavailable());
                }
                tokio::fs::write(&target, b"jar").await?;
                Ok(attempt)
            }
        })
        .await
        .unwrap();

        assert_eq!(outcome.value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            outcome.delays,
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
        assert!(target.is_file());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_reports_attempts_and_last_cause() {
        let err = with_retry(&policy(2), &CancellationToken::new(), "https://x/b", |_| async {
            Err::<(), _>(unavailable())
        })
        .await
        .unwrap_err();

        match err {
            FetchError::Exhausted {
                url,
                attempts,
                last_cause,
            } => {
                assert_eq!(url, "https://x/b");
                assert_eq!(attempts, 2);
                assert!(matches!(last_cause, AttemptError::Status(s) if s == StatusCode::SERVICE_UNAVAILABLE));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_before_the_next_attempt() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let err = with_retry(&policy(5), &cancel, "https://x/c", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            cancel.cancel();
            async { Err::<(), _>(unavailable()) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, FetchError::Cancelled { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let outcome = with_retry(&policy(0), &CancellationToken::new(), "https://x/d", |_| async {
            Ok::<_, AttemptError>("ok")
        })
        .await
        .unwrap();
        assert_eq!(outcome.value, "ok");
        assert!(outcome.delays.is_empty());
    }
}
