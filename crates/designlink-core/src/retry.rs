//! Retry with exponential backoff
//!
//! Wraps one fallible transport exchange. Only errors that
//! `TransportError::is_retryable` accepts are retried; the wait between
//! attempts comes from `RetryPolicy::delay_for` and is interruptible by the
//! call's cancellation token.

use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::TransportError;

/// Outcome of a retried operation
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    /// Attempts beyond the first
    pub retries: u32,
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent. The last error is returned on exhaustion.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<Retried<T>, TransportError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    retries: attempt - 1,
                })
            }
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "Attempt {}/{} failed: {} (retrying in {}ms)",
                    attempt,
                    max_attempts,
                    err,
                    delay.as_millis()
                );

                tokio::select! {
                    _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
            Err(err) => {
                debug!("Giving up after attempt {}: {}", attempt, err);
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        let calls = Arc::new(AtomicU32::new(0));
        let started = tokio::time::Instant::now();

        let result: Result<Retried<()>, _> =
            retry_with_backoff(&policy, &CancellationToken::new(), |_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(TransportError::ServerUnavailable("down".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(TransportError::ServerUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s after attempt 1, 2s after attempt 2
        assert_eq!(started.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_and_counts_retries() {
        let policy = RetryPolicy::default();
        let result = retry_with_backoff(&policy, &CancellationToken::new(), |attempt| async move {
            if attempt < 2 {
                Err(TransportError::Timeout(Duration::from_secs(1)))
            } else {
                Ok("done")
            }
        })
        .await
        .unwrap();

        assert_eq!(result.value, "done");
        assert_eq!(result.retries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<Retried<()>, _> = retry_with_backoff(
            &RetryPolicy::default(),
            &CancellationToken::new(),
            |_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(TransportError::AuthenticationFailed)
                }
            },
        )
        .await;

        assert_eq!(result.unwrap_err(), TransportError::AuthenticationFailed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let result: Result<Retried<()>, _> =
            retry_with_backoff(&RetryPolicy::default(), &cancel, |_| async {
                Err(TransportError::ServerUnavailable("down".into()))
            })
            .await;

        assert_eq!(result.unwrap_err(), TransportError::Cancelled);
    }
}
