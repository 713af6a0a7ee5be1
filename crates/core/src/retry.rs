//! Shared exponential-backoff retry, used by every LLM-calling component so
//! the policy (§5: initial 2s, max 10s, up to 3 attempts) lives in one place
//! instead of being re-implemented at each call site.

use std::future::Future;
use std::time::Duration;

use crate::config::AppConfig;

/// Retry `f` up to `max_attempts` times with exponential backoff, doubling
/// from `initial_backoff` up to `max_backoff`. Returns the last error if
/// every attempt fails.
pub async fn retry_with_backoff<T, E, F, Fut>(
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut backoff = initial_backoff;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts {
                    return Err(err);
                }
                tracing::warn!(attempt, max_attempts, "call failed, retrying after backoff");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(max_backoff);
            }
        }
    }
}

/// Convenience wrapper reading attempt/backoff bounds from `AppConfig`.
pub async fn retry_with_config<T, E, F, Fut>(config: &AppConfig, f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with_backoff(
        config.retry_max_attempts,
        Duration::from_millis(config.retry_initial_backoff_ms),
        Duration::from_millis(config.retry_max_backoff_ms),
        f,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_with_backoff(
            3,
            Duration::from_millis(1),
            Duration::from_millis(5),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            },
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_with_backoff(
            3,
            Duration::from_millis(1),
            Duration::from_millis(5),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(7)
                    }
                }
            },
        )
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_retries_and_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_with_backoff(
            3,
            Duration::from_millis(1),
            Duration::from_millis(5),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("permanent") }
            },
        )
        .await;
        assert_eq!(result, Err("permanent"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
