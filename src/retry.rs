use std::fmt::{Debug, Display};
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug, Error)]
#[error("gave up after {attempts} attempts, last error: {last_error}")]
pub struct RetriesExhausted<E>
where
    E: Display + Debug,
{
    pub attempts: u32,
    pub last_error: E,
}

/// Runs an operation up to `attempts` times, sleeping between tries and
/// doubling the sleep each time. Returns the first success immediately, or
/// the last error wrapped with the spent attempt budget. Carries no state
/// across invocations.
pub async fn retry_with_backoff<T, E, F, Fut>(
    attempts: u32,
    initial_backoff: Duration,
    mut operation: F,
) -> Result<T, RetriesExhausted<E>>
where
    E: Display + Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut backoff = initial_backoff;
    let mut last_error = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            sleep(backoff).await;
            backoff *= 2;
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                debug!(%err, attempt, "attempt failed");
                last_error = Some(err);
            }
        }
    }

    Err(RetriesExhausted {
        attempts,
        last_error: last_error.expect("expect a non-zero attempt budget"),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use anyhow::{anyhow, Result};

    use super::*;

    #[tokio::test]
    async fn first_success_returns_immediately_test() {
        let mut calls = 0;
        let result: Result<i32, RetriesExhausted<anyhow::Error>> =
            retry_with_backoff(3, Duration::from_millis(1), || {
                calls += 1;
                async { Ok(7) }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn recovers_from_transient_failure_test() {
        let mut calls = 0;
        let result = retry_with_backoff(2, Duration::from_millis(1), || {
            calls += 1;
            let succeed = calls > 1;
            async move {
                if succeed {
                    Ok::<_, anyhow::Error>("ok")
                } else {
                    Err(anyhow!("transient"))
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn exhausted_attempts_wrap_last_error_test() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with_backoff(2, Duration::from_millis(1), || {
            calls += 1;
            let call = calls;
            async move { Err::<(), _>(anyhow!("failure {call}")) }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(calls, 2);
        assert_eq!(err.attempts, 2);
        assert!(err.to_string().contains("gave up after 2 attempts"));
        assert!(err.to_string().contains("failure 2"));
    }

    #[tokio::test]
    async fn backoff_doubles_between_attempts_test() {
        let started_on = Instant::now();
        let result: Result<(), _> = retry_with_backoff(3, Duration::from_millis(10), || async {
            Err::<(), _>(anyhow!("nope"))
        })
        .await;

        assert!(result.is_err());
        // 10ms before the second attempt, 20ms before the third.
        assert!(started_on.elapsed() >= Duration::from_millis(30));
    }
}
