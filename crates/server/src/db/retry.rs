//! Retry combinator with exponential backoff.

use std::fmt::Display;
use std::future::Future;

use sellerdesk_core::transaction::{Retryability, TransactionOptions};
use tracing::{debug, error, info, warn};

/// Run `op` until it succeeds, fails fatally, or the attempt budget in
/// `options` is spent.
///
/// `op` receives the 1-based attempt number. `classify` decides whether an
/// error is worth another attempt. Between attempts the task sleeps for
/// `options.delay_after(attempt)`. The last error is returned as-is.
pub async fn retry_with_backoff<T, E, Op, Fut, C>(
    options: &TransactionOptions,
    classify: C,
    mut op: Op,
) -> Result<T, E>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> Retryability,
    E: Display,
{
    let max_attempts = options.attempts();
    let mut attempt = 1;

    loop {
        debug!(attempt, max_attempts, "Starting attempt");

        let err = match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if classify(&err) == Retryability::Fatal {
            error!(attempt, error = %err, "Fatal error, not retrying");
            return Err(err);
        }
        if attempt >= max_attempts {
            error!(attempt, max_attempts, error = %err, "Retry budget exhausted");
            return Err(err);
        }

        let delay = options.delay_after(attempt);
        warn!(
            attempt,
            max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "Transient error, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    enum Failure {
        Transient,
        Permanent,
    }

    impl Display for Failure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn classify(err: &Failure) -> Retryability {
        match err {
            Failure::Transient => Retryability::Retryable,
            Failure::Permanent => Retryability::Fatal,
        }
    }

    fn options(max_retries: u32) -> TransactionOptions {
        TransactionOptions::default()
            .with_max_retries(max_retries)
            .with_initial_retry_delay(Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_error_uses_whole_budget_with_doubling_delays() {
        let start = Instant::now();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let result: Result<(), Failure> = retry_with_backoff(&options(4), classify, |attempt| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().push((attempt, start.elapsed()));
                Err(Failure::Transient)
            }
        })
        .await;

        assert_eq!(result, Err(Failure::Transient));
        let seen = seen.lock().unwrap();
        let attempts: Vec<u32> = seen.iter().map(|(n, _)| *n).collect();
        assert_eq!(attempts, vec![1, 2, 3, 4]);

        // Attempts start at 0, d, d+2d, d+2d+4d
        let offsets: Vec<u128> = seen.iter().map(|(_, at)| at.as_millis()).collect();
        assert_eq!(offsets, vec![0, 100, 300, 700]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_attempts_once() {
        let calls = Arc::new(Mutex::new(0_u32));

        let result: Result<(), Failure> = retry_with_backoff(&options(5), classify, |_| {
            let calls = Arc::clone(&calls);
            async move {
                *calls.lock().unwrap() += 1;
                Err(Failure::Permanent)
            }
        })
        .await;

        assert_eq!(result, Err(Failure::Permanent));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let result = retry_with_backoff(&options(3), classify, |attempt| async move {
            if attempt < 3 {
                Err(Failure::Transient)
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert_eq!(result, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cap_bounds_delays() {
        let start = Instant::now();
        let capped = options(4).with_max_retry_delay(Duration::from_millis(150));

        let _: Result<(), Failure> =
            retry_with_backoff(&capped, classify, |_| async { Err(Failure::Transient) }).await;

        // 100 + 150 + 150
        assert_eq!(start.elapsed().as_millis(), 400);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_after_transient_stops_immediately() {
        let result: Result<(), Failure> = retry_with_backoff(&options(5), classify, |attempt| async move {
            if attempt == 1 {
                Err(Failure::Transient)
            } else {
                Err(Failure::Permanent)
            }
        })
        .await;

        assert_eq!(result, Err(Failure::Permanent));
    }
}
