//! Bounded retry with exponential backoff, in the style of
//! `utils::backoff::exponential_backoff_duration_seconds` used throughout the
//! pageserver's background tasks — but bounded by a fixed attempt count
//! rather than retried forever, per `WORK_RETRIES`.

use std::future::Future;
use std::time::Duration;

use crate::error::RestError;

const BASE_BACKOFF_SECONDS: f64 = 0.5;
const MAX_BACKOFF_SECONDS: f64 = 10.0;

/// Computes the delay before retry attempt `attempt` (0-indexed), doubling
/// each time and capped at `MAX_BACKOFF_SECONDS`.
pub fn exponential_backoff_duration(attempt: u32) -> Duration {
    let seconds = (BASE_BACKOFF_SECONDS * 2f64.powi(attempt as i32)).min(MAX_BACKOFF_SECONDS);
    Duration::from_secs_f64(seconds)
}

/// Calls `op` up to `retries + 1` times, retrying only on
/// [`RestError::is_retryable`] errors, sleeping with exponential backoff
/// between attempts. `description` is used for log context only.
pub async fn with_retries<F, Fut, T>(retries: u32, description: &str, mut op: F) -> Result<T, RestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RestError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < retries && err.is_retryable() => {
                let wait = exponential_backoff_duration(attempt);
                tracing::warn!(
                    attempt,
                    retries,
                    error = %err,
                    "{description} failed, retrying in {wait:?}"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
