//! The Calendar writer's own append retry policy, distinct from the
//! lock service's re-acquisition backoff: up to 15 attempts, geometric
//! with a 250ms base and a 1.2x growth factor per attempt.

use std::time::Duration;

/// Attempts before giving up and re-queuing the tick's work at the head of
/// the inbound queue.
pub const MAX_ATTEMPTS: u32 = 15;
const BASE_MS: f64 = 250.0;
const FACTOR: f64 = 1.2;

/// The delay before retry attempt `attempt` (0-indexed).
pub fn delay(attempt: u32) -> Duration {
    let ms = BASE_MS * FACTOR.powi(attempt as i32);
    Duration::from_millis(ms.round() as u64)
}

/// Runs `f` up to [`MAX_ATTEMPTS`] times, sleeping [`delay`] between
/// attempts, returning the last error if every attempt fails.
pub async fn with_retry<T, E, F, Fut>(mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempt += 1;
                if attempt >= MAX_ATTEMPTS {
                    return Err(e);
                }
                tokio::time::sleep(delay(attempt - 1)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_geometrically() {
        assert_eq!(delay(0), Duration::from_millis(250));
        assert!(delay(1) > delay(0));
        assert!(delay(14) > delay(1));
    }

    #[tokio::test]
    async fn with_retry_gives_up_after_max_attempts() {
        let mut calls = 0u32;
        let result: Result<(), &str> = with_retry(|| {
                calls += 1;
                async { Err("nope") }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn with_retry_returns_first_success() {
        let mut calls = 0u32;
        let result = with_retry(|| {
                calls += 1;
                async move {
                    if calls < 3 {
                        Err("retry me")
                    } else {
                        Ok(42)
                    }
                }
        })
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls, 3);
    }
}
