// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `retry.rs`

#[cfg(test)]
mod tests {
    use super::super::{retry_with_backoff, soa_backoff, ExponentialBackoff};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_backoff(max_attempts: u32) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(1),
            Duration::from_millis(4),
            max_attempts,
            2.0,
            0.0,
        )
    }

    /// Test that backoff configuration has expected values
    #[test]
    fn test_soa_backoff_configuration() {
        let backoff = soa_backoff();

        assert_eq!(backoff.initial_interval, Duration::from_millis(200));
        assert_eq!(backoff.max_interval, Duration::from_secs(2));
        assert_eq!(backoff.max_attempts, 3);

        #[allow(clippy::float_cmp)]
        {
            assert_eq!(backoff.multiplier, 2.0);
            assert_eq!(backoff.randomization_factor, 0.1);
        }
    }

    /// Test that the attempt budget bounds the number of delays handed out
    #[test]
    fn test_backoff_budget_is_bounded() {
        let mut backoff = fast_backoff(3);

        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(1)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(2)));
        assert_eq!(backoff.next_backoff(), None);
        assert_eq!(backoff.next_backoff(), None);
    }

    /// Test that intervals are capped at the maximum
    #[test]
    fn test_backoff_interval_capped() {
        let mut backoff = fast_backoff(10);
        let delays: Vec<Duration> = std::iter::from_fn(|| backoff.next_backoff()).collect();

        assert_eq!(delays.len(), 9);
        assert!(delays.iter().all(|d| *d <= Duration::from_millis(4)));
    }

    /// Test that jitter stays within ±10%
    #[test]
    fn test_jitter_within_bounds() {
        for _ in 0..50 {
            let mut backoff = soa_backoff();
            let delay = backoff.next_backoff().unwrap();
            assert!(delay >= Duration::from_millis(180));
            assert!(delay <= Duration::from_millis(220));
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_errors() {
        let calls = AtomicU32::new(0);

        let result: Result<u32, String> = retry_with_backoff(
            fast_backoff(3),
            "test",
            |_| true,
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("attempt {n} failed"))
                } else {
                    Ok(n)
                }
            },
        )
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_budget() {
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = retry_with_backoff(
            fast_backoff(3),
            "test",
            |_| true,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("still failing".to_string())
            },
        )
        .await;

        assert_eq!(result, Err("still failing".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_fails_fast_on_permanent_error() {
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = retry_with_backoff(
            fast_backoff(5),
            "test",
            |e: &String| !e.starts_with("permanent"),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("permanent failure".to_string())
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
