// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff for live DNS lookups.
//!
//! SOA discovery talks to resolvers that can drop packets or time out. A
//! small, bounded number of attempts with jittered exponential backoff smooths
//! over that without letting a single job hang. Permanent errors fail fast.

use crate::constants::{
    SOA_DISCOVERY_INITIAL_BACKOFF_MILLIS, SOA_DISCOVERY_MAX_ATTEMPTS,
    SOA_DISCOVERY_MAX_BACKOFF_SECS,
};
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Simple exponential backoff with a cap on the number of attempts.
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Initial interval duration
    pub initial_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
    attempts: u32,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with specified parameters.
    #[must_use]
    pub fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_attempts: u32,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            max_attempts,
            multiplier,
            randomization_factor,
            attempts: 1,
        }
    }

    /// Get the delay before the next attempt, or None once the budget is spent.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;

        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(jittered)
    }

    /// Apply randomization (jitter) to an interval.
    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let min = secs - delta;
        let max = secs + delta;

        let mut rng = rand::thread_rng();
        let jittered = rng.gen_range(min..=max);

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Backoff used for SOA discovery.
///
/// # Retry Schedule
///
/// With the default constants, attempts happen at approximately:
///
/// 1. immediately
/// 2. +200ms
/// 3. +400ms
///
/// after which discovery gives up and the authority is treated as unknown.
#[must_use]
pub fn soa_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(SOA_DISCOVERY_INITIAL_BACKOFF_MILLIS),
        Duration::from_secs(SOA_DISCOVERY_MAX_BACKOFF_SECS),
        SOA_DISCOVERY_MAX_ATTEMPTS,
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Retry an async operation with the given backoff.
///
/// `is_retryable` decides per error whether another attempt makes sense;
/// non-retryable errors are returned immediately.
///
/// # Errors
///
/// Returns the last error once the backoff is exhausted or a non-retryable
/// error is encountered.
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut backoff: ExponentialBackoff,
    operation_name: &str,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let start_time = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "Operation succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                if !is_retryable(&e) {
                    debug!(
                        operation = operation_name,
                        error = %e,
                        "Non-retryable error, failing immediately"
                    );
                    return Err(e);
                }

                if let Some(duration) = backoff.next_backoff() {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        retry_after = ?duration,
                        error = %e,
                        "Retryable error, will retry"
                    );
                    tokio::time::sleep(duration).await;
                } else {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        error = %e,
                        "Retry budget exhausted, giving up"
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
