// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff and cancellable polling.
//!
//! This module provides utilities for retrying transient Cloud DNS errors (429, 5xx,
//! transport failures) with exponential backoff, while failing fast on permanent errors
//! (4xx client errors). It also provides the bounded polling loop used both for pod IP
//! resolution and for waiting on Cloud DNS changes. Every wait observes the shutdown token.

use crate::dns_errors::DnsApiError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Initial retry interval for Cloud DNS calls (50ms)
const DNS_INITIAL_INTERVAL_MILLIS: u64 = 50;

/// Maximum interval between Cloud DNS retries (10 seconds)
const DNS_MAX_INTERVAL_SECS: u64 = 10;

/// Maximum total time to spend retrying a Cloud DNS call (2 minutes)
const DNS_MAX_ELAPSED_TIME_SECS: u64 = 120;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter) to prevent thundering herd.
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Initial interval duration
    pub initial_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Maximum total elapsed time
    pub max_elapsed_time: Option<Duration>,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
    /// Start time for tracking total elapsed time
    start_time: Instant,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with specified parameters.
    #[must_use]
    pub fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            max_elapsed_time,
            multiplier,
            randomization_factor,
            start_time: Instant::now(),
        }
    }

    /// Get the next backoff interval, or None if max elapsed time exceeded.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max_elapsed) = self.max_elapsed_time {
            if self.start_time.elapsed() >= max_elapsed {
                return None;
            }
        }

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

        let jittered = rand::rng().random_range(min..=max);

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Create exponential backoff configuration for Cloud DNS API retries.
///
/// # Configuration
///
/// - **Initial interval**: 50ms
/// - **Max interval**: 10 seconds
/// - **Max elapsed time**: 2 minutes total
/// - **Multiplier**: 2.0 (exponential growth)
/// - **Randomization**: ±10% (prevents thundering herd)
///
/// # Retry Schedule
///
/// With these settings, retries occur at approximately:
///
/// 1. 50ms
/// 2. 100ms
/// 3. 200ms
/// 4. 400ms
/// 5. 800ms
/// 6. 1.6s
/// 7. 3.2s
/// 8. 6.4s
/// 9. 10s (capped at max interval)
///    10-20. 10s intervals until 2 minutes elapsed
#[must_use]
pub fn dns_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(DNS_INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(DNS_MAX_INTERVAL_SECS),
        Some(Duration::from_secs(DNS_MAX_ELAPSED_TIME_SECS)),
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Sleep for `duration` unless shutdown is requested first.
///
/// Returns `false` if the sleep was interrupted by cancellation.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}

/// Retry a Cloud DNS call with exponential backoff.
///
/// Automatically retries on transient errors (HTTP 429, 5xx, transport failures) and
/// fails immediately on permanent errors (4xx client errors, conflicts, bad credentials).
///
/// # Arguments
///
/// * `operation` - Async function that performs the API call
/// * `operation_name` - Human-readable name for logging (e.g., "list rrsets")
/// * `cancel` - Shutdown token; backoff sleeps end early when it fires
///
/// # Errors
///
/// Returns the last error if it is not retryable, if the backoff budget is exhausted,
/// or [`DnsApiError::Cancelled`] if shutdown interrupts a backoff sleep.
pub async fn retry_dns_call<T, F, Fut>(
    mut operation: F,
    operation_name: &str,
    cancel: &CancellationToken,
) -> Result<T, DnsApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DnsApiError>>,
{
    let mut backoff = dns_backoff();
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
                        "Cloud DNS call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                if !e.is_retryable() {
                    if !e.is_conflict() {
                        error!(
                            operation = operation_name,
                            error = %e,
                            "Non-retryable Cloud DNS error, failing immediately"
                        );
                    }
                    return Err(e);
                }

                if let Some(duration) = backoff.next_backoff() {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        retry_after = ?duration,
                        error = %e,
                        "Retryable Cloud DNS error, will retry"
                    );
                    if !sleep_or_cancel(duration, cancel).await {
                        return Err(DnsApiError::Cancelled);
                    }
                } else {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        error = %e,
                        "Backoff exhausted, giving up"
                    );
                    return Err(e);
                }
            }
        }
    }
}

/// Result of [`poll_until`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The check produced a value
    Ready(T),
    /// The deadline passed without a value
    TimedOut,
    /// Shutdown was requested while waiting
    Cancelled,
}

/// Call `check` every `interval` until it yields a value, the optional `timeout`
/// elapses, or shutdown is requested.
///
/// The first check runs after one interval, matching how a freshly created pod or a
/// freshly submitted change needs a moment before it can be observed in its new state.
pub async fn poll_until<T, F, Fut>(
    interval: Duration,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
    mut check: F,
) -> PollOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = timeout.map(|t| Instant::now() + t);

    loop {
        let wait = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return PollOutcome::TimedOut;
                }
                interval.min(remaining)
            }
            None => interval,
        };

        if !sleep_or_cancel(wait, cancel).await {
            return PollOutcome::Cancelled;
        }

        if let Some(value) = check().await {
            return PollOutcome::Ready(value);
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
