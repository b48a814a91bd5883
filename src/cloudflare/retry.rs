// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry policy for Cloudflare API calls.
//!
//! Transient failures (HTTP 429, 5xx, connection resets) are retried with
//! exponential backoff and jitter; client errors fail fast and surface to the
//! reconcile loop, where the watch framework's own backoff takes over.

use rand::Rng;
use reqwest::StatusCode;
use std::time::{Duration, Instant};

/// Initial retry interval (200ms).
const INITIAL_INTERVAL_MILLIS: u64 = 200;

/// Maximum interval between retries (30 seconds).
const MAX_INTERVAL_SECS: u64 = 30;

/// Maximum total time spent retrying one call (2 minutes).
const MAX_ELAPSED_TIME_SECS: u64 = 120;

/// Backoff multiplier (exponential growth factor).
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%).
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Simple exponential backoff with jitter.
pub struct ExponentialBackoff {
    current_interval: Duration,
    max_interval: Duration,
    max_elapsed_time: Duration,
    start_time: Instant,
}

impl ExponentialBackoff {
    /// Get the next backoff interval, or `None` once the elapsed-time budget
    /// is spent.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.start_time.elapsed() >= self.max_elapsed_time {
            return None;
        }

        let interval = self.current_interval;
        let jittered = apply_jitter(interval);

        let next = interval.as_secs_f64() * BACKOFF_MULTIPLIER;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(jittered)
    }
}

fn apply_jitter(interval: Duration) -> Duration {
    let secs = interval.as_secs_f64();
    let delta = secs * RANDOMIZATION_FACTOR;

    let mut rng = rand::thread_rng();
    let jittered = rng.gen_range((secs - delta)..=(secs + delta));

    Duration::from_secs_f64(jittered.max(0.0))
}

/// Backoff configuration for Cloudflare API retries.
///
/// Retries occur at approximately 200ms, 400ms, 800ms, ... capped at 30s
/// intervals, until 2 minutes have elapsed.
#[must_use]
pub fn http_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        current_interval: Duration::from_millis(INITIAL_INTERVAL_MILLIS),
        max_interval: Duration::from_secs(MAX_INTERVAL_SECS),
        max_elapsed_time: Duration::from_secs(MAX_ELAPSED_TIME_SECS),
        start_time: Instant::now(),
    }
}

/// Whether an HTTP status indicates a transient error worth retrying.
///
/// Retryable: 429 (rate limit), 500, 502, 503, 504.
#[must_use]
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Whether a transport-level error is worth retrying (connection reset,
/// timeout, interrupted body).
#[must_use]
pub fn is_retryable_transport_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout() || err.is_body() || err.is_request()
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
