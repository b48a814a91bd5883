// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the retry policy.

use reqwest::StatusCode;
use std::time::Duration;

use super::*;

#[test]
fn test_retryable_statuses() {
    assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
    assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
    assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
    assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
    assert!(is_retryable_status(StatusCode::GATEWAY_TIMEOUT));
}

#[test]
fn test_client_errors_are_not_retryable() {
    assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
    assert!(!is_retryable_status(StatusCode::FORBIDDEN));
    assert!(!is_retryable_status(StatusCode::NOT_FOUND));
    assert!(!is_retryable_status(StatusCode::OK));
}

#[test]
fn test_backoff_intervals_grow_exponentially() {
    let mut backoff = http_backoff();

    let first = backoff.next_backoff().unwrap();
    let second = backoff.next_backoff().unwrap();
    let third = backoff.next_backoff().unwrap();

    // Each interval roughly doubles; jitter is within ±10%.
    assert!(first >= Duration::from_millis(180) && first <= Duration::from_millis(220));
    assert!(second >= Duration::from_millis(360) && second <= Duration::from_millis(440));
    assert!(third >= Duration::from_millis(720) && third <= Duration::from_millis(880));
}

#[test]
fn test_backoff_is_capped_at_max_interval() {
    let mut backoff = http_backoff();

    let mut last = Duration::ZERO;
    for _ in 0..12 {
        if let Some(interval) = backoff.next_backoff() {
            last = interval;
        }
    }

    assert!(last <= Duration::from_secs(33));
}
