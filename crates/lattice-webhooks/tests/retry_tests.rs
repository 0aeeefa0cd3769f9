//! Integration tests for retry scheduling and exhaustion.
//!
//! Tests verify the backoff schedule, eventual success after failures, and
//! that no retry is scheduled once attempts are exhausted.

#![cfg(feature = "integration")]

mod common;

use common::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

use lattice_webhooks::worker::{calculate_next_retry_at, DEFAULT_MAX_ATTEMPTS};

/// Test: a 5xx response leaves a retry on the schedule.
#[tokio::test]
async fn test_retry_scheduled_after_5xx() {
    let mock_server = MockServer::start().await;
    let capture = CaptureResponder::with_status(500);

    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(capture.clone())
        .mount(&mock_server)
        .await;

    let client = TestWebhookClient::new();
    let payload = project_created_payload(ORG_A);
    let url = format!("{}/webhook", mock_server.uri());

    let response = client.deliver(&url, &payload, None).await.unwrap();

    assert_eq!(response.status().as_u16(), 500);
    assert_eq!(capture.request_count(), 1);

    // After one failed attempt the coordinator schedules a retry.
    let next = calculate_next_retry_at(1, DEFAULT_MAX_ATTEMPTS);
    assert!(next.is_some(), "First failure should schedule a retry");
}

/// Test: backoff schedule follows 60s, 5min, 30min, 2hr, 24hr.
#[tokio::test]
async fn test_backoff_schedule() {
    let expected_delays = [60i64, 300, 1800, 7200, 86400];

    for (i, expected) in expected_delays.iter().enumerate() {
        let attempts_made = (i + 1) as i32;
        let next = calculate_next_retry_at(attempts_made, DEFAULT_MAX_ATTEMPTS)
            .unwrap_or_else(|| panic!("attempt {attempts_made} should schedule a retry"));

        let delay = (next - chrono::Utc::now()).num_seconds();
        assert!(
            (delay - expected).abs() <= 2,
            "attempt {attempts_made}: expected ~{expected}s delay, got {delay}s"
        );
    }
}

/// Test: success after transient failures stops the retry loop.
#[tokio::test]
async fn test_eventual_success_stops_retries() {
    let mock_server = MockServer::start().await;
    let failing = FailingResponder::fail_times(2);

    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(failing.clone())
        .mount(&mock_server)
        .await;

    let client = TestWebhookClient::new();
    let payload = project_created_payload(ORG_A);
    let url = format!("{}/webhook", mock_server.uri());

    let response1 = client.deliver(&url, &payload, None).await.unwrap();
    assert_eq!(response1.status().as_u16(), 500);

    let response2 = client.deliver(&url, &payload, None).await.unwrap();
    assert_eq!(response2.status().as_u16(), 500);

    let response3 = client.deliver(&url, &payload, None).await.unwrap();
    assert!(response3.status().is_success());

    assert_eq!(failing.attempt_count(), 3);
}

/// Test: exhaustion happens exactly at max_attempts, never before or after.
#[tokio::test]
async fn test_exhaustion_exactly_at_max_attempts() {
    assert!(
        calculate_next_retry_at(DEFAULT_MAX_ATTEMPTS - 1, DEFAULT_MAX_ATTEMPTS).is_some(),
        "One attempt before the limit should still allow a retry"
    );
    assert!(
        calculate_next_retry_at(DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_ATTEMPTS).is_none(),
        "Reaching the limit must not schedule more retries"
    );
    assert!(
        calculate_next_retry_at(DEFAULT_MAX_ATTEMPTS + 1, DEFAULT_MAX_ATTEMPTS).is_none(),
        "Past the limit must not schedule more retries"
    );
}

/// Test: a custom max_attempts configuration is respected.
#[tokio::test]
async fn test_custom_max_attempts() {
    let max_attempts = 3;

    assert!(calculate_next_retry_at(1, max_attempts).is_some());
    assert!(calculate_next_retry_at(2, max_attempts).is_some());
    assert!(calculate_next_retry_at(3, max_attempts).is_none());
}

/// Test: retried requests carry the same event id, so receivers can dedupe.
#[tokio::test]
async fn test_retried_requests_share_event_id() {
    let mock_server = MockServer::start().await;
    let capture = CaptureResponder::with_status(503);

    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(capture.clone())
        .mount(&mock_server)
        .await;

    let client = TestWebhookClient::new();
    let payload = project_created_payload(ORG_A);
    let url = format!("{}/webhook", mock_server.uri());

    // The worker re-sends the stored envelope on retry; simulate two
    // attempts of the same delivery.
    client.deliver(&url, &payload, Some(SECRET_1)).await.unwrap();
    client.deliver(&url, &payload, Some(SECRET_1)).await.unwrap();

    let requests = capture.requests();
    let first: WebhookPayload = requests[0].body_json().unwrap();
    let second: WebhookPayload = requests[1].body_json().unwrap();

    assert_eq!(first.id, second.id, "Retries must reuse the event id");
    assert_eq!(
        requests[0].header("x-lattice-event-id"),
        requests[1].header("x-lattice-event-id")
    );
}
