//! Delivery worker and retry coordination.
//!
//! Workers consume [`DeliveryJob`]s from the queue, perform the signed HTTP
//! POST, and record the outcome on the delivery row. The retry poller scans
//! for deliveries whose scheduled retry is due and re-enqueues them.
//!
//! A delivery reaches exactly one terminal state: delivered on the first
//! 2xx response, failed once `max_attempts` is exhausted. Everything in
//! between is a pending row with a `next_retry_at` schedule.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use sqlx::PgPool;

use lattice_db::models::{DeliveryOutcome, WebhookDelivery, WebhookEndpoint};

use crate::crypto;
use crate::error::WebhookError;
use crate::queue::{DeliveryJob, DeliveryQueue};

/// Default maximum delivery attempts per delivery (initial + 5 retries).
pub const DEFAULT_MAX_ATTEMPTS: i32 = 6;

/// Default bound on how many due retries one poll picks up.
pub const DEFAULT_RETRY_BATCH: i64 = 50;

/// Default pause between due-retry scans.
pub const DEFAULT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

/// Backoff schedule (in seconds): 1min, 5min, 30min, 2hr, 24hr.
const BACKOFF_SCHEDULE_SECS: [i64; 5] = [60, 300, 1800, 7200, 86400];

/// Maximum response body length recorded on the delivery row.
const MAX_RESPONSE_BODY_CHARS: usize = 4096;

/// Signature header sent with every delivery, `t={ts},v1={digest}`.
pub const SIGNATURE_HEADER: &str = "X-Lattice-Signature";

/// Event id header, the receiver's idempotency key.
pub const EVENT_ID_HEADER: &str = "X-Lattice-Event-Id";

/// Executes queued delivery jobs.
#[derive(Clone)]
pub struct WebhookWorker {
    pool: PgPool,
    http_client: Client,
    encryption_key: Vec<u8>,
    max_attempts: i32,
}

impl WebhookWorker {
    /// Create a new worker with a shared HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Internal` if the HTTP client cannot be built.
    pub fn new(pool: PgPool, encryption_key: Vec<u8>) -> Result<Self, WebhookError> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .user_agent("lattice-webhooks/1.0")
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WebhookError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            pool,
            http_client,
            encryption_key,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    /// Set the maximum delivery attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, max: i32) -> Self {
        self.max_attempts = max;
        self
    }

    /// Consume jobs until the queue closes.
    ///
    /// Each job runs on its own task: deliveries target disjoint rows, so
    /// there is nothing to serialize between them.
    pub async fn run(self, mut receiver: tokio::sync::mpsc::Receiver<DeliveryJob>) {
        while let Some(job) = receiver.recv().await {
            let worker = self.clone();
            tokio::spawn(async move {
                worker.execute_job(&job).await;
            });
        }
    }

    /// Perform one HTTP attempt for a job and record the outcome.
    pub async fn execute_job(&self, job: &DeliveryJob) {
        // The endpoint is fetched at execution time, not enqueue time, so a
        // secret rotation or URL change in between is honored.
        let endpoint =
            match WebhookEndpoint::find_by_id(&self.pool, job.org_id, job.endpoint_id).await {
                Ok(Some(endpoint)) => endpoint,
                Ok(None) => {
                    tracing::info!(
                        target: "webhook_delivery",
                        delivery_id = %job.delivery_id,
                        endpoint_id = %job.endpoint_id,
                        "Endpoint no longer exists; failing delivery"
                    );
                    self.record_terminal_failure(job, "Endpoint deleted").await;
                    return;
                }
                Err(e) => {
                    tracing::error!(
                        target: "webhook_delivery",
                        delivery_id = %job.delivery_id,
                        error = %e,
                        "Failed to load endpoint for delivery"
                    );
                    return;
                }
            };

        if !endpoint.enabled {
            tracing::info!(
                target: "webhook_delivery",
                delivery_id = %job.delivery_id,
                endpoint_id = %endpoint.id,
                "Endpoint is disabled; failing delivery"
            );
            self.record_terminal_failure(job, "Endpoint disabled").await;
            return;
        }

        let secret = match crypto::decrypt_secret(&endpoint.secret_encrypted, &self.encryption_key)
        {
            Ok(secret) => secret,
            Err(e) => {
                self.handle_failure(job, &format!("Failed to decrypt secret: {e}"), None, None)
                    .await;
                return;
            }
        };

        // Serialize once; these exact bytes are signed and sent.
        let body = match serde_json::to_vec(&job.payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.handle_failure(job, &format!("Failed to serialize payload: {e}"), None, None)
                    .await;
                return;
            }
        };

        let signature = crypto::sign_payload(&secret, &body, Utc::now().timestamp());

        let start = Instant::now();
        let result = self
            .http_client
            .post(&endpoint.url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(EVENT_ID_HEADER, job.event_id.to_string())
            .body(body)
            .send()
            .await;

        let latency_ms = start.elapsed().as_millis() as i64;

        match result {
            Ok(response) => {
                let status = response.status().as_u16() as i16;
                let headers = headers_to_map(response.headers());
                let body = response
                    .text()
                    .await
                    .unwrap_or_default()
                    .chars()
                    .take(MAX_RESPONSE_BODY_CHARS)
                    .collect::<String>();

                if (200..300).contains(&(status as u16)) {
                    self.handle_success(job, status, body, headers, latency_ms)
                        .await;
                } else {
                    self.handle_failure(
                        job,
                        &format!("HTTP {status}"),
                        Some((status, body)),
                        Some(headers),
                    )
                    .await;
                }
            }
            Err(e) => {
                let error_msg = if e.is_timeout() {
                    "Request timeout (10s)".to_string()
                } else if e.is_connect() {
                    format!("Connection failed: {e}")
                } else {
                    format!("Request error: {e}")
                };

                self.handle_failure(job, &error_msg, None, None).await;
            }
        }
    }

    /// Record a successful attempt: `delivered_at` is set exactly once and
    /// the retry schedule is cleared.
    async fn handle_success(
        &self,
        job: &DeliveryJob,
        status: i16,
        body: String,
        headers: serde_json::Value,
        latency_ms: i64,
    ) {
        tracing::info!(
            target: "webhook_delivery",
            delivery_id = %job.delivery_id,
            endpoint_id = %job.endpoint_id,
            org_id = %job.org_id,
            event_id = %job.event_id,
            event_type = %job.event_type,
            response_status = status,
            latency_ms,
            attempt_number = job.attempt_number,
            "Webhook delivery succeeded"
        );

        let outcome = DeliveryOutcome {
            response_status: Some(status),
            response_body: Some(body),
            response_headers: Some(headers),
            error_message: None,
            next_retry_at: None,
            delivered: true,
            failed: false,
        };

        if let Err(e) = WebhookDelivery::update_outcome(&self.pool, job.delivery_id, outcome).await
        {
            tracing::error!(
                target: "webhook_delivery",
                delivery_id = %job.delivery_id,
                error = %e,
                "Failed to record delivery success"
            );
        }
    }

    /// Record a failed attempt: schedule a retry while attempts remain,
    /// terminal-fail once they are exhausted.
    async fn handle_failure(
        &self,
        job: &DeliveryJob,
        error_message: &str,
        response: Option<(i16, String)>,
        headers: Option<serde_json::Value>,
    ) {
        let next_retry_at = calculate_next_retry_at(job.attempt_number, self.max_attempts);
        let exhausted = next_retry_at.is_none();

        tracing::warn!(
            target: "webhook_delivery",
            delivery_id = %job.delivery_id,
            endpoint_id = %job.endpoint_id,
            org_id = %job.org_id,
            event_id = %job.event_id,
            event_type = %job.event_type,
            error = %error_message,
            attempt_number = job.attempt_number,
            has_next_retry = !exhausted,
            "Webhook delivery failed"
        );

        let (response_status, response_body) = match response {
            Some((status, body)) => (Some(status), Some(body)),
            None => (None, None),
        };

        let outcome = DeliveryOutcome {
            response_status,
            response_body,
            response_headers: headers,
            error_message: Some(error_message.to_string()),
            next_retry_at,
            delivered: false,
            failed: exhausted,
        };

        if let Err(e) = WebhookDelivery::update_outcome(&self.pool, job.delivery_id, outcome).await
        {
            tracing::error!(
                target: "webhook_delivery",
                delivery_id = %job.delivery_id,
                error = %e,
                "Failed to record delivery failure"
            );
        }
    }

    /// Terminal-fail a delivery whose endpoint is gone or disabled,
    /// regardless of attempts remaining.
    async fn record_terminal_failure(&self, job: &DeliveryJob, reason: &str) {
        let outcome = DeliveryOutcome {
            error_message: Some(reason.to_string()),
            failed: true,
            ..Default::default()
        };

        if let Err(e) = WebhookDelivery::update_outcome(&self.pool, job.delivery_id, outcome).await
        {
            tracing::error!(
                target: "webhook_delivery",
                delivery_id = %job.delivery_id,
                error = %e,
                "Failed to record terminal failure"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Retry poller
// ---------------------------------------------------------------------------

/// Periodically re-enqueues deliveries whose scheduled retry is due.
///
/// Safe to run on multiple nodes: the batch is bounded, and a row picked up
/// twice at worst delivers twice, which receivers dedupe on the event id.
pub struct RetryPoller {
    pool: PgPool,
    queue: Arc<dyn DeliveryQueue>,
    poll_interval: std::time::Duration,
    batch: i64,
}

impl RetryPoller {
    /// Create a poller with default interval and batch size.
    pub fn new(pool: PgPool, queue: Arc<dyn DeliveryQueue>) -> Self {
        Self {
            pool,
            queue,
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch: DEFAULT_RETRY_BATCH,
        }
    }

    /// Set the pause between scans.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: std::time::Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the per-scan batch bound.
    #[must_use]
    pub fn with_batch(mut self, batch: i64) -> Self {
        self.batch = batch;
        self
    }

    /// Scan-and-enqueue loop. Runs until the task is dropped.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    /// One scan over due retries.
    pub async fn poll_once(&self) {
        let due = match WebhookDelivery::find_due_retries(&self.pool, self.batch).await {
            Ok(due) => due,
            Err(e) => {
                tracing::error!(
                    target: "webhook_delivery",
                    error = %e,
                    "Failed to scan for due retries"
                );
                return;
            }
        };

        for delivery in due {
            self.requeue(delivery).await;
        }
    }

    /// Bump the attempt counter and hand the delivery back to the queue.
    async fn requeue(&self, delivery: WebhookDelivery) {
        let endpoint = match WebhookEndpoint::find_by_id(
            &self.pool,
            delivery.org_id,
            delivery.endpoint_id,
        )
        .await
        {
            Ok(Some(endpoint)) if endpoint.enabled => endpoint,
            Ok(Some(_)) | Ok(None) => {
                // No live target; the delivery can never complete.
                tracing::info!(
                    target: "webhook_delivery",
                    delivery_id = %delivery.id,
                    endpoint_id = %delivery.endpoint_id,
                    "Endpoint missing or disabled; failing scheduled retry"
                );
                let outcome = DeliveryOutcome {
                    error_message: Some("Endpoint missing or disabled".to_string()),
                    failed: true,
                    ..Default::default()
                };
                if let Err(e) =
                    WebhookDelivery::update_outcome(&self.pool, delivery.id, outcome).await
                {
                    tracing::error!(
                        target: "webhook_delivery",
                        delivery_id = %delivery.id,
                        error = %e,
                        "Failed to record terminal failure for scheduled retry"
                    );
                }
                return;
            }
            Err(e) => {
                tracing::error!(
                    target: "webhook_delivery",
                    delivery_id = %delivery.id,
                    error = %e,
                    "Failed to load endpoint for scheduled retry"
                );
                return;
            }
        };

        // attempt_number counts attempts made; it moves at enqueue time.
        let delivery = match WebhookDelivery::begin_attempt(&self.pool, delivery.id).await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => return, // reached a terminal state since the scan
            Err(e) => {
                tracing::error!(
                    target: "webhook_delivery",
                    delivery_id = %delivery.id,
                    error = %e,
                    "Failed to begin retry attempt"
                );
                return;
            }
        };

        let job = DeliveryJob {
            delivery_id: delivery.id,
            endpoint_id: delivery.endpoint_id,
            org_id: delivery.org_id,
            url: endpoint.url,
            event_id: delivery.event_id,
            event_type: delivery.event_type.clone(),
            payload: delivery.payload.clone(),
            attempt_number: delivery.attempt_number,
        };

        if let Err(e) = self.queue.enqueue(job).await {
            tracing::error!(
                target: "webhook_delivery",
                delivery_id = %delivery.id,
                error = %e,
                "Failed to enqueue scheduled retry; rescheduling"
            );

            // Put the row back on the schedule so the next scan retries it.
            let outcome = DeliveryOutcome {
                error_message: Some(format!("Failed to enqueue retry: {e}")),
                next_retry_at: Some(Utc::now() + Duration::seconds(BACKOFF_SCHEDULE_SECS[0])),
                ..Default::default()
            };
            if let Err(e) = WebhookDelivery::update_outcome(&self.pool, delivery.id, outcome).await
            {
                tracing::error!(
                    target: "webhook_delivery",
                    delivery_id = %delivery.id,
                    error = %e,
                    "Failed to reschedule retry"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Backoff policy
// ---------------------------------------------------------------------------

/// Next retry timestamp after `attempts_made` failed attempts, or None once
/// attempts are exhausted.
pub fn calculate_next_retry_at(
    attempts_made: i32,
    max_attempts: i32,
) -> Option<DateTime<Utc>> {
    if attempts_made >= max_attempts {
        return None;
    }

    // attempts_made is 1-based: attempt 1 -> index 0, attempt 2 -> index 1, ...
    let idx = (attempts_made - 1).max(0) as usize;
    let delay_secs = BACKOFF_SCHEDULE_SECS
        .get(idx)
        .copied()
        .unwrap_or(*BACKOFF_SCHEDULE_SECS.last().unwrap());

    Some(Utc::now() + Duration::seconds(delay_secs))
}

/// Convert a reqwest HeaderMap to a JSON-serializable map.
fn headers_to_map(headers: &reqwest::header::HeaderMap) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (name, value) in headers.iter() {
        if let Ok(v) = value.to_str() {
            map.insert(name.to_string(), serde_json::Value::String(v.to_string()));
        }
    }
    serde_json::Value::Object(map)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
