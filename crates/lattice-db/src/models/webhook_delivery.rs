//! Webhook delivery model.
//!
//! One row per endpoint per event occurrence. Identity columns and the
//! payload are written at fan-out time and never change; only outcome
//! columns are mutable. A delivery is terminal once `delivered_at` or
//! `failed_at` is set, and the update operations guard so that at most one
//! of the two is ever non-null.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Derived delivery status used by history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// `delivered_at` is set.
    Success,
    /// `failed_at` is set.
    Failed,
    /// Neither terminal timestamp is set; covers "not yet attempted"
    /// and "scheduled for retry".
    Pending,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Pending => "pending",
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "pending" => Ok(Self::Pending),
            _ => Err(format!("Invalid delivery status: {s}")),
        }
    }
}

/// A delivery attempt record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookDelivery {
    /// Unique identifier.
    pub id: Uuid,

    /// Organization that owns the target endpoint.
    pub org_id: Uuid,

    /// Endpoint this delivery targets.
    pub endpoint_id: Uuid,

    /// Event occurrence id, shared by every delivery fanned out from one
    /// dispatch call. Receivers dedupe on it.
    pub event_id: Uuid,

    /// Event type identifier.
    pub event_type: String,

    /// Canonical event envelope sent to the endpoint.
    pub payload: serde_json::Value,

    /// Attempts made so far; starts at 1.
    pub attempt_number: i32,

    /// HTTP status of the latest completed attempt.
    pub response_status: Option<i16>,

    /// Response body of the latest completed attempt, truncated.
    pub response_body: Option<String>,

    /// Request headers of the latest attempt, for signature audits.
    pub response_headers: Option<serde_json::Value>,

    /// Error of the latest failed attempt.
    pub error_message: Option<String>,

    /// When the next automatic retry is due; null for terminal deliveries.
    pub next_retry_at: Option<DateTime<Utc>>,

    /// Set exactly once, on the first 2xx response.
    pub delivered_at: Option<DateTime<Utc>>,

    /// Set when attempts are exhausted.
    pub failed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookDelivery {
    /// Derived status of this row.
    pub fn status(&self) -> DeliveryStatus {
        if self.delivered_at.is_some() {
            DeliveryStatus::Success
        } else if self.failed_at.is_some() {
            DeliveryStatus::Failed
        } else {
            DeliveryStatus::Pending
        }
    }
}

/// Data needed to create a delivery row at fan-out time.
#[derive(Debug, Clone)]
pub struct CreateWebhookDelivery {
    pub org_id: Uuid,
    pub endpoint_id: Uuid,
    pub event_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
}

/// Outcome of one HTTP attempt, recorded by the worker.
///
/// This is the only write surface the worker has; identity columns and the
/// payload are not reachable from here.
#[derive(Debug, Clone, Default)]
pub struct DeliveryOutcome {
    pub response_status: Option<i16>,
    pub response_body: Option<String>,
    pub response_headers: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub delivered: bool,
    pub failed: bool,
}

/// Optional filters for delivery history queries.
#[derive(Debug, Clone, Default)]
pub struct DeliveryFilter {
    pub endpoint_id: Option<Uuid>,
    pub status: Option<DeliveryStatus>,
}

impl DeliveryFilter {
    /// SQL predicates for the derived status, usable after an org_id and
    /// optional endpoint_id bind.
    fn status_clause(&self) -> &'static str {
        match self.status {
            Some(DeliveryStatus::Success) => " AND delivered_at IS NOT NULL",
            Some(DeliveryStatus::Failed) => " AND failed_at IS NOT NULL",
            Some(DeliveryStatus::Pending) => {
                " AND delivered_at IS NULL AND failed_at IS NULL"
            }
            None => "",
        }
    }
}

impl WebhookDelivery {
    /// Insert a new delivery row at attempt 1 with no outcome.
    pub async fn create(pool: &PgPool, data: CreateWebhookDelivery) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO webhook_deliveries (
                org_id, endpoint_id, event_id, event_type, payload
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            ",
        )
        .bind(data.org_id)
        .bind(data.endpoint_id)
        .bind(data.event_id)
        .bind(&data.event_type)
        .bind(&data.payload)
        .fetch_one(pool)
        .await
    }

    /// Find a delivery by id within an organization.
    pub async fn find_by_id(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM webhook_deliveries
            WHERE org_id = $1 AND id = $2
            ",
        )
        .bind(org_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// List delivery history for an organization, newest first.
    pub async fn list_by_org(
        pool: &PgPool,
        org_id: Uuid,
        filter: &DeliveryFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r"
            SELECT * FROM webhook_deliveries
            WHERE org_id = $1 AND ($2::uuid IS NULL OR endpoint_id = $2){}
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            ",
            filter.status_clause()
        );

        sqlx::query_as(&query)
            .bind(org_id)
            .bind(filter.endpoint_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Count delivery history rows matching a filter.
    pub async fn count_by_org(
        pool: &PgPool,
        org_id: Uuid,
        filter: &DeliveryFilter,
    ) -> Result<i64, sqlx::Error> {
        let query = format!(
            r"
            SELECT COUNT(*) FROM webhook_deliveries
            WHERE org_id = $1 AND ($2::uuid IS NULL OR endpoint_id = $2){}
            ",
            filter.status_clause()
        );

        let row: (i64,) = sqlx::query_as(&query)
            .bind(org_id)
            .bind(filter.endpoint_id)
            .fetch_one(pool)
            .await?;

        Ok(row.0)
    }

    /// Record the outcome of one HTTP attempt.
    ///
    /// A `delivered` outcome only lands while the row is still pending, so
    /// `delivered_at` is set at most once and never next to `failed_at`; a
    /// `failed` outcome likewise refuses rows already delivered. Returns the
    /// updated row, or None when the row is missing or already terminal.
    pub async fn update_outcome(
        pool: &PgPool,
        id: Uuid,
        outcome: DeliveryOutcome,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE webhook_deliveries
            SET response_status = $2,
                response_body = $3,
                response_headers = $4,
                error_message = $5,
                next_retry_at = $6,
                delivered_at = CASE WHEN $7 THEN NOW() ELSE delivered_at END,
                failed_at = CASE WHEN $8 THEN NOW() ELSE failed_at END,
                updated_at = NOW()
            WHERE id = $1 AND delivered_at IS NULL AND failed_at IS NULL
            RETURNING *
            ",
        )
        .bind(id)
        .bind(outcome.response_status)
        .bind(&outcome.response_body)
        .bind(&outcome.response_headers)
        .bind(&outcome.error_message)
        .bind(outcome.next_retry_at)
        .bind(outcome.delivered)
        .bind(outcome.failed)
        .fetch_optional(pool)
        .await
    }

    /// Pending deliveries whose retry is due, bounded per poll.
    ///
    /// Deliberately unrestricted by organization: the retry poller works
    /// across all tenants. Concurrent pollers may pick up the same row;
    /// duplicate delivery is tolerated because receivers dedupe on event_id.
    pub async fn find_due_retries(pool: &PgPool, batch: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM webhook_deliveries
            WHERE delivered_at IS NULL
              AND failed_at IS NULL
              AND next_retry_at IS NOT NULL
              AND next_retry_at <= NOW()
            ORDER BY next_retry_at
            LIMIT $1
            ",
        )
        .bind(batch)
        .fetch_all(pool)
        .await
    }

    /// Bump the attempt counter and clear the retry schedule for a delivery
    /// that is about to be re-enqueued. Only touches pending rows.
    pub async fn begin_attempt(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE webhook_deliveries
            SET attempt_number = attempt_number + 1,
                next_retry_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND delivered_at IS NULL AND failed_at IS NULL
            RETURNING *
            ",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Reset a terminally failed delivery for a manual retry.
    ///
    /// Only failed rows match; delivered and pending rows return None and
    /// the caller reports the distinction.
    pub async fn reset_for_manual_retry(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE webhook_deliveries
            SET failed_at = NULL,
                error_message = NULL,
                next_retry_at = NULL,
                attempt_number = attempt_number + 1,
                updated_at = NOW()
            WHERE org_id = $1 AND id = $2 AND failed_at IS NOT NULL
            RETURNING *
            ",
        )
        .bind(org_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
