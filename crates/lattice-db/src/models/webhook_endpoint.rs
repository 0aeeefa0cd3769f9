//! Webhook endpoint model.
//!
//! Tenant-configured HTTP destinations for event delivery. The signing
//! secret is stored encrypted; the plaintext never touches the database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A webhook endpoint subscribed to one or more event types.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    /// Unique identifier.
    pub id: Uuid,

    /// Organization this endpoint belongs to.
    pub org_id: Uuid,

    /// Destination URL for event delivery.
    pub url: String,

    /// Optional operator-facing description.
    pub description: Option<String>,

    /// AES-256-GCM encrypted signing secret (base64 nonce || ciphertext).
    pub secret_encrypted: String,

    /// Subscribed event type identifiers.
    pub events: Vec<String>,

    /// Disabled endpoints are skipped at dispatch time.
    pub enabled: bool,

    /// User who created the endpoint.
    pub created_by: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data needed to create a new webhook endpoint.
#[derive(Debug, Clone)]
pub struct CreateWebhookEndpoint {
    pub org_id: Uuid,
    pub url: String,
    pub description: Option<String>,
    pub secret_encrypted: String,
    pub events: Vec<String>,
    pub created_by: Option<Uuid>,
}

/// Partial update of endpoint configuration.
///
/// `None` fields are left unchanged. The secret is deliberately absent:
/// it only changes through `rotate_secret`.
#[derive(Debug, Clone, Default)]
pub struct UpdateWebhookEndpoint {
    pub url: Option<String>,
    pub description: Option<String>,
    pub events: Option<Vec<String>>,
    pub enabled: Option<bool>,
}

impl WebhookEndpoint {
    /// Insert a new endpoint.
    pub async fn create(pool: &PgPool, data: CreateWebhookEndpoint) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO webhook_endpoints (
                org_id, url, description, secret_encrypted, events, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(data.org_id)
        .bind(&data.url)
        .bind(&data.description)
        .bind(&data.secret_encrypted)
        .bind(&data.events)
        .bind(data.created_by)
        .fetch_one(pool)
        .await
    }

    /// Find an endpoint by id within an organization.
    pub async fn find_by_id(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM webhook_endpoints
            WHERE org_id = $1 AND id = $2
            ",
        )
        .bind(org_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// List endpoints for an organization, newest first.
    pub async fn list_by_org(
        pool: &PgPool,
        org_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM webhook_endpoints
            WHERE org_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(org_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Count endpoints for an organization.
    pub async fn count_by_org(pool: &PgPool, org_id: Uuid) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*) FROM webhook_endpoints
            WHERE org_id = $1
            ",
        )
        .bind(org_id)
        .fetch_one(pool)
        .await?;

        Ok(row.0)
    }

    /// Partially update an endpoint. Returns None when no row matched.
    pub async fn update(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
        data: UpdateWebhookEndpoint,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE webhook_endpoints
            SET url = COALESCE($3, url),
                description = COALESCE($4, description),
                events = COALESCE($5, events),
                enabled = COALESCE($6, enabled),
                updated_at = NOW()
            WHERE org_id = $1 AND id = $2
            RETURNING *
            ",
        )
        .bind(org_id)
        .bind(id)
        .bind(&data.url)
        .bind(&data.description)
        .bind(&data.events)
        .bind(data.enabled)
        .fetch_optional(pool)
        .await
    }

    /// Delete an endpoint. Delivery history rows are left in place for audit.
    pub async fn delete(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            DELETE FROM webhook_endpoints
            WHERE org_id = $1 AND id = $2
            ",
        )
        .bind(org_id)
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the signing secret in a single write.
    ///
    /// The old secret stops verifying the moment this commits; there is no
    /// grace window where both secrets are live.
    pub async fn rotate_secret(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
        secret_encrypted: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE webhook_endpoints
            SET secret_encrypted = $3, updated_at = NOW()
            WHERE org_id = $1 AND id = $2
            RETURNING *
            ",
        )
        .bind(org_id)
        .bind(id)
        .bind(secret_encrypted)
        .fetch_optional(pool)
        .await
    }

    /// Enabled endpoints within an organization subscribed to an event type.
    pub async fn find_subscribed(
        pool: &PgPool,
        org_id: Uuid,
        event_type: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM webhook_endpoints
            WHERE org_id = $1 AND enabled AND $2 = ANY(events)
            ORDER BY created_at
            ",
        )
        .bind(org_id)
        .bind(event_type)
        .fetch_all(pool)
        .await
    }
}
