//! Request/response types for the webhook management API and the event
//! envelope wire contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use lattice_db::models::{WebhookDelivery, WebhookEndpoint};

use crate::secrets;

// ---------------------------------------------------------------------------
// Caller context
// ---------------------------------------------------------------------------

/// Authenticated caller context, supplied by the ambient auth layer as a
/// request extension.
///
/// Identity and role resolution live outside this crate; all the webhook
/// surface needs is the organization scope and whether the caller may
/// manage webhook configuration.
#[derive(Debug, Clone)]
pub struct WebhookCaller {
    pub org_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub webhook_admin: bool,
}

// ---------------------------------------------------------------------------
// Event envelope (wire contract)
// ---------------------------------------------------------------------------

/// JSON envelope delivered to webhook endpoints.
///
/// `id` is generated once per dispatch call and shared by every delivery
/// fanned out from it; receivers use it to deduplicate retries.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookPayload {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
    pub created_at: DateTime<Utc>,
    pub org_id: Uuid,
    pub data: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Endpoint requests/responses
// ---------------------------------------------------------------------------

/// Request body for creating a webhook endpoint.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateWebhookEndpointRequest {
    #[validate(length(min = 1, max = 2048))]
    pub url: String,

    #[validate(length(max = 500))]
    pub description: Option<String>,

    /// Subscribed event types; validated against the catalog.
    #[validate(length(min = 1))]
    pub events: Vec<String>,
}

/// Request body for partially updating a webhook endpoint.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateWebhookEndpointRequest {
    #[validate(length(min = 1, max = 2048))]
    pub url: Option<String>,

    #[validate(length(max = 500))]
    pub description: Option<String>,

    pub events: Option<Vec<String>>,

    pub enabled: Option<bool>,
}

/// Query parameters for listing endpoints.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ListEndpointsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// A webhook endpoint as returned by the management API.
///
/// `secret` is masked everywhere except the create and rotate-secret
/// responses, which carry the full value exactly once.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookEndpointResponse {
    pub id: Uuid,
    pub org_id: Uuid,
    pub url: String,
    pub description: Option<String>,
    pub secret: String,
    pub events: Vec<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Paginated endpoint listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookEndpointListResponse {
    pub items: Vec<WebhookEndpointResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Convert a DB endpoint to a response with the secret masked.
pub fn endpoint_to_response(endpoint: WebhookEndpoint) -> WebhookEndpointResponse {
    endpoint_to_response_with_secret(endpoint, secrets::masked_secret())
}

/// Convert a DB endpoint to a response carrying an explicit secret value
/// (used by create and rotate-secret, the only places the full secret is
/// ever returned).
pub fn endpoint_to_response_with_secret(
    endpoint: WebhookEndpoint,
    secret: String,
) -> WebhookEndpointResponse {
    WebhookEndpointResponse {
        id: endpoint.id,
        org_id: endpoint.org_id,
        url: endpoint.url,
        description: endpoint.description,
        secret,
        events: endpoint.events,
        enabled: endpoint.enabled,
        created_at: endpoint.created_at,
        updated_at: endpoint.updated_at,
    }
}

// ---------------------------------------------------------------------------
// Delivery responses
// ---------------------------------------------------------------------------

/// Query parameters for listing delivery history.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ListDeliveriesQuery {
    /// Restrict to one endpoint.
    pub endpoint_id: Option<Uuid>,
    /// `success`, `failed` or `pending`.
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// Delivery summary for history listings.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookDeliveryResponse {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub event_id: Uuid,
    pub event_type: String,
    pub status: String,
    pub attempt_number: i32,
    pub response_status: Option<i16>,
    pub error_message: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

/// Full delivery detail including payload and response capture.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookDeliveryDetailResponse {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub event_id: Uuid,
    pub event_type: String,
    pub status: String,
    pub attempt_number: i32,
    pub payload: serde_json::Value,
    pub response_status: Option<i16>,
    pub response_body: Option<String>,
    pub response_headers: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

/// Paginated delivery listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookDeliveryListResponse {
    pub items: Vec<WebhookDeliveryResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Convert a DB delivery to a summary response.
pub fn delivery_to_response(d: WebhookDelivery) -> WebhookDeliveryResponse {
    let status = d.status().as_str().to_string();
    WebhookDeliveryResponse {
        id: d.id,
        endpoint_id: d.endpoint_id,
        event_id: d.event_id,
        event_type: d.event_type,
        status,
        attempt_number: d.attempt_number,
        response_status: d.response_status,
        error_message: d.error_message,
        next_retry_at: d.next_retry_at,
        created_at: d.created_at,
        delivered_at: d.delivered_at,
        failed_at: d.failed_at,
    }
}

/// Convert a DB delivery to a full detail response.
pub fn delivery_to_detail_response(d: WebhookDelivery) -> WebhookDeliveryDetailResponse {
    let status = d.status().as_str().to_string();
    WebhookDeliveryDetailResponse {
        id: d.id,
        endpoint_id: d.endpoint_id,
        event_id: d.event_id,
        event_type: d.event_type,
        status,
        attempt_number: d.attempt_number,
        payload: d.payload,
        response_status: d.response_status,
        response_body: d.response_body,
        response_headers: d.response_headers,
        error_message: d.error_message,
        next_retry_at: d.next_retry_at,
        created_at: d.created_at,
        delivered_at: d.delivered_at,
        failed_at: d.failed_at,
    }
}

// ---------------------------------------------------------------------------
// Event type listing
// ---------------------------------------------------------------------------

/// One entry in the event-type catalog listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventTypeInfo {
    pub event_type: String,
    pub category: String,
    pub description: String,
}

/// Event-type catalog listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventTypeListResponse {
    pub event_types: Vec<EventTypeInfo>,
}

fn default_limit() -> i64 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wire_field_names() {
        let payload = WebhookPayload {
            id: Uuid::new_v4(),
            event_type: "project.created".to_string(),
            created_at: Utc::now(),
            org_id: Uuid::new_v4(),
            data: serde_json::json!({"project_id": "p-1"}),
        };

        let value = serde_json::to_value(&payload).unwrap();
        let obj = value.as_object().unwrap();

        assert_eq!(obj.len(), 5);
        for field in ["id", "type", "created_at", "org_id", "data"] {
            assert!(obj.contains_key(field), "missing field {field}");
        }
        assert_eq!(obj["type"], "project.created");
    }

    #[test]
    fn test_envelope_roundtrip() {
        let payload = WebhookPayload {
            id: Uuid::new_v4(),
            event_type: "member.role_changed".to_string(),
            created_at: Utc::now(),
            org_id: Uuid::new_v4(),
            data: serde_json::json!({"member_id": "m-1", "role": "admin"}),
        };

        let bytes = serde_json::to_vec(&payload).unwrap();
        let parsed: WebhookPayload = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.id, payload.id);
        assert_eq!(parsed.event_type, payload.event_type);
        assert_eq!(parsed.org_id, payload.org_id);
    }
}
