//! Event dispatcher: fan-out from one domain event to per-endpoint
//! delivery rows and queue jobs.
//!
//! `dispatch` is the one call surface other application modules use. It is
//! fire-and-forget by contract: the signature has no error variant, and any
//! ledger or queue failure is logged and swallowed so event dispatch can
//! never fail the business operation that triggered it.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use lattice_db::models::{CreateWebhookDelivery, WebhookDelivery, WebhookEndpoint};

use crate::error::WebhookError;
use crate::events::WebhookEventType;
use crate::models::{delivery_to_response, WebhookDeliveryResponse, WebhookPayload};
use crate::queue::{DeliveryJob, DeliveryQueue};

/// Dispatches domain events to subscribed webhook endpoints.
#[derive(Clone)]
pub struct EventDispatcher {
    pool: PgPool,
    queue: Arc<dyn DeliveryQueue>,
}

impl EventDispatcher {
    /// Create a new dispatcher.
    pub fn new(pool: PgPool, queue: Arc<dyn DeliveryQueue>) -> Self {
        Self { pool, queue }
    }

    /// Dispatch a domain event to every subscribed, enabled endpoint of the
    /// organization.
    ///
    /// One delivery row and one queue job are created per endpoint, all
    /// sharing a single freshly generated event id. No subscribers is a
    /// quiet no-op. Fan-out is independent per endpoint with no ordering or
    /// atomicity across endpoints; a partial fan-out is accepted and
    /// observable through the delivery history.
    pub async fn dispatch(
        &self,
        org_id: Uuid,
        event_type: WebhookEventType,
        data: serde_json::Value,
    ) {
        let endpoints =
            match WebhookEndpoint::find_subscribed(&self.pool, org_id, event_type.as_str()).await {
                Ok(endpoints) => endpoints,
                Err(e) => {
                    tracing::error!(
                        target: "webhook_delivery",
                        org_id = %org_id,
                        event_type = %event_type,
                        error = %e,
                        "Failed to query subscribed endpoints"
                    );
                    return;
                }
            };

        if endpoints.is_empty() {
            tracing::debug!(
                target: "webhook_delivery",
                org_id = %org_id,
                event_type = %event_type,
                "No enabled endpoints subscribe to event type"
            );
            return;
        }

        let payload = build_envelope(Uuid::new_v4(), event_type, org_id, data);

        tracing::info!(
            target: "webhook_delivery",
            org_id = %org_id,
            event_id = %payload.id,
            event_type = %event_type,
            endpoint_count = endpoints.len(),
            "Dispatching event to subscribed endpoints"
        );

        for endpoint in endpoints {
            if let Err(e) = self.fan_out_one(&endpoint, &payload).await {
                tracing::error!(
                    target: "webhook_delivery",
                    org_id = %org_id,
                    endpoint_id = %endpoint.id,
                    event_id = %payload.id,
                    error = %e,
                    "Fan-out to endpoint failed"
                );
            }
        }
    }

    /// Send a synthetic `test.ping` event to one endpoint, through the same
    /// ledger-row-plus-job path real events take.
    ///
    /// Unlike `dispatch` this is a management operation: validation errors
    /// surface to the caller. Disabled endpoints are rejected.
    pub async fn send_test_ping(
        &self,
        org_id: Uuid,
        endpoint_id: Uuid,
    ) -> Result<WebhookDeliveryResponse, WebhookError> {
        let endpoint = WebhookEndpoint::find_by_id(&self.pool, org_id, endpoint_id)
            .await?
            .ok_or(WebhookError::EndpointNotFound)?;

        if !endpoint.enabled {
            return Err(WebhookError::EndpointDisabled);
        }

        let payload = build_envelope(
            Uuid::new_v4(),
            WebhookEventType::TestPing,
            org_id,
            serde_json::json!({ "endpoint_id": endpoint_id }),
        );

        let delivery = self.fan_out_one(&endpoint, &payload).await?;
        Ok(delivery_to_response(delivery))
    }

    /// Create the ledger row and enqueue the job for one endpoint.
    ///
    /// The job carries no signing secret: the worker fetches the endpoint
    /// at execution time so a rotation in between is honored.
    async fn fan_out_one(
        &self,
        endpoint: &WebhookEndpoint,
        payload: &WebhookPayload,
    ) -> Result<WebhookDelivery, WebhookError> {
        let payload_json = serde_json::to_value(payload)
            .map_err(|e| WebhookError::Internal(format!("Failed to serialize envelope: {e}")))?;

        let delivery = WebhookDelivery::create(
            &self.pool,
            CreateWebhookDelivery {
                org_id: endpoint.org_id,
                endpoint_id: endpoint.id,
                event_id: payload.id,
                event_type: payload.event_type.clone(),
                payload: payload_json.clone(),
            },
        )
        .await?;

        self.queue
            .enqueue(DeliveryJob {
                delivery_id: delivery.id,
                endpoint_id: endpoint.id,
                org_id: endpoint.org_id,
                url: endpoint.url.clone(),
                event_id: payload.id,
                event_type: payload.event_type.clone(),
                payload: payload_json,
                attempt_number: delivery.attempt_number,
            })
            .await
            .map_err(|e| WebhookError::Internal(format!("Failed to enqueue delivery job: {e}")))?;

        Ok(delivery)
    }
}

/// Build the canonical event envelope shared by every delivery of one
/// dispatch call.
fn build_envelope(
    event_id: Uuid,
    event_type: WebhookEventType,
    org_id: Uuid,
    data: serde_json::Value,
) -> WebhookPayload {
    WebhookPayload {
        id: event_id,
        event_type: event_type.as_str().to_string(),
        created_at: Utc::now(),
        org_id,
        data,
    }
}
