//! Delivery history queries and the manual retry operation.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use lattice_db::models::{DeliveryFilter, DeliveryStatus, WebhookDelivery, WebhookEndpoint};

use crate::error::WebhookError;
use crate::models::{
    delivery_to_detail_response, delivery_to_response, ListDeliveriesQuery,
    WebhookDeliveryDetailResponse, WebhookDeliveryListResponse, WebhookDeliveryResponse,
};
use crate::queue::{DeliveryJob, DeliveryQueue};

/// Service for delivery history and operator-triggered retries.
#[derive(Clone)]
pub struct DeliveryService {
    pool: PgPool,
    queue: Arc<dyn DeliveryQueue>,
}

impl DeliveryService {
    /// Create a new delivery service.
    pub fn new(pool: PgPool, queue: Arc<dyn DeliveryQueue>) -> Self {
        Self { pool, queue }
    }

    /// List delivery history for an organization with optional endpoint and
    /// status filters.
    pub async fn list_deliveries(
        &self,
        org_id: Uuid,
        query: ListDeliveriesQuery,
    ) -> Result<WebhookDeliveryListResponse, WebhookError> {
        let status = query
            .status
            .as_deref()
            .map(|s| {
                s.parse::<DeliveryStatus>()
                    .map_err(WebhookError::Validation)
            })
            .transpose()?;

        let filter = DeliveryFilter {
            endpoint_id: query.endpoint_id,
            status,
        };

        let limit = query.limit.clamp(1, 100);
        let offset = query.offset.max(0);

        let deliveries =
            WebhookDelivery::list_by_org(&self.pool, org_id, &filter, limit, offset).await?;
        let total = WebhookDelivery::count_by_org(&self.pool, org_id, &filter).await?;

        Ok(WebhookDeliveryListResponse {
            items: deliveries.into_iter().map(delivery_to_response).collect(),
            total,
            limit,
            offset,
        })
    }

    /// Get full detail for a single delivery.
    pub async fn get_delivery(
        &self,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<WebhookDeliveryDetailResponse, WebhookError> {
        let delivery = WebhookDelivery::find_by_id(&self.pool, org_id, id)
            .await?
            .ok_or(WebhookError::DeliveryNotFound)?;

        Ok(delivery_to_detail_response(delivery))
    }

    /// Manually retry a terminally failed delivery.
    ///
    /// Only reachable from the failed state: a delivered row is rejected
    /// outright, a still-pending row is a validation error. The reset
    /// clears the outcome fields, bumps the attempt counter, and re-enqueues
    /// a job carrying the stored payload. The state check is read-then-write
    /// by design; the narrow race with an in-flight worker resolves as
    /// last-write-wins.
    pub async fn retry_delivery(
        &self,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<WebhookDeliveryResponse, WebhookError> {
        let delivery = WebhookDelivery::find_by_id(&self.pool, org_id, id)
            .await?
            .ok_or(WebhookError::DeliveryNotFound)?;

        match delivery.status() {
            DeliveryStatus::Success => return Err(WebhookError::AlreadyDelivered),
            DeliveryStatus::Pending => {
                return Err(WebhookError::Validation(
                    "Only failed deliveries can be retried".to_string(),
                ));
            }
            DeliveryStatus::Failed => {}
        }

        // History outlives its endpoint, but a retry needs a live target.
        let endpoint = WebhookEndpoint::find_by_id(&self.pool, org_id, delivery.endpoint_id)
            .await?
            .ok_or(WebhookError::EndpointNotFound)?;

        let reset = WebhookDelivery::reset_for_manual_retry(&self.pool, org_id, id)
            .await?
            .ok_or_else(|| {
                WebhookError::Validation("Delivery is no longer in a failed state".to_string())
            })?;

        self.queue
            .enqueue(DeliveryJob {
                delivery_id: reset.id,
                endpoint_id: reset.endpoint_id,
                org_id: reset.org_id,
                url: endpoint.url,
                event_id: reset.event_id,
                event_type: reset.event_type.clone(),
                payload: reset.payload.clone(),
                attempt_number: reset.attempt_number,
            })
            .await
            .map_err(|e| WebhookError::Internal(format!("Failed to enqueue retry job: {e}")))?;

        tracing::info!(
            target: "webhook_delivery",
            org_id = %org_id,
            delivery_id = %id,
            attempt_number = reset.attempt_number,
            "Manual retry enqueued"
        );

        Ok(delivery_to_response(reset))
    }
}
