//! Delivery history and manual retry handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use crate::error::{ApiResult, WebhookError};
use crate::models::{
    ListDeliveriesQuery, WebhookCaller, WebhookDeliveryDetailResponse,
    WebhookDeliveryListResponse, WebhookDeliveryResponse,
};
use crate::router::WebhooksState;

/// Delivery management requires the caller's webhook-admin capability.
fn require_admin(caller: &WebhookCaller) -> Result<Uuid, WebhookError> {
    if !caller.webhook_admin {
        return Err(WebhookError::Forbidden);
    }
    Ok(caller.org_id)
}

// ---------------------------------------------------------------------------
// Delivery history handlers
// ---------------------------------------------------------------------------

/// List delivery history, optionally filtered by endpoint and status.
#[utoipa::path(
    get,
    path = "/webhooks/deliveries",
    tag = "Webhooks",
    params(ListDeliveriesQuery),
    responses(
        (status = 200, description = "Paginated delivery list", body = WebhookDeliveryListResponse),
        (status = 400, description = "Invalid status filter"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_deliveries_handler(
    State(state): State<WebhooksState>,
    Extension(caller): Extension<WebhookCaller>,
    Query(query): Query<ListDeliveriesQuery>,
) -> ApiResult<Json<WebhookDeliveryListResponse>> {
    let org_id = require_admin(&caller)?;

    let response = state
        .delivery_service
        .list_deliveries(org_id, query)
        .await?;

    Ok(Json(response))
}

/// Get detailed information about a specific delivery.
#[utoipa::path(
    get,
    path = "/webhooks/deliveries/{id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Delivery ID"),
    ),
    responses(
        (status = 200, description = "Delivery details", body = WebhookDeliveryDetailResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Delivery not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_delivery_handler(
    State(state): State<WebhooksState>,
    Extension(caller): Extension<WebhookCaller>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WebhookDeliveryDetailResponse>> {
    let org_id = require_admin(&caller)?;

    let response = state.delivery_service.get_delivery(org_id, id).await?;

    Ok(Json(response))
}

/// Manually retry a terminally failed delivery.
#[utoipa::path(
    post,
    path = "/webhooks/deliveries/{id}/retry",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Delivery ID"),
    ),
    responses(
        (status = 202, description = "Retry enqueued", body = WebhookDeliveryResponse),
        (status = 400, description = "Delivery is not in a failed state"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Delivery or endpoint not found"),
        (status = 409, description = "Delivery already succeeded"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn retry_delivery_handler(
    State(state): State<WebhooksState>,
    Extension(caller): Extension<WebhookCaller>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<WebhookDeliveryResponse>)> {
    let org_id = require_admin(&caller)?;

    let response = state.delivery_service.retry_delivery(org_id, id).await?;

    Ok((StatusCode::ACCEPTED, Json(response)))
}
