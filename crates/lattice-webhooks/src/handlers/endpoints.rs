//! CRUD handlers for webhook endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiResult, WebhookError};
use crate::events::WebhookEventType;
use crate::models::{
    CreateWebhookEndpointRequest, EventTypeInfo, EventTypeListResponse, ListEndpointsQuery,
    UpdateWebhookEndpointRequest, WebhookCaller, WebhookDeliveryResponse,
    WebhookEndpointListResponse, WebhookEndpointResponse,
};
use crate::router::WebhooksState;

/// Endpoint management requires the caller's webhook-admin capability;
/// anyone else gets a generic forbidden, without leaking existence.
fn require_admin(caller: &WebhookCaller) -> Result<Uuid, WebhookError> {
    if !caller.webhook_admin {
        return Err(WebhookError::Forbidden);
    }
    Ok(caller.org_id)
}

// ---------------------------------------------------------------------------
// Endpoint CRUD handlers
// ---------------------------------------------------------------------------

/// Create a new webhook endpoint.
#[utoipa::path(
    post,
    path = "/webhooks/endpoints",
    tag = "Webhooks",
    request_body = CreateWebhookEndpointRequest,
    responses(
        (status = 201, description = "Endpoint created; response carries the full secret once", body = WebhookEndpointResponse),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Endpoint limit exceeded"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(caller): Extension<WebhookCaller>,
    Json(request): Json<CreateWebhookEndpointRequest>,
) -> ApiResult<(StatusCode, Json<WebhookEndpointResponse>)> {
    let org_id = require_admin(&caller)?;

    request
        .validate()
        .map_err(|e| WebhookError::Validation(e.to_string()))?;

    let response = state
        .endpoint_service
        .create_endpoint(org_id, caller.actor_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// List webhook endpoints, secrets masked.
#[utoipa::path(
    get,
    path = "/webhooks/endpoints",
    tag = "Webhooks",
    params(ListEndpointsQuery),
    responses(
        (status = 200, description = "Paginated endpoint list", body = WebhookEndpointListResponse),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_endpoints_handler(
    State(state): State<WebhooksState>,
    Extension(caller): Extension<WebhookCaller>,
    Query(query): Query<ListEndpointsQuery>,
) -> ApiResult<Json<WebhookEndpointListResponse>> {
    let org_id = require_admin(&caller)?;

    let response = state.endpoint_service.list_endpoints(org_id, query).await?;

    Ok(Json(response))
}

/// Get a single webhook endpoint, secret masked.
#[utoipa::path(
    get,
    path = "/webhooks/endpoints/{id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Endpoint ID")
    ),
    responses(
        (status = 200, description = "Endpoint details", body = WebhookEndpointResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Endpoint not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(caller): Extension<WebhookCaller>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WebhookEndpointResponse>> {
    let org_id = require_admin(&caller)?;

    let response = state.endpoint_service.get_endpoint(org_id, id).await?;

    Ok(Json(response))
}

/// Update a webhook endpoint.
#[utoipa::path(
    patch,
    path = "/webhooks/endpoints/{id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Endpoint ID")
    ),
    request_body = UpdateWebhookEndpointRequest,
    responses(
        (status = 200, description = "Endpoint updated", body = WebhookEndpointResponse),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Endpoint not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(caller): Extension<WebhookCaller>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateWebhookEndpointRequest>,
) -> ApiResult<Json<WebhookEndpointResponse>> {
    let org_id = require_admin(&caller)?;

    request
        .validate()
        .map_err(|e| WebhookError::Validation(e.to_string()))?;

    let response = state
        .endpoint_service
        .update_endpoint(org_id, id, request)
        .await?;

    Ok(Json(response))
}

/// Delete a webhook endpoint.
#[utoipa::path(
    delete,
    path = "/webhooks/endpoints/{id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Endpoint ID")
    ),
    responses(
        (status = 204, description = "Endpoint deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Endpoint not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(caller): Extension<WebhookCaller>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let org_id = require_admin(&caller)?;

    state.endpoint_service.delete_endpoint(org_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Rotate an endpoint's signing secret.
#[utoipa::path(
    post,
    path = "/webhooks/endpoints/{id}/rotate-secret",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Endpoint ID")
    ),
    responses(
        (status = 200, description = "Secret rotated; response carries the new secret once", body = WebhookEndpointResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Endpoint not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn rotate_secret_handler(
    State(state): State<WebhooksState>,
    Extension(caller): Extension<WebhookCaller>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WebhookEndpointResponse>> {
    let org_id = require_admin(&caller)?;

    let response = state.endpoint_service.rotate_secret(org_id, id).await?;

    Ok(Json(response))
}

/// Send a test ping through the regular dispatch path.
#[utoipa::path(
    post,
    path = "/webhooks/endpoints/{id}/test",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Endpoint ID")
    ),
    responses(
        (status = 202, description = "Test ping enqueued", body = WebhookDeliveryResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Endpoint not found"),
        (status = 409, description = "Endpoint is disabled"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn test_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(caller): Extension<WebhookCaller>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<WebhookDeliveryResponse>)> {
    let org_id = require_admin(&caller)?;

    let response = state.dispatcher.send_test_ping(org_id, id).await?;

    Ok((StatusCode::ACCEPTED, Json(response)))
}

// ---------------------------------------------------------------------------
// Event types handler
// ---------------------------------------------------------------------------

/// List all supported webhook event types.
#[utoipa::path(
    get,
    path = "/webhooks/event-types",
    tag = "Webhooks",
    responses(
        (status = 200, description = "List of event types", body = EventTypeListResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_event_types_handler() -> Json<EventTypeListResponse> {
    let event_types = WebhookEventType::all()
        .into_iter()
        .map(|et| EventTypeInfo {
            event_type: et.as_str().to_string(),
            category: et.category().to_string(),
            description: et.description().to_string(),
        })
        .collect();

    Json(EventTypeListResponse { event_types })
}
