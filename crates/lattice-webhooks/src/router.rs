//! Axum router setup for the webhook management surface.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

use crate::handlers::{deliveries, endpoints};
use crate::queue::DeliveryQueue;
use crate::services::delivery_service::DeliveryService;
use crate::services::dispatcher::EventDispatcher;
use crate::services::endpoint_service::EndpointService;

/// Shared state for webhook handlers.
#[derive(Clone)]
pub struct WebhooksState {
    pub endpoint_service: Arc<EndpointService>,
    pub delivery_service: Arc<DeliveryService>,
    pub dispatcher: Arc<EventDispatcher>,
}

impl WebhooksState {
    /// Create a new webhooks state.
    pub fn new(pool: PgPool, encryption_key: Vec<u8>, queue: Arc<dyn DeliveryQueue>) -> Self {
        Self {
            endpoint_service: Arc::new(EndpointService::new(pool.clone(), encryption_key)),
            delivery_service: Arc::new(DeliveryService::new(pool.clone(), queue.clone())),
            dispatcher: Arc::new(EventDispatcher::new(pool, queue)),
        }
    }

    /// Replace the endpoint service (builder-configured variants).
    #[must_use]
    pub fn with_endpoint_service(mut self, service: EndpointService) -> Self {
        self.endpoint_service = Arc::new(service);
        self
    }
}

/// Creates the webhook router with all routes.
pub fn webhooks_router(state: WebhooksState) -> Router {
    Router::new()
        // Endpoint CRUD
        .route(
            "/webhooks/endpoints",
            post(endpoints::create_endpoint_handler).get(endpoints::list_endpoints_handler),
        )
        .route(
            "/webhooks/endpoints/:id",
            get(endpoints::get_endpoint_handler)
                .patch(endpoints::update_endpoint_handler)
                .delete(endpoints::delete_endpoint_handler),
        )
        .route(
            "/webhooks/endpoints/:id/rotate-secret",
            post(endpoints::rotate_secret_handler),
        )
        .route(
            "/webhooks/endpoints/:id/test",
            post(endpoints::test_endpoint_handler),
        )
        // Event types
        .route(
            "/webhooks/event-types",
            get(endpoints::list_event_types_handler),
        )
        // Delivery history
        .route(
            "/webhooks/deliveries",
            get(deliveries::list_deliveries_handler),
        )
        .route(
            "/webhooks/deliveries/:id",
            get(deliveries::get_delivery_handler),
        )
        .route(
            "/webhooks/deliveries/:id/retry",
            post(deliveries::retry_delivery_handler),
        )
        .with_state(state)
}
