//! Webhook endpoint registry.
//!
//! CRUD over endpoint configuration with URL validation, SSRF protection,
//! per-organization endpoint caps, event subscription validation, and
//! server-side secret generation. The signing secret is returned in full
//! exactly once, from create and rotate-secret; every other read masks it.

use sqlx::PgPool;
use uuid::Uuid;

use lattice_db::models::{CreateWebhookEndpoint, UpdateWebhookEndpoint, WebhookEndpoint};

use crate::crypto;
use crate::error::WebhookError;
use crate::models::{
    endpoint_to_response, endpoint_to_response_with_secret, CreateWebhookEndpointRequest,
    ListEndpointsQuery, UpdateWebhookEndpointRequest, WebhookEndpointListResponse,
    WebhookEndpointResponse,
};
use crate::secrets;
use crate::validation;

/// Default maximum endpoints per organization.
pub const DEFAULT_MAX_ENDPOINTS: i64 = 25;

/// Service for webhook endpoint configuration.
#[derive(Clone)]
pub struct EndpointService {
    pool: PgPool,
    encryption_key: Vec<u8>,
    max_endpoints: i64,
    allow_http: bool,
}

impl EndpointService {
    /// Create a new endpoint service.
    #[must_use]
    pub fn new(pool: PgPool, encryption_key: Vec<u8>) -> Self {
        Self {
            pool,
            encryption_key,
            max_endpoints: DEFAULT_MAX_ENDPOINTS,
            allow_http: false,
        }
    }

    /// Set the maximum endpoints per organization.
    #[must_use]
    pub fn with_max_endpoints(mut self, max: i64) -> Self {
        self.max_endpoints = max;
        self
    }

    /// Allow HTTP URLs (for development/testing).
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }

    /// Create a new webhook endpoint.
    ///
    /// The response is the only read that carries the generated secret in
    /// full (besides rotation).
    pub async fn create_endpoint(
        &self,
        org_id: Uuid,
        created_by: Option<Uuid>,
        request: CreateWebhookEndpointRequest,
    ) -> Result<WebhookEndpointResponse, WebhookError> {
        validation::validate_endpoint_url(&request.url, self.allow_http)?;
        validation::validate_event_subscriptions(&request.events)?;

        let count = WebhookEndpoint::count_by_org(&self.pool, org_id).await?;
        if count >= self.max_endpoints {
            return Err(WebhookError::EndpointLimitExceeded {
                limit: self.max_endpoints,
            });
        }

        // Secret is generated server-side, never derived from user input.
        let secret = secrets::generate_secret();
        let secret_encrypted = crypto::encrypt_secret(&secret, &self.encryption_key)?;

        let endpoint = WebhookEndpoint::create(
            &self.pool,
            CreateWebhookEndpoint {
                org_id,
                url: request.url,
                description: request.description,
                secret_encrypted,
                events: request.events,
                created_by,
            },
        )
        .await?;

        tracing::info!(
            org_id = %org_id,
            endpoint_id = %endpoint.id,
            "Webhook endpoint created"
        );

        Ok(endpoint_to_response_with_secret(endpoint, secret))
    }

    /// List webhook endpoints for an organization, secrets masked.
    pub async fn list_endpoints(
        &self,
        org_id: Uuid,
        query: ListEndpointsQuery,
    ) -> Result<WebhookEndpointListResponse, WebhookError> {
        let limit = query.limit.clamp(1, 100);
        let offset = query.offset.max(0);

        let endpoints = WebhookEndpoint::list_by_org(&self.pool, org_id, limit, offset).await?;
        let total = WebhookEndpoint::count_by_org(&self.pool, org_id).await?;

        Ok(WebhookEndpointListResponse {
            items: endpoints.into_iter().map(endpoint_to_response).collect(),
            total,
            limit,
            offset,
        })
    }

    /// Get a single webhook endpoint, secret masked.
    pub async fn get_endpoint(
        &self,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<WebhookEndpointResponse, WebhookError> {
        let endpoint = WebhookEndpoint::find_by_id(&self.pool, org_id, id)
            .await?
            .ok_or(WebhookError::EndpointNotFound)?;

        Ok(endpoint_to_response(endpoint))
    }

    /// Partially update a webhook endpoint.
    pub async fn update_endpoint(
        &self,
        org_id: Uuid,
        id: Uuid,
        request: UpdateWebhookEndpointRequest,
    ) -> Result<WebhookEndpointResponse, WebhookError> {
        if let Some(ref url) = request.url {
            validation::validate_endpoint_url(url, self.allow_http)?;
        }

        if let Some(ref events) = request.events {
            validation::validate_event_subscriptions(events)?;
        }

        let endpoint = WebhookEndpoint::update(
            &self.pool,
            org_id,
            id,
            UpdateWebhookEndpoint {
                url: request.url,
                description: request.description,
                events: request.events,
                enabled: request.enabled,
            },
        )
        .await?
        .ok_or(WebhookError::EndpointNotFound)?;

        Ok(endpoint_to_response(endpoint))
    }

    /// Delete a webhook endpoint.
    ///
    /// Delivery history stays behind for audit; it is no longer reachable
    /// for retry because the endpoint lookup fails from then on.
    pub async fn delete_endpoint(&self, org_id: Uuid, id: Uuid) -> Result<(), WebhookError> {
        let deleted = WebhookEndpoint::delete(&self.pool, org_id, id).await?;
        if !deleted {
            return Err(WebhookError::EndpointNotFound);
        }

        tracing::info!(org_id = %org_id, endpoint_id = %id, "Webhook endpoint deleted");
        Ok(())
    }

    /// Replace the endpoint's signing secret.
    ///
    /// The old secret is invalidated by the same write that stores the new
    /// one; in-flight deliveries signed with it may be rejected by the
    /// receiver, which is the accepted cost of rotation.
    pub async fn rotate_secret(
        &self,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<WebhookEndpointResponse, WebhookError> {
        let secret = secrets::generate_secret();
        let secret_encrypted = crypto::encrypt_secret(&secret, &self.encryption_key)?;

        let endpoint = WebhookEndpoint::rotate_secret(&self.pool, org_id, id, &secret_encrypted)
            .await?
            .ok_or(WebhookError::EndpointNotFound)?;

        tracing::info!(org_id = %org_id, endpoint_id = %id, "Webhook secret rotated");

        Ok(endpoint_to_response_with_secret(endpoint, secret))
    }
}
