//! Database models.

pub mod webhook_delivery;
pub mod webhook_endpoint;

pub use webhook_delivery::{
    CreateWebhookDelivery, DeliveryFilter, DeliveryOutcome, DeliveryStatus, WebhookDelivery,
};
pub use webhook_endpoint::{CreateWebhookEndpoint, UpdateWebhookEndpoint, WebhookEndpoint};
