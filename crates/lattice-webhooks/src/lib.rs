//! Webhook event dispatch and delivery for the Lattice platform.
//!
//! Turns internal domain events into signed, at-least-once HTTP deliveries
//! to organization-configured endpoints: endpoint registry with server-side
//! secrets, per-endpoint fan-out into a delivery ledger and job queue, an
//! HMAC-SHA256 signing scheme with replay tolerance, and a retry state
//! machine with bounded attempts and scheduled backoff.

pub mod crypto;
pub mod error;
pub mod events;
pub mod handlers;
pub mod models;
pub mod queue;
pub mod router;
pub mod secrets;
pub mod services;
pub mod validation;
pub mod worker;

pub use error::WebhookError;
pub use events::WebhookEventType;
pub use models::{WebhookCaller, WebhookPayload};
pub use queue::{DeliveryJob, DeliveryQueue, InProcessQueue};
pub use router::{webhooks_router, WebhooksState};
pub use services::dispatcher::EventDispatcher;
pub use worker::{RetryPoller, WebhookWorker};
