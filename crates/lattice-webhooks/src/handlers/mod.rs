//! HTTP handlers for the webhook management surface.

pub mod deliveries;
pub mod endpoints;
