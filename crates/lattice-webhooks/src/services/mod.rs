//! Business logic services for the webhook system.

pub mod delivery_service;
pub mod dispatcher;
pub mod endpoint_service;
