//! Database layer for the Lattice platform.
//!
//! Provides the connection pool wrapper, embedded SQL migrations, and the
//! sqlx models for webhook endpoint configuration and delivery history.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::DbPool;
