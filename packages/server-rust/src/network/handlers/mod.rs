//! HTTP handler definitions for the `schedule-hub` server.
//!
//! Defines `AppState` (the shared state carried through axum extractors)
//! and re-exports every handler for router assembly.

pub mod error;
pub mod health;
pub mod operations;
pub mod resources;
pub mod subscriptions;

pub use error::ApiError;
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use operations::operation_status_handler;
pub use resources::{
    cancel_resource_handler, create_resource_handler, delete_resource_handler,
    delete_user_resources_handler, get_resource_handler, list_resources_handler,
    list_user_resources_handler, update_resource_async_handler, update_resource_handler,
};
pub use subscriptions::{subscribe_email_handler, subscribe_https_handler, subscribe_sms_handler};

use std::sync::Arc;
use std::time::Instant;

use super::{NetworkConfig, ShutdownController};
use crate::service::Services;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Every field is an `Arc` or cheap clone.
#[derive(Clone)]
pub struct AppState {
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
    pub services: Services,
}
