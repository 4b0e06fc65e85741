//! Network module with deferred startup lifecycle.
//!
//! `new()` wires shared state, `start()` binds the TCP listener, and
//! `serve()` accepts connections until shutdown. Callers can read the bound
//! port or share the shutdown controller between `start()` and `serve()`.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    cancel_resource_handler, create_resource_handler, delete_resource_handler,
    delete_user_resources_handler, get_resource_handler, health_handler, list_resources_handler,
    list_user_resources_handler, liveness_handler, operation_status_handler, readiness_handler,
    subscribe_email_handler, subscribe_https_handler, subscribe_sms_handler,
    update_resource_async_handler, update_resource_handler, AppState,
};
use super::middleware::{build_http_layers, track_in_flight};
use super::shutdown::ShutdownController;
use crate::service::Services;

/// Manages the HTTP server lifecycle.
///
/// 1. `new()` -- allocates the shutdown controller
/// 2. `start()` -- binds the TCP listener to the configured address
/// 3. `serve()` -- accepts connections until shutdown is signalled, then drains
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
    services: Services,
}

impl NetworkModule {
    #[must_use]
    pub fn new(config: NetworkConfig, services: Services) -> Self {
        Self {
            config,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
            services,
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the router over this module's services.
    pub fn build_router(&self) -> Router {
        build_router(AppState {
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.config.clone()),
            start_time: Instant::now(),
            services: self.services.clone(),
        })
    }

    /// Binds the TCP listener and returns the bound port (OS-assigned when
    /// the configured port is 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then waits up to `drain_timeout`
    /// for in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called or the server hits a
    /// fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let router = self.build_router();
        let shutdown_ctrl = Arc::clone(&self.shutdown);
        let drain_timeout = self.config.drain_timeout;

        shutdown_ctrl.set_ready();
        info!("Serving HTTP connections");

        let signal_ctrl = Arc::clone(&shutdown_ctrl);
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                signal_ctrl.trigger_shutdown();
            })
            .await?;

        shutdown_ctrl.trigger_shutdown();
        if shutdown_ctrl.wait_for_drain(drain_timeout).await {
            info!("All in-flight requests drained");
        } else {
            warn!(
                in_flight = shutdown_ctrl.in_flight_count(),
                "Drain timeout expired with in-flight requests remaining"
            );
        }
        Ok(())
    }
}

/// Routes:
/// - `GET /health`, `/health/live`, `/health/ready` -- probes, never refused
/// - `GET /operations/{operation_id}` -- async mutation status
/// - `POST /subscriptions/{email,sms,https}`
/// - `GET|POST /{resource}`
/// - `GET|PUT|DELETE /{resource}/{id}`
/// - `PUT /{resource}/{id}/async` -- tracked update, answers 202
/// - `POST /{resource}/{id}/cancel`
/// - `GET|DELETE /{resource}/users/{user_id}`
pub fn build_router(state: AppState) -> Router {
    let layers = build_http_layers(&state.config);

    let api = Router::new()
        .route("/operations/{operation_id}", get(operation_status_handler))
        .route("/subscriptions/email", post(subscribe_email_handler))
        .route("/subscriptions/sms", post(subscribe_sms_handler))
        .route("/subscriptions/https", post(subscribe_https_handler))
        .route(
            "/{resource}",
            get(list_resources_handler).post(create_resource_handler),
        )
        .route(
            "/{resource}/{id}",
            get(get_resource_handler)
                .put(update_resource_handler)
                .delete(delete_resource_handler),
        )
        .route("/{resource}/{id}/async", put(update_resource_async_handler))
        .route("/{resource}/{id}/cancel", post(cancel_resource_handler))
        .route(
            "/{resource}/users/{user_id}",
            get(list_user_resources_handler).delete(delete_user_resources_handler),
        )
        .layer(from_fn_with_state(
            Arc::clone(&state.shutdown),
            track_in_flight,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .merge(api)
        .layer(layers)
        .with_state(state)
}
