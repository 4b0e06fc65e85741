//! Application services behind the HTTP surface.
//!
//! 1. **Resources** (`resources`): synchronous CRUD with notification on change
//! 2. **Coordinator** (`coordinator`): async updates tracked as operations
//! 3. **Status** (`status`): read-only operation lookup for polling clients
//! 4. **Notify** (`notify`): best-effort rendering and publishing of changes
//! 5. **Subscriptions** (`subscriptions`): endpoint registration with the publisher
//! 6. **Background workers** (`worker`): periodic operation sweeps

pub mod config;
pub mod coordinator;
pub mod notify;
pub mod resources;
pub mod status;
pub mod subscriptions;
pub mod worker;

use std::sync::Arc;

pub use config::ServiceConfig;
pub use coordinator::{Acknowledgement, AsyncMutationCoordinator, Submission, SubmitError};
pub use notify::{DispatchOutcome, NotificationDispatcher, NotificationPolicy};
pub use resources::ResourceService;
pub use status::{operation_status, StatusOutcome};
pub use subscriptions::{SubscriptionError, SubscriptionService};
pub use worker::{BackgroundRunnable, BackgroundWorker, OperationSweeper, SweepTask};

use crate::storage::{InMemoryOperationStore, MemoryResourceStore, OperationStore};
use crate::traits::{Publisher, ResourceStore};

/// Every service wired to one set of stores and one publisher. Cheap to clone.
#[derive(Clone)]
pub struct Services {
    pub resources: ResourceService,
    pub coordinator: AsyncMutationCoordinator,
    pub subscriptions: SubscriptionService,
    pub operations: Arc<dyn OperationStore>,
    pub config: Arc<ServiceConfig>,
}

impl Services {
    #[must_use]
    pub fn new(
        config: ServiceConfig,
        store: Arc<dyn ResourceStore>,
        operations: Arc<dyn OperationStore>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let dispatcher = NotificationDispatcher::new(
            Arc::clone(&publisher),
            NotificationPolicy::from_config(&config),
        );

        let mut coordinator = AsyncMutationCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&operations),
            dispatcher.clone(),
            config.operation_ttl,
        );
        if config.serialize_per_resource {
            coordinator = coordinator.with_per_resource_serialization();
        }

        Self {
            resources: ResourceService::new(store, dispatcher),
            coordinator,
            subscriptions: SubscriptionService::new(
                publisher,
                config.notification_destination.clone(),
            ),
            operations,
            config: Arc::new(config),
        }
    }

    /// Services over fresh in-memory stores, honoring `operation_capacity`.
    #[must_use]
    pub fn in_memory(config: ServiceConfig, publisher: Arc<dyn Publisher>) -> Self {
        let operations: Arc<dyn OperationStore> = match config.operation_capacity {
            Some(capacity) => Arc::new(InMemoryOperationStore::with_capacity(capacity)),
            None => Arc::new(InMemoryOperationStore::new()),
        };
        Self::new(
            config,
            Arc::new(MemoryResourceStore::new()),
            operations,
            publisher,
        )
    }

    /// Starts the periodic sweep of expired operation records.
    #[must_use]
    pub fn start_sweeper(&self) -> BackgroundWorker<OperationSweeper> {
        BackgroundWorker::start(
            OperationSweeper::new(Arc::clone(&self.operations)),
            self.config.sweep_interval,
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::publish::InMemoryPublisher;
    use schedule_hub_core::ResourceKind;

    #[tokio::test]
    async fn in_memory_services_share_stores() {
        let services = Services::in_memory(
            ServiceConfig {
                serialize_per_resource: true,
                ..ServiceConfig::default()
            },
            Arc::new(InMemoryPublisher::new()),
        );
        let course = services
            .resources
            .create(ResourceKind::Course, &json!({ "courseName": "Compilers" }))
            .await
            .unwrap();
        let submission = services
            .coordinator
            .submit(ResourceKind::Course, course.id(), json!({ "courseName": "Parsers" }))
            .await
            .unwrap();
        submission.task.await.unwrap();

        let outcome = operation_status(
            services.operations.as_ref(),
            &submission.ack.operation_id.to_string(),
        )
        .await
        .unwrap();
        assert_eq!(outcome.record().unwrap().result().unwrap()["courseName"], "Parsers");

        let mut sweeper = services.start_sweeper();
        sweeper.stop().await;
    }
}
