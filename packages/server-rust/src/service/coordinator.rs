//! Acknowledge-now, apply-later mutations.
//!
//! [`AsyncMutationCoordinator::submit`] validates a partial update, checks the
//! target exists, writes a `processing` operation record, and returns an
//! acknowledgement. The mutation itself runs on a detached task whose only way
//! back to the client is the operation record it finalizes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use schedule_hub_core::{
    validate_update, ActionVerb, Operation, OperationId, OperationKind, ResourceId, ResourceKind,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{error, info_span, warn, Instrument};

use crate::service::notify::NotificationDispatcher;
use crate::storage::OperationStore;
use crate::traits::{ResourceStore, StoreError};

/// Message returned with every accepted submission.
pub const ACCEPTED_MESSAGE: &str = "Update request accepted";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Body of a `202 Accepted` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Acknowledgement {
    pub message: String,
    pub status_url: String,
    pub operation_id: OperationId,
}

/// An accepted submission: the acknowledgement plus the detached task.
///
/// Request handlers drop `task`; tests may await it.
#[derive(Debug)]
pub struct Submission {
    pub ack: Acknowledgement,
    pub task: JoinHandle<()>,
}

/// Synchronous rejection of a submission. No operation record exists.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("{} {id} not found", .kind.display_name())]
    NotFound { kind: ResourceKind, id: ResourceId },
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Store(StoreError),
    #[error("failed to record operation: {0}")]
    Tracking(#[source] anyhow::Error),
}

// ---------------------------------------------------------------------------
// Per-resource locks
// ---------------------------------------------------------------------------

type LockKey = (ResourceKind, ResourceId);

#[derive(Default)]
struct ResourceLocks {
    map: DashMap<LockKey, Arc<Mutex<()>>>,
}

impl ResourceLocks {
    async fn acquire(self: &Arc<Self>, key: LockKey) -> ResourceGuard {
        let mutex = Arc::clone(self.map.entry(key).or_default().value());
        let guard = mutex.lock_owned().await;
        ResourceGuard {
            locks: Arc::clone(self),
            key,
            guard: Some(guard),
        }
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

struct ResourceGuard {
    locks: Arc<ResourceLocks>,
    key: LockKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: nobody holds or awaits this lock.
        self.locks
            .map
            .remove_if(&self.key, |_, m| Arc::strong_count(m) == 1);
    }
}

// ---------------------------------------------------------------------------
// AsyncMutationCoordinator
// ---------------------------------------------------------------------------

/// Turns update requests into tracked, pollable background operations.
///
/// Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct AsyncMutationCoordinator {
    store: Arc<dyn ResourceStore>,
    operations: Arc<dyn OperationStore>,
    dispatcher: NotificationDispatcher,
    ttl: Duration,
    locks: Option<Arc<ResourceLocks>>,
}

impl AsyncMutationCoordinator {
    #[must_use]
    pub fn new(
        store: Arc<dyn ResourceStore>,
        operations: Arc<dyn OperationStore>,
        dispatcher: NotificationDispatcher,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            operations,
            dispatcher,
            ttl,
            locks: None,
        }
    }

    /// Applies background mutations on the same resource one at a time, in
    /// lock-acquisition order.
    #[must_use]
    pub fn with_per_resource_serialization(mut self) -> Self {
        self.locks = Some(Arc::default());
        self
    }

    /// Accepts a partial update of `kind` `id` for background execution.
    ///
    /// Returns once the `processing` record is stored; the mutation has not
    /// necessarily run yet.
    ///
    /// # Errors
    ///
    /// - [`SubmitError::Invalid`] if `payload` fails update validation.
    /// - [`SubmitError::NotFound`] if the target does not exist.
    /// - [`SubmitError::Store`] / [`SubmitError::Tracking`] if either store is unavailable.
    pub async fn submit(
        &self,
        kind: ResourceKind,
        id: ResourceId,
        payload: Value,
    ) -> Result<Submission, SubmitError> {
        validate_update(kind, &payload)
            .into_result()
            .map_err(SubmitError::Invalid)?;
        let exists = self
            .store
            .exists(kind, id)
            .await
            .map_err(SubmitError::Store)?;
        if !exists {
            return Err(SubmitError::NotFound { kind, id });
        }

        let operation_id = OperationId::generate();
        let record = Operation::processing(operation_id, kind, id, OperationKind::Update, payload);
        self.operations
            .put(operation_id, record.clone(), self.ttl)
            .await
            .map_err(SubmitError::Tracking)?;

        let span = info_span!(
            "async_mutation",
            %operation_id,
            resource_type = %kind,
            resource_id = id,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );
        let task = tokio::spawn(self.clone().run(record).instrument(span));

        Ok(Submission {
            ack: Acknowledgement {
                message: ACCEPTED_MESSAGE.to_string(),
                status_url: operation_id.status_url(),
                operation_id,
            },
            task,
        })
    }

    /// Background half of [`submit`](Self::submit): apply, then finalize the
    /// record exactly once.
    async fn run(self, mut record: Operation) {
        let start = Instant::now();
        let kind = record.resource_type;
        let id = record.resource_id;

        let guard = match &self.locks {
            Some(locks) => Some(locks.acquire((kind, id)).await),
            None => None,
        };

        let applied = self
            .store
            .apply_update(kind, id, &record.request_payload)
            .await;
        let (transition, updated) = match applied {
            Ok(entity) => (record.complete(entity.to_value()), Some(entity)),
            Err(e) => (record.fail(e.to_string()), None),
        };
        if let Err(e) = transition {
            warn!(error = %e, "operation already terminal; leaving record untouched");
            return;
        }

        if let Err(e) = self
            .operations
            .put(record.id, record.clone(), self.ttl)
            .await
        {
            error!(error = %e, "failed to store terminal operation state");
        }
        drop(guard);

        if let Some(entity) = updated {
            self.dispatcher.notify(ActionVerb::Updated, &entity).await;
        }

        let span = tracing::Span::current();
        #[allow(clippy::cast_possible_truncation)]
        span.record("duration_ms", start.elapsed().as_millis() as u64);
        span.record("outcome", record.status());
        if let Some(reason) = record.error() {
            warn!(reason, "async mutation failed");
        }
    }

    /// Number of resources with a live per-resource lock.
    #[must_use]
    pub fn locked_resources(&self) -> usize {
        self.locks.as_ref().map_or(0, |l| l.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
