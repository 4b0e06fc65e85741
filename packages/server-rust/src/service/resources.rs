//! Synchronous CRUD over scheduling entities.
//!
//! Successful create, update, and cancel announce the change through the
//! [`NotificationDispatcher`] on a detached task. Deletes are silent.

use std::sync::Arc;

use schedule_hub_core::{
    validate_create, validate_update, ActionVerb, Entity, ResourceId, ResourceKind,
};
use serde_json::Value;
use tracing::debug;

use crate::service::notify::NotificationDispatcher;
use crate::traits::{ListFilter, ResourceStore, StoreError};

#[derive(Clone)]
pub struct ResourceService {
    store: Arc<dyn ResourceStore>,
    dispatcher: NotificationDispatcher,
}

impl ResourceService {
    #[must_use]
    pub fn new(store: Arc<dyn ResourceStore>, dispatcher: NotificationDispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// # Errors
    ///
    /// [`StoreError::ValidationFailed`] for a bad payload, [`StoreError::Conflict`]
    /// for a duplicate natural key.
    pub async fn create(&self, kind: ResourceKind, payload: &Value) -> Result<Entity, StoreError> {
        validate_create(kind, payload)
            .into_result()
            .map_err(StoreError::ValidationFailed)?;
        let entity = self.store.create(kind, payload).await?;
        debug!(resource_type = %kind, resource_id = entity.id(), "created");
        self.dispatcher.spawn_notify(ActionVerb::Created, entity.clone());
        Ok(entity)
    }

    /// # Errors
    ///
    /// [`StoreError::NotFound`] if absent.
    pub async fn get(&self, kind: ResourceKind, id: ResourceId) -> Result<Entity, StoreError> {
        self.store
            .get(kind, id)
            .await?
            .ok_or(StoreError::NotFound { kind, id })
    }

    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn list(
        &self,
        kind: ResourceKind,
        filter: &ListFilter,
    ) -> Result<Vec<Entity>, StoreError> {
        self.store.list(kind, filter).await
    }

    /// Applies a partial update immediately.
    ///
    /// # Errors
    ///
    /// [`StoreError::ValidationFailed`], [`StoreError::NotFound`], or
    /// [`StoreError::Conflict`].
    pub async fn update(
        &self,
        kind: ResourceKind,
        id: ResourceId,
        payload: &Value,
    ) -> Result<Entity, StoreError> {
        validate_update(kind, payload)
            .into_result()
            .map_err(StoreError::ValidationFailed)?;
        let entity = self.store.apply_update(kind, id, payload).await?;
        self.dispatcher.spawn_notify(ActionVerb::Updated, entity.clone());
        Ok(entity)
    }

    /// Marks an appointment cancelled. The row is kept.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unsupported`] for kinds without a cancelled state,
    /// [`StoreError::NotFound`] if absent.
    pub async fn cancel(&self, kind: ResourceKind, id: ResourceId) -> Result<Entity, StoreError> {
        let entity = self.store.cancel(kind, id).await?;
        self.dispatcher.spawn_notify(ActionVerb::Cancelled, entity.clone());
        Ok(entity)
    }

    /// # Errors
    ///
    /// [`StoreError::NotFound`] if absent.
    pub async fn delete(&self, kind: ResourceKind, id: ResourceId) -> Result<(), StoreError> {
        self.store.delete(kind, id).await?;
        debug!(resource_type = %kind, resource_id = id, "deleted");
        Ok(())
    }

    /// Deletes every `kind` row owned by `user_id`. Returns the count removed.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unsupported`] for kinds without an owning user.
    pub async fn delete_for_user(
        &self,
        kind: ResourceKind,
        user_id: u64,
    ) -> Result<u64, StoreError> {
        if kind == ResourceKind::Course {
            return Err(StoreError::Unsupported {
                kind,
                operation: "delete by user",
            });
        }
        let removed = self
            .store
            .delete_where(kind, &ListFilter::by_user(user_id))
            .await?;
        debug!(resource_type = %kind, user_id, removed, "deleted by user");
        Ok(removed)
    }
}
