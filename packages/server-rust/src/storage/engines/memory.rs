//! In-memory [`ResourceStore`] implementation backed by [`DashMap`].
//!
//! One table per resource kind. Each table keeps its rows, a natural-key index
//! for kinds that declare one, and a monotonically increasing id counter.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use schedule_hub_core::{validate_create, AppointmentStatus, Entity, ResourceId, ResourceKind};
use serde_json::Value;

use crate::traits::{ListFilter, ResourceStore, StoreError};

struct Table {
    rows: DashMap<ResourceId, Entity>,
    unique: DashMap<String, ResourceId>,
    next_id: AtomicU64,
}

impl Table {
    fn new() -> Self {
        Self {
            rows: DashMap::new(),
            unique: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn reserve_key(
        &self,
        kind: ResourceKind,
        key: String,
        id: ResourceId,
    ) -> Result<(), StoreError> {
        match self.unique.entry(key) {
            MapEntry::Occupied(existing) if *existing.get() != id => Err(StoreError::Conflict(
                format!("{} already exists", kind.display_name()),
            )),
            MapEntry::Occupied(_) => Ok(()),
            MapEntry::Vacant(slot) => {
                slot.insert(id);
                Ok(())
            }
        }
    }

    fn release_key(&self, entity: &Entity) {
        if let Some(key) = entity.unique_key() {
            let id = entity.id();
            self.unique.remove_if(&key, |_, owner| *owner == id);
        }
    }
}

/// Concurrent in-memory relational store for all scheduling entities.
///
/// Rows of a kind with a natural key (schedules, appointments) are unique on
/// that key; a create or update that would duplicate it fails with
/// [`StoreError::Conflict`].
pub struct MemoryResourceStore {
    tables: [Table; 4],
}

impl MemoryResourceStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: [Table::new(), Table::new(), Table::new(), Table::new()],
        }
    }

    fn table(&self, kind: ResourceKind) -> &Table {
        let idx = match kind {
            ResourceKind::Schedule => 0,
            ResourceKind::Appointment => 1,
            ResourceKind::Course => 2,
            ResourceKind::CourseMembership => 3,
        };
        &self.tables[idx]
    }

    /// Stores `entity` under its own id, replacing any row with that id.
    ///
    /// Subsequent creates of the same kind are assigned ids above it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the entity duplicates another row's
    /// natural key, or [`StoreError::ValidationFailed`] if it violates an invariant.
    pub fn insert(&self, entity: Entity) -> Result<Entity, StoreError> {
        entity.check_invariants()?;
        let kind = entity.kind();
        let id = entity.id();
        let table = self.table(kind);
        if let Some(key) = entity.unique_key() {
            table.reserve_key(kind, key, id)?;
        }
        table.next_id.fetch_max(id + 1, Ordering::SeqCst);
        if let Some(previous) = table.rows.insert(id, entity.clone()) {
            if previous.unique_key() != entity.unique_key() {
                table.release_key(&previous);
            }
        }
        Ok(entity)
    }

    /// Number of rows of `kind`.
    #[must_use]
    pub fn count(&self, kind: ResourceKind) -> usize {
        self.table(kind).rows.len()
    }
}

impl Default for MemoryResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceStore for MemoryResourceStore {
    async fn exists(&self, kind: ResourceKind, id: ResourceId) -> Result<bool, StoreError> {
        Ok(self.table(kind).rows.contains_key(&id))
    }

    async fn get(&self, kind: ResourceKind, id: ResourceId) -> Result<Option<Entity>, StoreError> {
        Ok(self.table(kind).rows.get(&id).map(|r| r.value().clone()))
    }

    async fn list(
        &self,
        kind: ResourceKind,
        filter: &ListFilter,
    ) -> Result<Vec<Entity>, StoreError> {
        let mut rows: Vec<Entity> = self
            .table(kind)
            .rows
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(Entity::id);
        Ok(rows)
    }

    async fn create(&self, kind: ResourceKind, payload: &Value) -> Result<Entity, StoreError> {
        validate_create(kind, payload)
            .into_result()
            .map_err(StoreError::ValidationFailed)?;
        let Value::Object(fields) = payload else {
            return Err(StoreError::ValidationFailed(
                "request body must be a JSON object".into(),
            ));
        };

        let table = self.table(kind);
        let id = table.next_id.fetch_add(1, Ordering::SeqCst);
        let entity = Entity::from_fields(kind, id, fields)?;
        if let Some(key) = entity.unique_key() {
            table.reserve_key(kind, key, id)?;
        }
        table.rows.insert(id, entity.clone());
        Ok(entity)
    }

    async fn apply_update(
        &self,
        kind: ResourceKind,
        id: ResourceId,
        payload: &Value,
    ) -> Result<Entity, StoreError> {
        let table = self.table(kind);
        let Some(mut row) = table.rows.get_mut(&id) else {
            return Err(StoreError::NotFound { kind, id });
        };

        let patched = row.apply_patch(payload)?;
        let old_key = row.unique_key();
        let new_key = patched.unique_key();
        if new_key != old_key {
            if let Some(key) = new_key {
                table.reserve_key(kind, key, id)?;
            }
            if let Some(key) = old_key {
                table.unique.remove_if(&key, |_, owner| *owner == id);
            }
        }
        *row = patched.clone();
        Ok(patched)
    }

    async fn cancel(&self, kind: ResourceKind, id: ResourceId) -> Result<Entity, StoreError> {
        if kind != ResourceKind::Appointment {
            return Err(StoreError::Unsupported {
                kind,
                operation: "cancel",
            });
        }
        let Some(mut row) = self.table(kind).rows.get_mut(&id) else {
            return Err(StoreError::NotFound { kind, id });
        };
        if let Entity::Appointment(appointment) = row.value_mut() {
            appointment.status = AppointmentStatus::Cancelled;
        }
        Ok(row.value().clone())
    }

    async fn delete(&self, kind: ResourceKind, id: ResourceId) -> Result<(), StoreError> {
        let table = self.table(kind);
        let (_, removed) = table
            .rows
            .remove(&id)
            .ok_or(StoreError::NotFound { kind, id })?;
        table.release_key(&removed);
        Ok(())
    }

    async fn delete_where(
        &self,
        kind: ResourceKind,
        filter: &ListFilter,
    ) -> Result<u64, StoreError> {
        let table = self.table(kind);
        let ids: Vec<ResourceId> = table
            .rows
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| *r.key())
            .collect();

        let mut removed = 0;
        for id in ids {
            if let Some((_, entity)) = table.rows.remove_if(&id, |_, e| filter.matches(e)) {
                table.release_key(&entity);
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn schedule_payload(location: &str) -> Value {
        json!({
            "userId": 7,
            "sectionId": 3,
            "startTime": "2026-10-16T09:00:00Z",
            "endTime": "2026-10-16T10:00:00Z",
            "location": location,
        })
    }

    fn appointment_payload(user_id: u64, start: &str, end: &str) -> Value {
        json!({
            "userId": user_id,
            "scheduleId": 1,
            "startTime": start,
            "endTime": end,
            "description": "Thesis review",
        })
    }

    #[tokio::test]
    async fn create_assigns_increasing_ids() {
        let store = MemoryResourceStore::new();
        let a = store
            .create(ResourceKind::Course, &json!({ "courseName": "Databases" }))
            .await
            .unwrap();
        let b = store
            .create(ResourceKind::Course, &json!({ "courseName": "Compilers" }))
            .await
            .unwrap();
        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
        assert!(store.exists(ResourceKind::Course, 2).await.unwrap());
        assert!(!store.exists(ResourceKind::Schedule, 1).await.unwrap());
    }

    #[tokio::test]
    async fn create_rejects_invalid_payload() {
        let store = MemoryResourceStore::new();
        let mut payload = schedule_payload("Room A");
        payload["endTime"] = json!("2026-10-16T08:00:00Z");
        let err = store
            .create(ResourceKind::Schedule, &payload)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ValidationFailed(ref m) if m.contains("start time")));
        assert_eq!(store.count(ResourceKind::Schedule), 0);
    }

    #[tokio::test]
    async fn create_duplicate_natural_key_conflicts() {
        let store = MemoryResourceStore::new();
        store
            .create(ResourceKind::Schedule, &schedule_payload("Room A"))
            .await
            .unwrap();
        let err = store
            .create(ResourceKind::Schedule, &schedule_payload("Room A"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        store
            .create(ResourceKind::Schedule, &schedule_payload("Room B"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn apply_update_merges_and_checks_window() {
        let store = MemoryResourceStore::new();
        let created = store
            .create(ResourceKind::Schedule, &schedule_payload("Room A"))
            .await
            .unwrap();

        let updated = store
            .apply_update(ResourceKind::Schedule, created.id(), &json!({ "location": "Room B" }))
            .await
            .unwrap();
        assert_eq!(updated.to_fields()["location"], "Room B");
        assert_eq!(updated.to_fields()["userId"], 7);

        let err = store
            .apply_update(
                ResourceKind::Schedule,
                created.id(),
                &json!({ "endTime": "2026-10-16T08:00:00Z" }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ValidationFailed(_)));

        let stored = store
            .get(ResourceKind::Schedule, created.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, updated, "failed update leaves the row untouched");
    }

    #[tokio::test]
    async fn apply_update_missing_row_is_not_found() {
        let store = MemoryResourceStore::new();
        let err = store
            .apply_update(ResourceKind::Schedule, 9999, &json!({ "location": "Room B" }))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Schedule 9999 not found");
    }

    #[tokio::test]
    async fn update_moves_natural_key() {
        let store = MemoryResourceStore::new();
        let a = store
            .create(ResourceKind::Schedule, &schedule_payload("Room A"))
            .await
            .unwrap();
        store
            .apply_update(ResourceKind::Schedule, a.id(), &json!({ "location": "Room C" }))
            .await
            .unwrap();
        // The old key is free again.
        store
            .create(ResourceKind::Schedule, &schedule_payload("Room A"))
            .await
            .unwrap();
        let b = store
            .create(ResourceKind::Schedule, &schedule_payload("Room D"))
            .await
            .unwrap();
        let err = store
            .apply_update(ResourceKind::Schedule, b.id(), &json!({ "location": "Room C" }))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn cancel_keeps_row_and_sets_status() {
        let store = MemoryResourceStore::new();
        let appt = store
            .create(
                ResourceKind::Appointment,
                &appointment_payload(1, "2026-10-16T09:00:00Z", "2026-10-16T09:30:00Z"),
            )
            .await
            .unwrap();
        let cancelled = store
            .cancel(ResourceKind::Appointment, appt.id())
            .await
            .unwrap();
        assert_eq!(cancelled.to_fields()["status"], "cancelled");
        assert!(store.exists(ResourceKind::Appointment, appt.id()).await.unwrap());

        let err = store.cancel(ResourceKind::Course, 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn list_filters_and_orders_by_id() {
        let store = MemoryResourceStore::new();
        for (user, start, end) in [
            (2, "2026-10-16T11:00:00Z", "2026-10-16T11:30:00Z"),
            (1, "2026-10-16T09:00:00Z", "2026-10-16T09:30:00Z"),
            (1, "2026-10-16T10:00:00Z", "2026-10-16T10:30:00Z"),
        ] {
            store
                .create(ResourceKind::Appointment, &appointment_payload(user, start, end))
                .await
                .unwrap();
        }
        let mine = store
            .list(ResourceKind::Appointment, &ListFilter::by_user(1))
            .await
            .unwrap();
        assert_eq!(mine.iter().map(Entity::id).collect::<Vec<_>>(), vec![2, 3]);

        let all = store
            .list(ResourceKind::Appointment, &ListFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn delete_and_delete_where() {
        let store = MemoryResourceStore::new();
        for user in [1, 1, 2] {
            store
                .create(
                    ResourceKind::CourseMembership,
                    &json!({ "userId": user, "courseId": 9 }),
                )
                .await
                .unwrap();
        }
        let removed = store
            .delete_where(ResourceKind::CourseMembership, &ListFilter::by_user(1))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count(ResourceKind::CourseMembership), 1);

        store
            .delete(ResourceKind::CourseMembership, 3)
            .await
            .unwrap();
        let err = store
            .delete(ResourceKind::CourseMembership, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn insert_seeds_row_and_advances_counter() {
        let store = MemoryResourceStore::new();
        let seeded = Entity::from_fields(
            ResourceKind::Course,
            42,
            &object(json!({ "courseName": "Seminar" })),
        )
        .unwrap();
        store.insert(seeded).unwrap();
        let next = store
            .create(ResourceKind::Course, &json!({ "courseName": "Next" }))
            .await
            .unwrap();
        assert_eq!(next.id(), 43);
    }

    fn object(value: Value) -> serde_json::Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }
}
