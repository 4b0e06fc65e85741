use async_trait::async_trait;
use schedule_hub_core::{ChannelMessages, Entity, EntityError, ResourceId, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors surfaced by a [`ResourceStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{} {id} not found", .kind.display_name())]
    NotFound { kind: ResourceKind, id: ResourceId },
    #[error("{0}")]
    ValidationFailed(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{operation} is not supported for {kind}")]
    Unsupported {
        kind: ResourceKind,
        operation: &'static str,
    },
    #[error("storage error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<EntityError> for StoreError {
    fn from(e: EntityError) -> Self {
        Self::ValidationFailed(e.to_string())
    }
}

/// Equality filter on the integer foreign-key columns of an entity.
///
/// All set fields must match. An entity lacking a filtered column never matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilter {
    pub user_id: Option<u64>,
    pub section_id: Option<u64>,
    pub schedule_id: Option<u64>,
    pub course_id: Option<u64>,
}

impl ListFilter {
    #[must_use]
    pub fn by_user(user_id: u64) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        [
            ("userId", self.user_id),
            ("sectionId", self.section_id),
            ("scheduleId", self.schedule_id),
            ("courseId", self.course_id),
        ]
        .into_iter()
        .all(|(field, wanted)| match wanted {
            None => true,
            Some(v) => entity.integer_field(field) == Some(v),
        })
    }
}

/// Relational persistence of scheduling entities.
/// Implementations: in-memory (`MemoryResourceStore`); SQL backends plug in here.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Whether an entity with this id exists.
    async fn exists(&self, kind: ResourceKind, id: ResourceId) -> Result<bool, StoreError>;

    /// Load a single entity.
    async fn get(&self, kind: ResourceKind, id: ResourceId) -> Result<Option<Entity>, StoreError>;

    /// Load every entity of `kind` matching `filter`, ordered by id.
    async fn list(
        &self,
        kind: ResourceKind,
        filter: &ListFilter,
    ) -> Result<Vec<Entity>, StoreError>;

    /// Insert a new entity from a full field payload and return it with its id.
    async fn create(&self, kind: ResourceKind, payload: &Value) -> Result<Entity, StoreError>;

    /// Merge a partial payload into an existing entity and return the result.
    ///
    /// Fails with `NotFound` if the entity is absent and `ValidationFailed`
    /// if the merged entity violates an invariant.
    async fn apply_update(
        &self,
        kind: ResourceKind,
        id: ResourceId,
        payload: &Value,
    ) -> Result<Entity, StoreError>;

    /// Mark an entity cancelled, keeping the row. Only kinds with a
    /// cancellable lifecycle support this.
    async fn cancel(&self, kind: ResourceKind, id: ResourceId) -> Result<Entity, StoreError>;

    /// Remove a single entity.
    async fn delete(&self, kind: ResourceKind, id: ResourceId) -> Result<(), StoreError>;

    /// Remove every entity of `kind` matching `filter`. Returns the count removed.
    async fn delete_where(
        &self,
        kind: ResourceKind,
        filter: &ListFilter,
    ) -> Result<u64, StoreError>;
}

/// Delivery protocol of a notification subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionProtocol {
    Email,
    Sms,
    Https,
}

impl SubscriptionProtocol {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Https => "https",
        }
    }
}

/// Acknowledgement returned by a publisher for a new subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionReceipt {
    pub subscription_id: String,
    pub destination: String,
    pub protocol: SubscriptionProtocol,
    pub endpoint: String,
}

/// Best-effort fan-out transport for notifications.
/// Implementations: HTTP broker gateway (`HttpPublisher`), in-memory (`InMemoryPublisher`).
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Deliver one multi-channel message to `destination`. Single attempt.
    async fn publish(
        &self,
        destination: &str,
        messages: &ChannelMessages,
        subject: &str,
    ) -> anyhow::Result<()>;

    /// Register `endpoint` to receive messages published to `destination`.
    async fn subscribe(
        &self,
        destination: &str,
        protocol: SubscriptionProtocol,
        endpoint: &str,
    ) -> anyhow::Result<SubscriptionReceipt>;
}
