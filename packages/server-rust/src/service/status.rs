//! Read-only view of operation records for polling clients.

use http::StatusCode;
use schedule_hub_core::{Operation, OperationId};

use crate::storage::OperationStore;

/// Result of looking up an operation id.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusOutcome {
    /// Unknown, expired, or malformed id.
    NotFound,
    /// Still `processing`.
    InProgress(Operation),
    /// `completed` or `failed`.
    Terminal(Operation),
}

impl StatusOutcome {
    #[must_use]
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InProgress(_) => StatusCode::ACCEPTED,
            Self::Terminal(_) => StatusCode::OK,
        }
    }

    #[must_use]
    pub fn record(&self) -> Option<&Operation> {
        match self {
            Self::NotFound => None,
            Self::InProgress(op) | Self::Terminal(op) => Some(op),
        }
    }
}

/// Looks up `raw_id` without mutating anything.
///
/// # Errors
///
/// Returns an error only if the operation store itself fails.
pub async fn operation_status(
    operations: &dyn OperationStore,
    raw_id: &str,
) -> anyhow::Result<StatusOutcome> {
    let Ok(id) = raw_id.parse::<OperationId>() else {
        return Ok(StatusOutcome::NotFound);
    };
    Ok(match operations.get(&id).await? {
        None => StatusOutcome::NotFound,
        Some(op) if op.is_terminal() => StatusOutcome::Terminal(op),
        Some(op) => StatusOutcome::InProgress(op),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use schedule_hub_core::{OperationKind, ResourceKind};
    use serde_json::json;

    use super::*;
    use crate::storage::InMemoryOperationStore;

    async fn stored(store: &InMemoryOperationStore, ttl: Duration) -> Operation {
        let op = Operation::processing(
            OperationId::generate(),
            ResourceKind::Schedule,
            42,
            OperationKind::Update,
            json!({ "location": "Room B" }),
        );
        store.put(op.id, op.clone(), ttl).await.unwrap();
        op
    }

    #[tokio::test]
    async fn maps_lifecycle_to_status_codes() {
        let store = InMemoryOperationStore::new();
        let mut op = stored(&store, Duration::from_secs(60)).await;

        let outcome = operation_status(&store, &op.id.to_string()).await.unwrap();
        assert_eq!(outcome.http_status(), StatusCode::ACCEPTED);
        assert_eq!(outcome.record().unwrap().status(), "processing");

        op.fail("boom").unwrap();
        store
            .put(op.id, op.clone(), Duration::from_secs(60))
            .await
            .unwrap();
        let outcome = operation_status(&store, &op.id.to_string()).await.unwrap();
        assert_eq!(outcome, StatusOutcome::Terminal(op));
        assert_eq!(outcome.http_status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids_are_not_found() {
        let store = InMemoryOperationStore::new();
        let unknown = OperationId::generate().to_string();
        for raw in [unknown.as_str(), "not-a-uuid", ""] {
            let outcome = operation_status(&store, raw).await.unwrap();
            assert_eq!(outcome, StatusOutcome::NotFound);
            assert_eq!(outcome.http_status(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn expired_is_indistinguishable_from_unknown() {
        let store = InMemoryOperationStore::new();
        let op = stored(&store, Duration::from_secs(5)).await;
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(
            operation_status(&store, &op.id.to_string()).await.unwrap(),
            StatusOutcome::NotFound
        );
    }
}
