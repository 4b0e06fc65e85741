//! Tracked background mutations.
//!
//! An [`Operation`] records one accepted async mutation from the moment it is
//! acknowledged until its single terminal transition. The outcome lives in
//! [`OperationState`], an enum tagged by `status`, so a record can never carry
//! both a result and an error, and a processing record carries neither.
//!
//! State machine: `processing -> completed | failed`. Terminal states are final.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::{ResourceId, ResourceKind};

/// Opaque operation identifier: a random (v4) UUID.
///
/// Used both as the lookup key in the operation store and as the public
/// status URL path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Public status URL for this operation.
    #[must_use]
    pub fn status_url(&self) -> String {
        format!("/operations/{self}")
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for OperationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// The mutation verb an operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Update,
}

/// Lifecycle state of an operation, tagged on the wire by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OperationState {
    /// Accepted; background execution has not finished.
    Processing,
    /// The mutation was applied; `result` is the entity's final representation.
    Completed { result: Value },
    /// The mutation was rejected or could not be applied.
    Failed { error: String },
}

impl OperationState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }

    /// Wire name of the state (`processing`, `completed`, `failed`).
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Error returned when attempting to move an operation out of a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("operation {id} is already {status}")]
    AlreadyTerminal {
        id: OperationId,
        status: &'static str,
    },
}

/// One in-flight or finished background mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: OperationId,
    pub resource_type: ResourceKind,
    pub resource_id: ResourceId,
    pub operation: OperationKind,
    /// The submitted payload, retained for diagnostics.
    pub request_payload: Value,
    #[serde(flatten)]
    pub state: OperationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Operation {
    /// Creates a new record in the `processing` state.
    #[must_use]
    pub fn processing(
        id: OperationId,
        resource_type: ResourceKind,
        resource_id: ResourceId,
        operation: OperationKind,
        request_payload: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            resource_type,
            resource_id,
            operation,
            request_payload,
            state: OperationState::Processing,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transitions to `completed` with the mutated entity.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::AlreadyTerminal`] if the record is not processing.
    pub fn complete(&mut self, result: Value) -> Result<(), TransitionError> {
        self.transition(OperationState::Completed { result })
    }

    /// Transitions to `failed` with a human-readable reason.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::AlreadyTerminal`] if the record is not processing.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(OperationState::Failed {
            error: error.into(),
        })
    }

    fn transition(&mut self, next: OperationState) -> Result<(), TransitionError> {
        if self.state.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                id: self.id,
                status: self.state.label(),
            });
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    #[must_use]
    pub fn status(&self) -> &'static str {
        self.state.label()
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        match &self.state {
            OperationState::Completed { result } => Some(result),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            OperationState::Failed { error } => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn new_op() -> Operation {
        Operation::processing(
            OperationId::generate(),
            ResourceKind::Schedule,
            42,
            OperationKind::Update,
            json!({ "location": "Room B" }),
        )
    }

    #[test]
    fn ids_are_unique_and_parse_back() {
        let a = OperationId::generate();
        let b = OperationId::generate();
        assert_ne!(a, b);
        assert_eq!(a.to_string().parse::<OperationId>().unwrap(), a);
        assert!("not-a-uuid".parse::<OperationId>().is_err());
        assert_eq!(a.status_url(), format!("/operations/{a}"));
    }

    #[test]
    fn processing_record_serializes_without_result_or_error() {
        let op = new_op();
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["status"], "processing");
        assert_eq!(json["resourceType"], "schedule");
        assert_eq!(json["resourceId"], 42);
        assert_eq!(json["operation"], "update");
        assert!(json.get("result").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn completed_record_carries_result_only() {
        let mut op = new_op();
        op
            .complete(json!({ "id": 42, "location": "Room B" }))
            .unwrap();
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["result"]["location"], "Room B");
        assert!(json.get("error").is_none());
        assert!(op.error().is_none());
    }

    #[test]
    fn failed_record_carries_error_only() {
        let mut op = new_op();
        op
            .fail("Schedule start time must be less than end time")
            .unwrap();
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["status"], "failed");
        assert!(json.get("result").is_none());
        assert_eq!(op.error(), Some("Schedule start time must be less than end time"));
    }

    #[test]
    fn terminal_state_cannot_transition_again() {
        let mut op = new_op();
        op.complete(json!({})).unwrap();
        let err = op.fail("late failure").unwrap_err();
        assert_eq!(
            err,
            TransitionError::AlreadyTerminal {
                id: op.id,
                status: "completed"
            }
        );
        assert_eq!(op.status(), "completed");
    }

    #[test]
    fn deserializes_from_wire_form() {
        let mut op = new_op();
        op.complete(json!({ "id": 42 })).unwrap();
        let wire = serde_json::to_string(&op).unwrap();
        let back: Operation = serde_json::from_str(&wire).unwrap();
        assert_eq!(back, op);
    }

    proptest! {
        #[test]
        fn first_transition_wins(steps in proptest::collection::vec(any::<bool>(), 1..8)) {
            let mut op = new_op();
            let first_is_complete = steps[0];
            for complete in steps {
                let _ = if complete { op.complete(json!({})) } else { op.fail("boom") };
                prop_assert!(op.is_terminal());
            }
            prop_assert_eq!(op.result().is_some(), first_is_complete);
            prop_assert_eq!(op.error().is_some(), !first_is_complete);
        }
    }
}
