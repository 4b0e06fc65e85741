//! Ephemeral notification events.
//!
//! A [`NotificationEvent`] is built from an entity right after a state change
//! and consumed immediately by the dispatcher. It is never stored.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::types::{Entity, ResourceId, ResourceKind};

/// The state change being announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionVerb {
    Created,
    Updated,
    Cancelled,
}

impl ActionVerb {
    #[must_use]
    pub fn as_upper(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

/// A resource kind paired with a verb, e.g. `APPOINTMENT_CREATED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationAction {
    pub kind: ResourceKind,
    pub verb: ActionVerb,
}

impl NotificationAction {
    #[must_use]
    pub const fn new(kind: ResourceKind, verb: ActionVerb) -> Self {
        Self { kind, verb }
    }

    /// Prefix shared by every action code of this kind (`APPOINTMENT_`).
    #[must_use]
    pub fn prefix(&self) -> String {
        format!("{}_", self.kind.as_str().to_ascii_uppercase())
    }

    /// Wire code, e.g. `APPOINTMENT_CREATED` or `COURSE_MEMBERSHIP_UPDATED`.
    #[must_use]
    pub fn code(&self) -> String {
        format!("{}{}", self.prefix(), self.verb.as_upper())
    }

    /// Human phrase: the code with its kind prefix stripped, lowercased.
    #[must_use]
    pub fn phrase(&self) -> String {
        let code = self.code();
        code.strip_prefix(&self.prefix())
            .unwrap_or(&code)
            .replace('_', " ")
            .to_lowercase()
    }
}

impl fmt::Display for NotificationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl Serialize for NotificationAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.code())
    }
}

/// Textual fields of the entity that templates interpolate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A resource state change, ready to be rendered into channel messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub action: NotificationAction,
    pub resource_type: ResourceKind,
    pub resource_id: ResourceId,
    pub subject_fields: SubjectFields,
    pub occurred_at: DateTime<Utc>,
}

impl NotificationEvent {
    /// Captures `entity` as it is right now.
    #[must_use]
    pub fn from_entity(action: NotificationAction, entity: &Entity) -> Self {
        let (start_time, end_time) = entity.time_window().unzip();
        Self {
            action,
            resource_type: entity.kind(),
            resource_id: entity.id(),
            subject_fields: SubjectFields {
                start_time,
                end_time,
                description: entity.description().map(str::to_owned),
            },
            occurred_at: Utc::now(),
        }
    }
}
