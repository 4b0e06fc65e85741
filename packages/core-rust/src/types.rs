//! Scheduling entities and the resource kinds that address them.
//!
//! Every entity is a flat JSON object with camelCase field names. Partial
//! updates are applied by merging a JSON patch into the entity's field map and
//! re-deserializing, so the typed structs stay the single source of truth for
//! what a valid row looks like.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier of a stored entity. Assigned by the store on create.
pub type ResourceId = u64;

/// The kinds of entity exposed by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A professor's teaching slot for a section.
    Schedule,
    /// A student's booking against a schedule.
    Appointment,
    /// A course offering.
    Course,
    /// Enrollment of a user in a course.
    CourseMembership,
}

impl ResourceKind {
    /// All resource kinds, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Schedule,
        Self::Appointment,
        Self::Course,
        Self::CourseMembership,
    ];

    /// Singular machine name, used as `resourceType` in operation records.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Schedule => "schedule",
            Self::Appointment => "appointment",
            Self::Course => "course",
            Self::CourseMembership => "course_membership",
        }
    }

    /// Plural URL path segment (`/schedules`, `/course-memberships`, ...).
    #[must_use]
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Schedule => "schedules",
            Self::Appointment => "appointments",
            Self::Course => "courses",
            Self::CourseMembership => "course-memberships",
        }
    }

    /// Resolves a URL path segment back to a kind.
    #[must_use]
    pub fn from_path_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.path_segment() == segment)
    }

    /// Human-readable name used in messages and notification templates.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Schedule => "Schedule",
            Self::Appointment => "Appointment",
            Self::Course => "Course",
            Self::CourseMembership => "Course membership",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A teaching slot owned by a user (professor) for a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: ResourceId,
    pub user_id: u64,
    pub section_id: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: String,
}

/// Lifecycle of an appointment. Cancelling keeps the row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Cancelled,
}

/// A booking made by a user (student) against a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: ResourceId,
    pub user_id: u64,
    pub schedule_id: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: ResourceId,
    pub course_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseMembership {
    pub id: ResourceId,
    pub user_id: u64,
    pub course_id: u64,
}

/// Errors raised when building or patching an entity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityError {
    #[error("invalid {kind} fields: {message}")]
    Malformed { kind: ResourceKind, message: String },
    #[error("{} start time must be less than end time", .0.display_name())]
    StartNotBeforeEnd(ResourceKind),
    #[error("payload for {0} must be a JSON object")]
    NotAnObject(ResourceKind),
}

/// Any stored entity. Serializes as the bare entity object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Entity {
    Schedule(Schedule),
    Appointment(Appointment),
    Course(Course),
    CourseMembership(CourseMembership),
}

impl Entity {
    /// Builds an entity of `kind` from a field map, assigning `id`.
    ///
    /// Any `id` present in `fields` is overwritten. Entity invariants are
    /// checked before returning.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::Malformed`] if fields are missing or mistyped, and
    /// [`EntityError::StartNotBeforeEnd`] if the time window is empty or inverted.
    pub fn from_fields(
        kind: ResourceKind,
        id: ResourceId,
        fields: &Map<String, Value>,
    ) -> Result<Self, EntityError> {
        let mut fields = fields.clone();
        fields.insert("id".to_string(), Value::from(id));
        let value = Value::Object(fields);

        let malformed = |e: serde_json::Error| EntityError::Malformed {
            kind,
            message: e.to_string(),
        };

        let entity = match kind {
            ResourceKind::Schedule => {
                Self::Schedule(serde_json::from_value(value).map_err(malformed)?)
            }
            ResourceKind::Appointment => {
                Self::Appointment(serde_json::from_value(value).map_err(malformed)?)
            }
            ResourceKind::Course => Self::Course(serde_json::from_value(value).map_err(malformed)?),
            ResourceKind::CourseMembership => {
                Self::CourseMembership(serde_json::from_value(value).map_err(malformed)?)
            }
        };
        entity.check_invariants()?;
        Ok(entity)
    }

    /// Returns a copy of this entity with `patch` merged over its fields.
    ///
    /// The entity's `id` is preserved regardless of the patch contents.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::NotAnObject`] if `patch` is not a JSON object, or
    /// any error from [`Entity::from_fields`] for the merged result.
    pub fn apply_patch(&self, patch: &Value) -> Result<Self, EntityError> {
        let Value::Object(patch) = patch else {
            return Err(EntityError::NotAnObject(self.kind()));
        };
        let mut fields = self.to_fields();
        for (key, value) in patch {
            fields.insert(key.clone(), value.clone());
        }
        Self::from_fields(self.kind(), self.id(), &fields)
    }

    /// Checks cross-field invariants (currently: start strictly before end).
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::StartNotBeforeEnd`] on an empty or inverted window.
    pub fn check_invariants(&self) -> Result<(), EntityError> {
        if let Some((start, end)) = self.time_window() {
            if start >= end {
                return Err(EntityError::StartNotBeforeEnd(self.kind()));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Schedule(_) => ResourceKind::Schedule,
            Self::Appointment(_) => ResourceKind::Appointment,
            Self::Course(_) => ResourceKind::Course,
            Self::CourseMembership(_) => ResourceKind::CourseMembership,
        }
    }

    #[must_use]
    pub fn id(&self) -> ResourceId {
        match self {
            Self::Schedule(s) => s.id,
            Self::Appointment(a) => a.id,
            Self::Course(c) => c.id,
            Self::CourseMembership(m) => m.id,
        }
    }

    /// Start and end time, for entities that occupy a time window.
    #[must_use]
    pub fn time_window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match self {
            Self::Schedule(s) => Some((s.start_time, s.end_time)),
            Self::Appointment(a) => Some((a.start_time, a.end_time)),
            Self::Course(_) | Self::CourseMembership(_) => None,
        }
    }

    /// Free-text line shown in notifications: the appointment description,
    /// the schedule location, or the course name.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Appointment(a) => a.description.as_deref(),
            Self::Schedule(s) => Some(s.location.as_str()),
            Self::Course(c) => Some(c.course_name.as_str()),
            Self::CourseMembership(_) => None,
        }
    }

    /// Key of the entity's natural unique index, if the kind has one.
    ///
    /// Two entities of the same kind with equal keys conflict.
    #[must_use]
    pub fn unique_key(&self) -> Option<String> {
        match self {
            Self::Schedule(s) => Some(format!(
                "{}|{}|{}|{}|{}",
                s.user_id,
                s.section_id,
                s.start_time.timestamp_millis(),
                s.end_time.timestamp_millis(),
                s.location
            )),
            Self::Appointment(a) => Some(format!(
                "{}|{}|{}|{}",
                a.user_id,
                a.schedule_id,
                a.start_time.timestamp_millis(),
                a.end_time.timestamp_millis()
            )),
            Self::Course(_) | Self::CourseMembership(_) => None,
        }
    }

    /// Reads an unsigned integer field by its camelCase name.
    #[must_use]
    pub fn integer_field(&self, name: &str) -> Option<u64> {
        match (self, name) {
            (Self::Schedule(s), "userId") => Some(s.user_id),
            (Self::Schedule(s), "sectionId") => Some(s.section_id),
            (Self::Appointment(a), "userId") => Some(a.user_id),
            (Self::Appointment(a), "scheduleId") => Some(a.schedule_id),
            (Self::CourseMembership(m), "userId") => Some(m.user_id),
            (Self::CourseMembership(m), "courseId") => Some(m.course_id),
            _ => None,
        }
    }

    /// Field map of this entity, including `id`.
    #[must_use]
    pub fn to_fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // Every variant is a plain struct of serializable fields.
            _ => Map::new(),
        }
    }

    /// JSON representation of this entity.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.to_fields())
    }
}
