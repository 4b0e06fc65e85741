//! Structural validation of create and update payloads.
//!
//! Both the synchronous mutation path and the async coordinator run the same
//! checks, so a payload accepted by one is accepted by the other. Checks are
//! structural only: whether a referenced row exists, or whether a partial
//! update still yields a valid entity, is decided by the store at apply time.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::types::ResourceKind;

/// JSON type expected for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Non-negative integer.
    Integer,
    /// Non-empty string.
    String,
    /// RFC 3339 timestamp string.
    Timestamp,
}

/// Single writable field definition within a resource schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// camelCase field name as it appears on the wire.
    pub name: &'static str,
    /// Expected JSON type.
    pub field_type: FieldType,
    /// Whether the field must be present on create.
    pub required: bool,
}

impl FieldDef {
    const fn required(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: true,
        }
    }

    const fn optional(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: false,
        }
    }
}

const SCHEDULE_FIELDS: &[FieldDef] = &[
    FieldDef::required("userId", FieldType::Integer),
    FieldDef::required("sectionId", FieldType::Integer),
    FieldDef::required("startTime", FieldType::Timestamp),
    FieldDef::required("endTime", FieldType::Timestamp),
    FieldDef::required("location", FieldType::String),
];

const APPOINTMENT_FIELDS: &[FieldDef] = &[
    FieldDef::required("userId", FieldType::Integer),
    FieldDef::required("scheduleId", FieldType::Integer),
    FieldDef::required("startTime", FieldType::Timestamp),
    FieldDef::required("endTime", FieldType::Timestamp),
    FieldDef::optional("description", FieldType::String),
];

const COURSE_FIELDS: &[FieldDef] = &[FieldDef::required("courseName", FieldType::String)];

const COURSE_MEMBERSHIP_FIELDS: &[FieldDef] = &[
    FieldDef::required("userId", FieldType::Integer),
    FieldDef::required("courseId", FieldType::Integer),
];

/// Writable fields of `kind`. Server-managed fields (`id`, `status`) are not listed.
#[must_use]
pub fn fields_for(kind: ResourceKind) -> &'static [FieldDef] {
    match kind {
        ResourceKind::Schedule => SCHEDULE_FIELDS,
        ResourceKind::Appointment => APPOINTMENT_FIELDS,
        ResourceKind::Course => COURSE_FIELDS,
        ResourceKind::CourseMembership => COURSE_MEMBERSHIP_FIELDS,
    }
}

/// Result of validating a payload against a resource schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The payload conforms to the schema.
    Valid,
    /// The payload violates one or more schema constraints.
    Invalid {
        /// Human-readable descriptions of each validation failure.
        errors: Vec<String>,
    },
}

impl ValidationResult {
    fn from_errors(errors: Vec<String>) -> Self {
        if errors.is_empty() {
            Self::Valid
        } else {
            Self::Invalid { errors }
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Converts into a `Result`, joining all failures into one message.
    ///
    /// # Errors
    ///
    /// Returns the `; `-joined failure list when invalid.
    pub fn into_result(self) -> Result<(), String> {
        match self {
            Self::Valid => Ok(()),
            Self::Invalid { errors } => Err(errors.join("; ")),
        }
    }
}

/// Validates a full payload for creating a `kind` entity.
#[must_use]
pub fn validate_create(kind: ResourceKind, payload: &Value) -> ValidationResult {
    let Value::Object(fields) = payload else {
        return ValidationResult::from_errors(vec!["request body must be a JSON object".into()]);
    };

    let mut errors = check_known_fields(kind, fields);
    for def in fields_for(kind) {
        match fields.get(def.name) {
            None if def.required => errors.push(format!("field `{}` is required", def.name)),
            None => {}
            Some(value) => {
                if let Err(e) = check_type(def, value) {
                    errors.push(e);
                }
            }
        }
    }
    check_time_order(kind, fields, &mut errors);
    ValidationResult::from_errors(errors)
}

/// Validates a partial payload for updating a `kind` entity.
///
/// At least one writable field must be present. Missing fields keep their
/// stored values.
#[must_use]
pub fn validate_update(kind: ResourceKind, payload: &Value) -> ValidationResult {
    let Value::Object(fields) = payload else {
        return ValidationResult::from_errors(vec!["request body must be a JSON object".into()]);
    };
    if fields.is_empty() {
        return ValidationResult::from_errors(vec!["update must set at least one field".into()]);
    }

    let mut errors = check_known_fields(kind, fields);
    for def in fields_for(kind) {
        if let Some(value) = fields.get(def.name) {
            if let Err(e) = check_type(def, value) {
                errors.push(e);
            }
        }
    }
    check_time_order(kind, fields, &mut errors);
    ValidationResult::from_errors(errors)
}

fn check_known_fields(kind: ResourceKind, fields: &Map<String, Value>) -> Vec<String> {
    let defs = fields_for(kind);
    fields
        .keys()
        .filter(|name| !defs.iter().any(|d| d.name == name.as_str()))
        .map(|name| match name.as_str() {
            "id" => "field `id` is assigned by the server".to_string(),
            "status" => format!("field `status` of {kind} cannot be written directly"),
            other => format!("unknown field `{other}` for {kind}"),
        })
        .collect()
}

fn check_type(def: &FieldDef, value: &Value) -> Result<(), String> {
    let ok = match def.field_type {
        FieldType::Integer => value.as_u64().is_some(),
        FieldType::String => value.as_str().is_some_and(|s| !s.trim().is_empty()),
        FieldType::Timestamp => value.as_str().and_then(parse_timestamp).is_some(),
    };
    if ok {
        return Ok(());
    }
    let expected = match def.field_type {
        FieldType::Integer => "a non-negative integer",
        FieldType::String => "a non-empty string",
        FieldType::Timestamp => "an RFC 3339 timestamp",
    };
    Err(format!("field `{}` must be {expected}", def.name))
}

fn check_time_order(kind: ResourceKind, fields: &Map<String, Value>, errors: &mut Vec<String>) {
    let start = fields
        .get("startTime")
        .and_then(Value::as_str)
        .and_then(parse_timestamp);
    let end = fields
        .get("endTime")
        .and_then(Value::as_str)
        .and_then(parse_timestamp);
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            errors.push(format!(
                "{} start time must be less than end time",
                kind.display_name()
            ));
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn create_accepts_complete_schedule() {
        let payload = json!({
            "userId": 1,
            "sectionId": 2,
            "startTime": "2026-10-16T09:00:00Z",
            "endTime": "2026-10-16T10:00:00+00:00",
            "location": "Room A",
        });
        assert_eq!(validate_create(ResourceKind::Schedule, &payload), ValidationResult::Valid);
    }

    #[test]
    fn create_lists_every_missing_required_field() {
        let result = validate_create(ResourceKind::Appointment, &json!({ "description": "x" }));
        let ValidationResult::Invalid { errors } = result else {
            panic!("expected invalid");
        };
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("`scheduleId`")));
    }

    #[test]
    fn create_rejects_non_object() {
        assert!(!validate_create(ResourceKind::Course, &json!("Algorithms")).is_valid());
    }

    #[test]
    fn update_requires_at_least_one_field() {
        let err = validate_update(ResourceKind::Schedule, &json!({}))
            .into_result()
            .unwrap_err();
        assert_eq!(err, "update must set at least one field");
    }

    #[test]
    fn update_accepts_single_field() {
        assert!(
            validate_update(ResourceKind::Schedule, &json!({ "location": "Room B" })).is_valid()
        );
    }

    #[test]
    fn update_rejects_server_managed_fields() {
        let err = validate_update(
            ResourceKind::Appointment,
            &json!({ "id": 3, "status": "cancelled" }),
        )
        .into_result()
        .unwrap_err();
        assert!(err.contains("`id` is assigned by the server"));
        assert!(err.contains("`status` of appointment cannot be written"));
    }

    #[test]
    fn update_rejects_unknown_and_mistyped_fields() {
        let result = validate_update(
            ResourceKind::Schedule,
            &json!({ "room": "B", "userId": -4, "startTime": "tomorrow" }),
        );
        let ValidationResult::Invalid { errors } = result else {
            panic!("expected invalid");
        };
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn inverted_window_is_rejected_when_both_times_present() {
        let err = validate_update(
            ResourceKind::Appointment,
            &json!({ "startTime": "2026-10-16T10:00:00Z", "endTime": "2026-10-16T10:00:00Z" }),
        )
        .into_result()
        .unwrap_err();
        assert_eq!(err, "Appointment start time must be less than end time");
    }

    #[test]
    fn blank_strings_are_rejected() {
        assert!(!validate_update(ResourceKind::Course, &json!({ "courseName": "   " })).is_valid());
    }
}
