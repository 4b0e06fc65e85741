//! `schedule-hub` core -- scheduling entities, payload schemas, operation records,
//! and notification templates.

pub mod event;
pub mod operation;
pub mod schema;
pub mod template;
pub mod types;

pub use event::{ActionVerb, NotificationAction, NotificationEvent, SubjectFields};
pub use operation::{Operation, OperationId, OperationKind, OperationState, TransitionError};
pub use schema::{validate_create, validate_update, FieldDef, FieldType, ValidationResult};
pub use template::{render, ChannelMessages, RenderedNotification};
pub use types::{
    Appointment, AppointmentStatus, Course, CourseMembership, Entity, EntityError, ResourceId,
    ResourceKind, Schedule,
};

