//! Channel-specific rendering of notification events.
//!
//! A rendered notification carries one subject and three bodies: a structured
//! JSON event for the default channel, a long-form letter for email, and a
//! one-line text for SMS. Appointment actions have dedicated templates; every
//! other action falls back to a generic notice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{ActionVerb, NotificationEvent};
use crate::types::ResourceKind;

/// Maximum SMS body length in characters.
pub const SMS_MAX_CHARS: usize = 160;

/// Per-channel message bodies, keyed the way multi-protocol publishers expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessages {
    pub default: String,
    pub email: String,
    pub sms: String,
}

/// Subject line plus per-channel bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNotification {
    pub subject: String,
    pub messages: ChannelMessages,
}

/// Renders `event` for every channel.
///
/// # Errors
///
/// Returns a serialization error if the event cannot be encoded as JSON.
pub fn render(event: &NotificationEvent) -> serde_json::Result<RenderedNotification> {
    let default = serde_json::to_string(event)?;
    let (subject, email) = email_body(event);
    Ok(RenderedNotification {
        subject,
        messages: ChannelMessages {
            default,
            email,
            sms: sms_body(event),
        },
    })
}

fn format_date(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(|| "unknown".to_string(), |t| t.format("%-m/%-d/%Y").to_string())
}

fn format_time(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(|| "unknown".to_string(), |t| t.format("%-I:%M:%S %p").to_string())
}

fn email_body(event: &NotificationEvent) -> (String, String) {
    let fields = &event.subject_fields;
    let date = format_date(fields.start_time);
    let window = format!(
        "{} - {}",
        format_time(fields.start_time),
        format_time(fields.end_time)
    );
    let description = fields.description.as_deref().unwrap_or("");

    if event.resource_type != ResourceKind::Appointment {
        return (
            format!("{} Notification", event.resource_type.display_name()),
            format!(
                "There has been an update to your {}.",
                event.resource_type.display_name().to_lowercase()
            ),
        );
    }

    let (subject, message) = match event.action.verb {
        ActionVerb::Created => (
            "New Appointment Scheduled",
            format!(
                "Dear User,\n\n\
                 Your appointment has been successfully scheduled:\n\n\
                 Date: {date}\n\
                 Time: {window}\n\
                 Description: {description}\n\n\
                 You can view your appointment details by logging into your account.\n\n\
                 Best regards,\n\
                 Your Scheduling Team\n"
            ),
        ),
        ActionVerb::Updated => (
            "Appointment Updated",
            format!(
                "Dear User,\n\n\
                 Your appointment has been updated:\n\n\
                 Date: {date}\n\
                 Time: {window}\n\
                 Description: {description}\n\n\
                 You can view the updated details by logging into your account.\n\n\
                 Best regards,\n\
                 Your Scheduling Team\n"
            ),
        ),
        ActionVerb::Cancelled => (
            "Appointment Cancelled",
            format!(
                "Dear User,\n\n\
                 Your appointment has been cancelled:\n\n\
                 Date: {date}\n\
                 Time: {window}\n\n\
                 If you did not request this cancellation, please contact our support team.\n\n\
                 Best regards,\n\
                 Your Scheduling Team\n"
            ),
        ),
    };
    (subject.to_string(), message)
}

fn sms_body(event: &NotificationEvent) -> String {
    let fields = &event.subject_fields;
    let mut body = format!(
        "{} {}",
        event.resource_type.display_name(),
        event.action.phrase()
    );
    if fields.start_time.is_some() {
        body.push_str(&format!(
            ": {} {} - {}",
            format_date(fields.start_time),
            format_time(fields.start_time),
            format_time(fields.end_time)
        ));
    }
    if let Some(description) = fields.description.as_deref() {
        if event.action.verb != ActionVerb::Cancelled {
            body.push_str(&format!(" ({description})"));
        }
    }
    truncate_chars(body, SMS_MAX_CHARS)
}

fn truncate_chars(text: String, max: usize) -> String {
    if text.chars().count() <= max {
        return text;
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::event::{NotificationAction, SubjectFields};

    fn appointment_event(verb: ActionVerb, description: Option<&str>) -> NotificationEvent {
        NotificationEvent {
            action: NotificationAction::new(ResourceKind::Appointment, verb),
            resource_type: ResourceKind::Appointment,
            resource_id: 42,
            subject_fields: SubjectFields {
                start_time: Some(Utc.with_ymd_and_hms(2026, 3, 5, 14, 0, 0).unwrap()),
                end_time: Some(Utc.with_ymd_and_hms(2026, 3, 5, 14, 30, 0).unwrap()),
                description: description.map(str::to_owned),
            },
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn created_template_formats_locale_date_and_time() {
        let rendered =
            render(&appointment_event(ActionVerb::Created, Some("Thesis review"))).unwrap();
        assert_eq!(rendered.subject, "New Appointment Scheduled");
        assert!(rendered.messages.email.contains("Date: 3/5/2026"));
        assert!(rendered.messages.email.contains("Time: 2:00:00 PM - 2:30:00 PM"));
        assert!(rendered.messages.email.contains("Description: Thesis review"));
        assert_eq!(
            rendered.messages.sms,
            "Appointment created: 3/5/2026 2:00:00 PM - 2:30:00 PM (Thesis review)"
        );
    }

    #[test]
    fn cancelled_template_omits_description() {
        let rendered =
            render(&appointment_event(ActionVerb::Cancelled, Some("Thesis review"))).unwrap();
        assert_eq!(rendered.subject, "Appointment Cancelled");
        assert!(!rendered.messages.email.contains("Description"));
        assert!(rendered.messages.email.contains("contact our support team"));
        assert!(!rendered.messages.sms.contains("Thesis review"));
    }

    #[test]
    fn default_channel_is_structured_event() {
        let rendered = render(&appointment_event(ActionVerb::Updated, None)).unwrap();
        let body: serde_json::Value = serde_json::from_str(&rendered.messages.default).unwrap();
        assert_eq!(body["action"], "APPOINTMENT_UPDATED");
        assert_eq!(body["resourceId"], 42);
        assert_eq!(rendered.subject, "Appointment Updated");
    }

    #[test]
    fn other_kinds_use_generic_notice() {
        let mut event = appointment_event(ActionVerb::Updated, Some("Room B"));
        event.resource_type = ResourceKind::Schedule;
        event.action = NotificationAction::new(ResourceKind::Schedule, ActionVerb::Updated);
        let rendered = render(&event).unwrap();
        assert_eq!(rendered.subject, "Schedule Notification");
        assert_eq!(rendered.messages.email, "There has been an update to your schedule.");
        assert!(rendered.messages.sms.starts_with("Schedule updated: "));
    }

    #[test]
    fn sms_is_truncated() {
        let long = "x".repeat(400);
        let rendered = render(&appointment_event(ActionVerb::Created, Some(&long))).unwrap();
        assert_eq!(rendered.messages.sms.chars().count(), SMS_MAX_CHARS);
        assert!(rendered.messages.sms.ends_with("..."));
    }
}
