//! Best-effort notification fan-out.
//!
//! [`NotificationDispatcher`] turns a resource state change into rendered
//! channel messages and makes a single publish attempt. It never returns an
//! error: every failure is logged and reported only as a [`DispatchOutcome`].

use std::collections::HashSet;
use std::sync::Arc;

use schedule_hub_core::{
    render, ActionVerb, Entity, NotificationAction, NotificationEvent, ResourceKind,
};
use tokio::task::JoinHandle;
use tracing::{debug, info_span, warn, Instrument};

use crate::service::config::ServiceConfig;
use crate::traits::Publisher;

// ---------------------------------------------------------------------------
// NotificationPolicy
// ---------------------------------------------------------------------------

/// Where notifications go and which resource kinds produce them.
#[derive(Debug, Clone, Default)]
pub struct NotificationPolicy {
    destination: Option<String>,
    kinds: HashSet<ResourceKind>,
}

impl NotificationPolicy {
    #[must_use]
    pub fn new(destination: Option<String>, kinds: HashSet<ResourceKind>) -> Self {
        Self { destination, kinds }
    }

    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.notification_destination.clone(),
            config.notify_kinds.clone(),
        )
    }

    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    /// Whether state changes of `kind` are announced.
    #[must_use]
    pub fn covers(&self, kind: ResourceKind) -> bool {
        self.kinds.contains(&kind)
    }
}

// ---------------------------------------------------------------------------
// DispatchOutcome
// ---------------------------------------------------------------------------

/// What happened to one notification. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    /// The kind is outside the notification policy.
    NotCovered,
    /// No destination is configured.
    NoDestination,
    /// Rendering or the publish attempt failed; already logged.
    Failed,
}

// ---------------------------------------------------------------------------
// NotificationDispatcher
// ---------------------------------------------------------------------------

/// Renders and publishes resource state changes. Cheap to clone.
#[derive(Clone)]
pub struct NotificationDispatcher {
    publisher: Arc<dyn Publisher>,
    policy: Arc<NotificationPolicy>,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new(publisher: Arc<dyn Publisher>, policy: NotificationPolicy) -> Self {
        Self {
            publisher,
            policy: Arc::new(policy),
        }
    }

    /// Announces that `entity` was `verb`-ed. Single attempt, no retry.
    pub async fn notify(&self, verb: ActionVerb, entity: &Entity) -> DispatchOutcome {
        let kind = entity.kind();
        if !self.policy.covers(kind) {
            return DispatchOutcome::NotCovered;
        }
        let action = NotificationAction::new(kind, verb);
        let Some(destination) = self.policy.destination() else {
            debug!(
                %action,
                resource_id = entity.id(),
                "no notification destination configured; skipping"
            );
            return DispatchOutcome::NoDestination;
        };

        let span = info_span!(
            "notify",
            %action,
            resource_id = entity.id(),
            outcome = tracing::field::Empty,
        );
        async move {
            let event = NotificationEvent::from_entity(action, entity);
            let outcome = match render(&event) {
                Err(e) => {
                    warn!(error = %e, "failed to render notification");
                    DispatchOutcome::Failed
                }
                Ok(rendered) => match self
                    .publisher
                    .publish(destination, &rendered.messages, &rendered.subject)
                    .await
                {
                    Ok(()) => {
                        debug!(destination, subject = %rendered.subject, "notification published");
                        DispatchOutcome::Delivered
                    }
                    Err(e) => {
                        warn!(destination, error = %e, "failed to publish notification");
                        DispatchOutcome::Failed
                    }
                },
            };
            tracing::Span::current().record("outcome", tracing::field::debug(outcome));
            outcome
        }
        .instrument(span)
        .await
    }

    /// Runs [`notify`](Self::notify) on a detached task.
    ///
    /// The caller may drop the handle; the notification still runs.
    pub fn spawn_notify(&self, verb: ActionVerb, entity: Entity) -> JoinHandle<DispatchOutcome> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.notify(verb, &entity).await })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use schedule_hub_core::{Appointment, AppointmentStatus, Course};

    use super::*;
    use crate::publish::InMemoryPublisher;

    fn appointment() -> Entity {
        Entity::Appointment(Appointment {
            id: 5,
            user_id: 1,
            schedule_id: 2,
            start_time: Utc.with_ymd_and_hms(2026, 3, 5, 14, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2026, 3, 5, 14, 30, 0).unwrap(),
            description: Some("Thesis review".into()),
            status: AppointmentStatus::Scheduled,
        })
    }

    fn dispatcher(destination: Option<&str>) -> (NotificationDispatcher, Arc<InMemoryPublisher>) {
        let publisher = Arc::new(InMemoryPublisher::new());
        let policy = NotificationPolicy::from_config(&ServiceConfig {
            notification_destination: destination.map(str::to_owned),
            ..ServiceConfig::default()
        });
        (
            NotificationDispatcher::new(publisher.clone(), policy),
            publisher,
        )
    }

    #[tokio::test]
    async fn delivers_rendered_messages() {
        let (dispatcher, publisher) = dispatcher(Some("appointments"));
        let outcome = dispatcher.notify(ActionVerb::Created, &appointment()).await;
        assert_eq!(outcome, DispatchOutcome::Delivered);

        let deliveries = publisher.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].destination, "appointments");
        assert_eq!(deliveries[0].subject, "New Appointment Scheduled");
        assert!(deliveries[0].messages.sms.contains("(Thesis review)"));
        assert!(deliveries[0].messages.default.contains("APPOINTMENT_CREATED"));
    }

    #[tokio::test]
    async fn missing_destination_is_a_no_op() {
        let (dispatcher, publisher) = dispatcher(None);
        let outcome = dispatcher.notify(ActionVerb::Updated, &appointment()).await;
        assert_eq!(outcome, DispatchOutcome::NoDestination);
        assert!(publisher.deliveries().is_empty());
    }

    #[tokio::test]
    async fn kinds_outside_policy_are_skipped() {
        let (dispatcher, publisher) = dispatcher(Some("appointments"));
        let course = Entity::Course(Course {
            id: 1,
            course_name: "Compilers".into(),
        });
        assert_eq!(
            dispatcher.notify(ActionVerb::Created, &course).await,
            DispatchOutcome::NotCovered
        );
        assert!(publisher.deliveries().is_empty());
    }

    #[tokio::test]
    async fn publisher_failure_is_swallowed() {
        let (dispatcher, publisher) = dispatcher(Some("appointments"));
        publisher.set_failing(true);
        let outcome = dispatcher
            .notify(ActionVerb::Cancelled, &appointment())
            .await;
        assert_eq!(outcome, DispatchOutcome::Failed);
    }

    #[tokio::test]
    async fn spawn_notify_runs_detached() {
        let (dispatcher, publisher) = dispatcher(Some("appointments"));
        let handle = dispatcher.spawn_notify(ActionVerb::Updated, appointment());
        assert_eq!(handle.await.unwrap(), DispatchOutcome::Delivered);
        assert_eq!(publisher.deliveries()[0].subject, "Appointment Updated");
    }
}
