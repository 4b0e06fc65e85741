use std::collections::HashSet;
use std::time::Duration;

use schedule_hub_core::ResourceKind;

use crate::storage::DEFAULT_OPERATION_TTL;

/// Service-level configuration for async mutations and notifications.
///
/// Controls operation record lifetime, notification routing, and background
/// sweep intervals.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Lifetime of an operation record after its most recent write.
    pub operation_ttl: Duration,
    /// Soft bound on stored operation records. `None` leaves TTL as the only eviction.
    pub operation_capacity: Option<usize>,
    /// Publisher destination for notifications. `None` disables dispatch.
    pub notification_destination: Option<String>,
    /// Resource kinds whose state changes produce notifications.
    pub notify_kinds: HashSet<ResourceKind>,
    /// Run async mutations on the same resource one at a time.
    pub serialize_per_resource: bool,
    /// Interval between expired-operation sweeps.
    pub sweep_interval: Duration,
}

impl ServiceConfig {
    /// Widens notifications to every resource kind.
    #[must_use]
    pub fn notify_all_kinds(mut self) -> Self {
        self.notify_kinds = ResourceKind::ALL.into_iter().collect();
        self
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            operation_ttl: DEFAULT_OPERATION_TTL,
            operation_capacity: None,
            notification_destination: None,
            notify_kinds: HashSet::from([ResourceKind::Appointment]),
            serialize_per_resource: false,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.operation_ttl, Duration::from_secs(3600));
        assert!(config.notification_destination.is_none());
        assert_eq!(config.notify_kinds.len(), 1);
        assert!(config.notify_kinds.contains(&ResourceKind::Appointment));
        assert!(!config.serialize_per_resource);
    }

    #[test]
    fn notify_all_kinds_covers_every_kind() {
        let config = ServiceConfig::default().notify_all_kinds();
        for kind in ResourceKind::ALL {
            assert!(config.notify_kinds.contains(&kind));
        }
    }
}
