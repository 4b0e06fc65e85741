//! Registers notification endpoints with the publisher.
//!
//! Unlike dispatch, subscribing is the caller's own request, so failures are
//! surfaced instead of swallowed.

use std::sync::Arc;

use tracing::{info, warn};

use crate::traits::{Publisher, SubscriptionProtocol, SubscriptionReceipt};

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("{}", missing_endpoint_message(.0))]
    MissingEndpoint(SubscriptionProtocol),
    #[error("notification destination not configured")]
    NotConfigured,
    #[error("subscription failed: {0}")]
    Publisher(#[source] anyhow::Error),
}

fn missing_endpoint_message(protocol: &SubscriptionProtocol) -> &'static str {
    match protocol {
        SubscriptionProtocol::Email => "Email is required",
        SubscriptionProtocol::Sms => "Phone number is required",
        SubscriptionProtocol::Https => "URL is required",
    }
}

/// Confirmation text returned to the subscriber.
#[must_use]
pub fn success_message(protocol: SubscriptionProtocol) -> &'static str {
    match protocol {
        SubscriptionProtocol::Email => "Successfully subscribed to notifications",
        SubscriptionProtocol::Sms => "Successfully subscribed to SMS notifications",
        SubscriptionProtocol::Https => "Successfully subscribed endpoint to notifications",
    }
}

#[derive(Clone)]
pub struct SubscriptionService {
    publisher: Arc<dyn Publisher>,
    destination: Option<String>,
}

impl SubscriptionService {
    #[must_use]
    pub fn new(publisher: Arc<dyn Publisher>, destination: Option<String>) -> Self {
        Self {
            publisher,
            destination,
        }
    }

    /// Subscribes `endpoint` to the configured destination over `protocol`.
    ///
    /// # Errors
    ///
    /// - [`SubscriptionError::MissingEndpoint`] if `endpoint` is absent or blank.
    /// - [`SubscriptionError::NotConfigured`] if no destination is set.
    /// - [`SubscriptionError::Publisher`] if the publisher rejects the request.
    pub async fn subscribe(
        &self,
        protocol: SubscriptionProtocol,
        endpoint: Option<&str>,
    ) -> Result<SubscriptionReceipt, SubscriptionError> {
        let endpoint = endpoint
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(SubscriptionError::MissingEndpoint(protocol))?;
        let destination = self
            .destination
            .as_deref()
            .ok_or(SubscriptionError::NotConfigured)?;

        match self.publisher.subscribe(destination, protocol, endpoint).await {
            Ok(receipt) => {
                info!(protocol = protocol.as_str(), destination, "subscription registered");
                Ok(receipt)
            }
            Err(e) => {
                warn!(protocol = protocol.as_str(), error = %e, "subscription failed");
                Err(SubscriptionError::Publisher(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::InMemoryPublisher;

    #[tokio::test]
    async fn subscribes_to_configured_destination() {
        let publisher = Arc::new(InMemoryPublisher::new());
        let svc = SubscriptionService::new(publisher.clone(), Some("appointments".into()));
        let receipt = svc
            .subscribe(SubscriptionProtocol::Email, Some(" student@example.edu "))
            .await
            .unwrap();
        assert_eq!(receipt.destination, "appointments");
        assert_eq!(receipt.endpoint, "student@example.edu");
        assert_eq!(publisher.subscriptions().len(), 1);
    }

    #[tokio::test]
    async fn blank_endpoint_is_rejected() {
        let svc = SubscriptionService::new(Arc::new(InMemoryPublisher::new()), Some("t".into()));
        for endpoint in [None, Some(""), Some("   ")] {
            let err = svc
                .subscribe(SubscriptionProtocol::Sms, endpoint)
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "Phone number is required");
        }
    }

    #[tokio::test]
    async fn unconfigured_destination_is_reported() {
        let svc = SubscriptionService::new(Arc::new(InMemoryPublisher::new()), None);
        let err = svc
            .subscribe(SubscriptionProtocol::Https, Some("https://hooks.example.test"))
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::NotConfigured));
    }

    #[tokio::test]
    async fn publisher_failure_is_surfaced() {
        let publisher = Arc::new(InMemoryPublisher::new());
        publisher.set_failing(true);
        let svc = SubscriptionService::new(publisher, Some("t".into()));
        let err = svc
            .subscribe(SubscriptionProtocol::Email, Some("a@b.c"))
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::Publisher(_)));
    }
}
