//! In-process publisher that records every delivery, for tests that
//! assert on what was sent.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use schedule_hub_core::ChannelMessages;
use uuid::Uuid;

use crate::traits::{Publisher, SubscriptionProtocol, SubscriptionReceipt};

/// One message accepted by [`InMemoryPublisher::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub destination: String,
    pub subject: String,
    pub messages: ChannelMessages,
}

/// [`Publisher`] that keeps deliveries and subscriptions in memory.
///
/// [`set_failing`](Self::set_failing) makes every call fail, for exercising
/// best-effort delivery paths.
#[derive(Default)]
pub struct InMemoryPublisher {
    deliveries: Mutex<Vec<Delivery>>,
    subscriptions: Mutex<Vec<SubscriptionReceipt>>,
    failing: AtomicBool,
}

impl InMemoryPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    #[must_use]
    pub fn subscriptions(&self) -> Vec<SubscriptionReceipt> {
        self.subscriptions.lock().clone()
    }

    fn check_failing(&self) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("publisher unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl Publisher for InMemoryPublisher {
    async fn publish(
        &self,
        destination: &str,
        messages: &ChannelMessages,
        subject: &str,
    ) -> anyhow::Result<()> {
        self.check_failing()?;
        self.deliveries.lock().push(Delivery {
            destination: destination.to_string(),
            subject: subject.to_string(),
            messages: messages.clone(),
        });
        Ok(())
    }

    async fn subscribe(
        &self,
        destination: &str,
        protocol: SubscriptionProtocol,
        endpoint: &str,
    ) -> anyhow::Result<SubscriptionReceipt> {
        self.check_failing()?;
        let receipt = SubscriptionReceipt {
            subscription_id: format!("{destination}:{}", Uuid::new_v4()),
            destination: destination.to_string(),
            protocol,
            endpoint: endpoint.to_string(),
        };
        self.subscriptions.lock().push(receipt.clone());
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages() -> ChannelMessages {
        ChannelMessages {
            default: "{}".into(),
            email: "email".into(),
            sms: "sms".into(),
        }
    }

    #[tokio::test]
    async fn records_deliveries_and_subscriptions() {
        let publisher = InMemoryPublisher::new();
        publisher
            .publish("topic", &messages(), "hello")
            .await
            .unwrap();
        let receipt = publisher
            .subscribe("topic", SubscriptionProtocol::Https, "https://example.test/hook")
            .await
            .unwrap();

        assert_eq!(publisher.deliveries().len(), 1);
        assert_eq!(publisher.deliveries()[0].subject, "hello");
        assert!(receipt.subscription_id.starts_with("topic:"));
        assert_eq!(publisher.subscriptions(), vec![receipt]);
    }

    #[tokio::test]
    async fn failing_mode_rejects_everything() {
        let publisher = InMemoryPublisher::new();
        publisher.set_failing(true);
        assert!(publisher.publish("topic", &messages(), "s").await.is_err());
        assert!(publisher
            .subscribe("topic", SubscriptionProtocol::Email, "a@b.c")
            .await
            .is_err());
        assert!(publisher.deliveries().is_empty());

        publisher.set_failing(false);
        publisher.publish("topic", &messages(), "s").await.unwrap();
        assert_eq!(publisher.deliveries().len(), 1);
    }
}
