//! No-op [`Publisher`] that only logs.
//!
//! [`LogPublisher`] retains nothing: each publish or subscribe is written to
//! the `tracing` log and acknowledged. This is the default publisher when no
//! broker gateway is configured.

use async_trait::async_trait;
use schedule_hub_core::ChannelMessages;
use tracing::info;
use uuid::Uuid;

use crate::traits::{Publisher, SubscriptionProtocol, SubscriptionReceipt};

/// Logging `Publisher` for local runs without a broker.
///
/// Every call succeeds. Nothing is stored, so memory stays flat no matter
/// how many notifications pass through.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(
        &self,
        destination: &str,
        messages: &ChannelMessages,
        subject: &str,
    ) -> anyhow::Result<()> {
        info!(destination, subject, body = %messages.default, "notification published");
        Ok(())
    }

    async fn subscribe(
        &self,
        destination: &str,
        protocol: SubscriptionProtocol,
        endpoint: &str,
    ) -> anyhow::Result<SubscriptionReceipt> {
        info!(destination, protocol = protocol.as_str(), endpoint, "subscription accepted");
        Ok(SubscriptionReceipt {
            subscription_id: format!("{destination}:{}", Uuid::new_v4()),
            destination: destination.to_string(),
            protocol,
            endpoint: endpoint.to_string(),
        })
    }
}
