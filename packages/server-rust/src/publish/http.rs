//! Publisher that forwards to an HTTP message-broker gateway.
//!
//! Wire contract:
//!
//! - `POST {base}/publish` with `{destination, subject, messageStructure, message}`
//!   where `message` holds the per-channel bodies.
//! - `POST {base}/subscriptions` with `{destination, protocol, endpoint}`,
//!   answered by `{subscriptionId}`.
//!
//! Any non-2xx response is an error. No retries.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use schedule_hub_core::ChannelMessages;
use serde::{Deserialize, Serialize};

use crate::traits::{Publisher, SubscriptionProtocol, SubscriptionReceipt};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishRequest<'a> {
    destination: &'a str,
    subject: &'a str,
    message_structure: &'static str,
    message: &'a ChannelMessages,
}

#[derive(Serialize)]
struct SubscribeRequest<'a> {
    destination: &'a str,
    protocol: SubscriptionProtocol,
    endpoint: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeResponse {
    subscription_id: String,
}

/// [`Publisher`] backed by a broker gateway reachable over HTTP.
#[derive(Clone)]
pub struct HttpPublisher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPublisher {
    /// Creates a publisher targeting `base_url` (trailing slash optional).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building publisher HTTP client")?;
        Ok(Self::with_client(client, base_url))
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(
        &self,
        destination: &str,
        messages: &ChannelMessages,
        subject: &str,
    ) -> anyhow::Result<()> {
        let body = PublishRequest {
            destination,
            subject,
            message_structure: "json",
            message: messages,
        };
        self.client
            .post(self.url("publish"))
            .json(&body)
            .send()
            .await
            .context("sending publish request")?
            .error_for_status()
            .context("broker rejected publish")?;
        Ok(())
    }

    async fn subscribe(
        &self,
        destination: &str,
        protocol: SubscriptionProtocol,
        endpoint: &str,
    ) -> anyhow::Result<SubscriptionReceipt> {
        let body = SubscribeRequest {
            destination,
            protocol,
            endpoint,
        };
        let response: SubscribeResponse = self
            .client
            .post(self.url("subscriptions"))
            .json(&body)
            .send()
            .await
            .context("sending subscribe request")?
            .error_for_status()
            .context("broker rejected subscription")?
            .json()
            .await
            .context("decoding subscribe response")?;

        Ok(SubscriptionReceipt {
            subscription_id: response.subscription_id,
            destination: destination.to_string(),
            protocol,
            endpoint: endpoint.to_string(),
        })
    }
}
