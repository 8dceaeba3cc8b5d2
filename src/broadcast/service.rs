//! Hub service REST broadcaster
//!
//! Publishes `{ target, arguments }` to `POST {endpoint}/api/v1/hubs/{hub}`,
//! authenticated with a short-lived token whose audience is that URL.

use super::Broadcaster;
use crate::error::RelayError;
use crate::events::BroadcastMessage;
use crate::negotiate::{unix_now, ServiceEndpoint};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Lifetime of the token attached to each publish call
const PUBLISH_TOKEN_LIFETIME: Duration = Duration::from_secs(300);

/// Broadcaster for the managed hub service
pub struct ServiceBroadcaster {
    http: reqwest::Client,
    endpoint: Arc<ServiceEndpoint>,
    hub: String,
    messages_published: AtomicU64,
    publish_failures: AtomicU64,
}

impl ServiceBroadcaster {
    pub fn new(endpoint: Arc<ServiceEndpoint>, hub: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            hub: hub.into(),
            messages_published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
        }
    }

    /// Get total messages accepted by the service
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    /// Get total publish failures
    pub fn publish_failures(&self) -> u64 {
        self.publish_failures.load(Ordering::Relaxed)
    }

    async fn send(&self, message: &BroadcastMessage) -> Result<(), RelayError> {
        let url = self.endpoint.broadcast_url(&self.hub);
        let token = self.endpoint.sign_token(&url, unix_now(), PUBLISH_TOKEN_LIFETIME)?;

        debug!(hub = %self.hub, target_method = %message.target, arguments = message.arity(), "Publishing broadcast");

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .json(message)
            .send()
            .await
            .map_err(|source| RelayError::Upstream {
                service: "hub broadcast",
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::PublishRejected {
                hub: self.hub.clone(),
                status: status.as_u16(),
                body,
            });
        }

        debug!(hub = %self.hub, status = status.as_u16(), "Broadcast accepted");
        Ok(())
    }
}

#[async_trait]
impl Broadcaster for ServiceBroadcaster {
    async fn publish(&self, message: &BroadcastMessage) -> Result<(), RelayError> {
        match self.send(message).await {
            Ok(()) => {
                self.messages_published.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.publish_failures.fetch_add(1, Ordering::Relaxed);
                warn!(hub = %self.hub, error = %e, "Failed to publish broadcast");
                Err(e)
            }
        }
    }

    fn kind(&self) -> &'static str {
        "service"
    }
}
