//! Negotiator backed by the hub service connection string

use super::descriptor::ConnectionDescriptor;
use super::token::{unix_now, ServiceEndpoint};
use super::Negotiator;
use crate::error::RelayError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Issues client descriptors by signing tokens locally
pub struct ServiceNegotiator {
    endpoint: Arc<ServiceEndpoint>,
    lifetime: Duration,
}

impl ServiceNegotiator {
    pub fn new(endpoint: Arc<ServiceEndpoint>, lifetime: Duration) -> Self {
        Self { endpoint, lifetime }
    }
}

#[async_trait]
impl Negotiator for ServiceNegotiator {
    async fn issue(&self, hub: &str) -> Result<ConnectionDescriptor, RelayError> {
        let url = self.endpoint.client_url(hub);
        let issued_at = unix_now();
        let access_token = self.endpoint.sign_token(&url, issued_at, self.lifetime)?;

        debug!(hub, lifetime_secs = self.lifetime.as_secs(), "Issued connection descriptor");

        Ok(ConnectionDescriptor {
            url,
            access_token,
            issued_at,
            hub: hub.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_issue_scopes_descriptor_to_hub() {
        let endpoint = ServiceEndpoint::parse(
            "Endpoint=https://demo.service.signalr.net;AccessKey=abc;Version=1.0;",
        )
        .unwrap();
        let negotiator = ServiceNegotiator::new(Arc::new(endpoint), Duration::from_secs(60));

        let descriptor = negotiator.issue("agentsHub").await.unwrap();
        assert_eq!(descriptor.hub, "agentsHub");
        assert_eq!(descriptor.url, "https://demo.service.signalr.net/client/?hub=agentsHub");
        assert!(!descriptor.access_token.is_empty());
        assert_eq!(
            descriptor.websocket_url().unwrap(),
            "wss://demo.service.signalr.net/client/?hub=agentsHub"
        );
    }

    #[tokio::test]
    async fn test_unrepresentable_lifetime_fails_instead_of_wrapping() {
        let endpoint = ServiceEndpoint::parse("Endpoint=https://demo;AccessKey=abc;").unwrap();
        let negotiator = ServiceNegotiator::new(Arc::new(endpoint), Duration::from_secs(u64::MAX));

        let err = negotiator.issue("agentsHub").await.unwrap_err();
        assert!(matches!(err, RelayError::Signing(_)));
    }

    #[tokio::test]
    async fn test_each_issue_is_fresh() {
        let endpoint = ServiceEndpoint::parse("Endpoint=https://demo;AccessKey=abc;").unwrap();
        let negotiator = ServiceNegotiator::new(Arc::new(endpoint), Duration::from_secs(60));

        let first = negotiator.issue("h").await.unwrap();
        let second = negotiator.issue("h").await.unwrap();
        assert_ne!(first.access_token, second.access_token);
    }
}
