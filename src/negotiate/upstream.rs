//! Negotiator that asks a remote negotiate endpoint
//!
//! Used by the subscriber client against the relay's own `/api/negotiate`,
//! and usable by a relay that fronts another one.

use super::descriptor::{ConnectionDescriptor, NegotiateReply};
use super::token::unix_now;
use super::Negotiator;
use crate::error::RelayError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, error, info};

/// Forwards negotiation to `GET {base}/api/negotiate`
#[derive(Debug, Clone)]
pub struct UpstreamNegotiator {
    http: reqwest::Client,
    negotiate_url: String,
}

impl UpstreamNegotiator {
    /// `base_url` is the function app root, e.g. `https://func-demo.azurewebsites.net`
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            negotiate_url: format!("{}/api/negotiate", base_url.trim_end_matches('/')),
        }
    }

    pub fn negotiate_url(&self) -> &str {
        &self.negotiate_url
    }
}

#[async_trait]
impl Negotiator for UpstreamNegotiator {
    async fn issue(&self, hub: &str) -> Result<ConnectionDescriptor, RelayError> {
        info!(url = %self.negotiate_url, hub, "Negotiating");

        let response = self
            .http
            .get(&self.negotiate_url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|source| RelayError::Upstream {
                service: "negotiate",
                source,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| RelayError::Upstream {
            service: "negotiate",
            source,
        })?;

        if !status.is_success() {
            error!(status = status.as_u16(), body = %body, "Negotiation failed");
            return Err(RelayError::NegotiationRejected {
                status: status.as_u16(),
                body,
            });
        }

        let reply: NegotiateReply = serde_json::from_str(&body).map_err(|source| {
            RelayError::SerializationFailed {
                what: "negotiate reply",
                source,
            }
        })?;
        debug!(url = ?reply.url, has_token = reply.access_token.is_some(), "Negotiate reply received");

        let descriptor = ConnectionDescriptor::from_reply(reply, hub, unix_now()).inspect_err(|e| {
            error!(error = %e, "Missing URL or access token in connection info");
        })?;

        info!(
            url = %descriptor.url,
            token_len = descriptor.access_token.len(),
            "Negotiation successful"
        );
        Ok(descriptor)
    }
}
