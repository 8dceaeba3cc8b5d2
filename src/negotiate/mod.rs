//! Connection negotiation
//!
//! A Negotiator hands out the endpoint URL and time-limited credential a
//! client needs to join a hub. The token format belongs to the provider and
//! is never inspected by callers.

mod descriptor;
mod service;
mod token;
mod upstream;

pub use descriptor::{websocket_url, ConnectionDescriptor, NegotiateReply};
pub use service::ServiceNegotiator;
pub use token::{unix_now, ServiceEndpoint, TokenClaims};
pub use upstream::UpstreamNegotiator;

use crate::error::RelayError;
use async_trait::async_trait;

/// Issues connection descriptors scoped to a hub
#[async_trait]
pub trait Negotiator: Send + Sync {
    /// Issue a fresh descriptor for `hub`
    ///
    /// Provider failures must surface as errors, never as an empty descriptor.
    async fn issue(&self, hub: &str) -> Result<ConnectionDescriptor, RelayError>;
}
