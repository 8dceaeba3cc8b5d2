//! Broadcast mechanism
//!
//! Delivery to subscribed clients is owned by the hub service; the relay
//! only builds the message and hands it over.

mod service;

pub use service::ServiceBroadcaster;

use crate::error::RelayError;
use crate::events::BroadcastMessage;
use async_trait::async_trait;
use tracing::info;

/// Hands a message to every client subscribed to the configured hub
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Publish once; no retries
    async fn publish(&self, message: &BroadcastMessage) -> Result<(), RelayError>;

    /// Short label for logs and readiness output
    fn kind(&self) -> &'static str;
}

/// Local-mode broadcaster used when no hub service is configured
#[derive(Debug, Default)]
pub struct LogBroadcaster;

#[async_trait]
impl Broadcaster for LogBroadcaster {
    async fn publish(&self, message: &BroadcastMessage) -> Result<(), RelayError> {
        info!(
            target_method = %message.target,
            arguments = message.arity(),
            "Local mode: broadcast not delivered"
        );
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "local"
    }
}
