//! Broadcast message and change record payloads
//!
//! The wire shape of a broadcast is fixed by the hub service:
//! `{ "target": "<client method>", "arguments": [ ... ] }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client methods invoked by broadcasts
pub mod targets {
    /// Every relayed notification invokes this client method
    pub const NEW_MESSAGE: &str = "newMessage";
}

/// Fan-out message delivered to every client on a hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    /// Client method to invoke
    pub target: String,
    /// Ordered arguments passed to the client method
    pub arguments: Vec<Value>,
}

impl BroadcastMessage {
    pub fn new(target: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            target: target.into(),
            arguments,
        }
    }

    /// Number of arguments carried
    pub fn arity(&self) -> usize {
        self.arguments.len()
    }
}

/// Opaque document from the upstream change feed
///
/// Read-only to the relay; forwarded to clients as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeRecord(Value);

impl ChangeRecord {
    pub fn new(document: Value) -> Self {
        Self(document)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}
