//! JSON hub protocol framing
//!
//! Every record is a JSON object terminated by the ASCII record separator
//! (0x1E). A single websocket frame may carry several records.

use super::error::ClientError;
use serde::Deserialize;
use serde_json::Value;

/// Record terminator
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Message type codes used by the relay
pub mod message_type {
    pub const INVOCATION: u8 = 1;
    pub const PING: u8 = 6;
    pub const CLOSE: u8 = 7;
}

/// First record a client sends after the transport opens
pub fn handshake_request() -> String {
    format!(r#"{{"protocol":"json","version":1}}{RECORD_SEPARATOR}"#)
}

/// Keep-alive record
pub fn ping_frame() -> String {
    format!(r#"{{"type":{}}}{RECORD_SEPARATOR}"#, message_type::PING)
}

/// Split a frame into its non-empty records
pub fn split_records(frame: &str) -> impl Iterator<Item = &str> {
    frame.split(RECORD_SEPARATOR).filter(|r| !r.trim().is_empty())
}

#[derive(Debug, Deserialize)]
struct HandshakeResponse {
    #[serde(default)]
    error: Option<String>,
}

/// Validate the hub's handshake response (`{}` on success)
pub fn parse_handshake_response(record: &str) -> Result<(), ClientError> {
    let response: HandshakeResponse =
        serde_json::from_str(record).map_err(|e| ClientError::Handshake(format!("malformed response: {e}")))?;

    match response.error {
        Some(error) => Err(ClientError::Handshake(error)),
        None => Ok(()),
    }
}

/// Inbound hub message
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Server invokes a client method
    Invocation { target: String, arguments: Vec<Value> },
    /// Server keep-alive
    Ping,
    /// Server is closing the connection
    Close {
        error: Option<String>,
        allow_reconnect: bool,
    },
    /// Any message type the subscriber does not act on
    Other(u8),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    allow_reconnect: Option<bool>,
}

/// Decode one record
pub fn parse_message(record: &str) -> Result<HubMessage, ClientError> {
    let raw: RawMessage =
        serde_json::from_str(record).map_err(|e| ClientError::Protocol(format!("undecodable record: {e}")))?;

    Ok(match raw.kind {
        message_type::INVOCATION => HubMessage::Invocation {
            target: raw
                .target
                .ok_or_else(|| ClientError::Protocol("invocation without target".to_string()))?,
            arguments: raw.arguments.unwrap_or_default(),
        },
        message_type::PING => HubMessage::Ping,
        message_type::CLOSE => HubMessage::Close {
            error: raw.error,
            allow_reconnect: raw.allow_reconnect.unwrap_or(false),
        },
        other => HubMessage::Other(other),
    })
}
