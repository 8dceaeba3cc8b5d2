//! Change-event to broadcast mapping
//!
//! Pure functions with no I/O: the ingress handlers extract a payload, these
//! functions decide whether a BroadcastMessage exists for it.

use crate::events::{targets, BroadcastMessage, ChangeRecord};
use serde_json::Value;

/// Message announcing a name received by the HTTP trigger
pub fn name_message(name: &str) -> BroadcastMessage {
    BroadcastMessage::new(targets::NEW_MESSAGE, vec![Value::String(name.to_string())])
}

/// Message carrying a change-feed batch
///
/// One message per batch, every record as one argument in feed order.
/// Returns None for an empty batch.
pub fn change_batch_message(records: &[ChangeRecord]) -> Option<BroadcastMessage> {
    if records.is_empty() {
        return None;
    }

    let arguments = records.iter().map(|r| r.as_value().clone()).collect();
    Some(BroadcastMessage::new(targets::NEW_MESSAGE, arguments))
}

/// Pull `name` out of a trigger request
///
/// The query parameter wins; otherwise the body is parsed as a JSON object
/// and its string field `name` is used. An empty value counts as absent and
/// an unparseable body counts as no name.
pub fn extract_name(query_name: Option<&str>, body: &[u8]) -> Option<String> {
    if let Some(name) = query_name.filter(|n| !n.is_empty()) {
        return Some(name.to_string());
    }

    if body.is_empty() {
        return None;
    }

    let parsed: Value = serde_json::from_slice(body).ok()?;
    parsed
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}
