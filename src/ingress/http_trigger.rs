//! HTTP trigger: name in, greeting and optional broadcast out

use crate::events::BroadcastMessage;
use crate::relay;

/// Response when no name could be extracted
pub const GENERIC_RESPONSE: &str = "This HTTP triggered function executed successfully. \
Pass a name in the query string or in the request body for a personalized response.";

/// Result of evaluating one trigger request
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerOutcome {
    /// Text returned to the caller (always with status 200)
    pub body: String,
    /// Message to publish, present only when a name was extracted and
    /// broadcasting is enabled
    pub message: Option<BroadcastMessage>,
}

/// Evaluate a trigger request
///
/// `broadcast` selects between the fan-out and the answer-only variant of
/// the handler.
pub fn evaluate(query_name: Option<&str>, body: &[u8], broadcast: bool) -> TriggerOutcome {
    match relay::extract_name(query_name, body) {
        Some(name) if broadcast => TriggerOutcome {
            body: format!(
                "Hello, {name}. This HTTP triggered function executed successfully \
                 and sent a message to SignalR clients."
            ),
            message: Some(relay::name_message(&name)),
        },
        Some(name) => TriggerOutcome {
            body: format!("Hello, {name}. This HTTP triggered function executed successfully."),
            message: None,
        },
        None => TriggerOutcome {
            body: GENERIC_RESPONSE.to_string(),
            message: None,
        },
    }
}
