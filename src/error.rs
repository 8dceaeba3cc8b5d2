//! Domain error types for the hub relay
//!
//! main.rs and the subscriber binary are the ONLY places allowed to use
//! anyhow::Result (process boundary). Library code returns
//! Result<T, RelayError>; the subscriber client wraps it in ClientError.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Relay domain errors
///
/// Every variant carries structured context fields for diagnostics.
/// Example log output:
/// ```text
/// RelayError::NegotiationRejected { status: 503, body: "..." }
/// → "negotiation rejected by provider with status 503"
/// ```
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration error (environment variable missing or invalid)
    #[error("configuration error: {0}")]
    Config(String),

    /// Hub service connection string could not be parsed
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// No negotiation provider is configured on this instance
    #[error("no negotiation provider configured for hub '{hub}'")]
    ProviderUnavailable { hub: String },

    /// Provider answered the negotiate call with a non-success status
    #[error("negotiation rejected by provider with status {status}")]
    NegotiationRejected { status: u16, body: String },

    /// Provider reply lacked a required field
    #[error("negotiation reply missing '{field}'")]
    IncompleteReply { field: &'static str },

    /// Endpoint URL could not be parsed or mapped to a websocket scheme
    #[error("invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// HTTP call to an upstream service failed before a status was received
    #[error("request to {service} failed")]
    Upstream {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Hub service refused a broadcast
    #[error("broadcast to hub '{hub}' rejected with status {status}")]
    PublishRejected {
        hub: String,
        status: u16,
        body: String,
    },

    /// Access token could not be signed
    #[error("access token signing failed: {0}")]
    Signing(String),

    /// NATS connection failed
    #[error("NATS connection failed")]
    NatsConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// NATS subscription failed for a subject
    #[error("NATS subscribe failed for subject '{subject}'")]
    NatsSubscribeFailed {
        subject: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Change feed exceeded consecutive error threshold
    #[error("change feed exceeded consecutive error threshold ({count}/{max})")]
    FeedCircuitBroken { count: u32, max: u32 },

    /// JSON encoding or decoding failed
    #[error("serialization failed for {what}")]
    SerializationFailed {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl RelayError {
    /// Returns a static label string suitable for Prometheus metrics.
    ///
    /// Used as the `error_type` label on `relay_errors_total`.
    pub fn error_type_label(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::InvalidConnectionString(_) => "connection_string",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::NegotiationRejected { .. } => "negotiation_rejected",
            Self::IncompleteReply { .. } => "incomplete_reply",
            Self::InvalidEndpoint { .. } => "invalid_endpoint",
            Self::Upstream { .. } => "upstream",
            Self::PublishRejected { .. } => "publish_rejected",
            Self::Signing(_) => "signing",
            Self::NatsConnectionFailed(_) => "nats_connection",
            Self::NatsSubscribeFailed { .. } => "nats_subscribe",
            Self::FeedCircuitBroken { .. } => "feed_circuit_broken",
            Self::SerializationFailed { .. } => "serialization",
        }
    }

    /// HTTP status used when this error escapes a request handler.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ProviderUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::NegotiationRejected { .. }
            | Self::IncompleteReply { .. }
            | Self::InvalidEndpoint { .. }
            | Self::Upstream { .. }
            | Self::PublishRejected { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.error_type_label(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
