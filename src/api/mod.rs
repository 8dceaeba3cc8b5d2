//! Function endpoints
//!
//! `GET /api/negotiate` hands out connection descriptors and
//! `GET|POST /api/http_trigger` relays a name to every subscribed client.

use crate::broadcast::Broadcaster;
use crate::error::RelayError;
use crate::health;
use crate::ingress::http_trigger;
use crate::metrics::{BroadcastSource, RelayMetrics};
use crate::negotiate::{NegotiateReply, Negotiator};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Shared state for every endpoint
///
/// Only immutable configuration and `Arc` collaborators; requests share no
/// mutable state.
#[derive(Clone)]
pub struct AppState {
    pub hub: String,
    pub negotiator: Option<Arc<dyn Negotiator>>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub metrics: RelayMetrics,
    pub trigger_broadcast: bool,
}

/// Create the full router: function endpoints plus health endpoints
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/negotiate", get(negotiate_handler))
        .route(
            "/api/http_trigger",
            get(http_trigger_handler).post(http_trigger_handler),
        )
        .merge(health::routes())
        .with_state(state)
}

/// Negotiate endpoint - returns `{ url, accessToken }` for the configured hub
async fn negotiate_handler(State(state): State<AppState>) -> Result<Json<NegotiateReply>, RelayError> {
    let Some(negotiator) = state.negotiator.as_ref() else {
        let err = RelayError::ProviderUnavailable { hub: state.hub.clone() };
        state.metrics.record_negotiation(false);
        state.metrics.record_error(err.error_type_label());
        return Err(err);
    };

    match negotiator.issue(&state.hub).await {
        Ok(descriptor) => {
            state.metrics.record_negotiation(true);
            debug!(hub = %state.hub, "Negotiation served");
            Ok(Json(descriptor.to_reply()))
        }
        Err(e) => {
            state.metrics.record_negotiation(false);
            state.metrics.record_error(e.error_type_label());
            error!(hub = %state.hub, error = %e, "Negotiation failed");
            Err(e)
        }
    }
}

/// HTTP trigger - greets the caller and relays the name
async fn http_trigger_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<String, RelayError> {
    let outcome = http_trigger::evaluate(
        params.get("name").map(String::as_str),
        &body,
        state.trigger_broadcast,
    );

    if let Some(message) = outcome.message.as_ref() {
        let start = Instant::now();
        if let Err(e) = state.broadcaster.publish(message).await {
            state.metrics.record_broadcast_failure(BroadcastSource::HttpTrigger);
            state.metrics.record_error(e.error_type_label());
            error!(error = %e, "Failed to relay trigger message");
            return Err(e);
        }
        state
            .metrics
            .record_broadcast_success(BroadcastSource::HttpTrigger, start.elapsed());
        info!(hub = %state.hub, broadcaster = state.broadcaster.kind(), "Trigger message relayed");
    }

    Ok(outcome.body)
}
