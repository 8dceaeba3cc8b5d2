//! Prometheus metrics module

use crate::error::RelayError;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Duration;

/// Where a broadcast originated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastSource {
    HttpTrigger,
    ChangeFeed,
}

impl BroadcastSource {
    pub fn label(&self) -> &'static str {
        match self {
            Self::HttpTrigger => "http_trigger",
            Self::ChangeFeed => "change_feed",
        }
    }
}

/// Relay metrics collector
#[derive(Clone)]
pub struct RelayMetrics {
    handle: Arc<PrometheusHandle>,
}

impl RelayMetrics {
    /// Install the process-wide Prometheus recorder
    pub fn install() -> Result<Self, RelayError> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| RelayError::Config(format!("failed to install Prometheus recorder: {e}")))?;

        Self::register_metrics();

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    /// Collector that renders an empty registry and records nowhere
    ///
    /// Used by tests and embedders that install their own recorder.
    pub fn detached() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        Self {
            handle: Arc::new(recorder.handle()),
        }
    }

    fn register_metrics() {
        describe_counter!(
            "relay_negotiations_total",
            Unit::Count,
            "Negotiate requests by outcome"
        );
        describe_counter!(
            "relay_broadcasts_total",
            Unit::Count,
            "Broadcasts accepted by the hub service"
        );
        describe_counter!(
            "relay_broadcast_failures_total",
            Unit::Count,
            "Broadcasts the hub service did not accept"
        );
        describe_counter!(
            "relay_change_records_total",
            Unit::Count,
            "Change records received from the change feed"
        );
        describe_counter!(
            "relay_change_decode_failures_total",
            Unit::Count,
            "Change-feed payloads skipped because they were not JSON"
        );
        describe_counter!("relay_errors_total", Unit::Count, "Total relay errors");

        describe_histogram!(
            "relay_broadcast_duration_seconds",
            Unit::Seconds,
            "Time to hand a broadcast to the hub service"
        );

        describe_gauge!(
            "relay_change_feed_connected",
            Unit::Count,
            "Change feed status (1=connected, 0=disconnected)"
        );
    }

    /// Record a negotiate request
    pub fn record_negotiation(&self, success: bool) {
        counter!(
            "relay_negotiations_total",
            "outcome" => if success { "issued" } else { "failed" }
        )
        .increment(1);
    }

    /// Record a broadcast accepted by the service
    pub fn record_broadcast_success(&self, source: BroadcastSource, duration: Duration) {
        counter!("relay_broadcasts_total", "source" => source.label()).increment(1);
        histogram!("relay_broadcast_duration_seconds", "source" => source.label())
            .record(duration.as_secs_f64());
    }

    /// Record a broadcast that failed
    pub fn record_broadcast_failure(&self, source: BroadcastSource) {
        counter!("relay_broadcast_failures_total", "source" => source.label()).increment(1);
    }

    /// Record records received in one change-feed batch
    pub fn record_change_records(&self, count: usize) {
        counter!("relay_change_records_total").increment(count as u64);
    }

    /// Record a change-feed payload that could not be decoded
    pub fn record_change_decode_failure(&self) {
        counter!("relay_change_decode_failures_total").increment(1);
    }

    /// Record relay error by type label
    pub fn record_error(&self, error_type: &'static str) {
        counter!("relay_errors_total", "error_type" => error_type).increment(1);
    }

    /// Set change feed connection status
    pub fn set_change_feed_connected(&self, connected: bool) {
        gauge!("relay_change_feed_connected").set(if connected { 1.0 } else { 0.0 });
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_labels() {
        assert_eq!(BroadcastSource::HttpTrigger.label(), "http_trigger");
        assert_eq!(BroadcastSource::ChangeFeed.label(), "change_feed");
    }

    #[test]
    fn test_detached_metrics_record_without_recorder() {
        let metrics = RelayMetrics::detached();
        metrics.record_negotiation(true);
        metrics.record_broadcast_failure(BroadcastSource::ChangeFeed);
        metrics.record_change_decode_failure();
        metrics.record_error("config");
        let _ = metrics.render();
    }
}
