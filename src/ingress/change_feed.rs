//! Change-feed ingress
//!
//! A [`ChangeFeedSource`] yields batches of changed records; the
//! [`ChangeFeedPump`] turns each non-empty batch into exactly one broadcast.

use crate::broadcast::Broadcaster;
use crate::error::RelayError;
use crate::events::ChangeRecord;
use crate::metrics::{BroadcastSource, RelayMetrics};
use crate::relay;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Consecutive poll errors after which the pump gives up
pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Upstream persistence change feed
#[async_trait]
pub trait ChangeFeedSource: Send {
    /// Wait for the next batch
    ///
    /// Returns `Ok(None)` once the feed has ended. A batch may be empty.
    async fn poll(&mut self) -> Result<Option<Vec<ChangeRecord>>, RelayError>;
}

/// What happened to one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Empty batch, nothing published
    Skipped,
    /// One message with this many arguments was published
    Published(usize),
    /// Publishing failed; the batch is dropped
    Failed,
}

/// Drives a change feed into the broadcaster
pub struct ChangeFeedPump<S> {
    source: S,
    broadcaster: Arc<dyn Broadcaster>,
    metrics: RelayMetrics,
}

impl<S: ChangeFeedSource> ChangeFeedPump<S> {
    pub fn new(source: S, broadcaster: Arc<dyn Broadcaster>, metrics: RelayMetrics) -> Self {
        Self {
            source,
            broadcaster,
            metrics,
        }
    }

    /// Run until the feed ends or trips the error threshold
    pub async fn run(mut self) -> Result<(), RelayError> {
        info!(broadcaster = self.broadcaster.kind(), "Change feed pump starting");
        self.metrics.set_change_feed_connected(true);

        let mut consecutive_errors: u32 = 0;

        loop {
            let records = match self.source.poll().await {
                Ok(Some(records)) => {
                    consecutive_errors = 0;
                    records
                }
                Ok(None) => break,
                Err(e) => {
                    consecutive_errors += 1;
                    self.metrics.record_error(e.error_type_label());
                    warn!(error = %e, consecutive = consecutive_errors, "Error polling change feed");

                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        self.metrics.set_change_feed_connected(false);
                        error!(consecutive = consecutive_errors, "Change feed dead: consecutive error threshold exceeded");
                        return Err(RelayError::FeedCircuitBroken {
                            count: consecutive_errors,
                            max: MAX_CONSECUTIVE_ERRORS,
                        });
                    }
                    continue;
                }
            };

            self.relay_batch(&records).await;
        }

        self.metrics.set_change_feed_connected(false);
        info!("Change feed ended");
        Ok(())
    }

    /// Relay one batch; failures are logged and counted, never fatal
    pub async fn relay_batch(&self, records: &[ChangeRecord]) -> BatchOutcome {
        let Some(message) = relay::change_batch_message(records) else {
            info!("Change feed delivered an empty batch, nothing to relay");
            return BatchOutcome::Skipped;
        };

        self.metrics.record_change_records(records.len());
        debug!(records = records.len(), "Relaying change batch");

        let start = Instant::now();
        match self.broadcaster.publish(&message).await {
            Ok(()) => {
                self.metrics
                    .record_broadcast_success(BroadcastSource::ChangeFeed, start.elapsed());
                BatchOutcome::Published(message.arity())
            }
            Err(e) => {
                self.metrics.record_broadcast_failure(BroadcastSource::ChangeFeed);
                self.metrics.record_error(e.error_type_label());
                warn!(records = records.len(), error = %e, "Failed to relay change batch");
                BatchOutcome::Failed
            }
        }
    }
}
