//! Batching change feed over a stream of payloads

use crate::error::RelayError;
use crate::events::ChangeRecord;
use crate::ingress::ChangeFeedSource;
use crate::metrics::RelayMetrics;
use async_nats::{Client, Message, Subscriber};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{Map, Stream};
use futures_util::{FutureExt, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Message payloads of a NATS subscription
pub type NatsPayloads = Map<Subscriber, fn(Message) -> Bytes>;

/// Change feed reading batches from a NATS subject
pub type NatsChangeFeed = BatchingFeed<NatsPayloads>;

fn message_payload(message: Message) -> Bytes {
    message.payload
}

/// Change feed that turns a stream of JSON payloads into record batches
///
/// Each poll waits for one decodable payload, then drains whatever the
/// stream already has buffered. A batch never holds more than `max_batch`
/// records; the rest of an oversized payload opens the next batch.
pub struct BatchingFeed<S> {
    payloads: S,
    subject: String,
    max_batch: usize,
    carry: VecDeque<ChangeRecord>,
    ended: bool,
    metrics: RelayMetrics,
}

impl NatsChangeFeed {
    /// Connect to NATS and subscribe to `subject`
    pub async fn connect(
        servers: &str,
        subject: &str,
        max_batch: usize,
        metrics: RelayMetrics,
    ) -> Result<Self, RelayError> {
        info!(servers, subject, "Connecting change feed to NATS");

        let client = async_nats::connect(servers)
            .await
            .map_err(|e| RelayError::NatsConnectionFailed(Box::new(e)))?;

        Self::subscribe(&client, subject, max_batch, metrics).await
    }

    /// Subscribe on an existing client
    pub async fn subscribe(
        client: &Client,
        subject: &str,
        max_batch: usize,
        metrics: RelayMetrics,
    ) -> Result<Self, RelayError> {
        let subscriber = client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| RelayError::NatsSubscribeFailed {
                subject: subject.to_string(),
                source: Box::new(e),
            })?;

        info!(subject, max_batch, "Subscribed to change feed");

        let payloads: NatsPayloads = subscriber.map(message_payload as fn(Message) -> Bytes);
        Ok(BatchingFeed::new(payloads, subject, max_batch, metrics))
    }
}

impl<S> BatchingFeed<S>
where
    S: Stream + Unpin + Send,
    S::Item: AsRef<[u8]>,
{
    pub fn new(payloads: S, subject: &str, max_batch: usize, metrics: RelayMetrics) -> Self {
        Self {
            payloads,
            subject: subject.to_string(),
            max_batch: max_batch.max(1),
            carry: VecDeque::new(),
            ended: false,
            metrics,
        }
    }

    /// Decode a payload, logging and counting failures
    fn accept(&self, payload: &[u8], into: &mut Vec<ChangeRecord>) -> bool {
        match decode_batch(payload) {
            Ok(records) => {
                into.extend(records);
                true
            }
            Err(e) => {
                self.metrics.record_change_decode_failure();
                warn!(subject = %self.subject, error = %e, "Skipping undecodable change payload");
                false
            }
        }
    }
}

#[async_trait]
impl<S> ChangeFeedSource for BatchingFeed<S>
where
    S: Stream + Unpin + Send,
    S::Item: AsRef<[u8]> + Send,
{
    async fn poll(&mut self) -> Result<Option<Vec<ChangeRecord>>, RelayError> {
        let take = self.carry.len().min(self.max_batch);
        let mut records: Vec<ChangeRecord> = self.carry.drain(..take).collect();

        if records.is_empty() {
            if self.ended {
                return Ok(None);
            }

            // Block until one decodable payload arrives
            loop {
                let Some(payload) = self.payloads.next().await else {
                    self.ended = true;
                    return Ok(None);
                };
                if self.accept(payload.as_ref(), &mut records) {
                    break;
                }
            }
        }

        // Drain whatever is already buffered into the same batch
        while records.len() < self.max_batch && !self.ended {
            match self.payloads.next().now_or_never() {
                Some(Some(payload)) => {
                    self.accept(payload.as_ref(), &mut records);
                }
                Some(None) => self.ended = true,
                None => break,
            }
        }

        if records.len() > self.max_batch {
            let overflow: Vec<ChangeRecord> = records.drain(self.max_batch..).collect();
            // Overflow precedes anything still in carry
            for record in overflow.into_iter().rev() {
                self.carry.push_front(record);
            }
        }

        debug!(subject = %self.subject, records = records.len(), carried = self.carry.len(), "Change batch received");
        Ok(Some(records))
    }
}

/// Decode one feed payload into records
///
/// A JSON array is a batch (possibly empty); any other JSON value is a
/// batch of one.
pub fn decode_batch(payload: &[u8]) -> Result<Vec<ChangeRecord>, RelayError> {
    let value: Value = serde_json::from_slice(payload).map_err(|source| RelayError::SerializationFailed {
        what: "change payload",
        source,
    })?;

    Ok(match value {
        Value::Array(documents) => documents.into_iter().map(ChangeRecord::new).collect(),
        document => vec![ChangeRecord::new(document)],
    })
}
