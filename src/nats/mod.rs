//! NATS change-feed integration
//!
//! Changed documents are delivered on a NATS subject, either one document
//! per message or a JSON array per message.

mod feed;

pub use feed::{decode_batch, BatchingFeed, NatsChangeFeed, NatsPayloads};
