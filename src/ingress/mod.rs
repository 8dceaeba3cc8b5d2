//! Ingress handlers
//!
//! Two ways a notification enters the relay: a direct HTTP trigger carrying
//! a name, or a batch of records pushed by the change feed.

pub mod change_feed;
pub mod http_trigger;

pub use change_feed::{BatchOutcome, ChangeFeedPump, ChangeFeedSource, MAX_CONSECUTIVE_ERRORS};
pub use http_trigger::{evaluate, TriggerOutcome};
