//! Relay payload types
//!
//! The fan-out message handed to the hub service and the opaque change
//! records arriving from the change feed.

pub mod message;

pub use message::{targets, BroadcastMessage, ChangeRecord};
