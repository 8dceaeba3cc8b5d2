//! Hub Relay - change notifications fanned out through a real-time hub service
//!
//! - Negotiate endpoint issuing hub connection descriptors
//! - HTTP trigger and change feed relaying payloads as broadcasts
//! - Subscriber client with keep-alive and bounded reconnection

pub mod api;
pub mod broadcast;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod ingress;
pub mod metrics;
pub mod nats;
pub mod negotiate;
pub mod relay;
pub mod signals;
