//! Subscriber client
//!
//! Negotiates a hub endpoint with the relay, connects over a websocket
//! speaking the JSON hub protocol, and invokes callbacks for every event.

mod error;
pub mod protocol;
mod state;
mod subscriber;
mod transport;

pub use error::ClientError;
pub use state::ClientState;
pub use subscriber::{LogHandler, ReconnectPolicy, Subscriber, SubscriberHandler};
pub use transport::{HubConnection, HubEndpoint, Transport, WsTransport};
