//! Subscriber client
//!
//! Negotiates once, then holds a hub connection open: handshake, keep-alive
//! pings, callback dispatch, and bounded fixed-interval reconnection reusing
//! the negotiated endpoint.

use super::error::ClientError;
use super::protocol::{self, HubMessage};
use super::state::ClientState;
use super::transport::{HubConnection, HubEndpoint, Transport};
use crate::events::targets;
use crate::negotiate::Negotiator;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

/// Fixed connection timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Interval between keep-alive pings while connected
    pub keep_alive_interval: Duration,
    /// Wait before each reconnection attempt
    pub reconnect_interval: Duration,
    /// Attempts before giving up
    pub max_attempts: u32,
    /// Bound on the protocol handshake
    pub handshake_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            keep_alive_interval: Duration::from_secs(10),
            reconnect_interval: Duration::from_secs(5),
            max_attempts: 5,
            handshake_timeout: Duration::from_secs(15),
        }
    }
}

/// Lifecycle callbacks
///
/// Defaults log each event, which is all the stock client does.
pub trait SubscriberHandler: Send + Sync {
    fn on_open(&self) {
        info!("Connection opened");
    }

    fn on_message(&self, arguments: &[Value]) {
        info!(?arguments, "Received message");
    }

    fn on_error(&self, error: &ClientError) {
        error!(error = %error, kind = error.error_type_label(), "Subscriber error");
    }

    fn on_close(&self) {
        info!("Connection closed");
    }
}

/// Handler that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

impl SubscriberHandler for LogHandler {}

/// Why the receive loop stopped
enum Lost {
    /// Transport dropped or server asked us to reconnect
    Dropped,
    /// Server closed and does not want us back
    ServerClosed { error: Option<String> },
}

enum Reconnect {
    Connected(Box<dyn HubConnection>, Vec<String>),
    Interrupted,
    Exhausted(u32),
}

enum Step {
    KeepAlive,
    Frame(Option<Result<String, ClientError>>),
}

/// Hub subscriber
pub struct Subscriber<T, H> {
    transport: T,
    handler: H,
    policy: ReconnectPolicy,
    target: String,
    state: watch::Sender<ClientState>,
}

impl<T: Transport, H: SubscriberHandler> Subscriber<T, H> {
    pub fn new(transport: T, handler: H, policy: ReconnectPolicy) -> Self {
        let (state, _) = watch::channel(ClientState::Disconnected);
        Self {
            transport,
            handler,
            policy,
            target: targets::NEW_MESSAGE.to_string(),
            state,
        }
    }

    /// Observe state transitions
    pub fn state(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Negotiate, then serve until `shutdown` resolves or the connection is lost for good
    ///
    /// Negotiation failures are returned as [`ClientError::Negotiation`]
    /// without any connection attempt.
    pub async fn run<N, F>(&self, negotiator: &N, hub: &str, shutdown: F) -> Result<(), ClientError>
    where
        N: Negotiator + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.transition(ClientState::Negotiating);

        let issued = tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted during negotiation");
                self.transition(ClientState::Closed);
                return Ok(());
            }
            issued = negotiator.issue(hub) => issued,
        };

        let endpoint = match issued.and_then(|descriptor| HubEndpoint::from_descriptor(&descriptor)) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.transition(ClientState::Closed);
                return Err(e.into());
            }
        };
        info!(url = %endpoint.url, "Hub endpoint negotiated");

        self.serve(endpoint, shutdown).await
    }

    /// Connect to an already negotiated endpoint and serve
    pub async fn serve<F>(&self, endpoint: HubEndpoint, shutdown: F) -> Result<(), ClientError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.transition(ClientState::Connecting);

        let opened = tokio::select! {
            _ = &mut shutdown => {
                self.transition(ClientState::Closed);
                return Ok(());
            }
            opened = self.open(&endpoint) => opened,
        };

        let (mut conn, mut backlog) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                self.handler.on_error(&e);
                self.transition(ClientState::Closed);
                return Err(e);
            }
        };
        self.connected(&endpoint);

        loop {
            let lost = tokio::select! {
                _ = &mut shutdown => None,
                lost = self.pump(conn.as_mut(), std::mem::take(&mut backlog)) => Some(lost),
            };

            match lost {
                None => {
                    info!("Stopping connection");
                    self.close(conn.as_mut()).await;
                    self.finish();
                    return Ok(());
                }
                Some(Lost::ServerClosed { error }) => {
                    info!(?error, "Hub closed the connection");
                    self.close(conn.as_mut()).await;
                    self.finish();
                    return Ok(());
                }
                Some(Lost::Dropped) => {
                    warn!("Connection lost");
                }
            }

            match self.reconnect(&endpoint, &mut shutdown).await {
                Reconnect::Connected(new_conn, new_backlog) => {
                    conn = new_conn;
                    backlog = new_backlog;
                    self.connected(&endpoint);
                }
                Reconnect::Interrupted => {
                    self.finish();
                    return Ok(());
                }
                Reconnect::Exhausted(attempts) => {
                    let e = ClientError::ReconnectExhausted { attempts };
                    self.handler.on_error(&e);
                    self.finish();
                    return Err(e);
                }
            }
        }
    }

    /// Open a transport and complete the handshake
    ///
    /// Returns the connection and any records that arrived with the
    /// handshake response.
    async fn open(&self, endpoint: &HubEndpoint) -> Result<(Box<dyn HubConnection>, Vec<String>), ClientError> {
        let mut conn = self.transport.connect(endpoint).await?;
        conn.send_text(protocol::handshake_request()).await?;

        let frame = match tokio::time::timeout(self.policy.handshake_timeout, conn.next_text()).await {
            Err(_) => {
                return Err(ClientError::HandshakeTimeout {
                    secs: self.policy.handshake_timeout.as_secs(),
                })
            }
            Ok(None) => return Err(ClientError::ConnectionClosed),
            Ok(Some(frame)) => frame?,
        };

        let mut records = protocol::split_records(&frame);
        let response = records
            .next()
            .ok_or_else(|| ClientError::Handshake("empty handshake response".to_string()))?;
        protocol::parse_handshake_response(response)?;

        Ok((conn, records.map(str::to_string).collect()))
    }

    /// Receive until the connection is lost
    async fn pump(&self, conn: &mut dyn HubConnection, backlog: Vec<String>) -> Lost {
        for record in &backlog {
            if let Some(lost) = self.dispatch(record) {
                return lost;
            }
        }

        let period = self.policy.keep_alive_interval;
        let mut keep_alive = tokio::time::interval_at(Instant::now() + period, period);
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let step = tokio::select! {
                _ = keep_alive.tick() => Step::KeepAlive,
                frame = conn.next_text() => Step::Frame(frame),
            };

            match step {
                Step::KeepAlive => {
                    if let Err(e) = conn.send_text(protocol::ping_frame()).await {
                        self.handler.on_error(&e);
                        return Lost::Dropped;
                    }
                    trace!("Keep-alive sent");
                }
                Step::Frame(None) => return Lost::Dropped,
                Step::Frame(Some(Err(e))) => {
                    self.handler.on_error(&e);
                    return Lost::Dropped;
                }
                Step::Frame(Some(Ok(frame))) => {
                    for record in protocol::split_records(&frame) {
                        if let Some(lost) = self.dispatch(record) {
                            return lost;
                        }
                    }
                }
            }
        }
    }

    /// Handle one record; returns Some when it ends the connection
    fn dispatch(&self, record: &str) -> Option<Lost> {
        match protocol::parse_message(record) {
            Ok(HubMessage::Invocation { target, arguments }) => {
                if target == self.target {
                    self.handler.on_message(&arguments);
                } else {
                    debug!(target_method = %target, "No handler registered for target");
                }
                None
            }
            Ok(HubMessage::Ping) => {
                trace!("Hub ping");
                None
            }
            Ok(HubMessage::Close { error, allow_reconnect }) => {
                if allow_reconnect {
                    info!(?error, "Hub closed the connection, reconnect allowed");
                    Some(Lost::Dropped)
                } else {
                    Some(Lost::ServerClosed { error })
                }
            }
            Ok(HubMessage::Other(kind)) => {
                debug!(kind, "Ignoring hub message");
                None
            }
            Err(e) => {
                self.handler.on_error(&e);
                None
            }
        }
    }

    async fn reconnect<S>(&self, endpoint: &HubEndpoint, shutdown: &mut S) -> Reconnect
    where
        S: Future<Output = ()> + Unpin,
    {
        let max = self.policy.max_attempts;

        for attempt in 1..=max {
            self.transition(ClientState::Reconnecting { attempt });
            info!(
                attempt,
                max,
                delay_secs = self.policy.reconnect_interval.as_secs(),
                "Reconnecting"
            );

            let interrupted = tokio::select! {
                _ = &mut *shutdown => true,
                _ = tokio::time::sleep(self.policy.reconnect_interval) => false,
            };
            if interrupted {
                return Reconnect::Interrupted;
            }

            let opened = tokio::select! {
                _ = &mut *shutdown => None,
                opened = self.open(endpoint) => Some(opened),
            };

            match opened {
                None => return Reconnect::Interrupted,
                Some(Ok((conn, backlog))) => return Reconnect::Connected(conn, backlog),
                Some(Err(e)) => {
                    warn!(attempt, error = %e, "Reconnection attempt failed");
                    self.handler.on_error(&e);
                }
            }
        }

        error!(attempts = max, "Giving up on reconnection");
        Reconnect::Exhausted(max)
    }

    /// Close the transport; failures are logged, the session ends regardless
    async fn close(&self, conn: &mut dyn HubConnection) {
        if let Err(e) = conn.close().await {
            warn!(error = %e, kind = e.error_type_label(), "Error stopping connection");
        }
    }

    fn connected(&self, endpoint: &HubEndpoint) {
        self.transition(ClientState::Connected);
        info!(url = %endpoint.url, "Connection established");
        self.handler.on_open();
    }

    fn finish(&self) {
        self.handler.on_close();
        self.transition(ClientState::Closed);
    }

    fn transition(&self, next: ClientState) {
        let previous = self.state.send_replace(next);
        debug!(from = %previous, to = %next, "Subscriber state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_constants() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.keep_alive_interval, Duration::from_secs(10));
        assert_eq!(policy.reconnect_interval, Duration::from_secs(5));
        assert_eq!(policy.max_attempts, 5);
    }
}
