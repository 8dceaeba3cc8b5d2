//! Persistent-connection transport
//!
//! The subscriber speaks the hub protocol over any [`Transport`]; the
//! websocket implementation is the production one.

use super::error::ClientError;
use crate::error::RelayError;
use crate::negotiate::ConnectionDescriptor;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

/// Where and how to connect, derived from a negotiated descriptor
///
/// Passed explicitly into every connect call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubEndpoint {
    /// Websocket URL (`ws`/`wss`)
    pub url: String,
    /// Bearer credential from negotiation
    pub access_token: String,
}

impl HubEndpoint {
    pub fn from_descriptor(descriptor: &ConnectionDescriptor) -> Result<Self, RelayError> {
        Ok(Self {
            url: descriptor.websocket_url()?,
            access_token: descriptor.access_token.clone(),
        })
    }
}

/// Opens connections to a hub
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, endpoint: &HubEndpoint) -> Result<Box<dyn HubConnection>, ClientError>;
}

/// One open text-frame connection
#[async_trait]
pub trait HubConnection: Send {
    async fn send_text(&mut self, text: String) -> Result<(), ClientError>;

    /// Next text frame; `None` once the connection has ended
    async fn next_text(&mut self) -> Option<Result<String, ClientError>>;

    async fn close(&mut self) -> Result<(), ClientError>;
}

/// Websocket transport
///
/// Connects straight to the negotiated URL with the bearer token in the
/// `Authorization` header; no secondary negotiation round-trip.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, endpoint: &HubEndpoint) -> Result<Box<dyn HubConnection>, ClientError> {
        let connect_error = |source: Box<dyn std::error::Error + Send + Sync>| ClientError::Connect {
            url: endpoint.url.clone(),
            source,
        };

        let mut request = endpoint
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| connect_error(Box::new(e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", endpoint.access_token))
            .map_err(|e| connect_error(Box::new(e)))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (stream, response) = connect_async(request)
            .await
            .map_err(|e| connect_error(Box::new(e)))?;
        debug!(url = %endpoint.url, status = response.status().as_u16(), "Websocket connected");

        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl HubConnection for WsConnection {
    async fn send_text(&mut self, text: String) -> Result<(), ClientError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ClientError::Transport(Box::new(e)))
    }

    async fn next_text(&mut self) -> Option<Result<String, ClientError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(ClientError::Transport(Box::new(e)))),
            };

            match message {
                Message::Text(text) => return Some(Ok(text.as_str().to_owned())),
                Message::Binary(bytes) => {
                    return Some(
                        String::from_utf8(bytes.to_vec())
                            .map_err(|e| ClientError::Protocol(format!("binary frame is not UTF-8: {e}"))),
                    )
                }
                // tungstenite queues the pong itself
                Message::Ping(_) => trace!("Websocket ping"),
                Message::Close(frame) => {
                    debug!(?frame, "Websocket closed by server");
                    return None;
                }
                _ => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.stream
            .close(None)
            .await
            .map_err(|e| ClientError::Transport(Box::new(e)))
    }
}
