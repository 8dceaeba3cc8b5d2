//! Subscriber client errors

use crate::error::RelayError;
use thiserror::Error;

/// Subscriber client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// Negotiation failed before any connection was opened
    #[error("negotiation failed")]
    Negotiation(#[from] RelayError),

    /// Transport could not open a connection
    #[error("failed to connect to {url}")]
    Connect {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Hub rejected or garbled the protocol handshake
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// No handshake response within the allowed time
    #[error("handshake timed out after {secs}s")]
    HandshakeTimeout { secs: u64 },

    /// Error reported by an open transport
    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Connection ended while a response was expected
    #[error("connection closed")]
    ConnectionClosed,

    /// Inbound frame did not follow the hub protocol
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Every reconnection attempt failed
    #[error("reconnection failed after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },
}

impl ClientError {
    /// Returns a static label string for logs
    pub fn error_type_label(&self) -> &'static str {
        match self {
            Self::Negotiation(_) => "negotiation",
            Self::Connect { .. } => "connect",
            Self::Handshake(_) => "handshake",
            Self::HandshakeTimeout { .. } => "handshake_timeout",
            Self::Transport(_) => "transport",
            Self::ConnectionClosed => "connection_closed",
            Self::Protocol(_) => "protocol",
            Self::ReconnectExhausted { .. } => "reconnect_exhausted",
        }
    }

    /// True when the failure happened before any connection existed
    pub fn is_negotiation_failure(&self) -> bool {
        matches!(self, Self::Negotiation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiation_failure_wraps_relay_error() {
        let err: ClientError = RelayError::IncompleteReply { field: "accessToken" }.into();
        assert!(err.is_negotiation_failure());
        assert_eq!(err.error_type_label(), "negotiation");
        let source = std::error::Error::source(&err).expect("source");
        assert!(source.to_string().contains("accessToken"));
    }

    #[test]
    fn test_exhausted_message_has_attempts() {
        let err = ClientError::ReconnectExhausted { attempts: 5 };
        assert_eq!(err.to_string(), "reconnection failed after 5 attempts");
        assert!(!err.is_negotiation_failure());
    }
}
