//! Subscriber lifecycle states

use std::fmt;

/// `Disconnected → Negotiating → Connecting → Connected → (Reconnecting ↔ Connected) → Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Negotiating,
    Connecting,
    Connected,
    /// Waiting for or performing reconnection attempt `attempt` (1-based)
    Reconnecting { attempt: u32 },
    Closed,
}

impl ClientState {
    /// Returns true if inbound events are being delivered
    pub fn is_connected(&self) -> bool {
        matches!(self, ClientState::Connected)
    }

    /// Returns true once the subscriber has terminated
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClientState::Closed)
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Negotiating => f.write_str("negotiating"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        assert!(ClientState::Connected.is_connected());
        assert!(!ClientState::Reconnecting { attempt: 1 }.is_connected());
        assert!(ClientState::Closed.is_terminal());
        assert!(!ClientState::Disconnected.is_terminal());
        assert_eq!(ClientState::Reconnecting { attempt: 3 }.to_string(), "reconnecting (attempt 3)");
    }
}
