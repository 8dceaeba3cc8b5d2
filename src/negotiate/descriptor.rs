//! Connection descriptor and its wire form

use crate::error::RelayError;
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Everything a client needs to open a persistent connection to a hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    /// Client endpoint URL as issued by the provider (http/https)
    pub url: String,
    /// Time-limited bearer credential
    pub access_token: String,
    /// Unix seconds at which the descriptor was issued
    pub issued_at: u64,
    /// Hub the credential is scoped to
    pub hub: String,
}

/// Negotiate response body: `{ "url": ..., "accessToken": ... }`
///
/// Both fields are optional on decode so that an incomplete provider reply
/// is reported as such instead of as a parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiateReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl ConnectionDescriptor {
    /// Validate a provider reply into a descriptor
    ///
    /// Missing or empty `url`/`accessToken` is a provider failure.
    pub fn from_reply(reply: NegotiateReply, hub: &str, issued_at: u64) -> Result<Self, RelayError> {
        let url = reply
            .url
            .filter(|u| !u.is_empty())
            .ok_or(RelayError::IncompleteReply { field: "url" })?;
        let access_token = reply
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(RelayError::IncompleteReply { field: "accessToken" })?;

        Ok(Self {
            url,
            access_token,
            issued_at,
            hub: hub.to_string(),
        })
    }

    /// Wire form returned by the negotiate endpoint
    pub fn to_reply(&self) -> NegotiateReply {
        NegotiateReply {
            url: Some(self.url.clone()),
            access_token: Some(self.access_token.clone()),
        }
    }

    /// Websocket URL the client connects to
    pub fn websocket_url(&self) -> Result<String, RelayError> {
        websocket_url(&self.url)
    }
}

/// Map an issued endpoint URL onto its websocket equivalent
///
/// `https` becomes `wss` and `http` becomes `ws`; host, port, path and
/// query are kept. URLs already on a websocket scheme pass through.
pub fn websocket_url(url: &str) -> Result<String, RelayError> {
    let invalid = |reason: String| RelayError::InvalidEndpoint {
        url: url.to_string(),
        reason,
    };

    let mut parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    if parsed.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    let scheme = match parsed.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    };

    parsed
        .set_scheme(scheme)
        .map_err(|()| invalid(format!("cannot switch scheme to '{scheme}'")))?;

    Ok(parsed.to_string())
}
