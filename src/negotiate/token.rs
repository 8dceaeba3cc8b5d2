//! Hub service endpoint and access token signing
//!
//! The hub service authenticates both clients and the REST publish API with
//! HS256 JWTs signed by the access key from the connection string. The
//! audience claim must equal the URL the token is presented to.

use crate::error::RelayError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Claims carried by every issued token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub aud: String,
    pub iat: u64,
    pub exp: u64,
    pub jti: String,
}

/// Parsed hub service connection string
///
/// Format: `Endpoint=https://<name>.service.signalr.net;AccessKey=<key>;[Port=<port>;]Version=1.0;`
#[derive(Clone)]
pub struct ServiceEndpoint {
    endpoint: String,
    access_key: String,
}

impl std::fmt::Debug for ServiceEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEndpoint")
            .field("endpoint", &self.endpoint)
            .field("access_key", &"<redacted>")
            .finish()
    }
}

impl ServiceEndpoint {
    /// Parse a connection string
    pub fn parse(connection_string: &str) -> Result<Self, RelayError> {
        let mut endpoint = None;
        let mut access_key = None;
        let mut port = None;

        for part in connection_string.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // Access keys are base64 and may end in '='
            let (key, value) = part.split_once('=').ok_or_else(|| {
                RelayError::InvalidConnectionString(format!("segment without '=': {part}"))
            })?;

            match key.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value.trim().trim_end_matches('/').to_string()),
                "accesskey" => access_key = Some(value.trim().to_string()),
                "port" => {
                    let parsed: u16 = value.trim().parse().map_err(|e| {
                        RelayError::InvalidConnectionString(format!("Port must be a valid port number: {e}"))
                    })?;
                    port = Some(parsed);
                }
                _ => {}
            }
        }

        let mut endpoint = endpoint
            .filter(|e| !e.is_empty())
            .ok_or_else(|| RelayError::InvalidConnectionString("missing Endpoint".to_string()))?;
        let access_key = access_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RelayError::InvalidConnectionString("missing AccessKey".to_string()))?;

        let authority = endpoint
            .strip_prefix("https://")
            .or_else(|| endpoint.strip_prefix("http://"))
            .ok_or_else(|| {
                RelayError::InvalidConnectionString(format!("Endpoint must be http(s): {endpoint}"))
            })?;

        if let Some(port) = port {
            if !authority.contains(':') {
                endpoint = format!("{endpoint}:{port}");
            }
        }

        Ok(Self { endpoint, access_key })
    }

    /// Base endpoint, without trailing slash
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// URL clients connect to for `hub`
    pub fn client_url(&self, hub: &str) -> String {
        format!("{}/client/?hub={}", self.endpoint, hub)
    }

    /// REST URL that broadcasts to every connection on `hub`
    pub fn broadcast_url(&self, hub: &str) -> String {
        format!("{}/api/v1/hubs/{}", self.endpoint, hub)
    }

    /// Sign an HS256 token for `audience`
    pub fn sign_token(&self, audience: &str, issued_at: u64, lifetime: Duration) -> Result<String, RelayError> {
        let header = serde_json::json!({ "alg": "HS256", "typ": "JWT" });
        let exp = issued_at
            .checked_add(lifetime.as_secs())
            .ok_or_else(|| RelayError::Signing(format!("token lifetime {}s overflows expiry", lifetime.as_secs())))?;
        let claims = TokenClaims {
            aud: audience.to_string(),
            iat: issued_at,
            exp,
            jti: Uuid::new_v4().to_string(),
        };

        let header = serde_json::to_vec(&header)
            .map_err(|source| RelayError::SerializationFailed { what: "token header", source })?;
        let claims = serde_json::to_vec(&claims)
            .map_err(|source| RelayError::SerializationFailed { what: "token claims", source })?;

        let signing_input = format!("{}.{}", URL_SAFE_NO_PAD.encode(header), URL_SAFE_NO_PAD.encode(claims));

        let mut mac = HmacSha256::new_from_slice(self.access_key.as_bytes())
            .map_err(|e| RelayError::Signing(e.to_string()))?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }
}

/// Current time as unix seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
