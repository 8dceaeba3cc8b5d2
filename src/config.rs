//! Relay configuration module
//!
//! Handles loading configuration from environment variables (and `.env`).

use crate::error::RelayError;
use std::env;
use std::time::Duration;

/// Default hub (channel) name
pub const DEFAULT_HUB: &str = "agentsHub";

/// Default subject the change feed listens on
pub const DEFAULT_CHANGE_SUBJECT: &str = "changes.>";

/// Upper bound on issued token lifetime (7 days)
pub const MAX_TOKEN_LIFETIME_SECS: u64 = 7 * 24 * 60 * 60;

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Hub service connection string; None runs the relay in local mode
    pub connection_string: Option<String>,

    /// Hub every client subscribes to and every message is broadcast on
    pub hub: String,

    /// HTTP port for the function endpoints and health checks
    pub http_port: u16,

    /// Lifetime of issued access tokens
    pub token_lifetime: Duration,

    /// Whether the HTTP trigger publishes to the hub or only answers
    pub trigger_broadcast: bool,

    /// NATS server URL(s) carrying the change feed
    pub nats_url: Option<String>,

    /// Subject the change feed subscribes to
    pub change_subject: String,

    /// Max records relayed per change-feed poll
    pub change_max_batch: usize,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl RelayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, RelayError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_vars<F>(var: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let connection_string = var("SIGNALR_CONNECTION_STRING")
            .or_else(|| var("AzureSignalRConnectionString")) // Functions app setting name
            .filter(|s| !s.trim().is_empty());

        let hub = hub_name(&var)?;

        let http_port = var("HTTP_PORT")
            .or_else(|| var("FUNCTIONS_HTTPWORKER_PORT"))
            .unwrap_or_else(|| "7071".to_string())
            .parse()
            .map_err(|e| RelayError::Config(format!("HTTP_PORT must be a valid port number: {e}")))?;

        let token_lifetime_secs: u64 = var("TOKEN_LIFETIME_SECS")
            .unwrap_or_else(|| "3600".to_string())
            .parse()
            .map_err(|e| RelayError::Config(format!("TOKEN_LIFETIME_SECS must be a valid number: {e}")))?;
        if token_lifetime_secs == 0 || token_lifetime_secs > MAX_TOKEN_LIFETIME_SECS {
            return Err(RelayError::Config(format!(
                "TOKEN_LIFETIME_SECS must be between 1 and {MAX_TOKEN_LIFETIME_SECS}, got {token_lifetime_secs}"
            )));
        }

        let trigger_broadcast = parse_bool(
            "HTTP_TRIGGER_BROADCAST",
            var("HTTP_TRIGGER_BROADCAST").as_deref().unwrap_or("true"),
        )?;

        let nats_url = var("NATS_URL").filter(|s| !s.trim().is_empty());

        let change_subject =
            var("CHANGE_FEED_SUBJECT").unwrap_or_else(|| DEFAULT_CHANGE_SUBJECT.to_string());

        let change_max_batch: usize = var("CHANGE_FEED_MAX_BATCH")
            .unwrap_or_else(|| "100".to_string())
            .parse()
            .map_err(|e| RelayError::Config(format!("CHANGE_FEED_MAX_BATCH must be a valid number: {e}")))?;
        if change_max_batch == 0 {
            return Err(RelayError::Config("CHANGE_FEED_MAX_BATCH must be positive".to_string()));
        }

        let log_level = var("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            connection_string,
            hub,
            http_port,
            token_lifetime: Duration::from_secs(token_lifetime_secs),
            trigger_broadcast,
            nats_url,
            change_subject,
            change_max_batch,
            log_level,
        })
    }
}

/// Subscriber client configuration
///
/// Keep-alive and reconnection timings are fixed constants in
/// [`crate::client::ReconnectPolicy`], not configuration.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Base URL of the function app serving `/api/negotiate`
    pub function_app_url: String,

    /// Hub to subscribe to
    pub hub: String,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl SubscriberConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, RelayError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_vars<F>(var: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let function_app_url = var("FUNCTION_APP_URL")
            .unwrap_or_else(|| "http://localhost:7071".to_string())
            .trim_end_matches('/')
            .to_string();
        if function_app_url.is_empty() {
            return Err(RelayError::Config("FUNCTION_APP_URL must not be empty".to_string()));
        }

        Ok(Self {
            function_app_url,
            hub: hub_name(&var)?,
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn hub_name<F>(var: &F) -> Result<String, RelayError>
where
    F: Fn(&str) -> Option<String>,
{
    let hub = var("HUB_NAME").unwrap_or_else(|| DEFAULT_HUB.to_string());
    if hub.trim().is_empty() {
        return Err(RelayError::Config("HUB_NAME must not be empty".to_string()));
    }
    Ok(hub)
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, RelayError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(RelayError::Config(format!("{key} must be a boolean, got '{other}'"))),
    }
}
