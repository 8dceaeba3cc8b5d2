//! Hub subscriber client
//!
//! Negotiates with the relay, connects to the hub and logs every
//! `newMessage` event until interrupted.
//!
//! Exit codes: 0 on normal or interrupted shutdown, 1 when negotiation fails
//! before any connection is made or the connection is lost for good.

use anyhow::Result;
use hub_relay::client::{ClientError, LogHandler, ReconnectPolicy, Subscriber, WsTransport};
use hub_relay::config::SubscriberConfig;
use hub_relay::negotiate::UpstreamNegotiator;
use hub_relay::signals::shutdown_signal;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let config = SubscriberConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("hub_relay={}", config.log_level).parse()?)
                .add_directive(format!("hub_subscriber={}", config.log_level).parse()?)
                .add_directive("tungstenite=info".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    info!(
        function_app = %config.function_app_url,
        hub = %config.hub,
        "Starting subscriber client"
    );

    let negotiator = UpstreamNegotiator::new(&config.function_app_url);
    let subscriber = Subscriber::new(WsTransport, LogHandler, ReconnectPolicy::default());

    match subscriber.run(&negotiator, &config.hub, shutdown_signal()).await {
        Ok(()) => {
            info!("Subscriber stopped");
            Ok(ExitCode::SUCCESS)
        }
        Err(ClientError::Negotiation(cause)) => {
            error!(error = %cause, kind = cause.error_type_label(), "Failed to get connection info from function app. Exiting.");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            error!(error = %e, kind = e.error_type_label(), "Subscriber terminated");
            Ok(ExitCode::FAILURE)
        }
    }
}
