//! Hub Relay server
//!
//! Serves the function endpoints and drives the change feed:
//! - `/api/negotiate` issues hub connection descriptors
//! - `/api/http_trigger` relays a name to every subscribed client
//! - the NATS change feed relays each batch of changed records
//! - health/ready/metrics endpoints for the hosting platform

use anyhow::Result;
use hub_relay::api::{self, AppState};
use hub_relay::broadcast::{Broadcaster, LogBroadcaster, ServiceBroadcaster};
use hub_relay::config::RelayConfig;
use hub_relay::ingress::ChangeFeedPump;
use hub_relay::metrics::RelayMetrics;
use hub_relay::nats::NatsChangeFeed;
use hub_relay::negotiate::{Negotiator, ServiceEndpoint, ServiceNegotiator};
use hub_relay::signals::shutdown_signal;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first to get log level
    let config = RelayConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("hub_relay={}", config.log_level).parse()?)
                .add_directive("async_nats=warn".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .json()
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        hub = %config.hub,
        trigger_broadcast = config.trigger_broadcast,
        "Starting Hub Relay"
    );

    let metrics = RelayMetrics::install()?;
    info!("Prometheus metrics initialized");

    // Hub service, or local mode without one
    let (negotiator, broadcaster): (Option<Arc<dyn Negotiator>>, Arc<dyn Broadcaster>) =
        match config.connection_string.as_deref() {
            Some(connection_string) => {
                let endpoint = Arc::new(ServiceEndpoint::parse(connection_string)?);
                info!(endpoint = endpoint.endpoint(), "Using hub service");
                let negotiator: Arc<dyn Negotiator> =
                    Arc::new(ServiceNegotiator::new(Arc::clone(&endpoint), config.token_lifetime));
                let broadcaster: Arc<dyn Broadcaster> =
                    Arc::new(ServiceBroadcaster::new(endpoint, config.hub.clone()));
                (Some(negotiator), broadcaster)
            }
            None => {
                info!("No hub connection string configured - running in local mode");
                let broadcaster: Arc<dyn Broadcaster> = Arc::new(LogBroadcaster);
                (None, broadcaster)
            }
        };

    // Change feed if configured
    let feed = if let Some(ref url) = config.nats_url {
        match NatsChangeFeed::connect(url, &config.change_subject, config.change_max_batch, metrics.clone()).await {
            Ok(feed) => {
                info!(url = %url, subject = %config.change_subject, "Change feed connected");
                Some(feed)
            }
            Err(e) => {
                error!(error = %e, "Failed to connect change feed - HTTP trigger only");
                metrics.record_error(e.error_type_label());
                metrics.set_change_feed_connected(false);
                None
            }
        }
    } else {
        info!("No NATS_URL configured - change feed disabled");
        None
    };

    let state = AppState {
        hub: config.hub.clone(),
        negotiator,
        broadcaster: Arc::clone(&broadcaster),
        metrics: metrics.clone(),
        trigger_broadcast: config.trigger_broadcast,
    };

    let addr: SocketAddr = ([0, 0, 0, 0], config.http_port).into();
    info!(port = config.http_port, "Starting HTTP server");

    let http_server = axum::serve(tokio::net::TcpListener::bind(addr).await?, api::router(state));

    let pump = async {
        match feed {
            Some(feed) => ChangeFeedPump::new(feed, broadcaster, metrics.clone()).run().await,
            None => std::future::pending().await,
        }
    };

    // Run everything concurrently
    tokio::select! {
        result = pump => {
            if let Err(e) = result {
                error!(error = %e, "Change feed error");
            }
        }
        result = http_server => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Hub Relay shutdown complete");
    Ok(())
}
