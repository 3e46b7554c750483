//! Relay server
//!
//! Run with: cargo run --bin sensor-relay -- [OPTIONS]
//!
//! Every option can also come from the environment, e.g.
//!   RELAY_INGEST_ADDR=0.0.0.0:9750 RELAY_HTTP_ADDR=0.0.0.0:8000 sensor-relay
//!
//! Devices connect to the ingest port and write one JSON reading per line:
//!   {"temperature":"25","humidity":"40","vibration":"3"}
//!
//! Viewers open ws://HOST:8000/api/ws/sensor.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sensor_relay::analysis::OfflineAnalyzer;
use sensor_relay::hub::{BroadcastHub, HubConfig, SubscribePolicy};
use sensor_relay::server::{http, AppState, IngestListener, ServerConfig};

#[derive(Debug, Parser)]
#[command(
    name = "sensor-relay",
    version,
    about = "Real-time relay for drying-rig sensor readings"
)]
struct Cli {
    /// Address for device connections
    #[arg(long, env = "RELAY_INGEST_ADDR", default_value = "0.0.0.0:9750")]
    ingest_addr: SocketAddr,

    /// Address for the HTTP/WebSocket server
    #[arg(long, env = "RELAY_HTTP_ADDR", default_value = "0.0.0.0:8000")]
    http_addr: SocketAddr,

    /// Maximum concurrent device connections (0 = unlimited)
    #[arg(long, env = "RELAY_MAX_DEVICES", default_value_t = 0)]
    max_devices: usize,

    /// Disconnect a silent device after this many seconds
    #[arg(long, env = "RELAY_IDLE_TIMEOUT_SECS", default_value_t = 60)]
    idle_timeout_secs: u64,

    /// Frames buffered per viewer
    #[arg(long, env = "RELAY_SUBSCRIBER_BUFFER", default_value_t = 16)]
    subscriber_buffer: usize,

    /// Drop a viewer whose buffer stays full this long
    #[arg(long, env = "RELAY_SEND_TIMEOUT_MS", default_value_t = 2000)]
    send_timeout_ms: u64,

    /// What a new viewer gets on join: replay-latest or future-only
    #[arg(long, env = "RELAY_SUBSCRIBE_POLICY", default_value = "replay-latest")]
    subscribe_policy: SubscribePolicy,
}

impl Cli {
    fn hub_config(&self) -> HubConfig {
        HubConfig::default()
            .subscriber_buffer(self.subscriber_buffer)
            .send_timeout(Duration::from_millis(self.send_timeout_ms))
            .subscribe_policy(self.subscribe_policy)
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig::default()
            .ingest_addr(self.ingest_addr)
            .http_addr(self.http_addr)
            .max_device_connections(self.max_devices)
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> sensor_relay::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let server_config = cli.server_config();
    let hub = Arc::new(BroadcastHub::with_config(cli.hub_config()));

    tracing::info!(
        policy = ?hub.config().subscribe_policy,
        send_timeout_ms = cli.send_timeout_ms,
        "Starting sensor relay"
    );

    let sweep = hub.spawn_sweep_task();

    let ingest = IngestListener::bind(server_config.clone(), Arc::clone(&hub)).await?;
    let state = AppState::new(Arc::clone(&hub), Arc::new(OfflineAnalyzer));
    let http_server = tokio::spawn(http::serve(
        server_config.http_addr,
        state,
        shutdown_signal(),
    ));

    let result = tokio::select! {
        result = ingest.run_until(shutdown_signal()) => result,
        joined = http_server => match joined {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "HTTP server task failed");
                Ok(())
            }
        },
    };

    sweep.abort();
    tracing::info!("Sensor relay stopped");

    result
}
