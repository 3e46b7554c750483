//! Device simulator
//!
//! Pushes a random reading to a relay every interval, reconnecting when the
//! relay goes away.
//!
//! Run with: cargo run --bin sensor-sim -- --relay 127.0.0.1:9750

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use rand::Rng;
use tracing_subscriber::EnvFilter;

use sensor_relay::client::{DevicePublisher, OutgoingReading};

#[derive(Debug, Parser)]
#[command(name = "sensor-sim", about = "Send random drying-rig readings to a relay")]
struct Cli {
    /// Relay ingest address
    #[arg(long, env = "RELAY_INGEST_ADDR", default_value = "127.0.0.1:9750")]
    relay: SocketAddr,

    /// Seconds between readings
    #[arg(long, default_value_t = 2)]
    interval_secs: u64,
}

fn random_reading() -> OutgoingReading {
    let mut rng = rand::thread_rng();
    OutgoingReading::now(
        rng.gen_range(20..=100).to_string(), // °C
        rng.gen_range(10..=90).to_string(),  // %
        rng.gen_range(0..=50).to_string(),
    )
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let (mut publisher, _events) = DevicePublisher::new(cli.relay);
    let mut ticker = tokio::time::interval(Duration::from_secs(cli.interval_secs.max(1)));

    loop {
        ticker.tick().await;

        if !publisher.is_connected() {
            if let Err(e) = publisher.connect().await {
                tracing::warn!(relay = %cli.relay, error = %e, "Relay unreachable");
                continue;
            }
            tracing::info!(relay = %cli.relay, "Connected to relay");
        }

        let reading = random_reading();
        match publisher.send(&reading).await {
            Ok(()) => tracing::info!(
                temperature = %reading.temperature,
                humidity = %reading.humidity,
                vibration = %reading.vibration,
                "Sent"
            ),
            Err(e) => tracing::warn!(error = %e, "Send failed"),
        }
    }
}
