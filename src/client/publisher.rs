//! Device-side reading publisher
//!
//! Connects to the relay's ingest port and sends one JSON reading per line.

use std::net::SocketAddr;

use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Events from the publisher
#[derive(Debug)]
pub enum PublishEvent {
    /// Connected to the relay
    Connected,

    /// A reading was written to the socket
    Sent,

    /// Error occurred
    Error(String),

    /// Disconnected
    Disconnected,
}

/// Wire form of an outgoing reading
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingReading {
    pub temperature: String,
    pub humidity: String,
    pub vibration: String,
    pub timestamp: chrono::DateTime<Utc>,
}

impl OutgoingReading {
    /// Build a reading stamped with the device's current time
    pub fn now(
        temperature: impl Into<String>,
        humidity: impl Into<String>,
        vibration: impl Into<String>,
    ) -> Self {
        Self {
            temperature: temperature.into(),
            humidity: humidity.into(),
            vibration: vibration.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Publishes readings to a relay over TCP
///
/// # Example
/// ```no_run
/// use sensor_relay::client::{DevicePublisher, OutgoingReading};
///
/// # async fn example() -> sensor_relay::error::Result<()> {
/// let addr = "127.0.0.1:9750".parse().unwrap();
/// let (mut publisher, _events) = DevicePublisher::new(addr);
///
/// publisher.connect().await?;
/// publisher.send(&OutgoingReading::now("25", "40", "3")).await?;
/// # Ok(())
/// # }
/// ```
pub struct DevicePublisher {
    addr: SocketAddr,
    event_tx: mpsc::Sender<PublishEvent>,
    stream: Option<TcpStream>,
}

impl DevicePublisher {
    /// Create a new publisher.
    ///
    /// Returns the publisher and a receiver for events.
    pub fn new(addr: SocketAddr) -> (Self, mpsc::Receiver<PublishEvent>) {
        let (tx, rx) = mpsc::channel(256);

        let publisher = Self {
            addr,
            event_tx: tx,
            stream: None,
        };

        (publisher, rx)
    }

    /// Connect to the relay's ingest port
    pub async fn connect(&mut self) -> Result<()> {
        let stream = TcpStream::connect(self.addr).await?;
        stream.set_nodelay(true)?;
        self.stream = Some(stream);

        let _ = self.event_tx.try_send(PublishEvent::Connected);
        Ok(())
    }

    /// Send one reading
    ///
    /// On a write error the connection is dropped; call `connect` again.
    pub async fn send(&mut self, reading: &OutgoingReading) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let mut line = serde_json::to_vec(reading)?;
        line.push(b'\n');

        if let Err(e) = stream.write_all(&line).await {
            self.stream = None;
            let _ = self.event_tx.try_send(PublishEvent::Error(e.to_string()));
            return Err(e.into());
        }

        let _ = self.event_tx.try_send(PublishEvent::Sent);
        Ok(())
    }

    /// Disconnect from the relay
    pub async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        let _ = self.event_tx.try_send(PublishEvent::Disconnected);
    }

    /// Check if currently connected
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}
