//! Device ingest listener
//!
//! Accepts TCP connections from the device and reads one JSON reading per
//! line. Malformed lines are logged and skipped; the connection stays open.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;
use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::codec::{Decoder, FramedRead, LinesCodec, LinesCodecError};

use crate::error::{Error, Result};
use crate::hub::{BroadcastHub, DeviceMessage, Reading};
use crate::server::config::ServerConfig;

/// Decode one framed device line
pub fn decode_line(line: &str) -> serde_json::Result<DeviceMessage> {
    serde_json::from_str(line)
}

/// One framed unit from a device stream
#[derive(Debug)]
pub enum DeviceLine {
    Line(String),
    /// Line dropped by the framer; the stream carries on after it
    Rejected(Error),
}

/// Newline framing that keeps the stream usable after a bad line
///
/// `FramedRead` stops yielding after the first decoder error, so an overlong
/// or non-UTF-8 line is surfaced as [`DeviceLine::Rejected`] instead.
#[derive(Debug)]
pub struct DeviceLineCodec {
    inner: LinesCodec,
    max_length: usize,
}

impl DeviceLineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(max_length),
            max_length,
        }
    }

    fn lift(
        &self,
        decoded: std::result::Result<Option<String>, LinesCodecError>,
    ) -> std::io::Result<Option<DeviceLine>> {
        let reason = match decoded {
            Ok(line) => return Ok(line.map(DeviceLine::Line)),
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                format!("line exceeds {} bytes", self.max_length)
            }
            Err(LinesCodecError::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                format!("line is not UTF-8: {}", e)
            }
            Err(LinesCodecError::Io(e)) => return Err(e),
        };
        Ok(Some(DeviceLine::Rejected(Error::Protocol(reason))))
    }
}

impl Decoder for DeviceLineCodec {
    type Item = DeviceLine;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> std::io::Result<Option<DeviceLine>> {
        let decoded = self.inner.decode(src);
        self.lift(decoded)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> std::io::Result<Option<DeviceLine>> {
        let decoded = self.inner.decode_eof(src);
        self.lift(decoded)
    }
}

/// Per-connection counters, logged when the device disconnects
#[derive(Debug)]
struct DeviceSession {
    id: u64,
    peer_addr: SocketAddr,
    connected_at: Instant,
    readings: u64,
    rejected: u64,
}

impl DeviceSession {
    fn new(id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            connected_at: Instant::now(),
            readings: 0,
            rejected: 0,
        }
    }
}

/// TCP listener feeding device readings into the hub
pub struct IngestListener {
    listener: TcpListener,
    config: ServerConfig,
    hub: Arc<BroadcastHub>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl IngestListener {
    /// Bind to `config.ingest_addr`
    pub async fn bind(config: ServerConfig, hub: Arc<BroadcastHub>) -> Result<Self> {
        let listener = TcpListener::bind(config.ingest_addr).await?;

        let connection_semaphore = if config.max_device_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_device_connections)))
        } else {
            None
        };

        tracing::info!(addr = %listener.local_addr()?, "Device ingest listening");

        Ok(Self {
            listener,
            config,
            hub,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the accept loop forever
    pub async fn run(&self) -> Result<()> {
        self.accept_loop().await
    }

    /// Run the accept loop until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Device ingest shutting down");
                Ok(())
            }
            result = self.accept_loop() => result,
        }
    }

    async fn accept_loop(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept device connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Device rejected: connection limit reached");
                    return;
                }
            }
        } else {
            None
        };

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure device socket");
                return;
            }
        }

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let config = self.config.clone();
        let hub = Arc::clone(&self.hub);

        tokio::spawn(async move {
            let _permit = permit;
            let mut session = DeviceSession::new(session_id, peer_addr);

            tracing::info!(session_id, peer = %peer_addr, "Device connected");

            if let Err(e) = serve_device(&mut session, socket, &config, &hub).await {
                tracing::debug!(session_id, error = %e, "Device connection error");
            }

            tracing::info!(
                session_id = session.id,
                peer = %session.peer_addr,
                readings = session.readings,
                rejected = session.rejected,
                duration_secs = session.connected_at.elapsed().as_secs(),
                "Device disconnected"
            );
        });
    }
}

async fn serve_device(
    session: &mut DeviceSession,
    socket: TcpStream,
    config: &ServerConfig,
    hub: &BroadcastHub,
) -> Result<()> {
    let mut lines = FramedRead::new(socket, DeviceLineCodec::new(config.max_line_length));

    loop {
        let next = match tokio::time::timeout(config.idle_timeout, lines.next()).await {
            Ok(next) => next,
            Err(_) => {
                tracing::debug!(session_id = session.id, "Device idle timeout");
                return Ok(());
            }
        };

        let line = match next {
            None => return Ok(()),
            Some(Ok(DeviceLine::Line(line))) => line,
            Some(Ok(DeviceLine::Rejected(e))) => {
                session.rejected += 1;
                tracing::warn!(session_id = session.id, error = %e, "Device line discarded");
                continue;
            }
            Some(Err(e)) => return Err(e.into()),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match decode_line(line) {
            Ok(message) => {
                hub.ingest(Reading::received_now(message)).await?;
                session.readings += 1;
            }
            Err(e) => {
                session.rejected += 1;
                tracing::warn!(session_id = session.id, error = %e, "Malformed device message");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::hub::{HubConfig, SubscribePolicy};

    fn loopback_config() -> ServerConfig {
        ServerConfig::default().ingest_addr(SocketAddr::from(([127, 0, 0, 1], 0)))
    }

    #[test]
    fn test_decode_line() {
        let msg = decode_line(r#"{"temperature":"25","humidity":"40","vibration":"3"}"#).unwrap();
        assert_eq!(msg, DeviceMessage::new("25", "40", "3"));

        assert!(decode_line("not json").is_err());
        assert!(decode_line(r#"{"temperature":25}"#).is_err());
    }

    #[tokio::test]
    async fn test_malformed_line_skipped() {
        let hub = Arc::new(BroadcastHub::with_config(
            HubConfig::default().subscribe_policy(SubscribePolicy::FutureOnly),
        ));
        let listener = IngestListener::bind(loopback_config(), Arc::clone(&hub))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move { listener.run().await });

        let mut sub = hub.subscribe("test").await.unwrap();

        let mut device = TcpStream::connect(addr).await.unwrap();
        device
            .write_all(
                b"garbage\n\n{\"temperature\":\"25\",\"humidity\":\"40\",\"vibration\":\"3\"}\n",
            )
            .await
            .unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame.reading.temperature, "25");
        assert_eq!(hub.stats().await.readings_ingested, 1);

        server.abort();
    }

    #[test]
    fn test_codec_recovers_after_overlong_line() {
        let mut codec = DeviceLineCodec::new(8);
        let mut buf = BytesMut::from(&b"0123456789abcdef\n{\"a\":1}\n"[..]);

        match codec.decode(&mut buf).unwrap() {
            Some(DeviceLine::Rejected(Error::Protocol(msg))) => assert!(msg.contains("8 bytes")),
            other => panic!("expected rejected line, got {:?}", other),
        }
        match codec.decode(&mut buf).unwrap() {
            Some(DeviceLine::Line(line)) => assert_eq!(line, "{\"a\":1}"),
            other => panic!("expected line, got {:?}", other),
        }
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_codec_rejects_invalid_utf8() {
        let mut codec = DeviceLineCodec::new(64);
        let mut buf = BytesMut::from(&b"\xff\xfe\nok\n"[..]);

        assert!(matches!(
            codec.decode(&mut buf).unwrap(),
            Some(DeviceLine::Rejected(Error::Protocol(_)))
        ));
        assert!(matches!(
            codec.decode(&mut buf).unwrap(),
            Some(DeviceLine::Line(ref line)) if line == "ok"
        ));
    }

    #[tokio::test]
    async fn test_overlong_line_skipped_connection_kept() {
        let hub = Arc::new(BroadcastHub::with_config(
            HubConfig::default().subscribe_policy(SubscribePolicy::FutureOnly),
        ));
        let config = loopback_config().max_line_length(64);
        let listener = IngestListener::bind(config, Arc::clone(&hub)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move { listener.run().await });

        let mut sub = hub.subscribe("test").await.unwrap();

        let mut device = TcpStream::connect(addr).await.unwrap();
        let mut overlong = vec![b'x'; 200];
        overlong.push(b'\n');
        device.write_all(&overlong).await.unwrap();
        device.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        device
            .write_all(b"{\"temperature\":\"25\",\"humidity\":\"40\",\"vibration\":\"3\"}\n")
            .await
            .unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame.reading.temperature, "25");
        assert_eq!(hub.stats().await.readings_ingested, 1);

        server.abort();
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let hub = Arc::new(BroadcastHub::new());
        let config = loopback_config().max_device_connections(1);
        let listener = IngestListener::bind(config, Arc::clone(&hub)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move { listener.run().await });

        let mut first = TcpStream::connect(addr).await.unwrap();
        // Give the listener a moment to hand the first socket a permit
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut second = TcpStream::connect(addr).await.unwrap();
        second
            .write_all(b"{\"temperature\":\"99\",\"humidity\":\"1\",\"vibration\":\"1\"}\n")
            .await
            .ok();
        first
            .write_all(b"{\"temperature\":\"25\",\"humidity\":\"40\",\"vibration\":\"3\"}\n")
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        let current = hub.snapshots().reading().unwrap();
        assert_eq!(current.temperature, "25");
        assert_eq!(hub.stats().await.readings_ingested, 1);

        server.abort();
    }
}
