//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Default TCP port for device connections
pub const DEFAULT_INGEST_PORT: u16 = 9750;

/// Default HTTP port for viewers and the analysis endpoint
pub const DEFAULT_HTTP_PORT: u16 = 8000;

/// Transport configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the device ingest listener binds to
    pub ingest_addr: SocketAddr,

    /// Address the HTTP/WebSocket server binds to
    pub http_addr: SocketAddr,

    /// Maximum concurrent device connections (0 = unlimited)
    pub max_device_connections: usize,

    /// Longest accepted device line, in bytes
    pub max_line_length: usize,

    /// Disconnect a device that sends nothing for this long
    pub idle_timeout: Duration,

    /// Enable TCP_NODELAY on device sockets
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ingest_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_INGEST_PORT)),
            http_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_HTTP_PORT)),
            max_device_connections: 0, // Unlimited
            max_line_length: 4096,
            idle_timeout: Duration::from_secs(60),
            tcp_nodelay: true,
        }
    }
}

impl ServerConfig {
    /// Set the device ingest address
    pub fn ingest_addr(mut self, addr: SocketAddr) -> Self {
        self.ingest_addr = addr;
        self
    }

    /// Set the HTTP address
    pub fn http_addr(mut self, addr: SocketAddr) -> Self {
        self.http_addr = addr;
        self
    }

    /// Set maximum device connections
    pub fn max_device_connections(mut self, max: usize) -> Self {
        self.max_device_connections = max;
        self
    }

    /// Set the maximum line length (minimum 64 bytes)
    pub fn max_line_length(mut self, len: usize) -> Self {
        self.max_line_length = len.max(64);
        self
    }

    /// Set idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.ingest_addr.port(), DEFAULT_INGEST_PORT);
        assert_eq!(config.http_addr.port(), DEFAULT_HTTP_PORT);
        assert_eq!(config.max_device_connections, 0);
        assert_eq!(config.max_line_length, 4096);
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_builder_line_length_floor() {
        let config = ServerConfig::default().max_line_length(1);

        assert_eq!(config.max_line_length, 64);
    }

    #[test]
    fn test_builder_chaining() {
        let ingest: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let http: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        let config = ServerConfig::default()
            .ingest_addr(ingest)
            .http_addr(http)
            .max_device_connections(2)
            .max_line_length(1024)
            .idle_timeout(Duration::from_secs(5));

        assert_eq!(config.ingest_addr, ingest);
        assert_eq!(config.http_addr, http);
        assert_eq!(config.max_device_connections, 2);
        assert_eq!(config.max_line_length, 1024);
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
    }
}
