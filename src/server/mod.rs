//! Transports around the hub
//!
//! - [`ingest`]: TCP listener for the device, one JSON reading per line
//! - [`http`]: axum router for viewers (WebSocket), snapshots and analysis

pub mod config;
pub mod http;
pub mod ingest;

pub use config::ServerConfig;
pub use http::AppState;
pub use ingest::IngestListener;
