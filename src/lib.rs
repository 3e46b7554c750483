//! sensor-relay: real-time relay for drying-rig sensor readings
//!
//! A single device pushes temperature, humidity and vibration readings; the
//! relay keeps the latest one and fans every update out to any number of
//! viewers. The latest reading is also available to an on-demand analysis
//! routine through a read-only snapshot.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sensor_relay::hub::{BroadcastHub, DeviceMessage, Reading};
//!
//! # async fn example() -> Result<(), sensor_relay::hub::HubError> {
//! let hub = Arc::new(BroadcastHub::new());
//! let mut viewer = hub.subscribe("dashboard").await?;
//!
//! hub.ingest(Reading::received_now(DeviceMessage::new("25", "40", "3")))
//!     .await?;
//!
//! if let Some(frame) = viewer.recv().await {
//!     println!("{}", frame.as_text());
//! }
//!
//! let snapshot = hub.snapshots().current();
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod client;
pub mod error;
pub mod hub;
pub mod server;
pub mod stats;

pub use error::{Error, Result};
pub use hub::{BroadcastHub, HubConfig, Reading, SnapshotAccessor};
pub use server::{IngestListener, ServerConfig};
