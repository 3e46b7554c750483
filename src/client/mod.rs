//! Device client
//!
//! Publishes readings to a relay's ingest port. Used by the simulator and
//! by anything standing in for the real device.

pub mod publisher;

pub use publisher::{DevicePublisher, OutgoingReading, PublishEvent};
