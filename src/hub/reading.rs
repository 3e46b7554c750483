//! Reading and frame types for the relay
//!
//! This module defines the sensor reading held by the store and the
//! pre-encoded frame that is pushed to subscribers.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single sensor sample as sent by the device
///
/// All three measurements are carried as strings, exactly as the device
/// reports them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceMessage {
    /// Air temperature (°C)
    pub temperature: String,
    /// Relative humidity (%)
    pub humidity: String,
    /// Vibration sensor value, reported as air velocity (m/s)
    pub vibration: String,
    /// Timestamp stamped by the device, if any
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl DeviceMessage {
    /// Create a message without a device timestamp
    pub fn new(
        temperature: impl Into<String>,
        humidity: impl Into<String>,
        vibration: impl Into<String>,
    ) -> Self {
        Self {
            temperature: temperature.into(),
            humidity: humidity.into(),
            vibration: vibration.into(),
            timestamp: None,
        }
    }
}

/// An immutable sensor reading
///
/// `timestamp` is the arrival time at the relay. The device clock is kept
/// separately and never sent to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reading {
    pub temperature: String,
    pub humidity: String,
    pub vibration: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    pub device_timestamp: Option<DateTime<Utc>>,
}

impl Reading {
    /// Create a reading that arrived at `timestamp`
    pub fn new(
        temperature: impl Into<String>,
        humidity: impl Into<String>,
        vibration: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            temperature: temperature.into(),
            humidity: humidity.into(),
            vibration: vibration.into(),
            timestamp,
            device_timestamp: None,
        }
    }

    /// Stamp a decoded device message with its arrival time
    pub fn from_message(message: DeviceMessage, arrived_at: DateTime<Utc>) -> Self {
        Self {
            temperature: message.temperature,
            humidity: message.humidity,
            vibration: message.vibration,
            timestamp: arrived_at,
            device_timestamp: message.timestamp,
        }
    }

    /// Stamp a decoded device message with the current time
    pub fn received_now(message: DeviceMessage) -> Self {
        Self::from_message(message, Utc::now())
    }
}

/// A reading ready to be pushed to subscribers
///
/// Cheap to clone: the reading is behind an `Arc` and the encoded JSON is
/// reference-counted `Bytes`, so every subscriber shares one allocation.
#[derive(Debug, Clone)]
pub struct ReadingFrame {
    /// The reading this frame was encoded from
    pub reading: Arc<Reading>,
    /// JSON payload `{temperature, humidity, vibration, timestamp}`
    pub data: Bytes,
}

impl ReadingFrame {
    /// Encode a reading into a frame
    pub fn encode(reading: Arc<Reading>) -> serde_json::Result<Self> {
        let data = Bytes::from(serde_json::to_vec(reading.as_ref())?);
        Ok(Self { reading, data })
    }

    /// The payload as UTF-8 text
    pub fn as_text(&self) -> &str {
        // serde_json only ever produces UTF-8
        std::str::from_utf8(&self.data).unwrap_or_default()
    }
}
