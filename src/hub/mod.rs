//! Real-time relay hub
//!
//! The hub keeps the latest sensor reading and fans every new reading out to
//! the connected subscribers. Delivery is best-effort: a subscriber whose
//! send fails is dropped from the registry and never retried.
//!
//! # Architecture
//!
//! ```text
//!                           Arc<BroadcastHub>
//!                     ┌───────────────────────────┐
//!                     │ store: ReadingStore       │◄──── SnapshotAccessor
//!                     │   (ArcSwapOption<Reading>)│      current() / age
//!                     │ subscribers:              │
//!                     │   SubscriberRegistry {    │
//!                     │     id -> mpsc::Sender    │
//!                     │   }                       │
//!                     └─────────────┬─────────────┘
//!                                   │
//!   [Device] ── ingest() ──► replace ──► snapshot ──► deliver (concurrent)
//!                                                   │          │
//!                                                   ▼          ▼
//!                                            [Subscriber] [Subscriber]
//!                                             recv()       send failed
//!                                                          -> removed
//! ```
//!
//! # Shared frames
//!
//! Each reading is encoded to JSON once. `ReadingFrame` holds the encoding
//! in `bytes::Bytes`, so cloning it per subscriber only bumps a refcount.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod reading;
pub mod snapshot;
pub mod store;
pub mod subscriber;

pub use broadcast::{BroadcastHub, HubState, IngestReport};
pub use config::{HubConfig, SubscribePolicy};
pub use error::{DeliveryError, HubError};
pub use reading::{DeviceMessage, Reading, ReadingFrame};
pub use snapshot::{Snapshot, SnapshotAccessor};
pub use store::ReadingStore;
pub use subscriber::{Subscriber, SubscriberId, SubscriberRegistry, Subscription};
