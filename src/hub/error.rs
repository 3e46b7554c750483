//! Hub error types

use thiserror::Error;

use super::subscriber::SubscriberId;

/// Error type for hub operations
#[derive(Debug, Error)]
pub enum HubError {
    /// A subscriber with this id is already registered
    #[error("subscriber already registered: {0}")]
    DuplicateSubscriber(SubscriberId),

    /// The reading could not be encoded for subscribers
    #[error("failed to encode reading: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Why a single delivery failed
///
/// Delivery failures are handled inside the hub by pruning the subscriber;
/// this type only surfaces in logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The subscriber's receiving half was dropped
    #[error("subscriber channel closed")]
    Closed,

    /// The subscriber's buffer stayed full for the whole send timeout
    #[error("send timed out")]
    TimedOut,
}
