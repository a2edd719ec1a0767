//! Session error types.

use std::time::Duration;

use uuid::Uuid;

/// Errors raised by a [`Transport`](crate::transport::Transport).
///
/// The session never hands these to its caller; they are folded into
/// `Outcome::Failed { reason: ConnectionLost }`.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No Bluetooth adapter on this host.
    #[error("no Bluetooth adapter available")]
    NoAdapter,

    /// Scan finished without a matching device.
    #[error("no BACtrack device found")]
    DeviceNotFound,

    /// The device does not expose the test characteristic.
    #[error("characteristic {0} not found on device")]
    CharacteristicNotFound(Uuid),

    /// Operation needs an established link.
    #[error("not connected to device")]
    NotConnected,

    /// Connect did not finish in time.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// btleplug error.
    #[cfg(feature = "ble")]
    #[error("bluetooth error: {0}")]
    Ble(#[from] btleplug::Error),
}

/// Misuse of a [`DeviceSession`](crate::session::DeviceSession).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `start` was called while an earlier attempt is still running.
    #[error("a breath test is already in progress on this session")]
    AttemptInProgress,
}

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
