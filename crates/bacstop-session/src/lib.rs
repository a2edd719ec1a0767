//! Device session for BACtrack breath tests.
//!
//! Owns the link to the device, runs the connect → subscribe → start →
//! notify exchange, and turns it into a progress stream plus one terminal
//! [`Outcome`](bacstop_protocol::Outcome).
//!
//! ## Modules
//!
//! - [`transport`]: the `Transport` seam and protocol constants
//! - [`session`]: `DeviceSession`, `Attempt`, `run_attempt`
//! - [`scripted`]: replayable in-memory transport
//! - `ble`: btleplug transport (feature `ble`)

#[cfg(feature = "ble")]
pub mod ble;
pub mod error;
pub mod scripted;
pub mod session;
pub mod transport;

/// Whether this build can talk to real Bluetooth hardware.
pub const BLE_AVAILABLE: bool = cfg!(feature = "ble");

#[cfg(feature = "ble")]
pub use ble::BleTransport;
pub use error::{SessionError, TransportError};
pub use scripted::{Call, CallLog, ScriptedTransport};
pub use session::{
    run_attempt, Attempt, DeviceSession, ProgressStream, SessionParams, DEFAULT_INACTIVITY_WINDOW,
};
pub use transport::{
    Notifications, Transport, CHARACTERISTIC_UUID, DEVICE_NAME_HINT, SERVICE_UUID,
    START_TEST_COMMAND,
};
