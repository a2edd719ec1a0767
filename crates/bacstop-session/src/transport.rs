//! Transport seam between the session and the radio.
//!
//! A transport exposes the single write + notify characteristic a BACtrack
//! device uses for breath tests. Implementations: `ble::BleTransport` over
//! btleplug (feature `ble`) and [`ScriptedTransport`] for development and
//! tests.
//!
//! [`ScriptedTransport`]: crate::scripted::ScriptedTransport

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use uuid::Uuid;

use crate::error::Result;

/// GATT service carrying the test characteristic.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x862bfff0_7d59_4359_8b59_a96db28bc679);

/// Write + notify characteristic used for the test exchange.
pub const CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x862bfff1_7d59_4359_8b59_a96db28bc679);

/// Payload that starts a breath test.
pub const START_TEST_COMMAND: [u8; 2] = [0x00, 0x01];

/// Lower-cased substring of the advertised name of supported devices.
pub const DEVICE_NAME_HINT: &str = "bactrack";

/// Raw notification payloads in arrival order. Ends when the link drops.
pub type Notifications = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// A link to one device.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Find the device and establish the link.
    async fn connect(&mut self) -> Result<()>;

    /// Enable notifications on the test characteristic.
    async fn subscribe(&mut self) -> Result<Notifications>;

    /// Write a command to the test characteristic, with response.
    async fn write_command(&mut self, payload: &[u8]) -> Result<()>;

    /// Tear the link down. Must be safe to call when not connected.
    async fn disconnect(&mut self) -> Result<()>;

    /// Address of the connected peer, if any.
    fn peer(&self) -> Option<String>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn connect(&mut self) -> Result<()> {
        (**self).connect().await
    }

    async fn subscribe(&mut self) -> Result<Notifications> {
        (**self).subscribe().await
    }

    async fn write_command(&mut self, payload: &[u8]) -> Result<()> {
        (**self).write_command(payload).await
    }

    async fn disconnect(&mut self) -> Result<()> {
        (**self).disconnect().await
    }

    fn peer(&self) -> Option<String> {
        (**self).peer()
    }
}
