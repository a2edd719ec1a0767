//! `bacstop info`: build features and the connected device.

use anyhow::{Context, Result};
use tokio::time::timeout;

use bacstop_session::{
    Transport, TransportError, BLE_AVAILABLE, CHARACTERISTIC_UUID, SERVICE_UUID,
};

use super::device::DeviceOptions;
use super::EXIT_OK;

pub async fn run(device: &DeviceOptions) -> Result<i32> {
    println!("BACstop version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "  Bluetooth: {}",
        if BLE_AVAILABLE {
            "available"
        } else {
            "not compiled (rebuild with --features ble)"
        }
    );
    println!();

    let mut transport = device.open()?;
    println!("Scanning...");
    let budget = device.params().connect_timeout;
    timeout(budget, transport.connect())
        .await
        .map_err(|_| TransportError::TimedOut(budget))
        .and_then(|connected| connected)
        .context("connecting to device")?;

    println!();
    println!("Device found!");
    println!("  Address:        {}", transport.peer().unwrap_or_else(|| "unknown".into()));
    println!("  Service:        {SERVICE_UUID}");
    println!("  Characteristic: {CHARACTERISTIC_UUID}");

    transport
        .disconnect()
        .await
        .context("disconnecting from device")?;
    Ok(EXIT_OK)
}
