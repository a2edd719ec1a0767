//! Bluetooth LE transport over btleplug.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central as _, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Manager, Peripheral};
use futures::StreamExt;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::session::SessionParams;
use crate::transport::{Notifications, Transport, CHARACTERISTIC_UUID, DEVICE_NAME_HINT};

/// A BACtrack device reached through the first Bluetooth adapter.
pub struct BleTransport {
    address: Option<String>,
    scan_window: Duration,
    peripheral: Option<Peripheral>,
    characteristic: Option<Characteristic>,
}

impl BleTransport {
    pub fn new(params: &SessionParams) -> Self {
        Self {
            address: params.device_address.clone(),
            scan_window: params.scan_window,
            peripheral: None,
            characteristic: None,
        }
    }

    async fn find_peripheral(&self) -> Result<Peripheral> {
        let manager = Manager::new().await?;
        let central = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(TransportError::NoAdapter)?;

        info!(window = ?self.scan_window, "scanning for BACtrack device");
        central.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(self.scan_window).await;
        let peripherals = central.peripherals().await?;
        if let Err(err) = central.stop_scan().await {
            debug!(error = %err, "stop_scan failed");
        }

        for peripheral in peripherals {
            let address = peripheral.address().to_string();
            if let Some(wanted) = &self.address {
                if address.eq_ignore_ascii_case(wanted) {
                    return Ok(peripheral);
                }
                continue;
            }
            let name = peripheral
                .properties()
                .await?
                .and_then(|props| props.local_name);
            if let Some(name) = name {
                debug!(%address, %name, "found peripheral");
                if name.to_lowercase().contains(DEVICE_NAME_HINT) {
                    return Ok(peripheral);
                }
            }
        }
        Err(TransportError::DeviceNotFound)
    }

    fn link(&self) -> Result<(&Peripheral, &Characteristic)> {
        match (&self.peripheral, &self.characteristic) {
            (Some(p), Some(c)) => Ok((p, c)),
            _ => Err(TransportError::NotConnected),
        }
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn connect(&mut self) -> Result<()> {
        let peripheral = self.find_peripheral().await?;
        peripheral.connect().await?;
        peripheral.discover_services().await?;

        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == CHARACTERISTIC_UUID)
            .ok_or(TransportError::CharacteristicNotFound(CHARACTERISTIC_UUID))?;

        self.peripheral = Some(peripheral);
        self.characteristic = Some(characteristic);
        Ok(())
    }

    async fn subscribe(&mut self) -> Result<Notifications> {
        let (peripheral, characteristic) = self.link()?;
        // The stream must exist before notifications are enabled.
        let raw = peripheral.notifications().await?;
        peripheral.subscribe(characteristic).await?;
        let filtered: Notifications = Box::pin(raw.filter_map(|n| async move {
            (n.uuid == CHARACTERISTIC_UUID).then_some(n.value)
        }));
        Ok(filtered)
    }

    async fn write_command(&mut self, payload: &[u8]) -> Result<()> {
        let (peripheral, characteristic) = self.link()?;
        peripheral
            .write(characteristic, payload, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let Some(peripheral) = self.peripheral.take() else {
            return Ok(());
        };
        if let Some(characteristic) = self.characteristic.take() {
            if let Err(err) = peripheral.unsubscribe(&characteristic).await {
                debug!(error = %err, "unsubscribe failed");
            }
        }
        if peripheral.is_connected().await? {
            peripheral.disconnect().await?;
        }
        info!("disconnected from device");
        Ok(())
    }

    fn peer(&self) -> Option<String> {
        self.peripheral.as_ref().map(|p| p.address().to_string())
    }
}
