//! Opening a device and running one breath test against it.

use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;

use bacstop_protocol::{Bac, Outcome, TestEvent};
use bacstop_session::{DeviceSession, ScriptedTransport, SessionParams, Transport};

/// Delay between notifications of a simulated test.
pub const SIMULATED_PACE: Duration = Duration::from_millis(500);

/// Where a breath test comes from.
#[derive(Debug, Clone)]
pub struct DeviceOptions {
    pub address: Option<String>,
    pub inactivity: Duration,
    /// Replay a scripted test ending at this BAC instead of using Bluetooth.
    pub simulate: Option<Bac>,
    pub pace: Duration,
}

impl DeviceOptions {
    pub fn params(&self) -> SessionParams {
        SessionParams {
            device_address: self.address.clone(),
            inactivity_window: self.inactivity,
            ..SessionParams::default()
        }
    }

    /// The transport these options select.
    pub fn open(&self) -> Result<Box<dyn Transport>> {
        if let Some(bac) = self.simulate {
            return Ok(Box::new(ScriptedTransport::simulated(bac, self.pace)));
        }
        bluetooth(&self.params())
    }

    /// Run one breath test, handing each progress event to `on_event`.
    pub async fn breath_test(&self, mut on_event: impl FnMut(&TestEvent)) -> Result<Outcome> {
        let session = DeviceSession::new(self.open()?, self.params());
        let mut attempt = session.start()?;
        if let Some(mut progress) = attempt.progress() {
            while let Some(event) = progress.next().await {
                on_event(&event);
            }
        }
        Ok(attempt.outcome().await)
    }
}

#[cfg(feature = "ble")]
fn bluetooth(params: &SessionParams) -> Result<Box<dyn Transport>> {
    Ok(Box::new(bacstop_session::BleTransport::new(params)))
}

#[cfg(not(feature = "ble"))]
fn bluetooth(_params: &SessionParams) -> Result<Box<dyn Transport>> {
    anyhow::bail!(
        "Bluetooth support not compiled (rebuild with --features ble, or use --simulate <BAC>)"
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn simulated(raw: u16) -> DeviceOptions {
        DeviceOptions {
            address: None,
            inactivity: Duration::from_secs(30),
            simulate: Some(Bac::from_raw(raw)),
            pace: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn simulated_test_reports_progress_and_result() {
        let mut seen = Vec::new();
        let outcome = simulated(208)
            .breath_test(|e| seen.push(*e))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Completed { bac: Bac::from_raw(208) });
        assert_eq!(seen.len(), 14);
        assert_eq!(seen[0], TestEvent::Countdown(5));
        assert_eq!(seen[5], TestEvent::StartBlow);
    }

    #[test]
    fn params_carry_address_and_window() {
        let options = DeviceOptions {
            address: Some("AA:BB:CC:DD:EE:FF".into()),
            inactivity: Duration::from_secs(7),
            simulate: None,
            pace: SIMULATED_PACE,
        };
        let params = options.params();
        assert_eq!(params.device_address.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
        assert_eq!(params.inactivity_window, Duration::from_secs(7));
    }

    #[cfg(not(feature = "ble"))]
    #[test]
    fn bluetooth_needs_the_feature() {
        let options = DeviceOptions {
            simulate: None,
            ..simulated(0)
        };
        let err = options.open().err().unwrap();
        assert!(err.to_string().contains("--features ble"));
    }
}
