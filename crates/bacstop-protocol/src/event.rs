//! Decoded test events.

use std::fmt;

use serde::Serialize;

use crate::bac::Bac;

/// One decoded notification from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TestEvent {
    /// Sensor warm-up, seconds remaining.
    Countdown(u8),
    StartBlow,
    /// Sample collection, seconds remaining.
    KeepBlowing(u8),
    Analyzing,
    Finalizing,
    WrappingUp,
    /// The device gave up (user walked away or the device timed out).
    Cancelled,
    /// Not enough breath.
    BlowError,
    Result(Bac),
}

impl fmt::Display for TestEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestEvent::Countdown(s) => write!(f, "Warming up... {s}s"),
            TestEvent::StartBlow => write!(f, "BEGIN BLOWING NOW!"),
            TestEvent::KeepBlowing(s) => write!(f, "Keep blowing... {s}s"),
            TestEvent::Analyzing => write!(f, "Analyzing sample..."),
            TestEvent::Finalizing => write!(f, "Finalizing results..."),
            TestEvent::WrappingUp => write!(f, "Test wrapping up..."),
            TestEvent::Cancelled => write!(f, "Test cancelled or timed out"),
            TestEvent::BlowError => write!(f, "Blow error - insufficient breath detected"),
            TestEvent::Result(bac) => write!(f, "BAC result: {bac}"),
        }
    }
}
