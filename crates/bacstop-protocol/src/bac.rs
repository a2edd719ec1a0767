//! Breath alcohol content values.
//!
//! The device reports BAC as an unsigned count of ten-thousandths of a
//! percent. `Bac` keeps that integer representation so threshold comparisons
//! are exact, and only converts to `f64` for display.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scale between the raw device unit and one percent.
pub const BAC_SCALE: u32 = 10_000;

/// A breath alcohol content percentage with 4-decimal resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Bac {
    ten_thousandths: u32,
}

/// A percentage that cannot be represented as a `Bac`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacError {
    #[error("BAC percentage must be finite, got {0}")]
    NotFinite(f64),

    #[error("BAC percentage must be non-negative, got {0}")]
    Negative(f64),

    #[error("BAC percentage {0} is out of range")]
    OutOfRange(f64),
}

impl Bac {
    /// Zero BAC.
    pub const ZERO: Bac = Bac { ten_thousandths: 0 };

    /// Build from the raw 16-bit value carried in a result frame.
    pub const fn from_raw(raw: u16) -> Self {
        Self {
            ten_thousandths: raw as u32,
        }
    }

    /// Build from a count of ten-thousandths of a percent.
    pub const fn from_ten_thousandths(ten_thousandths: u32) -> Self {
        Self { ten_thousandths }
    }

    /// Build from a decimal percentage, rounding to the nearest ten-thousandth.
    pub fn from_percent(percent: f64) -> Result<Self, BacError> {
        if !percent.is_finite() {
            return Err(BacError::NotFinite(percent));
        }
        if percent < 0.0 {
            return Err(BacError::Negative(percent));
        }
        let scaled = (percent * f64::from(BAC_SCALE)).round();
        if scaled > f64::from(u32::MAX) {
            return Err(BacError::OutOfRange(percent));
        }
        Ok(Self {
            ten_thousandths: scaled as u32,
        })
    }

    pub fn ten_thousandths(&self) -> u32 {
        self.ten_thousandths
    }

    /// The value as a percentage.
    pub fn percent(&self) -> f64 {
        f64::from(self.ten_thousandths) / f64::from(BAC_SCALE)
    }
}

impl TryFrom<f64> for Bac {
    type Error = BacError;

    fn try_from(percent: f64) -> Result<Self, Self::Error> {
        Bac::from_percent(percent)
    }
}

impl From<Bac> for f64 {
    fn from(bac: Bac) -> f64 {
        bac.percent()
    }
}

impl fmt::Display for Bac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:04}%",
            self.ten_thousandths / BAC_SCALE,
            self.ten_thousandths % BAC_SCALE
        )
    }
}
