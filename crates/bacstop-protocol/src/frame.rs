//! Notification frame decoding.
//!
//! Every notification on the test characteristic is one of two fixed shapes:
//!
//! ```text
//! Status frame (6 bytes):
//! ┌───────────┬───────────┬──────┬──────┬──────┬──────┐
//! │ prefix_hi │ prefix_lo │ data │ 0x00 │ 0x15 │ 0xE7 │
//! └───────────┴───────────┴──────┴──────┴──────┴──────┘
//!
//! Result frame (17 bytes):
//! ┌──────┬─────┬────────────────┬─────────────────────┐
//! │ 0x81 │  ?  │ raw (u16, LE)  │ 13 undocumented     │
//! └──────┴─────┴────────────────┴─────────────────────┘
//! ```
//!
//! Decoding is pure: the same bytes always produce the same result.

use thiserror::Error;
use tracing::debug;

use crate::bac::Bac;
use crate::event::TestEvent;

/// Length of a status frame.
pub const STATUS_FRAME_LEN: usize = 6;

/// Length of a result frame.
pub const RESULT_FRAME_LEN: usize = 17;

/// Fixed trailer of every status frame.
pub const STATUS_FOOTER: [u8; 3] = [0x00, 0x15, 0xE7];

/// First byte of a result frame.
pub const RESULT_MARKER: u8 = 0x81;

/// Errors produced while decoding a notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("frame length {len} is neither 6 nor 17 bytes")]
    BadLength { len: usize },

    #[error("unknown frame prefix {prefix:#06x}")]
    UnknownPrefix { prefix: u16 },

    #[error("bad status footer {found:02x?}")]
    BadFooter { found: [u8; 3] },
}

/// Kind of a status frame, selected by its 16-bit prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Countdown,
    StartBlow,
    KeepBlowing,
    Analyzing,
    Finalizing,
    WrappingUp,
    Cancelled,
    BlowError,
}

/// Prefix table for status frames. New status codes go here.
pub const STATUS_PREFIXES: &[(u16, StatusKind)] = &[
    (0x8001, StatusKind::Countdown),
    (0x8002, StatusKind::StartBlow),
    (0x8003, StatusKind::KeepBlowing),
    (0x8004, StatusKind::Analyzing),
    (0x8005, StatusKind::Finalizing),
    (0x8006, StatusKind::WrappingUp),
    (0x8007, StatusKind::Cancelled),
    (0x8008, StatusKind::BlowError),
];

impl StatusKind {
    /// Look up a status kind by frame prefix.
    pub fn from_prefix(prefix: u16) -> Option<Self> {
        STATUS_PREFIXES
            .iter()
            .find(|(p, _)| *p == prefix)
            .map(|(_, kind)| *kind)
    }

    /// The prefix a frame of this kind carries.
    pub fn prefix(&self) -> u16 {
        STATUS_PREFIXES
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(p, _)| *p)
            .unwrap_or_default()
    }

    fn into_event(self, data: u8) -> TestEvent {
        match self {
            StatusKind::Countdown => TestEvent::Countdown(data),
            StatusKind::StartBlow => TestEvent::StartBlow,
            StatusKind::KeepBlowing => TestEvent::KeepBlowing(data),
            StatusKind::Analyzing => TestEvent::Analyzing,
            StatusKind::Finalizing => TestEvent::Finalizing,
            StatusKind::WrappingUp => TestEvent::WrappingUp,
            StatusKind::Cancelled => TestEvent::Cancelled,
            StatusKind::BlowError => TestEvent::BlowError,
        }
    }
}

/// A raw notification of one of the two known shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Status([u8; STATUS_FRAME_LEN]),
    Result([u8; RESULT_FRAME_LEN]),
}

impl Frame {
    /// Classify raw bytes by length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if let Ok(status) = <[u8; STATUS_FRAME_LEN]>::try_from(bytes) {
            return Ok(Frame::Status(status));
        }
        if let Ok(result) = <[u8; RESULT_FRAME_LEN]>::try_from(bytes) {
            return Ok(Frame::Result(result));
        }
        Err(DecodeError::BadLength { len: bytes.len() })
    }

    /// Build a status frame for the given kind and data byte.
    pub fn status(kind: StatusKind, data: u8) -> Self {
        let [hi, lo] = kind.prefix().to_be_bytes();
        let [f0, f1, f2] = STATUS_FOOTER;
        Frame::Status([hi, lo, data, f0, f1, f2])
    }

    /// Build a result frame carrying the given raw BAC value.
    pub fn result(raw: u16) -> Self {
        let mut bytes = [0u8; RESULT_FRAME_LEN];
        bytes[0] = RESULT_MARKER;
        bytes[2..4].copy_from_slice(&raw.to_le_bytes());
        Frame::Result(bytes)
    }

    /// Encode an event the way the device would send it.
    ///
    /// Results above the 16-bit wire range saturate.
    pub fn encode(event: TestEvent) -> Self {
        match event {
            TestEvent::Countdown(s) => Frame::status(StatusKind::Countdown, s),
            TestEvent::StartBlow => Frame::status(StatusKind::StartBlow, 0),
            TestEvent::KeepBlowing(s) => Frame::status(StatusKind::KeepBlowing, s),
            TestEvent::Analyzing => Frame::status(StatusKind::Analyzing, 0),
            TestEvent::Finalizing => Frame::status(StatusKind::Finalizing, 0),
            TestEvent::WrappingUp => Frame::status(StatusKind::WrappingUp, 0),
            TestEvent::Cancelled => Frame::status(StatusKind::Cancelled, 0),
            TestEvent::BlowError => Frame::status(StatusKind::BlowError, 0),
            TestEvent::Result(bac) => {
                Frame::result(u16::try_from(bac.ten_thousandths()).unwrap_or(u16::MAX))
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Frame::Status(bytes) => &bytes[..],
            Frame::Result(bytes) => &bytes[..],
        }
    }

    /// Interpret the frame as a test event.
    pub fn decode(&self) -> Result<TestEvent, DecodeError> {
        match self {
            Frame::Status(bytes) => {
                let footer = [bytes[3], bytes[4], bytes[5]];
                if footer != STATUS_FOOTER {
                    return Err(DecodeError::BadFooter { found: footer });
                }
                let prefix = u16::from_be_bytes([bytes[0], bytes[1]]);
                let kind = StatusKind::from_prefix(prefix)
                    .ok_or(DecodeError::UnknownPrefix { prefix })?;
                Ok(kind.into_event(bytes[2]))
            }
            Frame::Result(bytes) => {
                if bytes[0] != RESULT_MARKER {
                    return Err(DecodeError::UnknownPrefix {
                        prefix: u16::from(bytes[0]),
                    });
                }
                let raw = u16::from_le_bytes([bytes[2], bytes[3]]);
                Ok(TestEvent::Result(Bac::from_raw(raw)))
            }
        }
    }
}

/// Decode one notification payload.
pub fn decode(bytes: &[u8]) -> Result<TestEvent, DecodeError> {
    let decoded = Frame::from_bytes(bytes).and_then(|frame| frame.decode());
    debug!(frame = ?bytes, result = ?decoded, "decoded notification");
    decoded
}
