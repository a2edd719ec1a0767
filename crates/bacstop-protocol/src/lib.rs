//! BACtrack breathalyzer protocol.
//!
//! Decodes the fixed-shape notification frames a BACtrack device emits during
//! a breath test and sequences them into a single terminal [`Outcome`].
//!
//! ## Modules
//!
//! - [`bac`]: exact 4-decimal BAC percentages
//! - [`frame`]: frame shapes, prefix table, and the decoder
//! - [`event`]: decoded test events
//! - [`machine`]: the breath-test state machine

pub mod bac;
pub mod event;
pub mod frame;
pub mod machine;

pub use bac::{Bac, BacError};
pub use event::TestEvent;
pub use frame::{decode, DecodeError, Frame, StatusKind};
pub use machine::{FailureReason, Input, Outcome, Phase, Step, TestStateMachine};
