//! Spice-level policy for BACstop.
//!
//! Turns a breath-test [`Outcome`](bacstop_protocol::Outcome) plus the
//! repository's [`PolicyConfig`] into a [`Decision`] for the git hook.
//!
//! | Spice  | BAC >= threshold | BAC < threshold | test failed |
//! |--------|------------------|-----------------|-------------|
//! | verde  | allow            | allow           | block       |
//! | hot    | allow            | block           | block       |
//! | diablo | allow            | destroy         | block       |

pub mod config;
pub mod engine;
pub mod error;

pub use config::{
    parse_threshold, HookKind, PolicyConfig, Spice, CONFIG_FILE_NAME, ENV_HOOK, ENV_SPICE,
    ENV_THRESHOLD,
};
pub use engine::{decide, Decision};
pub use error::{PolicyError, Result};
