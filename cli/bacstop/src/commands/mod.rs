//! CLI command implementations.

pub mod check;
pub mod device;
pub mod hook;
pub mod info;
pub mod install;
pub mod uninstall;

/// Success, or the gated operation may proceed.
pub const EXIT_OK: i32 = 0;
/// The gated operation is rejected.
pub const EXIT_BLOCKED: i32 = 1;
/// Something went wrong, including a destroy that could not complete.
pub const EXIT_ERROR: i32 = 2;
