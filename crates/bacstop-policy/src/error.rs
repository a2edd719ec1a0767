//! Policy error types.

use std::path::PathBuf;

use bacstop_protocol::BacError;

/// Errors raised while building a [`PolicyConfig`](crate::config::PolicyConfig).
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// Spice level outside verde / hot / diablo.
    #[error("unknown spice level '{value}' (expected verde, hot, or diablo)")]
    UnknownSpice { value: String },

    /// Hook type outside pre-commit / pre-push.
    #[error("unknown hook type '{value}' (expected pre-commit or pre-push)")]
    UnknownHook { value: String },

    /// Threshold that is not a usable percentage.
    #[error("invalid threshold '{value}': {reason}")]
    InvalidThreshold { value: String, reason: String },

    /// Threshold rejected by the BAC range check.
    #[error("invalid threshold: {0}")]
    Threshold(#[from] BacError),

    /// Malformed `.bacstop` file.
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// TOML serialization error.
    #[error("cannot render config: {0}")]
    Render(#[from] toml::ser::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;
