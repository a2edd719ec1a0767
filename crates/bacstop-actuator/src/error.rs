//! Actuator error types.

use std::path::PathBuf;

/// Errors from driving `git` against a working tree.
#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    /// The working directory does not exist.
    #[error("working directory not found: {0}")]
    MissingWorkdir(PathBuf),

    /// `git` could not be started at all.
    #[error("failed to invoke git {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// `git` ran and exited non-zero.
    #[error("git {command} failed: {stderr}")]
    GitFailed { command: String, stderr: String },

    /// `git` produced output that could not be interpreted.
    #[error("unexpected output from git {command}: {message}")]
    UnexpectedOutput { command: String, message: String },
}

/// Result type alias for actuator operations.
pub type Result<T> = std::result::Result<T, ActuatorError>;
