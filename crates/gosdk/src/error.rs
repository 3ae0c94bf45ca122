//! Error types for Go SDK discovery and launching.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Main error type for this crate.
#[derive(Debug, Error)]
pub enum SdkError {
    /// A version string is not of the form `go1.N[.P][preN]`.
    #[error("Invalid Go version: {0:?}")]
    InvalidVersion(String),

    /// A command could not be started.
    #[error("Failed to run {command}: {source}")]
    Spawn {
        /// Program and arguments
        command: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// A command ran but exited unsuccessfully.
    #[error("{command} exited with {status}: {stderr}")]
    CommandFailed {
        /// Program and arguments
        command: String,
        /// Exit status
        status: ExitStatus,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// A `go.work` file could not be read.
    #[error("Failed to read {path}: {source}")]
    ReadGoWork {
        /// Path reported by `go env GOWORK`
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The Ctrl-C handler could not be installed.
    #[error("Signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    /// Environment table rejected an edit.
    #[error("Environment: {0}")]
    Env(#[from] cmdutil::EnvError),

    /// Other I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
