//! Unified error type for the Keystone workspace.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum KeystoneError {
    /// The build target has no entry in the layer table.
    #[error("unknown build target: {target}")]
    UnknownTarget {
        /// Target name as requested by the caller.
        target: String,
    },

    /// A mount command exited unsuccessfully.
    #[error(
        "mount command `{}` failed with {}",
        .command.join(" "),
        describe_exit(.exit_code.as_ref())
    )]
    Mount {
        /// Full argument vector of the failed command.
        command: Vec<String>,
        /// Exit code, or `None` when the process was killed by a signal.
        exit_code: Option<i32>,
    },

    /// An unmount command exited unsuccessfully.
    #[error(
        "unmount command `{}` failed with {}",
        .command.join(" "),
        describe_exit(.exit_code.as_ref())
    )]
    Teardown {
        /// Full argument vector of the failed command.
        command: Vec<String>,
        /// Exit code, or `None` when the process was killed by a signal.
        exit_code: Option<i32>,
    },

    /// A command could not be started.
    #[error("failed to spawn `{}`: {source}", .command.join(" "))]
    Spawn {
        /// Argument vector that could not be executed.
        command: Vec<String>,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Teardown finished but one or more steps failed.
    #[error("{} teardown step(s) failed; mounts may remain under the source root", .failures.len())]
    TeardownIncomplete {
        /// Every individual failure, in the order teardown encountered them.
        failures: Vec<KeystoneError>,
    },

    /// Another overlay manager already holds the source root.
    #[error("source root is busy: {path} is locked by another overlay manager")]
    Busy {
        /// Lock file that could not be acquired.
        path: PathBuf,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

fn describe_exit(code: Option<&i32>) -> String {
    code.map_or_else(|| "termination by signal".to_owned(), |c| format!("exit code {c}"))
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, KeystoneError>;
