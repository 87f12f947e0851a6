//! Binary-level errors.

use std::path::PathBuf;

use thiserror::Error;
use windwall_core::error::{ConfigError, CoordinatorError};

use crate::bus::BusError;

/// Everything that can end the coordinator process with a failure.
#[derive(Debug, Error)]
pub enum CliError {
    /// Config file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that was requested
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the expected schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File that was requested
        path: PathBuf,
        /// Parser failure
        #[source]
        source: toml::de::Error,
    },

    /// Configuration loaded but rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A signal or run parameter is unusable.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// `--log-level` is not a valid filter directive.
    #[error("invalid log filter: {0}")]
    LogFilter(String),

    /// Bus hardware could not be opened.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// The control loop stopped on a fatal error.
    #[error("coordinator loop failed: {0}")]
    Coordinator(#[from] CoordinatorError),

    /// The control loop thread panicked or was cancelled.
    #[error("coordinator loop thread failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Process-level I/O (signal handler installation).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
