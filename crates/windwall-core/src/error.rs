//! Error types for the coordinator and configuration.

use thiserror::Error;
use windwall_proto::ProtocolError;

/// Signal source failures.
///
/// Always fatal to the coordinator loop: there is no substitute target that
/// is both safe and meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// The source wrote the wrong number of intensities.
    #[error("signal source produced {actual} intensities, expected {expected}")]
    Length {
        /// One per motor
        expected: usize,
        /// Produced
        actual: usize,
    },

    /// An intensity was NaN or infinite.
    #[error("signal source produced a non-finite intensity for motor {motor}")]
    NonFinite {
        /// Motor index
        motor: usize,
    },

    /// Source specific failure.
    #[error("signal source failed: {0}")]
    Source(String),
}

/// Configuration validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A field has an unusable value.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Wire format structures could not be built.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid { field, reason: reason.into() }
    }
}

/// Coordinator failures that stop the control loop.
///
/// Bus write failures are deliberately absent: they skip a tick and the loop
/// carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    /// Signal source failure (fatal).
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Encoding failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
