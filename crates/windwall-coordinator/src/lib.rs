//! Windwall coordinator process
//!
//! Binds the sans-IO [`windwall_core::runtime::Runtime`] to the wall clock, a
//! bus driver and a Fourier series signal source. `main` adds the CLI,
//! logging, shutdown handling and the telemetry reporter on top.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bus;
pub mod cli;
pub mod error;
pub mod fourier;
pub mod settings;

pub use bus::{BusError, BusKind, CoordinatorBus, MockBus};
pub use cli::Cli;
pub use error::CliError;
pub use fourier::{FourierSignal, Harmonic, MotorSeries};
pub use settings::{Settings, SignalConfig, SignalPreset};
