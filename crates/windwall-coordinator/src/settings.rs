//! Process configuration.
//!
//! A TOML file with an optional top-level `duration_s` and two tables:
//!
//! ```toml
//! duration_s = 10.0
//!
//! [system]
//! rate_hz = 400
//! slew_limit_us = 50
//!
//! [signal]
//! preset = "sine"
//! amplitude = 0.3
//! period_s = 2.0
//! ```
//!
//! Missing keys take their defaults. Command-line flags are applied on top.

use std::{fs, path::Path, time::Duration};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use windwall_core::config::SystemConfig;

use crate::{cli::Cli, error::CliError, fourier::FourierSignal};

/// Waveform family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SignalPreset {
    /// Constant `value` on every motor
    #[default]
    Uniform,
    /// `offset + amplitude * sin(2 pi t / period)`
    Sine,
    /// Pulse train of height `amplitude` and width `duty_cycle * period`
    SquarePulse,
}

/// Signal source parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Waveform family.
    /// Default: uniform
    pub preset: SignalPreset,
    /// Level for `uniform`.
    /// Default: 0.5
    pub value: f64,
    /// Sine amplitude or pulse height.
    /// Default: 0.5
    pub amplitude: f64,
    /// Sine DC offset.
    /// Default: 0.5
    pub offset: f64,
    /// Fundamental period (seconds).
    /// Default: 1.0
    pub period_s: f64,
    /// Pulse on-fraction.
    /// Default: 0.5
    pub duty_cycle: f64,
    /// Harmonics kept for `square_pulse`.
    /// Default: 7
    pub terms: usize,
    /// Phase lag between neighbouring motors (radians of the fundamental).
    /// Default: 0
    pub phase_step_rad: f64,
    /// Time at `value_min` before the waveform starts (seconds).
    /// Default: 0
    pub start_delay_s: f64,
    /// Lower clamp, within `[0, 1]`.
    /// Default: 0
    pub value_min: f64,
    /// Upper clamp, within `[value_min, 1]`.
    /// Default: 1
    pub value_max: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            preset: SignalPreset::Uniform,
            value: 0.5,
            amplitude: 0.5,
            offset: 0.5,
            period_s: 1.0,
            duty_cycle: 0.5,
            terms: 7,
            phase_step_rad: 0.0,
            start_delay_s: 0.0,
            value_min: 0.0,
            value_max: 1.0,
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> CliError {
    CliError::Invalid { field, reason: reason.into() }
}

fn finite(field: &'static str, value: f64) -> Result<f64, CliError> {
    if value.is_finite() { Ok(value) } else { Err(invalid(field, "must be finite")) }
}

fn seconds(field: &'static str, value: f64) -> Result<Duration, CliError> {
    Duration::try_from_secs_f64(value).map_err(|e| invalid(field, e.to_string()))
}

impl SignalConfig {
    /// Build the signal source for `n_motors` motors.
    pub fn build(&self, n_motors: usize) -> Result<FourierSignal, CliError> {
        let value_min = finite("value_min", self.value_min)?;
        let value_max = finite("value_max", self.value_max)?;
        if !(0.0 <= value_min && value_min <= value_max && value_max <= 1.0) {
            return Err(invalid("value_min/value_max", "need 0 <= value_min <= value_max <= 1"));
        }
        let start_delay = seconds("start_delay_s", self.start_delay_s)?;
        let phase_step = finite("phase_step_rad", self.phase_step_rad)?;

        let signal = match self.preset {
            SignalPreset::Uniform => FourierSignal::uniform(n_motors, finite("value", self.value)?),
            SignalPreset::Sine => FourierSignal::sine(
                n_motors,
                finite("amplitude", self.amplitude)?,
                finite("offset", self.offset)?,
                self.period()?,
            ),
            SignalPreset::SquarePulse => {
                if !(0.0..=1.0).contains(&self.duty_cycle) {
                    return Err(invalid("duty_cycle", "must be within [0, 1]"));
                }
                if self.terms == 0 {
                    return Err(invalid("terms", "must be at least 1"));
                }
                FourierSignal::square_pulse(
                    n_motors,
                    finite("amplitude", self.amplitude)?,
                    self.duty_cycle,
                    self.terms,
                    self.period()?,
                )
            },
        };

        Ok(signal
            .with_bounds(value_min, value_max)
            .with_start_delay(start_delay)
            .with_phase_step(phase_step))
    }

    fn period(&self) -> Result<Duration, CliError> {
        let period = seconds("period_s", self.period_s)?;
        if period.is_zero() {
            return Err(invalid("period_s", "must be positive"));
        }
        Ok(period)
    }
}

/// Everything the coordinator process needs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Run length in seconds; `None` runs until interrupted.
    pub duration_s: Option<f64>,
    /// Protocol and timing configuration.
    pub system: SystemConfig,
    /// Signal source.
    pub signal: SignalConfig,
}

impl Settings {
    /// Read `path`, or defaults when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = fs::read_to_string(path)
            .map_err(|source| CliError::Read { path: path.to_path_buf(), source })?;
        toml::from_str(&text).map_err(|source| CliError::Parse { path: path.to_path_buf(), source })
    }

    /// Layer command-line overrides on top.
    pub fn apply(&mut self, cli: &Cli) {
        if let Some(rate_hz) = cli.rate_hz {
            self.system.rate_hz = rate_hz;
        }
        if let Some(slew_limit) = cli.slew_limit {
            self.system.slew_limit_us = slew_limit;
        }
        if let Some(duration) = cli.duration {
            self.duration_s = Some(duration);
        }
        if let Some(preset) = cli.signal {
            self.signal.preset = preset;
        }
    }

    /// Validated run length.
    pub fn duration(&self) -> Result<Option<Duration>, CliError> {
        self.duration_s.map(|s| seconds("duration_s", s)).transpose()
    }

    /// Check the whole configuration before any hardware is touched.
    pub fn validate(&self) -> Result<(), CliError> {
        self.system.validate()?;
        self.signal.build(self.system.n_motors)?;
        self.duration()?;
        Ok(())
    }
}
