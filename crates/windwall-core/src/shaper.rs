//! Safety shaping: intensities in, bounded slew-limited pulse widths out.
//!
//! For every motor, each tick:
//!
//! ```text
//! s      = clamp(intensity, 0, 1)
//! target = min + s * (max - min)
//! delta  = clamp(target - previous, -slew, +slew)
//! output = clamp(previous + delta, min, max)
//! ```
//!
//! `previous` is the value last committed as transmitted. Before the first
//! commit it is the channel's idle value, so the very first tick is slew
//! limited exactly like every other.

use crate::error::SignalError;

/// One motor as seen by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotorChannel {
    /// Motor index
    pub index: usize,
    /// Lowest valid output (microseconds)
    pub min: u16,
    /// Highest valid output (microseconds)
    pub max: u16,
    /// Stopped / disarmed output (microseconds)
    pub idle: u16,
    output: u16,
}

impl MotorChannel {
    /// Create a channel whose current output starts at `idle`.
    ///
    /// `idle` is clamped into `[min, max]` so the range invariant holds from
    /// construction on.
    pub fn new(index: usize, min: u16, max: u16, idle: u16) -> Self {
        Self { index, min, max, idle, output: idle.clamp(min, max) }
    }

    /// Last committed output.
    pub fn output(&self) -> u16 {
        self.output
    }

    fn target(&self, intensity: f64) -> u16 {
        let s = intensity.clamp(0.0, 1.0);
        let span = f64::from(self.max - self.min);
        self.min + (s * span).round() as u16
    }

    fn limit(&self, target: u16, slew_limit: u16) -> u16 {
        let previous = i32::from(self.output);
        let slew = i32::from(slew_limit);
        let delta = (i32::from(target) - previous).clamp(-slew, slew);

        (previous + delta).clamp(i32::from(self.min), i32::from(self.max)) as u16
    }
}

/// Converts target intensities into bounded, slew-limited outputs.
#[derive(Debug, Clone)]
pub struct Shaper {
    channels: Vec<MotorChannel>,
    slew_limit: u16,
}

impl Shaper {
    /// Create a shaper over `channels` with a per-tick change limit.
    pub fn new(channels: Vec<MotorChannel>, slew_limit: u16) -> Self {
        Self { channels, slew_limit }
    }

    /// Channels in motor order.
    pub fn channels(&self) -> &[MotorChannel] {
        &self.channels
    }

    /// Maximum per-tick change.
    pub fn slew_limit(&self) -> u16 {
        self.slew_limit
    }

    /// Outputs last committed, in motor order.
    pub fn previous(&self) -> Vec<u16> {
        self.channels.iter().map(MotorChannel::output).collect()
    }

    /// Shape one tick of intensities into `out`.
    ///
    /// Does not change state; call [`Shaper::commit`] once the result has
    /// actually been transmitted.
    ///
    /// # Errors
    ///
    /// `Length` if either slice does not match the channel count, `NonFinite`
    /// for NaN or infinite intensities.
    pub fn shape(&self, intensities: &[f64], out: &mut [u16]) -> Result<(), SignalError> {
        let expected = self.channels.len();
        if intensities.len() != expected {
            return Err(SignalError::Length { expected, actual: intensities.len() });
        }
        if out.len() != expected {
            return Err(SignalError::Length { expected, actual: out.len() });
        }

        for ((channel, &intensity), slot) in self.channels.iter().zip(intensities).zip(out) {
            if !intensity.is_finite() {
                return Err(SignalError::NonFinite { motor: channel.index });
            }
            *slot = channel.limit(channel.target(intensity), self.slew_limit);
        }

        Ok(())
    }

    /// Record `outputs` as the values now in flight.
    ///
    /// Values are clamped to each channel's range.
    pub fn commit(&mut self, outputs: &[u16]) {
        for (channel, &value) in self.channels.iter_mut().zip(outputs) {
            channel.output = value.clamp(channel.min, channel.max);
        }
    }
}
