//! Raw byte <-> pulse width mapping.
//!
//! Every motor byte is interpreted on its own:
//!
//! ```text
//! b = 0        -> idle                     (stop / disarmed sentinel)
//! b = 1..=255  -> active_min + (b - 1) * (active_max - active_min) / 254
//! ```
//!
//! The idle value sits below the active range on purpose. A motor commanded
//! to its lowest active speed is still spinning; idle means stopped. Decoded
//! values are clamped to `[idle, active_max]` before they reach hardware.

use crate::errors::{ProtocolError, Result};

/// Steps in the active range (bytes `1..=255`).
const ACTIVE_STEPS: u32 = 254;

/// Affine mapping between wire bytes and output pulse widths (microseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseMap {
    idle: u16,
    active_min: u16,
    active_max: u16,
}

impl PulseMap {
    /// Create a pulse map.
    ///
    /// # Errors
    ///
    /// `InvalidPulseMap` unless `idle <= active_min < active_max`.
    pub fn new(idle: u16, active_min: u16, active_max: u16) -> Result<Self> {
        if idle > active_min || active_min >= active_max {
            return Err(ProtocolError::InvalidPulseMap { idle, active_min, active_max });
        }
        Ok(Self { idle, active_min, active_max })
    }

    /// Idle (sentinel) pulse width.
    pub fn idle(&self) -> u16 {
        self.idle
    }

    /// Lowest active pulse width, produced by byte `1`.
    pub fn active_min(&self) -> u16 {
        self.active_min
    }

    /// Highest active pulse width, produced by byte `255`.
    pub fn active_max(&self) -> u16 {
        self.active_max
    }

    /// Map a wire byte to the pulse width a node drives.
    pub fn decode(&self, byte: u8) -> u16 {
        if byte == 0 {
            return self.idle;
        }

        let span = u32::from(self.active_max - self.active_min);
        let pulse = u32::from(self.active_min) + (u32::from(byte) - 1) * span / ACTIVE_STEPS;

        (pulse as u16).clamp(self.idle, self.active_max)
    }

    /// Quantize a commanded pulse width into a wire byte.
    ///
    /// Anything below `active_min` becomes the idle sentinel; the active range
    /// is rounded to the nearest of the 255 active steps.
    pub fn encode(&self, pulse: u16) -> u8 {
        if pulse < self.active_min {
            return 0;
        }

        let span = u32::from(self.active_max - self.active_min);
        let offset = u32::from(pulse.min(self.active_max) - self.active_min);
        let step = (offset * ACTIVE_STEPS + span / 2) / span;

        (1 + step).clamp(1, 255) as u8
    }
}

impl Default for PulseMap {
    fn default() -> Self {
        Self { idle: 1000, active_min: 1200, active_max: 2000 }
    }
}
