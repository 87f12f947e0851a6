//! Signal source abstraction.
//!
//! A signal source is a pure function of time producing one normalized target
//! intensity per motor. Waveform synthesis itself lives outside the core.

use std::time::Duration;

use crate::error::SignalError;

/// Produces target intensities for every motor at a point in time.
///
/// Implementations should write values in `[0, 1]`; the shaper clamps
/// anything outside that interval. Non-finite values are a source failure.
pub trait SignalSource {
    /// Fill `out` (one entry per motor) with intensities at time `t` since
    /// the loop started.
    fn sample(&self, t: Duration, out: &mut [f64]) -> Result<(), SignalError>;
}

impl<F> SignalSource for F
where
    F: Fn(Duration, &mut [f64]) -> Result<(), SignalError>,
{
    fn sample(&self, t: Duration, out: &mut [f64]) -> Result<(), SignalError> {
        self(t, out)
    }
}

/// Same intensity for every motor at all times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantSignal(pub f64);

impl SignalSource for ConstantSignal {
    fn sample(&self, _t: Duration, out: &mut [f64]) -> Result<(), SignalError> {
        out.fill(self.0);
        Ok(())
    }
}
