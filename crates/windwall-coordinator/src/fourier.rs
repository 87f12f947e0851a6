//! Fourier series signal source.
//!
//! Motor `i` follows
//!
//! ```text
//! s_i(t) = a0_i + sum_n a_{i,n} * sin(n * w * (t - t0) + phi_{i,n})
//! ```
//!
//! clamped to `[value_min, value_max]`. Coefficients are fixed before the loop
//! starts, so sampling never allocates.

use std::{f64::consts::PI, time::Duration};

use windwall_core::{error::SignalError, signal::SignalSource};

/// One sine term of a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Harmonic {
    /// Amplitude (normalized intensity units)
    pub amplitude: f64,
    /// Phase in radians of this harmonic
    pub phase: f64,
}

/// Series for a single motor. `harmonics[k]` is harmonic `k + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct MotorSeries {
    /// DC term
    pub offset: f64,
    /// Sine terms, fundamental first
    pub harmonics: Vec<Harmonic>,
}

impl MotorSeries {
    /// Series with only a DC term.
    pub fn constant(offset: f64) -> Self {
        Self { offset, harmonics: Vec::new() }
    }

    /// Value at fundamental angle `theta = w * (t - t0)`.
    pub fn evaluate(&self, theta: f64) -> f64 {
        self.harmonics.iter().zip(1u32..).fold(self.offset, |acc, (h, n)| {
            acc + h.amplitude * (f64::from(n) * theta + h.phase).sin()
        })
    }

    /// Delay the whole waveform by `phase` radians of the fundamental.
    fn delayed(mut self, phase: f64) -> Self {
        for (h, n) in self.harmonics.iter_mut().zip(1u32..) {
            h.phase -= f64::from(n) * phase;
        }
        self
    }
}

/// Per-motor Fourier series sampled by the coordinator loop.
#[derive(Debug, Clone, PartialEq)]
pub struct FourierSignal {
    series: Vec<MotorSeries>,
    omega: f64,
    start_delay: Duration,
    value_min: f64,
    value_max: f64,
}

impl FourierSignal {
    /// Signal with fundamental period `period`, bounds `[0, 1]` and no delay.
    pub fn new(series: Vec<MotorSeries>, period: Duration) -> Self {
        let omega = if period.is_zero() { 0.0 } else { 2.0 * PI / period.as_secs_f64() };
        Self { series, omega, start_delay: Duration::ZERO, value_min: 0.0, value_max: 1.0 }
    }

    /// Every motor holds `value`.
    pub fn uniform(n_motors: usize, value: f64) -> Self {
        Self::new(vec![MotorSeries::constant(value); n_motors], Duration::ZERO)
    }

    /// `offset + amplitude * sin(2 pi t / period)` on every motor.
    pub fn sine(n_motors: usize, amplitude: f64, offset: f64, period: Duration) -> Self {
        let series = MotorSeries { offset, harmonics: vec![Harmonic { amplitude, phase: 0.0 }] };
        Self::new(vec![series; n_motors], period)
    }

    /// Square pulse train of height `amplitude`, on for `duty_cycle` of each
    /// period and centered on `t = t0`, truncated to `terms` harmonics.
    pub fn square_pulse(
        n_motors: usize,
        amplitude: f64,
        duty_cycle: f64,
        terms: usize,
        period: Duration,
    ) -> Self {
        let harmonics = (1..=terms)
            .map(|n| {
                let n = n as f64;
                // Cosine terms of the even pulse, written as phase-shifted sines.
                let amplitude = 2.0 * amplitude * (n * PI * duty_cycle).sin() / (n * PI);
                Harmonic { amplitude, phase: PI / 2.0 }
            })
            .collect();
        let series = MotorSeries { offset: amplitude * duty_cycle, harmonics };
        Self::new(vec![series; n_motors], period)
    }

    /// Clamp every sample to `[min, max]`.
    #[must_use]
    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.value_min = min;
        self.value_max = max;
        self
    }

    /// Hold `value_min` until `delay` has passed, then start the waveform at
    /// its `t = 0` point.
    #[must_use]
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Delay motor `i` by `i * step` radians of the fundamental, turning a
    /// uniform pattern into a travelling wave.
    #[must_use]
    pub fn with_phase_step(mut self, step: f64) -> Self {
        self.series = self
            .series
            .into_iter()
            .enumerate()
            .map(|(i, series)| series.delayed(i as f64 * step))
            .collect();
        self
    }

    /// Motors covered.
    pub fn n_motors(&self) -> usize {
        self.series.len()
    }

    /// Per-motor series.
    pub fn series(&self) -> &[MotorSeries] {
        &self.series
    }
}

impl SignalSource for FourierSignal {
    fn sample(&self, t: Duration, out: &mut [f64]) -> Result<(), SignalError> {
        if out.len() != self.series.len() {
            return Err(SignalError::Length { expected: out.len(), actual: self.series.len() });
        }

        let Some(running) = t.checked_sub(self.start_delay) else {
            out.fill(self.value_min);
            return Ok(());
        };

        let theta = self.omega * running.as_secs_f64();
        for (value, series) in out.iter_mut().zip(&self.series) {
            *value = series.evaluate(theta).clamp(self.value_min, self.value_max);
        }
        Ok(())
    }
}
