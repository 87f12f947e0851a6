//! Per-tick planning for the coordinator.
//!
//! Pure logic, no clock and no bus: given the time since the loop started,
//! produce the outputs and frame to transmit. The plan is only folded back
//! into slew state by [`Coordinator::commit`], which the runtime calls once
//! the frame and sync pulse actually went out. A skipped tick therefore
//! leaves the slew reference at what the nodes really applied.

use std::time::Duration;

use windwall_proto::{Frame, FrameEncoder};

use crate::{config::SystemConfig, error::CoordinatorError, shaper::Shaper, signal::SignalSource};

/// Timing of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTiming {
    /// Tick period
    pub period: Duration,
    /// Sync line assertion width
    pub sync_pulse: Duration,
    /// Gap between the last byte and the sync edge
    pub sync_settle: Duration,
}

/// Everything one tick will transmit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickPlan {
    /// Tick number, counting skipped ticks
    pub tick: u64,
    /// Time since the loop started
    pub elapsed: Duration,
    /// Shaped output per motor (logical order, microseconds)
    pub pulses: Vec<u16>,
    /// Encoded frame
    pub frame: Frame,
}

/// Signal sampling, shaping and encoding.
#[derive(Debug)]
pub struct Coordinator<S> {
    signal: S,
    shaper: Shaper,
    encoder: FrameEncoder,
    timing: TickTiming,
    intensities: Vec<f64>,
    next_tick: u64,
}

impl<S: SignalSource> Coordinator<S> {
    /// Build a coordinator from a validated configuration.
    pub fn new(config: &SystemConfig, signal: S) -> Result<Self, CoordinatorError> {
        config.validate()?;

        Ok(Self {
            signal,
            shaper: Shaper::new(config.channels(), config.slew_limit_us),
            encoder: config.encoder()?,
            timing: TickTiming {
                period: config.period(),
                sync_pulse: config.sync_pulse(),
                sync_settle: config.sync_settle(),
            },
            intensities: vec![0.0; config.n_motors],
            next_tick: 0,
        })
    }

    /// Plan the next tick.
    ///
    /// # Errors
    ///
    /// Any signal source failure. The tick counter still advances.
    pub fn plan(&mut self, elapsed: Duration) -> Result<TickPlan, CoordinatorError> {
        let tick = self.next_tick;
        self.next_tick += 1;

        self.signal.sample(elapsed, &mut self.intensities)?;

        let mut pulses = vec![0; self.intensities.len()];
        self.shaper.shape(&self.intensities, &mut pulses)?;
        let frame = self.encoder.encode(&pulses)?;

        Ok(TickPlan { tick, elapsed, pulses, frame })
    }

    /// Record a plan as transmitted.
    pub fn commit(&mut self, plan: &TickPlan) {
        self.shaper.commit(&plan.pulses);
    }

    /// Outputs last committed.
    pub fn previous(&self) -> Vec<u16> {
        self.shaper.previous()
    }

    /// Tick timing.
    pub fn timing(&self) -> TickTiming {
        self.timing
    }

    /// Motors per frame.
    pub fn n_motors(&self) -> usize {
        self.intensities.len()
    }

    /// Ticks planned so far.
    pub fn ticks_planned(&self) -> u64 {
        self.next_tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::SignalError, signal::ConstantSignal};

    fn config(n_motors: usize) -> SystemConfig {
        SystemConfig { n_motors, ..SystemConfig::default() }
    }

    #[test]
    fn first_plan_is_slew_limited_from_idle() {
        let mut coordinator = Coordinator::new(&config(4), ConstantSignal(1.0)).unwrap();
        let plan = coordinator.plan(Duration::ZERO).unwrap();

        assert_eq!(plan.tick, 0);
        assert_eq!(plan.pulses, vec![1050; 4]);
        assert_eq!(plan.frame.len(), 4);
    }

    #[test]
    fn uncommitted_plan_does_not_move_reference() {
        let mut coordinator = Coordinator::new(&config(4), ConstantSignal(1.0)).unwrap();
        let first = coordinator.plan(Duration::ZERO).unwrap();
        let second = coordinator.plan(Duration::from_micros(2500)).unwrap();

        assert_eq!(first.pulses, second.pulses);
        assert_eq!(second.tick, 1);

        coordinator.commit(&second);
        let third = coordinator.plan(Duration::from_micros(5000)).unwrap();
        assert_eq!(third.pulses, vec![1100; 4]);
    }

    #[test]
    fn signal_failure_is_reported() {
        let failing = |_t: Duration, _out: &mut [f64]| -> Result<(), SignalError> {
            Err(SignalError::Source("sensor offline".into()))
        };
        let mut coordinator = Coordinator::new(&config(4), failing).unwrap();

        assert!(matches!(
            coordinator.plan(Duration::ZERO),
            Err(CoordinatorError::Signal(SignalError::Source(_)))
        ));
    }

    #[test]
    fn signal_sees_elapsed_time() {
        let ramp = |t: Duration, out: &mut [f64]| -> Result<(), SignalError> {
            out.fill(t.as_secs_f64());
            Ok(())
        };
        let cfg = SystemConfig { n_motors: 4, slew_limit_us: 1000, ..SystemConfig::default() };
        let mut coordinator = Coordinator::new(&cfg, ramp).unwrap();

        let plan = coordinator.plan(Duration::from_millis(500)).unwrap();
        assert_eq!(plan.pulses, vec![1500; 4]);
        assert_eq!(plan.frame.as_bytes(), &[96; 4]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = SystemConfig { rate_hz: 0, ..SystemConfig::default() };
        assert!(matches!(
            Coordinator::new(&cfg, ConstantSignal(0.5)),
            Err(CoordinatorError::Config(_))
        ));
    }
}
