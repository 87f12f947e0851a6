//! Fixed-period coordinator loop.
//!
//! One tick:
//!
//! 1. plan (sample, shape, encode)
//! 2. write the whole frame
//! 3. wait out the settle margin, pulse the sync line
//! 4. commit the plan and publish it to telemetry
//! 5. wait until one period after the tick started
//!
//! A tick that overruns its period is followed immediately by the next one;
//! lost time is never made up by skipping or merging ticks.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

use tracing::{debug, info, warn};
use windwall_proto::Frame;

use crate::{
    coordinator::Coordinator, env::Environment, error::CoordinatorError, signal::SignalSource,
    telemetry::TelemetryBuffer, transport::Bus,
};

/// Ticks between status log lines.
pub const STATUS_INTERVAL: u64 = 100;

/// What happened on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Frame and sync pulse went out.
    Sent,
    /// The bus failed; nothing was committed.
    Skipped,
}

/// Loop counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Ticks run
    pub ticks: u64,
    /// Ticks skipped on bus failure
    pub skipped: u64,
    /// Ticks that took longer than one period
    pub overruns: u64,
    /// Longest tick body
    pub max_tick: Duration,
}

/// Coordinator loop bound to a bus and a clock.
#[derive(Debug)]
pub struct Runtime<S, B, E> {
    coordinator: Coordinator<S>,
    bus: B,
    env: E,
    telemetry: TelemetryBuffer,
    started: Option<Instant>,
    stats: LoopStats,
}

impl<S, B, E> Runtime<S, B, E>
where
    S: SignalSource,
    B: Bus,
    E: Environment,
{
    /// Create a runtime. The clock starts on the first tick.
    pub fn new(coordinator: Coordinator<S>, bus: B, env: E, telemetry: TelemetryBuffer) -> Self {
        Self { coordinator, bus, env, telemetry, started: None, stats: LoopStats::default() }
    }

    /// Run one complete tick, including the wait for the end of its period.
    ///
    /// # Errors
    ///
    /// Signal source failures. Bus failures only skip the tick.
    pub fn run_tick(&mut self) -> Result<TickOutcome, CoordinatorError> {
        let tick_start = self.env.now();
        let started = *self.started.get_or_insert(tick_start);
        let timing = self.coordinator.timing();

        let plan = self.coordinator.plan(tick_start.saturating_duration_since(started))?;

        let outcome = match self.transmit(&plan.frame, timing.sync_settle, timing.sync_pulse) {
            Ok(()) => {
                self.coordinator.commit(&plan);
                self.telemetry.publish(plan.tick, &plan.pulses);
                TickOutcome::Sent
            },
            Err(error) => {
                self.stats.skipped += 1;
                warn!(tick = plan.tick, %error, "bus failure, tick skipped");
                TickOutcome::Skipped
            },
        };

        self.stats.ticks += 1;

        let body = self.env.now().saturating_duration_since(tick_start);
        self.stats.max_tick = self.stats.max_tick.max(body);
        if body > timing.period {
            self.stats.overruns += 1;
            warn!(tick = plan.tick, ?body, period = ?timing.period, "tick overran its period");
        } else {
            self.env.wait_until(tick_start + timing.period);
        }

        Ok(outcome)
    }

    fn transmit(
        &mut self,
        frame: &Frame,
        settle: Duration,
        pulse: Duration,
    ) -> Result<(), B::Error> {
        self.bus.write_frame(frame)?;
        self.env.wait(settle);
        self.bus.pulse_sync(pulse)
    }

    /// Tick until `stop` is set or the signal source fails.
    ///
    /// The tick in progress when `stop` is set runs to completion.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<LoopStats, CoordinatorError> {
        let period = self.coordinator.timing().period;
        info!(n_motors = self.coordinator.n_motors(), ?period, "coordinator loop started");

        let mut window_start = self.env.now();
        while !stop.load(Ordering::Acquire) {
            self.run_tick()?;

            if self.stats.ticks % STATUS_INTERVAL == 0 {
                let now = self.env.now();
                let window = now.saturating_duration_since(window_start);
                window_start = now;
                self.log_status(window);
            }
        }

        info!(
            ticks = self.stats.ticks,
            skipped = self.stats.skipped,
            overruns = self.stats.overruns,
            max_tick = ?self.stats.max_tick,
            "coordinator loop stopped"
        );
        Ok(self.stats)
    }

    fn log_status(&self, window: Duration) {
        let rate_hz = if window.is_zero() {
            0.0
        } else {
            STATUS_INTERVAL as f64 / window.as_secs_f64()
        };

        let previous = self.coordinator.previous();
        let mean_us = if previous.is_empty() {
            0.0
        } else {
            previous.iter().map(|&p| f64::from(p)).sum::<f64>() / previous.len() as f64
        };

        debug!(
            ticks = self.stats.ticks,
            rate_hz,
            mean_us,
            skipped = self.stats.skipped,
            overruns = self.stats.overruns,
            "coordinator status"
        );
    }

    /// Loop counters.
    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Planner.
    pub fn coordinator(&self) -> &Coordinator<S> {
        &self.coordinator
    }

    /// Bus.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutable bus, for fault injection.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Clock.
    pub fn env(&self) -> &E {
        &self.env
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, fmt};

    use super::*;
    use crate::{config::SystemConfig, error::SignalError, signal::ConstantSignal};

    #[derive(Debug)]
    struct Offline;

    impl fmt::Display for Offline {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("bus offline")
        }
    }

    impl std::error::Error for Offline {}

    #[derive(Debug, PartialEq, Eq)]
    enum Event {
        Write(Vec<u8>),
        Sync(Duration),
    }

    #[derive(Default)]
    struct RecordingBus {
        events: Vec<Event>,
        fail_writes: usize,
    }

    impl Bus for RecordingBus {
        type Error = Offline;

        fn write_frame(&mut self, frame: &Frame) -> Result<(), Offline> {
            if self.fail_writes > 0 {
                self.fail_writes -= 1;
                return Err(Offline);
            }
            self.events.push(Event::Write(frame.as_bytes().to_vec()));
            Ok(())
        }

        fn pulse_sync(&mut self, width: Duration) -> Result<(), Offline> {
            self.events.push(Event::Sync(width));
            Ok(())
        }
    }

    /// Clock that only moves when waited on.
    struct StepClock {
        base: Instant,
        offset: Cell<Duration>,
    }

    impl StepClock {
        fn new() -> Self {
            Self { base: Instant::now(), offset: Cell::new(Duration::ZERO) }
        }
    }

    impl Environment for StepClock {
        fn now(&self) -> Instant {
            self.base + self.offset.get()
        }

        fn wait_until(&self, deadline: Instant) {
            if deadline > self.now() {
                self.offset.set(deadline - self.base);
            }
        }
    }

    fn runtime(fail_writes: usize) -> Runtime<ConstantSignal, RecordingBus, StepClock> {
        let config = SystemConfig { n_motors: 4, ..SystemConfig::default() };
        let coordinator = Coordinator::new(&config, ConstantSignal(1.0)).unwrap();
        let bus = RecordingBus { fail_writes, ..RecordingBus::default() };
        Runtime::new(coordinator, bus, StepClock::new(), TelemetryBuffer::new(4))
    }

    #[test]
    fn frame_precedes_sync() {
        let mut runtime = runtime(0);
        assert_eq!(runtime.run_tick(), Ok(TickOutcome::Sent));

        let events = &runtime.bus().events;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::Write(ref bytes) if bytes.len() == 4));
        assert_eq!(events[1], Event::Sync(Duration::from_micros(10)));
    }

    #[test]
    fn holds_the_period() {
        let mut runtime = runtime(0);
        let start = runtime.env().now();
        for _ in 0..4 {
            runtime.run_tick().unwrap();
        }
        assert_eq!(runtime.env().now() - start, Duration::from_micros(10_000));
        assert_eq!(runtime.stats().overruns, 0);
    }

    #[test]
    fn bus_failure_skips_without_sync_or_commit() {
        let mut runtime = runtime(1);
        assert_eq!(runtime.run_tick(), Ok(TickOutcome::Skipped));
        assert!(runtime.bus().events.is_empty());
        assert_eq!(runtime.coordinator().previous(), vec![1000; 4]);

        assert_eq!(runtime.run_tick(), Ok(TickOutcome::Sent));
        assert_eq!(runtime.coordinator().previous(), vec![1050; 4]);

        let stats = runtime.stats();
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn signal_failure_stops_the_loop() {
        let failing = |_t: Duration, _out: &mut [f64]| -> Result<(), SignalError> {
            Err(SignalError::NonFinite { motor: 0 })
        };
        let config = SystemConfig { n_motors: 4, ..SystemConfig::default() };
        let coordinator = Coordinator::new(&config, failing).unwrap();
        let bus = RecordingBus::default();
        let mut runtime = Runtime::new(coordinator, bus, StepClock::new(), TelemetryBuffer::new(4));

        let stop = AtomicBool::new(false);
        assert!(matches!(runtime.run(&stop), Err(CoordinatorError::Signal(_))));
        assert!(runtime.bus().events.is_empty());
    }

    #[test]
    fn telemetry_sees_committed_outputs() {
        let config = SystemConfig { n_motors: 4, ..SystemConfig::default() };
        let coordinator = Coordinator::new(&config, ConstantSignal(1.0)).unwrap();
        let telemetry = TelemetryBuffer::new(4);
        let reader = telemetry.reader();
        let bus = RecordingBus { fail_writes: 1, ..RecordingBus::default() };
        let mut runtime = Runtime::new(coordinator, bus, StepClock::new(), telemetry);

        runtime.run_tick().unwrap();
        assert_eq!(reader.snapshot(), None);

        runtime.run_tick().unwrap();
        let snapshot = reader.snapshot().unwrap();
        assert_eq!(snapshot.tick, 1);
        assert_eq!(snapshot.pulses, vec![1050; 4]);
    }
}
