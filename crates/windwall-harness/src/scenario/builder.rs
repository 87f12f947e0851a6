//! Scenario builder API.
//!
//! Declarative construction of whole-system tests. `.oracle()` is the only
//! way to obtain something runnable.

use std::time::Duration;

use windwall_core::{
    config::SystemConfig,
    coordinator::Coordinator,
    env::Environment,
    error::SignalError,
    runtime::Runtime,
    signal::{ConstantSignal, SignalSource},
    telemetry::TelemetryBuffer,
    transport::Bus,
};
use windwall_proto::{Frame, NodeAssignment};

use crate::{
    SimBus, SimEnv,
    scenario::{OracleFn, World},
};

/// Signal source type used by scenarios.
pub type ScenarioSignal = Box<dyn Fn(Duration, &mut [f64]) -> Result<(), SignalError>>;

/// One step of a scenario, applied in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Run this many coordinator ticks.
    Ticks(u64),
    /// Let time pass with no traffic, nodes keep polling.
    Silence(Duration),
    /// Stream raw bytes (bypassing the coordinator), then pulse sync.
    RawFrame(Vec<u8>),
    /// Drop the byte at this position of the next frame.
    DropByte(usize),
    /// Replace the byte at a position of the next frame.
    CorruptByte {
        /// Frame position
        position: usize,
        /// Byte delivered instead
        value: u8,
    },
    /// Swallow the next sync pulses.
    SuppressSync(usize),
    /// Fail the next frame writes.
    FailWrites(usize),
    /// Fail the next sync pulses.
    FailSyncs(usize),
    /// Random byte corruption rate.
    Noise(f64),
    /// Cut the bus.
    Disconnect,
    /// Restore the bus.
    Reconnect,
}

/// Scenario builder.
pub struct Scenario {
    name: String,
    config: SystemConfig,
    signal: Option<ScenarioSignal>,
    seed: u64,
    byte_time: Duration,
    steps: Vec<Step>,
}

impl Scenario {
    /// Create a scenario with the default configuration and an all-zero
    /// signal.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: SystemConfig::default(),
            signal: None,
            seed: 0,
            byte_time: SimBus::DEFAULT_BYTE_TIME,
            steps: Vec::new(),
        }
    }

    /// Use this system configuration.
    pub fn config(mut self, config: SystemConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the node table, keeping the rest of the configuration.
    pub fn nodes(mut self, nodes: Vec<NodeAssignment>) -> Self {
        self.config.nodes = nodes;
        self
    }

    /// Drive the coordinator with this signal.
    pub fn signal<S: SignalSource + 'static>(mut self, signal: S) -> Self {
        self.signal = Some(Box::new(move |t: Duration, out: &mut [f64]| signal.sample(t, out)));
        self
    }

    /// RNG seed for noise injection.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Time to clock one byte onto the bus.
    pub fn byte_time(mut self, byte_time: Duration) -> Self {
        self.byte_time = byte_time;
        self
    }

    /// Append a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append `count` coordinator ticks.
    pub fn ticks(self, count: u64) -> Self {
        self.step(Step::Ticks(count))
    }

    /// Append a period of bus silence.
    pub fn silence(self, duration: Duration) -> Self {
        self.step(Step::Silence(duration))
    }

    /// Append a raw frame followed by a sync pulse.
    pub fn raw_frame(self, bytes: impl Into<Vec<u8>>) -> Self {
        self.step(Step::RawFrame(bytes.into()))
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute every step, then run the oracle on the final world.
    ///
    /// A fatal coordinator error stops further ticks but not the remaining
    /// steps, so scenarios can still observe node fail-safe afterwards.
    pub fn run(self) -> Result<(), String> {
        let Scenario { name, config, signal, seed, byte_time, steps } = self.scenario;
        let fail = |what: &str, e: &dyn std::fmt::Display| format!("Scenario '{name}': {what}: {e}");

        let env = SimEnv::with_seed(seed);
        let table = config.node_table().map_err(|e| fail("node table", &e))?;
        let node_config = config.node_config().map_err(|e| fail("node config", &e))?;
        let wire_order = config.wire_order().map_err(|e| fail("wire order", &e))?;
        let bus = SimBus::new(env.clone(), &table, &node_config).with_byte_time(byte_time);

        let signal: ScenarioSignal = match signal {
            Some(signal) => signal,
            None => Box::new(|t: Duration, out: &mut [f64]| ConstantSignal(0.0).sample(t, out)),
        };
        let coordinator = Coordinator::new(&config, signal).map_err(|e| fail("coordinator", &e))?;

        let telemetry = TelemetryBuffer::new(config.n_motors);
        let reader = telemetry.reader();
        let period = config.period();
        let timing = coordinator.timing();
        let n_motors = config.n_motors;

        let runtime = Runtime::new(coordinator, bus, env, telemetry);
        let pulse_map = node_config.pulse_map;
        let mut world = World::new(config, pulse_map, wire_order, runtime, reader);

        for step in steps {
            match step {
                Step::Ticks(count) => {
                    for _ in 0..count {
                        if world.fatal_error().is_some() {
                            break;
                        }
                        match world.runtime_mut().run_tick() {
                            Ok(outcome) => world.record_outcome(outcome),
                            Err(error) => world.record_fatal(error),
                        }
                    }
                },
                Step::Silence(duration) => {
                    world.runtime_mut().bus_mut().idle(duration, period);
                },
                Step::RawFrame(bytes) => {
                    let frame = Frame::new(bytes, n_motors).map_err(|e| fail("raw frame", &e))?;
                    let runtime = world.runtime_mut();
                    let bus = runtime.bus_mut();
                    bus.write_frame(&frame).map_err(|e| fail("raw frame write", &e))?;
                    bus.env().wait(timing.sync_settle);
                    bus.pulse_sync(timing.sync_pulse).map_err(|e| fail("raw frame sync", &e))?;
                },
                Step::DropByte(position) => world.runtime_mut().bus_mut().drop_byte_at(position),
                Step::CorruptByte { position, value } => {
                    world.runtime_mut().bus_mut().corrupt_byte_at(position, value);
                },
                Step::SuppressSync(count) => world.runtime_mut().bus_mut().suppress_sync(count),
                Step::FailWrites(count) => world.runtime_mut().bus_mut().fail_next_writes(count),
                Step::FailSyncs(count) => world.runtime_mut().bus_mut().fail_next_syncs(count),
                Step::Noise(rate) => world.runtime_mut().bus_mut().noise(rate),
                Step::Disconnect => world.runtime_mut().bus_mut().disconnect(),
                Step::Reconnect => world.runtime_mut().bus_mut().reconnect(),
            }
        }

        (self.oracle)(&world).map_err(|e| format!("Scenario '{name}': {e}"))
    }
}
