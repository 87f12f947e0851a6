//! World state for scenario execution.
//!
//! The World owns the coordinator runtime (and through it the simulated bus
//! and nodes), records what every tick did, and offers the queries oracles
//! are written against.

use std::time::Duration;

use windwall_core::{
    config::SystemConfig,
    error::CoordinatorError,
    node::NodeStats,
    runtime::{LoopStats, Runtime, TickOutcome},
    telemetry::{TelemetryReader, TelemetrySnapshot},
    watchdog::NodeMode,
};
use windwall_proto::{NodeId, PulseMap, WireOrder};

use crate::{SimBus, SimEnv, SimNode, scenario::ScenarioSignal};

/// Everything a scenario produced.
pub struct World {
    config: SystemConfig,
    pulse_map: PulseMap,
    wire_order: WireOrder,
    runtime: Runtime<ScenarioSignal, SimBus, SimEnv>,
    telemetry: TelemetryReader,
    outcomes: Vec<TickOutcome>,
    fatal: Option<CoordinatorError>,
}

impl World {
    pub(crate) fn new(
        config: SystemConfig,
        pulse_map: PulseMap,
        wire_order: WireOrder,
        runtime: Runtime<ScenarioSignal, SimBus, SimEnv>,
        telemetry: TelemetryReader,
    ) -> Self {
        Self {
            config,
            pulse_map,
            wire_order,
            runtime,
            telemetry,
            outcomes: Vec::new(),
            fatal: None,
        }
    }

    pub(crate) fn runtime_mut(&mut self) -> &mut Runtime<ScenarioSignal, SimBus, SimEnv> {
        &mut self.runtime
    }

    pub(crate) fn record_outcome(&mut self, outcome: TickOutcome) {
        self.outcomes.push(outcome);
    }

    pub(crate) fn record_fatal(&mut self, error: CoordinatorError) {
        self.fatal = Some(error);
    }

    /// Configuration the scenario ran with.
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Simulated bus.
    pub fn bus(&self) -> &SimBus {
        self.runtime.bus()
    }

    /// All nodes in table order.
    pub fn nodes(&self) -> &[SimNode] {
        self.bus().nodes()
    }

    /// A node by id.
    pub fn node(&self, id: NodeId) -> Option<&SimNode> {
        self.bus().node(id)
    }

    /// Pulse driven at every frame position, in node table order.
    ///
    /// Equals logical motor order unless a wire order is configured.
    pub fn motor_outputs(&self) -> Vec<u16> {
        self.bus().motor_outputs()
    }

    /// What [`World::motor_outputs`] must read once the coordinator's last
    /// committed outputs have been delivered intact: each value quantized to
    /// a byte and decoded again, placed at its wire position.
    pub fn expected_motor_outputs(&self) -> Vec<u16> {
        let committed = self.coordinator_outputs();
        self.wire_order
            .iter()
            .map(|motor| self.pulse_map.decode(self.pulse_map.encode(committed[motor])))
            .collect()
    }

    /// Outcome of every tick in order.
    pub fn outcomes(&self) -> &[TickOutcome] {
        &self.outcomes
    }

    /// Coordinator loop counters.
    pub fn loop_stats(&self) -> LoopStats {
        self.runtime.stats()
    }

    /// Counters of one node.
    pub fn node_stats(&self, id: NodeId) -> Option<NodeStats> {
        self.node(id).map(|node| node.context.stats())
    }

    /// Outputs the coordinator last committed.
    pub fn coordinator_outputs(&self) -> Vec<u16> {
        self.runtime.coordinator().previous()
    }

    /// Latest telemetry snapshot.
    pub fn telemetry(&self) -> Option<TelemetrySnapshot> {
        self.telemetry.snapshot()
    }

    /// Error that stopped the coordinator, if any.
    pub fn fatal_error(&self) -> Option<&CoordinatorError> {
        self.fatal.as_ref()
    }

    /// Virtual time since the scenario started.
    pub fn elapsed(&self) -> Duration {
        self.bus().env().elapsed()
    }

    /// True if every node has output authority.
    pub fn all_armed(&self) -> bool {
        self.nodes().iter().all(|node| node.context.mode() == NodeMode::Armed)
    }

    /// True if every node is in fail-safe and driving idle.
    pub fn all_idle(&self) -> bool {
        let idle = self.config.node.idle_us;
        self.nodes().iter().all(|node| {
            node.context.mode() == NodeMode::FailSafe
                && node.actuator.pulses().iter().all(|&pulse| pulse == idle)
        })
    }
}
