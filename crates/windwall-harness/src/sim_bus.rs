//! In-process bus feeding simulated nodes.
//!
//! Bytes are clocked out one at a time on the shared virtual clock and
//! broadcast to every node; the sync pulse signals every node's edge handle
//! and then lets each node's main loop run. Faults are one-shot or counted
//! and apply to the next frames written:
//!
//! - `drop_byte_at`: the byte at a frame position never arrives
//! - `corrupt_byte_at`: the byte at a frame position arrives with a new value
//! - `suppress_sync`: the next sync pulses never reach the nodes
//! - `fail_next_writes` / `fail_next_syncs`: the coordinator sees an error
//! - `disconnect`: nothing reaches the nodes until `reconnect`
//! - `noise`: each byte is replaced by a random one with some probability

use std::time::Duration;

use thiserror::Error;
use tracing::trace;
use windwall_core::{
    env::Environment,
    node::{NodeAction, NodeConfig, NodeContext},
    transport::Bus,
};
use windwall_proto::{Frame, NodeId, NodeTable};

use crate::{SimActuator, SimEnv};

/// Injected failures seen by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimBusError {
    /// `fail_next_writes` was armed.
    #[error("injected frame write failure")]
    Write,

    /// `fail_next_syncs` was armed.
    #[error("injected sync line failure")]
    Sync,
}

/// A node plus the outputs it drives.
#[derive(Debug)]
pub struct SimNode {
    /// Node state machine
    pub context: NodeContext,
    /// PWM outputs
    pub actuator: SimActuator,
    /// Every action the node produced
    pub actions: Vec<NodeAction>,
}

impl SimNode {
    fn poll(&mut self, env: &SimEnv) {
        for action in self.context.poll(env.now()) {
            action.apply_to(&mut self.actuator);
            self.actions.push(action);
        }
    }
}

/// Simulated byte stream plus sync line.
#[derive(Debug)]
pub struct SimBus {
    env: SimEnv,
    nodes: Vec<SimNode>,
    byte_time: Duration,
    drops: Vec<usize>,
    corruptions: Vec<(usize, u8)>,
    suppressed_syncs: usize,
    failing_writes: usize,
    failing_syncs: usize,
    noise: f64,
    connected: bool,
    frames_written: u64,
    syncs_delivered: u64,
}

impl SimBus {
    /// Byte time of a 1 MHz SPI clock.
    pub const DEFAULT_BYTE_TIME: Duration = Duration::from_micros(8);

    /// Bus with one node per table entry, all booted now.
    pub fn new(env: SimEnv, table: &NodeTable, config: &NodeConfig) -> Self {
        let now = env.now();
        let idle = config.pulse_map.idle();
        let nodes = table
            .entries()
            .iter()
            .map(|entry| SimNode {
                context: NodeContext::new(entry.clone(), config.clone(), now),
                actuator: SimActuator::new(entry.len(), idle),
                actions: Vec::new(),
            })
            .collect();

        Self {
            env,
            nodes,
            byte_time: Self::DEFAULT_BYTE_TIME,
            drops: Vec::new(),
            corruptions: Vec::new(),
            suppressed_syncs: 0,
            failing_writes: 0,
            failing_syncs: 0,
            noise: 0.0,
            connected: true,
            frames_written: 0,
            syncs_delivered: 0,
        }
    }

    /// Time to clock one byte.
    pub fn with_byte_time(mut self, byte_time: Duration) -> Self {
        self.byte_time = byte_time;
        self
    }

    /// Drop the byte at `position` of the next frame.
    pub fn drop_byte_at(&mut self, position: usize) {
        self.drops.push(position);
    }

    /// Replace the byte at `position` of the next frame.
    pub fn corrupt_byte_at(&mut self, position: usize, value: u8) {
        self.corruptions.push((position, value));
    }

    /// Swallow the next `count` sync pulses.
    pub fn suppress_sync(&mut self, count: usize) {
        self.suppressed_syncs += count;
    }

    /// Fail the next `count` frame writes.
    pub fn fail_next_writes(&mut self, count: usize) {
        self.failing_writes += count;
    }

    /// Fail the next `count` sync pulses.
    pub fn fail_next_syncs(&mut self, count: usize) {
        self.failing_syncs += count;
    }

    /// Replace each byte with a random one with probability `rate`.
    pub fn noise(&mut self, rate: f64) {
        self.noise = rate;
    }

    /// Cut the bus. Writes still succeed but nothing arrives.
    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    /// Restore the bus.
    pub fn reconnect(&mut self) {
        self.connected = true;
    }

    /// Clock raw bytes onto the stream, bypassing frame faults.
    pub fn deliver(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.env.advance(self.byte_time);
            if !self.connected {
                continue;
            }
            let now = self.env.now();
            for node in &mut self.nodes {
                node.context.receive_byte(byte, now);
            }
        }
    }

    /// Run every node's main loop once.
    pub fn poll_nodes(&mut self) {
        for node in &mut self.nodes {
            node.poll(&self.env);
        }
    }

    /// Let `duration` pass with no traffic, polling nodes every `step`.
    pub fn idle(&mut self, duration: Duration, step: Duration) {
        let step = step.max(Duration::from_micros(1));
        let mut waited = Duration::ZERO;
        while waited < duration {
            let slice = step.min(duration - waited);
            self.env.advance(slice);
            waited += slice;
            self.poll_nodes();
        }
    }

    /// Simulated nodes in table order.
    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    /// A node by id.
    pub fn node(&self, id: NodeId) -> Option<&SimNode> {
        self.nodes.iter().find(|node| node.context.id() == id)
    }

    /// Pulse currently driven on every motor, in motor order.
    pub fn motor_outputs(&self) -> Vec<u16> {
        self.nodes.iter().flat_map(|node| node.actuator.pulses().iter().copied()).collect()
    }

    /// Frames accepted by `write_frame`.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Sync edges that reached the nodes.
    pub fn syncs_delivered(&self) -> u64 {
        self.syncs_delivered
    }

    /// Shared clock.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    fn faulted_frame(&mut self, frame: &Frame) -> Vec<u8> {
        let drops = std::mem::take(&mut self.drops);
        let corruptions = std::mem::take(&mut self.corruptions);

        frame
            .iter()
            .enumerate()
            .filter(|(position, _)| !drops.contains(position))
            .map(|(position, byte)| {
                let byte = corruptions
                    .iter()
                    .find(|(at, _)| *at == position)
                    .map_or(byte, |&(_, value)| value);
                if self.env.chance(self.noise) { self.env.random_byte() } else { byte }
            })
            .collect()
    }
}

impl Bus for SimBus {
    type Error = SimBusError;

    fn write_frame(&mut self, frame: &Frame) -> Result<(), SimBusError> {
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(SimBusError::Write);
        }

        let bytes = self.faulted_frame(frame);
        self.deliver(&bytes);
        self.poll_nodes();
        self.frames_written += 1;
        Ok(())
    }

    fn pulse_sync(&mut self, width: Duration) -> Result<(), SimBusError> {
        if self.failing_syncs > 0 {
            self.failing_syncs -= 1;
            return Err(SimBusError::Sync);
        }

        let delivered = self.connected && self.suppressed_syncs == 0;
        self.suppressed_syncs = self.suppressed_syncs.saturating_sub(1);

        if delivered {
            for node in &self.nodes {
                node.context.sync_edge().signal();
            }
            self.syncs_delivered += 1;
        } else {
            trace!("sync pulse lost");
        }

        self.env.advance(width);
        self.poll_nodes();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use windwall_core::watchdog::NodeMode;

    use super::*;

    fn bus() -> SimBus {
        let config = NodeConfig { frame_len: 6, ..NodeConfig::default() };
        SimBus::new(SimEnv::new(), &NodeTable::uniform(2, 3), &config)
    }

    fn frame(bytes: [u8; 6]) -> Frame {
        Frame::new(bytes.to_vec(), 6).unwrap()
    }

    #[test]
    fn frame_then_sync_drives_outputs() {
        let mut bus = bus();
        bus.write_frame(&frame([255, 255, 255, 0, 0, 0])).unwrap();
        assert_eq!(bus.motor_outputs(), vec![1000; 6]);

        bus.pulse_sync(Duration::from_micros(10)).unwrap();
        assert_eq!(bus.motor_outputs(), vec![2000, 2000, 2000, 1000, 1000, 1000]);
        assert!(bus.nodes().iter().all(|n| n.context.mode() == NodeMode::Armed));
    }

    #[test]
    fn dropped_byte_applies_to_one_frame_only() {
        let mut bus = bus();
        bus.drop_byte_at(0);
        bus.write_frame(&frame([1, 2, 3, 4, 5, 6])).unwrap();
        bus.pulse_sync(Duration::from_micros(10)).unwrap();
        assert_eq!(bus.nodes()[1].context.active(), &[5, 6, 0]);

        bus.write_frame(&frame([1, 2, 3, 4, 5, 6])).unwrap();
        bus.pulse_sync(Duration::from_micros(10)).unwrap();
        assert_eq!(bus.nodes()[1].context.active(), &[4, 5, 6]);
    }

    #[test]
    fn suppressed_sync_latches_nothing() {
        let mut bus = bus();
        bus.suppress_sync(1);
        bus.write_frame(&frame([255; 6])).unwrap();
        bus.pulse_sync(Duration::from_micros(10)).unwrap();

        assert_eq!(bus.syncs_delivered(), 0);
        assert_eq!(bus.motor_outputs(), vec![1000; 6]);
    }

    #[test]
    fn injected_failures_are_counted_down() {
        let mut bus = bus();
        bus.fail_next_writes(1);
        assert_eq!(bus.write_frame(&frame([0; 6])), Err(SimBusError::Write));
        assert_eq!(bus.write_frame(&frame([0; 6])), Ok(()));
        assert_eq!(bus.frames_written(), 1);
    }
}
