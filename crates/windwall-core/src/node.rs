//! Actuation node: frame parser, atomic latch and fail-safe.
//!
//! # Architecture
//!
//! A node lives in two execution contexts:
//!
//! - the **edge context** (interrupt on the sync line) only calls
//!   [`SyncEdge::signal`] on the handle returned by [`NodeContext::sync_edge`]
//! - the **main loop** owns the [`NodeContext`], feeds it bytes with
//!   [`NodeContext::receive_byte`] and calls [`NodeContext::poll`], executing
//!   the returned [`NodeAction`]s against the PWM outputs
//!
//! The pending buffer is written only by the main loop, so the copy into the
//! active buffer on an edge can never observe a half-written slot.
//!
//! # Parsing
//!
//! Every byte advances `stream_position`, which wraps after one frame.
//! Bytes whose position this node owns are stored in the pending buffer.
//! An edge resets the position to 0, so a dropped byte costs at most one
//! stale frame. A stream that stops mid-frame for longer than the stall
//! timeout is also reset.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{debug, info, trace, warn};
use windwall_proto::{Addressing, NodeAssignment, NodeId, PulseMap};

use crate::{
    handoff::SyncEdge,
    watchdog::{NodeMode, Watchdog},
};

/// Node parameters shared by every node on a bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Bytes per frame (total motor count)
    pub frame_len: usize,
    /// Byte to pulse mapping
    pub pulse_map: PulseMap,
    /// Sync silence before fail-safe
    pub watchdog_timeout: Duration,
    /// Mid-frame byte silence before the partial frame is dropped
    pub stall_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            frame_len: 36,
            pulse_map: PulseMap::default(),
            watchdog_timeout: Duration::from_millis(200),
            stall_timeout: Duration::from_millis(2),
        }
    }
}

/// Actions for the node driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeAction {
    /// Drive owned outputs with these pulse widths (slot order).
    Drive {
        /// Pulse width per owned motor (microseconds)
        pulses: Vec<u16>,
    },

    /// Watchdog expired: drive every owned output to idle.
    ForceIdle {
        /// Idle pulse per owned motor
        pulses: Vec<u16>,
        /// Sync silence that triggered the transition
        silent_for: Duration,
    },

    /// A sync edge re-armed the node after fail-safe.
    Resume,

    /// The stream stalled mid-frame and the parser was reset.
    StreamReset {
        /// Position the parser was at
        position: usize,
    },
}

/// PWM output stage of a node.
pub trait Actuator {
    /// Set the pulse width of one owned output.
    fn set_pulse(&mut self, channel: usize, pulse_us: u16);
}

impl NodeAction {
    /// Execute this action against an actuator.
    ///
    /// Only [`NodeAction::Drive`] and [`NodeAction::ForceIdle`] touch
    /// outputs.
    pub fn apply_to<A: Actuator + ?Sized>(&self, actuator: &mut A) {
        match self {
            Self::Drive { pulses } | Self::ForceIdle { pulses, .. } => {
                for (channel, &pulse) in pulses.iter().enumerate() {
                    actuator.set_pulse(channel, pulse);
                }
            },
            Self::Resume | Self::StreamReset { .. } => {},
        }
    }
}

/// Node counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    /// Bytes seen on the stream
    pub bytes_received: u64,
    /// Frames latched
    pub latches: u64,
    /// Mid-frame stall resets
    pub stall_resets: u64,
    /// Armed -> fail-safe transitions
    pub watchdog_expiries: u64,
    /// Fail-safe -> armed transitions
    pub resumes: u64,
    /// Edges that arrived while a previous edge was still pending
    pub coalesced_edges: u64,
}

/// Complete state of one node.
///
/// Everything a node's handlers touch lives here, so any number of nodes can
/// run side by side in one process.
#[derive(Debug)]
pub struct NodeContext<A: Addressing = NodeAssignment> {
    id: NodeId,
    addressing: A,
    config: NodeConfig,
    stream_position: usize,
    pending: Vec<u8>,
    active: Vec<u8>,
    outputs: Vec<u16>,
    watchdog: Watchdog,
    last_byte_at: Option<Instant>,
    edge: Arc<SyncEdge>,
    stats: NodeStats,
}

impl NodeContext<NodeAssignment> {
    /// Create a node owning the positions of `assignment`.
    pub fn new(assignment: NodeAssignment, config: NodeConfig, now: Instant) -> Self {
        Self::with_addressing(assignment.node, assignment, config, now)
    }
}

impl<A: Addressing> NodeContext<A> {
    /// Create a node with a custom addressing scheme.
    ///
    /// The node boots in fail-safe with every output at idle and the pending
    /// buffer holding the idle sentinel.
    pub fn with_addressing(id: NodeId, addressing: A, config: NodeConfig, now: Instant) -> Self {
        let slots = addressing.slots();
        let idle = config.pulse_map.idle();

        Self {
            id,
            addressing,
            stream_position: 0,
            pending: vec![0; slots],
            active: vec![0; slots],
            outputs: vec![idle; slots],
            watchdog: Watchdog::new(config.watchdog_timeout, now),
            last_byte_at: None,
            edge: Arc::new(SyncEdge::new()),
            stats: NodeStats::default(),
            config,
        }
    }

    /// Node identity.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Addressing scheme.
    pub fn addressing(&self) -> &A {
        &self.addressing
    }

    /// Handle for the edge context.
    pub fn sync_edge(&self) -> Arc<SyncEdge> {
        Arc::clone(&self.edge)
    }

    /// Feed one byte from the stream.
    pub fn receive_byte(&mut self, byte: u8, now: Instant) {
        if let Some(slot) = self.addressing.slot(self.stream_position)
            && let Some(pending) = self.pending.get_mut(slot)
        {
            *pending = byte;
        }

        self.stream_position += 1;
        if self.stream_position >= self.config.frame_len {
            self.stream_position = 0;
        }

        self.last_byte_at = Some(now);
        self.stats.bytes_received += 1;
    }

    /// Process a pending edge, stall timeout and watchdog.
    ///
    /// Call from the main loop at least once per byte batch and well within
    /// one frame period.
    pub fn poll(&mut self, now: Instant) -> Vec<NodeAction> {
        let mut actions = Vec::new();

        if self.edge.take() {
            self.latch(now, &mut actions);
        } else if let Some(position) = self.check_stall(now) {
            self.stream_position = 0;
            self.stats.stall_resets += 1;
            debug!(node = %self.id, position, "stream stalled mid-frame, parser reset");
            actions.push(NodeAction::StreamReset { position });
        }

        if let Some(silent_for) = self.watchdog.check(now) {
            self.outputs.fill(self.config.pulse_map.idle());
            self.stats.watchdog_expiries += 1;
            warn!(node = %self.id, ?silent_for, "no sync edge, forcing idle");
            actions.push(NodeAction::ForceIdle { pulses: self.outputs.clone(), silent_for });
        }

        actions
    }

    fn latch(&mut self, now: Instant, actions: &mut Vec<NodeAction>) {
        self.active.copy_from_slice(&self.pending);
        self.stream_position = 0;
        self.stats.latches += 1;

        if self.watchdog.feed(now) {
            self.stats.resumes += 1;
            info!(node = %self.id, "sync edge observed, armed");
            actions.push(NodeAction::Resume);
        }

        let pulse_map = self.config.pulse_map;
        for (output, &byte) in self.outputs.iter_mut().zip(&self.active) {
            *output = pulse_map.decode(byte);
        }

        trace!(node = %self.id, latches = self.stats.latches, "frame latched");
        actions.push(NodeAction::Drive { pulses: self.outputs.clone() });
    }

    fn check_stall(&self, now: Instant) -> Option<usize> {
        if self.stream_position == 0 {
            return None;
        }

        let last = self.last_byte_at?;
        if now.saturating_duration_since(last) > self.config.stall_timeout {
            Some(self.stream_position)
        } else {
            None
        }
    }

    /// Pulse widths currently driven, in slot order.
    pub fn outputs(&self) -> &[u16] {
        &self.outputs
    }

    /// Raw bytes of the last latched frame slice.
    pub fn active(&self) -> &[u8] {
        &self.active
    }

    /// Watchdog mode.
    pub fn mode(&self) -> NodeMode {
        self.watchdog.mode()
    }

    /// Bytes seen in the current frame.
    pub fn stream_position(&self) -> usize {
        self.stream_position
    }

    /// Counters, including coalesced edges from the edge context.
    pub fn stats(&self) -> NodeStats {
        NodeStats { coalesced_edges: self.edge.coalesced(), ..self.stats }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const FRAME_LEN: usize = 12;

    fn config() -> NodeConfig {
        NodeConfig { frame_len: FRAME_LEN, ..NodeConfig::default() }
    }

    fn node(range: std::ops::Range<usize>, now: Instant) -> NodeContext {
        NodeContext::new(NodeAssignment::new(NodeId(1), range), config(), now)
    }

    fn stream(node: &mut NodeContext, bytes: &[u8], now: Instant) {
        for &byte in bytes {
            node.receive_byte(byte, now);
        }
    }

    fn frame(f: impl Fn(usize) -> u8) -> Vec<u8> {
        (0..FRAME_LEN).map(f).collect()
    }

    #[derive(Default)]
    struct Recorder(Vec<(usize, u16)>);

    impl Actuator for Recorder {
        fn set_pulse(&mut self, channel: usize, pulse_us: u16) {
            self.0.push((channel, pulse_us));
        }
    }

    #[test]
    fn boots_idle_and_fail_safe() {
        let t0 = Instant::now();
        let node = node(4..8, t0);
        assert_eq!(node.outputs(), &[1000; 4]);
        assert_eq!(node.mode(), NodeMode::FailSafe);
    }

    #[test]
    fn stores_only_owned_positions() {
        let t0 = Instant::now();
        let mut node = node(4..8, t0);
        stream(&mut node, &frame(|i| i as u8 + 1), t0);
        assert_eq!(node.stream_position(), 0);

        node.sync_edge().signal();
        let actions = node.poll(t0);

        assert_eq!(node.active(), &[5, 6, 7, 8]);
        assert_eq!(actions[0], NodeAction::Resume);
        assert_eq!(
            actions[1],
            NodeAction::Drive { pulses: node.outputs().to_vec() }
        );
        assert_eq!(node.mode(), NodeMode::Armed);
    }

    #[test]
    fn nothing_changes_without_edge() {
        let t0 = Instant::now();
        let mut node = node(0..4, t0);
        stream(&mut node, &frame(|_| 200), t0);

        assert!(node.poll(t0).is_empty());
        assert_eq!(node.outputs(), &[1000; 4]);
    }

    #[test]
    fn zero_byte_latches_idle() {
        let t0 = Instant::now();
        let mut node = node(0..4, t0);
        stream(&mut node, &frame(|i| if i == 2 { 0 } else { 255 }), t0);
        node.sync_edge().signal();
        node.poll(t0);

        assert_eq!(node.outputs(), &[2000, 2000, 1000, 2000]);
    }

    #[test]
    fn edge_resets_position_mid_frame() {
        let t0 = Instant::now();
        let mut node = node(0..4, t0);
        stream(&mut node, &[9; 5], t0);
        assert_eq!(node.stream_position(), 5);

        node.sync_edge().signal();
        node.poll(t0);
        assert_eq!(node.stream_position(), 0);
    }

    #[test]
    fn stall_resets_position() {
        let t0 = Instant::now();
        let mut node = node(0..4, t0);
        stream(&mut node, &[9; 5], t0);

        assert!(node.poll(t0 + Duration::from_millis(1)).is_empty());
        let actions = node.poll(t0 + Duration::from_millis(3));

        assert_eq!(actions, vec![NodeAction::StreamReset { position: 5 }]);
        assert_eq!(node.stream_position(), 0);
        assert_eq!(node.stats().stall_resets, 1);
    }

    #[test]
    fn watchdog_forces_idle_then_resumes() {
        let t0 = Instant::now();
        let mut node = node(0..4, t0);
        stream(&mut node, &frame(|_| 255), t0);
        node.sync_edge().signal();
        node.poll(t0);
        assert_eq!(node.outputs(), &[2000; 4]);

        let late = t0 + Duration::from_millis(201);
        let actions = node.poll(late);
        assert!(matches!(
            actions.as_slice(),
            [NodeAction::ForceIdle { pulses, .. }] if pulses == &vec![1000; 4]
        ));
        assert_eq!(node.mode(), NodeMode::FailSafe);

        // Pending still holds the old frame; resuming uses whatever is latched.
        node.sync_edge().signal();
        let actions = node.poll(late + Duration::from_millis(1));
        assert_eq!(actions[0], NodeAction::Resume);
        assert_eq!(node.outputs(), &[2000; 4]);

        let stats = node.stats();
        assert_eq!(stats.watchdog_expiries, 1);
        assert_eq!(stats.resumes, 2);
        assert_eq!(stats.latches, 2);
    }

    #[test]
    fn apply_to_drives_every_slot() {
        let action = NodeAction::Drive { pulses: vec![1100, 1200] };
        let mut recorder = Recorder::default();
        action.apply_to(&mut recorder);
        assert_eq!(recorder.0, vec![(0, 1100), (1, 1200)]);

        let mut recorder = Recorder::default();
        NodeAction::Resume.apply_to(&mut recorder);
        assert!(recorder.0.is_empty());
    }

    proptest! {
        #[test]
        fn prop_latch_is_never_torn(
            old in 1u8..=100,
            new in 156u8..=255,
            start in 0usize..FRAME_LEN,
            len in 1usize..=4,
        ) {
            let end = (start + len).min(FRAME_LEN);
            let t0 = Instant::now();
            let mut node = node(start..end, t0);

            stream(&mut node, &frame(|_| old), t0);
            node.sync_edge().signal();
            node.poll(t0);
            let old_outputs = node.outputs().to_vec();

            stream(&mut node, &frame(|_| new), t0);
            node.sync_edge().signal();
            node.poll(t0);

            let map = PulseMap::default();
            prop_assert_ne!(&old_outputs, &node.outputs().to_vec());
            prop_assert!(node.outputs().iter().all(|&p| p == map.decode(new)));
        }

        #[test]
        fn prop_realigns_after_dropped_byte(
            drop_at in 0usize..FRAME_LEN,
            frames in 2usize..6,
        ) {
            let t0 = Instant::now();
            let mut node = node(8..12, t0);
            let expected = frame(|i| i as u8 + 10);

            let mut garbled = expected.clone();
            garbled.remove(drop_at);
            stream(&mut node, &garbled, t0);
            node.sync_edge().signal();
            node.poll(t0);

            for _ in 0..frames {
                stream(&mut node, &expected, t0);
                node.sync_edge().signal();
                node.poll(t0);
                prop_assert_eq!(node.active(), &expected[8..12]);
            }
        }
    }
}
