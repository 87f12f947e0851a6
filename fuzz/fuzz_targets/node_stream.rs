//! Arbitrary byte, edge and silence interleavings against one node.
//!
//! Input is read as `(op, value)` pairs. After every operation the node must
//! hold a valid stream position, drive only in-range pulses, and drive idle
//! whenever it is in fail-safe.

#![no_main]

use std::time::{Duration, Instant};

use libfuzzer_sys::fuzz_target;
use windwall_core::{
    node::{NodeAction, NodeConfig, NodeContext},
    watchdog::NodeMode,
};
use windwall_proto::{NodeAssignment, NodeId};

const FRAME_LEN: usize = 12;

fuzz_target!(|data: &[u8]| {
    let config = NodeConfig { frame_len: FRAME_LEN, ..NodeConfig::default() };
    let map = config.pulse_map;
    let mut now = Instant::now();
    let mut node = NodeContext::new(NodeAssignment::new(NodeId(1), 4..9), config, now);
    let edge = node.sync_edge();

    for pair in data.chunks_exact(2) {
        let (op, value) = (pair[0], pair[1]);
        match op % 4 {
            0 => {
                now += Duration::from_micros(8);
                node.receive_byte(value, now);
            },
            1 => {
                edge.signal();
            },
            2 => {
                now += Duration::from_micros(u64::from(value) * 100);
            },
            _ => {},
        }

        for action in node.poll(now) {
            if let NodeAction::Drive { pulses } | NodeAction::ForceIdle { pulses, .. } = &action {
                assert_eq!(pulses.len(), 5);
            }
        }

        assert!(node.stream_position() < FRAME_LEN);
        assert!(node.outputs().iter().all(|&p| p >= map.idle() && p <= map.active_max()));
        if node.mode() == NodeMode::FailSafe {
            assert!(node.outputs().iter().all(|&p| p == map.idle()));
        }
    }

    let stats = node.stats();
    assert!(stats.latches <= edge.edges());
});
