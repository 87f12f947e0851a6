//! Latch atomicity properties.
//!
//! Two frames are built from disjoint byte ranges, so any interleaving of the
//! two would be visible in the outputs. Whatever happens on the wire, every
//! node must show exactly one of them.

use std::time::Duration;

use proptest::prelude::*;
use windwall_core::{env::Environment, node::NodeConfig, transport::Bus};
use windwall_harness::{SimBus, SimEnv};
use windwall_proto::{Frame, NodeTable, PulseMap};

const N_MOTORS: usize = 36;
const SETTLE: Duration = Duration::from_micros(5);
const PULSE: Duration = Duration::from_micros(10);

fn bus() -> SimBus {
    let config = NodeConfig { frame_len: N_MOTORS, ..NodeConfig::default() };
    SimBus::new(SimEnv::new(), &NodeTable::uniform(4, 9), &config)
}

fn send(bus: &mut SimBus, bytes: &[u8]) {
    let frame = Frame::new(bytes.to_vec(), N_MOTORS).unwrap();
    bus.write_frame(&frame).unwrap();
    bus.env().wait(SETTLE);
    bus.pulse_sync(PULSE).unwrap();
}

fn decoded(bytes: &[u8]) -> Vec<u16> {
    let map = PulseMap::default();
    bytes.iter().map(|&b| map.decode(b)).collect()
}

fn low_frame() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(1u8..=100, N_MOTORS)
}

fn high_frame() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(156u8..=255, N_MOTORS)
}

proptest! {
    #[test]
    fn prop_each_edge_applies_the_last_complete_frame(
        low in low_frame(),
        high in high_frame(),
        order in prop::collection::vec(any::<bool>(), 1..20),
    ) {
        let mut bus = bus();
        for pick_high in order {
            let frame = if pick_high { &high } else { &low };
            send(&mut bus, frame);
            prop_assert_eq!(bus.motor_outputs(), decoded(frame));
        }
    }

    #[test]
    fn prop_streaming_never_changes_outputs_before_the_edge(
        low in low_frame(),
        high in high_frame(),
        split in 1usize..N_MOTORS,
    ) {
        let mut bus = bus();
        send(&mut bus, &low);
        let before = bus.motor_outputs();

        // Half of the next frame, then the rest, without an edge.
        bus.deliver(&high[..split]);
        bus.poll_nodes();
        prop_assert_eq!(&bus.motor_outputs(), &before);

        bus.deliver(&high[split..]);
        bus.poll_nodes();
        prop_assert_eq!(&bus.motor_outputs(), &before);

        bus.env().wait(SETTLE);
        bus.pulse_sync(PULSE).unwrap();
        prop_assert_eq!(bus.motor_outputs(), decoded(&high));
    }

    #[test]
    fn prop_lost_edge_delays_but_never_mixes(
        low in low_frame(),
        high in high_frame(),
    ) {
        let mut bus = bus();
        send(&mut bus, &low);

        bus.suppress_sync(1);
        send(&mut bus, &high);
        prop_assert_eq!(bus.motor_outputs(), decoded(&low));

        // The pending buffer holds a complete high frame; the next edge
        // applies it even before a new frame arrives.
        bus.pulse_sync(PULSE).unwrap();
        prop_assert_eq!(bus.motor_outputs(), decoded(&high));
    }
}
