//! Reusable oracles.

use crate::scenario::{OracleFn, World};

/// Passes only if every oracle passes; reports the first failure.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world| oracles.iter().try_for_each(|oracle| oracle(world)))
}

/// Wrap a closure as an oracle.
pub fn check<F>(f: F) -> OracleFn
where
    F: Fn(&World) -> Result<(), String> + 'static,
{
    Box::new(f)
}

/// Every node armed.
pub fn all_armed() -> OracleFn {
    Box::new(|world| {
        if world.all_armed() {
            Ok(())
        } else {
            Err(format!("not every node is armed: {:?}", modes(world)))
        }
    })
}

/// Every node in fail-safe, every motor at idle.
pub fn all_idle() -> OracleFn {
    Box::new(|world| {
        if world.all_idle() {
            Ok(())
        } else {
            Err(format!("expected every motor idle, got {:?}", world.motor_outputs()))
        }
    })
}

/// Every motor driven at exactly `pulse`.
pub fn all_motors_at(pulse: u16) -> OracleFn {
    Box::new(move |world| {
        let outputs = world.motor_outputs();
        match outputs.iter().position(|&p| p != pulse) {
            None => Ok(()),
            Some(motor) => {
                Err(format!("motor {motor} drives {} instead of {pulse}: {outputs:?}", outputs[motor]))
            },
        }
    })
}

/// Motor outputs exactly as given.
pub fn motors_equal(expected: Vec<u16>) -> OracleFn {
    Box::new(move |world| {
        let outputs = world.motor_outputs();
        if outputs == expected {
            Ok(())
        } else {
            Err(format!("motor outputs {outputs:?}, expected {expected:?}"))
        }
    })
}

/// The coordinator never stopped on a fatal error.
pub fn no_fatal_error() -> OracleFn {
    Box::new(|world| match world.fatal_error() {
        None => Ok(()),
        Some(error) => Err(format!("coordinator stopped: {error}")),
    })
}

/// Node outputs equal the coordinator's committed outputs as seen through
/// the wire (quantized, reordered).
///
/// Holds after any tick that was delivered intact.
pub fn nodes_follow_coordinator() -> OracleFn {
    Box::new(|world| {
        let expected = world.expected_motor_outputs();
        let outputs = world.motor_outputs();

        if outputs == expected {
            Ok(())
        } else {
            Err(format!("nodes drive {outputs:?}, coordinator committed {expected:?}"))
        }
    })
}

fn modes(world: &World) -> Vec<String> {
    world
        .nodes()
        .iter()
        .map(|node| format!("{}={:?}", node.context.id(), node.context.mode()))
        .collect()
}
