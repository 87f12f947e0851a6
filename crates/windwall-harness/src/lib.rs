//! Deterministic simulation harness for the Windwall protocol.
//!
//! A virtual clock and an in-process bus that feeds real node state machines,
//! so whole-system behavior (latching, resynchronization, fail-safe) can be
//! tested without hardware and without wall-clock sleeps.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod scenario;
pub mod sim_actuator;
pub mod sim_bus;
pub mod sim_env;

pub use sim_actuator::SimActuator;
pub use sim_bus::{SimBus, SimBusError, SimNode};
pub use sim_env::SimEnv;
